//! Applying approved directives.
//!
//! [`execute`] takes the plan and its [`Approval`] by value. Failures while
//! applying become an [`Outcome`]; only a mismatched approval is an error.

use std::fmt;

use crate::backup::BackupRecord;
use crate::context::Scanner;
use crate::directive::MalformedDirective;
use crate::error::{Result, ValidationFailure, VibeError};
use crate::gate::Approval;
use crate::session::Session;
use crate::shell::{truncate_at_char_boundary, RunResult};
use crate::validate::{Action, PlannedDirective, ShellPurpose};

#[derive(Debug)]
pub enum Outcome {
    Applied {
        summary: String,
        backup: Option<BackupRecord>,
        output: Option<String>,
    },
    Rejected,
    Malformed(MalformedDirective),
    Invalid(ValidationFailure),
    BackupFailed(String),
    Failed {
        summary: String,
        output: Option<String>,
    },
    TimedOut {
        secs: u64,
    },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied { .. } => "applied",
            Outcome::Rejected => "rejected",
            Outcome::Malformed(_) => "malformed",
            Outcome::Invalid(_) => "invalid",
            Outcome::BackupFailed(_) => "backup failed",
            Outcome::Failed { .. } => "failed",
            Outcome::TimedOut { .. } => "timed out",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Outcome::Applied { summary, .. } | Outcome::Failed { summary, .. } => summary.clone(),
            Outcome::Rejected => "declined by the user; nothing was changed".to_string(),
            Outcome::Malformed(m) => m.reason.to_string(),
            Outcome::Invalid(v) => v.to_string(),
            Outcome::BackupFailed(e) => format!("{e}; the operation was not performed"),
            Outcome::TimedOut { secs } => {
                format!("did not finish within {secs}s and was terminated")
            }
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Outcome::Applied { output, .. } | Outcome::Failed { output, .. } => output.as_deref(),
            _ => None,
        }
    }

    pub fn backup(&self) -> Option<&BackupRecord> {
        match self {
            Outcome::Applied { backup, .. } => backup.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message())
    }
}

fn applied(summary: impl Into<String>) -> Outcome {
    Outcome::Applied {
        summary: summary.into(),
        backup: None,
        output: None,
    }
}

fn failed(summary: impl Into<String>) -> Outcome {
    Outcome::Failed {
        summary: summary.into(),
        output: None,
    }
}

/// Apply `planned`. The approval must have been issued for this directive.
pub async fn execute(
    session: &mut Session,
    planned: PlannedDirective,
    approval: Approval,
) -> Result<Outcome> {
    if approval.id() != planned.id {
        return Err(VibeError::ApprovalMismatch);
    }

    let outcome = match planned.action {
        Action::Write { path, rel, content } => {
            let backup = if path.is_file() {
                match session.backups().backup(&rel, &path) {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        tracing::warn!(path = %rel, error = %e, "backup failed; write skipped");
                        return Ok(Outcome::BackupFailed(e.to_string()));
                    }
                }
            } else {
                None
            };
            match crate::io::atomic_write(&path, content.as_bytes()) {
                Ok(()) => {
                    let verb = if backup.is_some() { "updated" } else { "created" };
                    tracing::info!(path = %rel, bytes = content.len(), verb, "file written");
                    Outcome::Applied {
                        summary: format!("{verb} {rel} ({} bytes)", content.len()),
                        backup,
                        output: None,
                    }
                }
                Err(e) => failed(format!("could not write {rel}: {e}")),
            }
        }

        Action::Delete { path, rel } => {
            let meta = match std::fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(_) => return Ok(Outcome::Invalid(ValidationFailure::NotFound(rel))),
            };
            let backup = if meta.file_type().is_symlink() {
                None
            } else {
                match session.backups().backup(&rel, &path) {
                    Ok(rec) => Some(rec),
                    Err(e) => {
                        tracing::warn!(path = %rel, error = %e, "backup failed; delete skipped");
                        return Ok(Outcome::BackupFailed(e.to_string()));
                    }
                }
            };
            let removed = if meta.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match removed {
                Ok(()) => {
                    tracing::info!(path = %rel, "deleted");
                    Outcome::Applied {
                        summary: format!("deleted {rel}"),
                        backup,
                        output: None,
                    }
                }
                Err(e) => failed(format!("could not delete {rel}: {e}")),
            }
        }

        Action::Shell { command, purpose } => {
            let runner = session.runner();
            let cwd = session.cwd().to_path_buf();
            match runner.run(&command, &cwd).await {
                Err(e) => failed(e.to_string()),
                Ok(RunResult::TimedOut(after)) => Outcome::TimedOut {
                    secs: after.as_secs(),
                },
                Ok(RunResult::Completed(out)) => {
                    let text = out.combined();
                    let output = (!text.is_empty()).then_some(text);
                    if !out.success() {
                        let code = out
                            .exit_code
                            .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
                        Outcome::Failed {
                            summary: format!("`{}` exited with {code}", command.command),
                            output,
                        }
                    } else {
                        let mut summary = format!("ran `{}`", command.command);
                        if let ShellPurpose::Create { project_dir } = purpose {
                            if let Ok(dir) = project_dir.canonicalize() {
                                if dir.is_dir() && dir.starts_with(session.root()) {
                                    session.set_cwd(dir);
                                    summary.push_str(&format!(
                                        "; working directory is now {}",
                                        session.relative_cwd()
                                    ));
                                }
                            }
                        }
                        tracing::info!(command = %command.command, "command succeeded");
                        Outcome::Applied {
                            summary,
                            backup: None,
                            output,
                        }
                    }
                }
            }
        }

        Action::Read { path, rel } => {
            let cfg = &session.config().context;
            if path.is_dir() {
                match Scanner::new(cfg).scan(&path, session.root()) {
                    Ok(snapshot) => Outcome::Applied {
                        summary: format!("read {} file(s) under {rel}", snapshot.files.len()),
                        backup: None,
                        output: Some(snapshot.render()),
                    },
                    Err(e) => failed(format!("could not read {rel}: {e}")),
                }
            } else {
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        let total = bytes.len();
                        let mut text = String::from_utf8_lossy(&bytes).into_owned();
                        let cap = usize::try_from(cfg.max_file_bytes).unwrap_or(usize::MAX);
                        let mut summary = format!("read {rel} ({total} bytes)");
                        if text.len() > cap {
                            truncate_at_char_boundary(&mut text, cap);
                            summary.push_str(&format!(", first {cap} bytes shown"));
                        }
                        Outcome::Applied {
                            summary,
                            backup: None,
                            output: Some(text),
                        }
                    }
                    Err(e) => failed(format!("could not read {rel}: {e}")),
                }
            }
        }

        Action::Cd { path, rel } => {
            session.set_cwd(path);
            applied(format!("working directory is now {rel}"))
        }

        Action::Tree { path, rel } => match Scanner::new(&session.config().context).tree(&path) {
            Ok(tree) => Outcome::Applied {
                summary: format!("listed {rel}"),
                backup: None,
                output: Some(tree),
            },
            Err(e) => failed(format!("could not list {rel}: {e}")),
        },

        Action::ListFiles { path, rel } => match crate::context::list_dir(&path) {
            Ok(listing) => Outcome::Applied {
                summary: format!("listed files in {rel}"),
                backup: None,
                output: Some(listing),
            },
            Err(e) => failed(format!("could not list {rel}: {e}")),
        },

        // The chat loop swaps the fresh snapshot into the conversation.
        Action::Refresh { path, rel } => {
            match Scanner::new(&session.config().context).scan(&path, &path) {
                Ok(snapshot) => applied(format!(
                    "rescanned {rel}: {} file(s), {} skipped",
                    snapshot.files.len(),
                    snapshot.skipped.len()
                )),
                Err(e) => failed(format!("could not rescan {rel}: {e}")),
            }
        }
    };

    Ok(outcome)
}
