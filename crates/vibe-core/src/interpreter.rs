//! One assistant turn, start to finish.
//!
//! For each item the parser yields, in document order and strictly one at a
//! time: validate, preview, confirm, then execute or skip. Every item ends up
//! as a [`DirectiveReport`]; nothing short of an I/O failure on the prompt
//! aborts the turn.

use std::fmt::Write as _;

use console::style;
use serde::Serialize;

use crate::directive::{self, DirectiveKind, ParseItem};
use crate::error::Result;
use crate::executor::{self, Outcome};
use crate::gate::{ConfirmationGate, Decision, Prompter};
use crate::preview::Preview;
use crate::session::Session;
use crate::validate;

/// Header of the results message fed back to the model.
pub const RESULTS_HEADER: &str = "SYSTEM: Results:";

#[derive(Debug)]
pub struct DirectiveReport {
    /// e.g. `WRITE src/app.ts`
    pub label: String,
    /// `None` for a malformed block.
    pub kind: Option<DirectiveKind>,
    pub outcome: Outcome,
}

impl DirectiveReport {
    /// One line for the user: status and summary, with command output below.
    pub fn render(&self, color: bool) -> String {
        let status = format!("[{}]", self.outcome.label());
        let status = if !color {
            status
        } else if self.outcome.is_applied() {
            style(status).green().force_styling(true).to_string()
        } else if matches!(self.outcome, Outcome::Rejected) {
            style(status).yellow().force_styling(true).to_string()
        } else {
            style(status).red().force_styling(true).to_string()
        };
        let mut out = format!("{status} {}: {}", self.label, self.outcome.message());
        if let Some(b) = self.outcome.backup() {
            let _ = write!(out, " (backup: {})", b.name);
        }
        let show_output = !matches!(
            self.kind,
            Some(DirectiveKind::Read) | Some(DirectiveKind::Tree)
        );
        if let (true, Some(output)) = (show_output, self.outcome.output()) {
            for line in output.lines() {
                let _ = write!(out, "\n    {line}");
            }
        }
        out
    }

    fn feedback(&self) -> String {
        let mut out = format!("- {} [{}]: {}", self.label, self.outcome.label(), self.outcome.message());
        if let Some(output) = self.outcome.output() {
            let _ = write!(out, "\n{}", output.trim_end());
        }
        out
    }
}

/// Serializable view of a report, for `--json` output.
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub directive: &'a str,
    pub status: &'static str,
    pub message: String,
    pub backup: Option<&'a str>,
    pub output: Option<&'a str>,
}

#[derive(Debug, Default)]
pub struct TurnReport {
    pub reports: Vec<DirectiveReport>,
}

impl TurnReport {
    /// True when the text contained at least one directive block.
    pub fn acted(&self) -> bool {
        !self.reports.is_empty()
    }

    pub fn applied(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_applied()).count()
    }

    /// True when an approved REFRESH asked for a new project snapshot.
    pub fn refresh_requested(&self) -> bool {
        self.reports
            .iter()
            .any(|r| r.kind == Some(DirectiveKind::Refresh) && r.outcome.is_applied())
    }

    /// Anything other than `applied`, including a rejection.
    pub fn has_failures(&self) -> bool {
        self.reports.iter().any(|r| !r.outcome.is_applied())
    }

    /// The message handed back to the model after the turn.
    pub fn feedback(&self) -> String {
        let mut out = String::from(RESULTS_HEADER);
        for r in &self.reports {
            out.push('\n');
            out.push_str(&r.feedback());
        }
        out
    }

    pub fn summaries(&self) -> Vec<ReportSummary<'_>> {
        self.reports
            .iter()
            .map(|r| ReportSummary {
                directive: &r.label,
                status: r.outcome.label(),
                message: r.outcome.message(),
                backup: r.outcome.backup().map(|b| b.name.as_str()),
                output: r.outcome.output(),
            })
            .collect()
    }
}

pub struct Interpreter<P> {
    session: Session,
    gate: ConfirmationGate<P>,
    color: bool,
}

impl<P: Prompter> Interpreter<P> {
    pub fn new(session: Session, prompter: P, color: bool) -> Self {
        Self {
            session,
            gate: ConfirmationGate::new(prompter, color),
            color,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn prompter(&self) -> &P {
        self.gate.prompter()
    }

    pub fn prompter_mut(&mut self) -> &mut P {
        self.gate.prompter_mut()
    }

    /// Parse `text` and handle every directive in it.
    pub async fn run_turn(&mut self, text: &str) -> Result<TurnReport> {
        let items: Vec<ParseItem> = directive::parse(text).collect();
        self.run_items(items).await
    }

    /// Handle already-parsed items, e.g. from a streaming buffer.
    pub async fn run_items<I>(&mut self, items: I) -> Result<TurnReport>
    where
        I: IntoIterator<Item = ParseItem>,
    {
        let mut report = TurnReport::default();
        for item in items {
            let r = self.handle(item).await?;
            self.gate.prompter_mut().show(&r.render(self.color));
            report.reports.push(r);
        }
        Ok(report)
    }

    async fn handle(&mut self, item: ParseItem) -> Result<DirectiveReport> {
        let parsed = match item {
            Ok(p) => p,
            Err(m) => {
                tracing::warn!(reason = %m.reason, at = m.span.start, "malformed directive");
                let label = m.raw.lines().next().unwrap_or_default().trim().to_string();
                return Ok(DirectiveReport {
                    label,
                    kind: None,
                    outcome: Outcome::Malformed(m),
                });
            }
        };

        let label = parsed.directive.to_string();
        let kind = Some(parsed.directive.kind());
        let planned = match validate::plan(&mut self.session, parsed.directive) {
            Ok(p) => p,
            Err(v) => {
                tracing::warn!(directive = %label, reason = %v, "directive failed validation");
                return Ok(DirectiveReport {
                    label,
                    kind,
                    outcome: Outcome::Invalid(v),
                });
            }
        };

        let preview = match Preview::of(&planned) {
            Ok(p) => p,
            Err(e) => {
                return Ok(DirectiveReport {
                    label,
                    kind,
                    outcome: Outcome::Failed {
                        summary: format!("could not prepare preview: {e}"),
                        output: None,
                    },
                })
            }
        };

        let outcome = match self.gate.confirm(&planned, &preview)? {
            Decision::Rejected => Outcome::Rejected,
            Decision::Approved(approval) => {
                executor::execute(&mut self.session, planned, approval).await?
            }
        };
        Ok(DirectiveReport {
            label,
            kind,
            outcome,
        })
    }
}
