//! What the user sees before answering the gate.

use std::fmt::Write as _;
use std::path::Path;

use console::style;
use serde::Serialize;

use crate::error::Result;
use crate::validate::{Action, PlannedDirective, ShellPurpose};

/// Above this many LCS cells the diff degrades to remove-all/add-all.
const MAX_DIFF_CELLS: usize = 4_000_000;
/// Unchanged lines kept around each change.
const CONTEXT_LINES: usize = 3;

// ---------------------------------------------------------------------------
// Line diff
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "line", rename_all = "snake_case")]
pub enum DiffLine {
    Unchanged(String),
    Removed(String),
    Added(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LineDiff {
    pub lines: Vec<DiffLine>,
}

impl LineDiff {
    pub fn compute(old: &str, new: &str) -> Self {
        let a: Vec<&str> = old.lines().collect();
        let b: Vec<&str> = new.lines().collect();

        let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
        let suffix = a[prefix..]
            .iter()
            .rev()
            .zip(b[prefix..].iter().rev())
            .take_while(|(x, y)| x == y)
            .count();

        let mut lines: Vec<DiffLine> = a[..prefix]
            .iter()
            .map(|l| DiffLine::Unchanged(l.to_string()))
            .collect();

        let mid_a = &a[prefix..a.len() - suffix];
        let mid_b = &b[prefix..b.len() - suffix];
        if mid_a.len().saturating_mul(mid_b.len()) > MAX_DIFF_CELLS {
            lines.extend(mid_a.iter().map(|l| DiffLine::Removed(l.to_string())));
            lines.extend(mid_b.iter().map(|l| DiffLine::Added(l.to_string())));
        } else {
            lines.extend(lcs_diff(mid_a, mid_b));
        }

        lines.extend(
            a[a.len() - suffix..]
                .iter()
                .map(|l| DiffLine::Unchanged(l.to_string())),
        );
        Self { lines }
    }

    pub fn added(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .count()
    }

    pub fn removed(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .count()
    }

    pub fn is_unchanged(&self) -> bool {
        self.added() == 0 && self.removed() == 0
    }
}

fn lcs_diff(a: &[&str], b: &[&str]) -> Vec<DiffLine> {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // table[i][j] = LCS length of a[i..] and b[j..]
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if a[i] == b[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(DiffLine::Unchanged(a[i].to_string()));
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            out.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else {
            out.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|l| DiffLine::Removed(l.to_string())));
    out.extend(b[j..].iter().map(|l| DiffLine::Added(l.to_string())));
    out
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum PreviewLine {
    Added(String),
    Removed(String),
    Context(String),
    Elided(usize),
    Info(String),
    Command(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub title: String,
    pub lines: Vec<PreviewLine>,
    pub warnings: Vec<String>,
    pub dangerous: bool,
}

impl Preview {
    pub fn of(planned: &PlannedDirective) -> Result<Self> {
        let kind = planned.directive.kind();
        let mut lines = Vec::new();
        let mut warnings = Vec::new();

        let title = match &planned.action {
            Action::Write { path, rel, content } => {
                let title = write_preview(path, rel, content, &mut lines)?;
                format!("{kind} {title}")
            }
            Action::Delete { path, rel } => {
                let meta = std::fs::symlink_metadata(path)?;
                if meta.file_type().is_symlink() {
                    lines.push(PreviewLine::Info("symbolic link (the link itself is removed)".into()));
                } else if meta.is_dir() {
                    let (bytes, files) = crate::io::disk_usage(path)?;
                    lines.push(PreviewLine::Info(format!(
                        "directory, {files} file(s), {bytes} bytes"
                    )));
                } else {
                    lines.push(PreviewLine::Info(format!("file, {} bytes", meta.len())));
                }
                lines.push(PreviewLine::Info(
                    "a backup is written to .vibe/backups before removal".into(),
                ));
                format!("{kind} {rel}")
            }
            Action::Shell { command, purpose } => {
                lines.push(PreviewLine::Command(command.command.clone()));
                if command.command != command.original {
                    lines.push(PreviewLine::Info(format!("proposed as: {}", command.original)));
                }
                if let ShellPurpose::Create { project_dir } = purpose {
                    let name = project_dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    lines.push(PreviewLine::Info(format!("creates project directory '{name}'")));
                    if project_dir.exists() {
                        warnings.push(format!("'{name}' already exists"));
                    }
                }
                if matches!(purpose, ShellPurpose::Component) {
                    lines.push(PreviewLine::Info(
                        "adds shadcn/ui component source files to the project".into(),
                    ));
                }
                if !matches!(purpose, ShellPurpose::Run) {
                    if let Some(program) = command.command.split_whitespace().next() {
                        if which::which(program).is_err() {
                            warnings.push(format!("'{program}' was not found on PATH"));
                        }
                    }
                }
                if planned.risk.dangerous {
                    warnings.push("DANGEROUS: matches a destructive command pattern".into());
                }
                if planned.risk.long_running {
                    warnings.push(
                        "long-running command: it is killed when the command timeout expires"
                            .into(),
                    );
                }
                format!("{kind} {}", planned.directive.target())
            }
            Action::Read { path, rel } => {
                let what = if path.is_dir() { "directory scan" } else { "file" };
                lines.push(PreviewLine::Info(format!("sends {what} '{rel}' to the assistant")));
                format!("{kind} {rel}")
            }
            Action::Cd { rel, .. } => {
                lines.push(PreviewLine::Info(format!("working directory becomes '{rel}'")));
                format!("{kind} {rel}")
            }
            Action::Tree { rel, .. } => {
                lines.push(PreviewLine::Info(format!(
                    "sends the directory tree of '{rel}' to the assistant"
                )));
                format!("{kind} {rel}")
            }
            Action::ListFiles { rel, .. } => {
                lines.push(PreviewLine::Info(format!(
                    "sends the entries of '{rel}' to the assistant"
                )));
                format!("{kind} {rel}")
            }
            Action::Refresh { rel, .. } => {
                lines.push(PreviewLine::Info(format!(
                    "rescans '{rel}' and replaces the assistant's project context"
                )));
                format!("{kind} {rel}")
            }
        };

        Ok(Self {
            title,
            lines,
            warnings,
            dangerous: planned.risk.dangerous,
        })
    }

    pub fn render(&self, color: bool) -> String {
        let paint = |text: String, f: fn(console::StyledObject<String>) -> console::StyledObject<String>| {
            if color {
                f(style(text)).force_styling(true).to_string()
            } else {
                text
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", paint(format!("── {} ──", self.title), |s| s.bold().cyan()));
        for line in &self.lines {
            let rendered = match line {
                PreviewLine::Added(l) => paint(format!("+ {l}"), |s| s.green()),
                PreviewLine::Removed(l) => paint(format!("- {l}"), |s| s.red()),
                PreviewLine::Context(l) => paint(format!("  {l}"), |s| s.dim()),
                PreviewLine::Elided(n) => paint(format!("  ... {n} unchanged line(s)"), |s| s.dim()),
                PreviewLine::Info(l) => format!("  {l}"),
                PreviewLine::Command(c) => paint(format!("  $ {c}"), |s| s.yellow()),
            };
            let _ = writeln!(out, "{rendered}");
        }
        for w in &self.warnings {
            let rendered = if self.dangerous {
                paint(format!("! {w}"), |s| s.red().bold())
            } else {
                paint(format!("! {w}"), |s| s.yellow())
            };
            let _ = writeln!(out, "{rendered}");
        }
        out.trim_end().to_string()
    }
}

fn write_preview(path: &Path, rel: &str, content: &str, lines: &mut Vec<PreviewLine>) -> Result<String> {
    if !path.exists() {
        let diff = LineDiff::compute("", content);
        push_diff(&diff, lines);
        return Ok(format!("{rel} (new file, {} line(s))", diff.added()));
    }

    let bytes = std::fs::read(path)?;
    let Ok(old) = String::from_utf8(bytes) else {
        lines.push(PreviewLine::Info(
            "existing file is not UTF-8 text; it will be replaced".into(),
        ));
        let diff = LineDiff::compute("", content);
        push_diff(&diff, lines);
        return Ok(format!("{rel} (replace binary)"));
    };

    let diff = LineDiff::compute(&old, content);
    if old == content {
        lines.push(PreviewLine::Info("content is identical".into()));
    } else if diff.is_unchanged() {
        lines.push(PreviewLine::Info("only line endings or the final newline change".into()));
    } else {
        push_diff(&diff, lines);
    }
    Ok(format!("{rel} (+{} -{})", diff.added(), diff.removed()))
}

/// Append the diff, collapsing long unchanged runs to their edges.
fn push_diff(diff: &LineDiff, out: &mut Vec<PreviewLine>) {
    let n = diff.lines.len();
    let mut i = 0;
    while i < n {
        match &diff.lines[i] {
            DiffLine::Added(l) => {
                out.push(PreviewLine::Added(l.clone()));
                i += 1;
            }
            DiffLine::Removed(l) => {
                out.push(PreviewLine::Removed(l.clone()));
                i += 1;
            }
            DiffLine::Unchanged(_) => {
                let start = i;
                while i < n && matches!(diff.lines[i], DiffLine::Unchanged(_)) {
                    i += 1;
                }
                let run = &diff.lines[start..i];
                let keep_head = if start == 0 { 0 } else { CONTEXT_LINES };
                let keep_tail = if i == n { 0 } else { CONTEXT_LINES };
                let context = |l: &DiffLine| match l {
                    DiffLine::Unchanged(s) => PreviewLine::Context(s.clone()),
                    _ => unreachable!("run holds only unchanged lines"),
                };
                if run.len() <= keep_head + keep_tail + 1 {
                    out.extend(run.iter().map(context));
                } else {
                    out.extend(run[..keep_head].iter().map(context));
                    out.push(PreviewLine::Elided(run.len() - keep_head - keep_tail));
                    out.extend(run[run.len() - keep_tail..].iter().map(context));
                }
            }
        }
    }
}
