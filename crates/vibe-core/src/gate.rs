//! The confirmation checkpoint in front of every directive.
//!
//! [`ConfirmationGate`] is the only place an [`Approval`] can be created. The
//! executor demands one per directive, bound to that directive's id and
//! consumed by value, so a directive cannot run without an affirmative answer
//! and cannot run twice on the same answer.

use std::collections::VecDeque;
use std::fmt;
use std::io::{BufRead, Write};

use serde::Serialize;

use crate::error::Result;
use crate::preview::Preview;
use crate::validate::PlannedDirective;

/// Word the user must type to approve a dangerous command.
pub const STRONG_CONFIRMATION: &str = "confirm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DirectiveId(u64);

impl DirectiveId {
    pub(crate) fn new(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for DirectiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Proof that the user approved one specific directive.
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct Approval {
    id: DirectiveId,
}

impl Approval {
    pub fn id(&self) -> DirectiveId {
        self.id
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Approved(Approval),
    Rejected,
}

// ---------------------------------------------------------------------------
// Prompter
// ---------------------------------------------------------------------------

/// Where previews are shown and answers come from.
pub trait Prompter {
    fn show(&mut self, text: &str);

    /// `Ok(None)` means input is exhausted.
    fn ask(&mut self, question: &str) -> std::io::Result<Option<String>>;
}

/// Reads answers line by line from stdin; writes to stdout, or to stderr when
/// stdout is reserved for machine-readable output.
#[derive(Debug, Default)]
pub struct TerminalPrompter {
    to_stderr: bool,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stderr() -> Self {
        Self { to_stderr: true }
    }

    fn out(&self) -> Box<dyn Write> {
        if self.to_stderr {
            Box::new(std::io::stderr())
        } else {
            Box::new(std::io::stdout())
        }
    }
}

impl Prompter for TerminalPrompter {
    fn show(&mut self, text: &str) {
        let _ = writeln!(self.out(), "{text}");
    }

    fn ask(&mut self, question: &str) -> std::io::Result<Option<String>> {
        let mut out = self.out();
        write!(out, "{question}")?;
        out.flush()?;
        let mut line = String::new();
        let n = std::io::stdin().lock().read_line(&mut line)?;
        if n == 0 {
            writeln!(out)?;
            return Ok(None);
        }
        Ok(Some(line))
    }
}

/// Canned answers, for tests and non-interactive callers.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub shown: Vec<String>,
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            shown: Vec::new(),
            asked: Vec::new(),
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }

    fn ask(&mut self, question: &str) -> std::io::Result<Option<String>> {
        self.asked.push(question.to_string());
        Ok(self.answers.pop_front())
    }
}

// ---------------------------------------------------------------------------
// ConfirmationGate
// ---------------------------------------------------------------------------

pub struct ConfirmationGate<P> {
    prompter: P,
    color: bool,
}

impl<P: Prompter> ConfirmationGate<P> {
    pub fn new(prompter: P, color: bool) -> Self {
        Self { prompter, color }
    }

    pub fn prompter(&self) -> &P {
        &self.prompter
    }

    pub fn prompter_mut(&mut self) -> &mut P {
        &mut self.prompter
    }

    /// Show the preview and block for an answer.
    pub fn confirm(&mut self, planned: &PlannedDirective, preview: &Preview) -> Result<Decision> {
        self.prompter.show(&preview.render(self.color));

        let approved = if planned.risk.dangerous {
            let answer = self.prompter.ask(&format!(
                "This command is flagged as DANGEROUS. Type '{STRONG_CONFIRMATION}' to proceed: "
            ))?;
            answer.is_some_and(|a| a.trim() == STRONG_CONFIRMATION)
        } else {
            let answer = self.prompter.ask("Apply? [y/N] ")?;
            answer.is_some_and(|a| is_yes(&a))
        };

        if approved {
            tracing::debug!(id = %planned.id, directive = %planned.directive, "approved");
            Ok(Decision::Approved(Approval { id: planned.id }))
        } else {
            tracing::debug!(id = %planned.id, directive = %planned.directive, "rejected");
            Ok(Decision::Rejected)
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
