use std::path::Path;

use vibe_core::executor::Outcome;
use vibe_core::gate::TerminalPrompter;
use vibe_core::interpreter::Interpreter;

use crate::cmd::{open_session, runtime};
use crate::output::{print_json, read_input};

pub fn run(root: &Path, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let text = read_input(file)?;
    if file.is_none() {
        tracing::warn!("response read from stdin; confirmations will see end of input and reject");
    }

    let session = open_session(root)?;
    let prompter = if json {
        TerminalPrompter::stderr()
    } else {
        TerminalPrompter::new()
    };
    let mut interpreter = Interpreter::new(session, prompter, !json && console::colors_enabled());

    let report = runtime()?.block_on(interpreter.run_turn(&text))?;

    if json {
        print_json(&report.summaries())?;
    } else if !report.acted() {
        println!("No directives found.");
    } else {
        println!(
            "\n{} of {} directive(s) applied.",
            report.applied(),
            report.reports.len()
        );
    }

    let errors = report
        .reports
        .iter()
        .filter(|r| !r.outcome.is_applied() && !matches!(r.outcome, Outcome::Rejected))
        .count();
    if errors > 0 {
        anyhow::bail!("{errors} directive(s) could not be applied");
    }
    Ok(())
}
