use std::io::Write;
use std::path::Path;

use anyhow::Context;
use futures::StreamExt;
use vibe_core::context::Scanner;
use vibe_core::directive::{strip_directives, DirectiveBuffer, ParseItem, OPEN_MARKER};
use vibe_core::gate::{Prompter, TerminalPrompter};
use vibe_core::interpreter::{Interpreter, TurnReport};
use vibe_core::paths;
use vibe_core::session::Session;
use vibe_llm::{ChatClient, ChatOptions, Conversation};

use crate::cmd::{open_session, runtime};
use crate::prompt::system_prompt;

type Chat = Interpreter<TerminalPrompter>;

pub fn run(root: &Path, with_context: bool) -> anyhow::Result<()> {
    let env_file = paths::env_path(root);
    if env_file.exists() {
        if let Err(e) = dotenvy::from_path(&env_file) {
            tracing::warn!(error = %e, "could not load {}", env_file.display());
        }
    }

    let session = open_session(root)?;
    let cfg = session.config();
    let options = ChatOptions {
        model: cfg.model.clone(),
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
    };
    let client = ChatClient::from_env(&cfg.api_base_url, options)?;

    runtime()?.block_on(chat_loop(session, client, with_context))
}

async fn chat_loop(session: Session, client: ChatClient, with_context: bool) -> anyhow::Result<()> {
    let max_turns = session.config().max_history_turns;
    let mut convo = Conversation::new(system_prompt(&session));
    let mut chat = Interpreter::new(session, TerminalPrompter::new(), console::colors_enabled());

    println!("vibe | {}", client.options().model);
    println!("root: {}", chat.session().root().display());
    let pm = chat.session().package_manager();
    if pm.is_available() {
        println!("package manager: {pm}");
    } else {
        println!("package manager: {pm} (not found on PATH)");
    }
    if with_context {
        refresh_context(&chat, &mut convo)?;
    }
    println!("Type 'refresh' to rescan the project, 'exit' to quit.");

    loop {
        let Some(line) = chat.prompter_mut().ask("\n(you) > ")? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "exit" | "quit" => break,
            "refresh" => {
                refresh_context(&chat, &mut convo)?;
                continue;
            }
            input => {
                convo.push_user(input);
                convo.prune(max_turns);
            }
        }
        if let Err(e) = turn(&client, &mut convo, &mut chat, with_context).await {
            eprintln!("error: {e:#}");
        }
    }
    Ok(())
}

/// One user message: stream the reply, run its directives, and when every
/// directive applied, give the model one follow-up.
async fn turn(
    client: &ChatClient,
    convo: &mut Conversation,
    chat: &mut Chat,
    with_context: bool,
) -> anyhow::Result<()> {
    let (text, items) = stream_reply(client, convo).await?;
    convo.push_assistant(text);

    let report = chat.run_items(items).await?;
    if !record(&report, convo, chat, with_context)? {
        return Ok(());
    }
    if report.has_failures() {
        println!("\nNot everything was applied; over to you.");
        return Ok(());
    }

    println!("\nProcessing next steps...");
    let follow_up = client
        .complete(&convo.messages())
        .await
        .context("follow-up request failed")?;
    let prose = strip_directives(&follow_up);
    if !prose.trim().is_empty() {
        println!("\n{}", prose.trim());
    }
    convo.push_assistant(follow_up.as_str());
    let report = chat.run_turn(&follow_up).await?;
    record(&report, convo, chat, with_context)?;
    Ok(())
}

/// Feed results back to the model. Returns false when nothing was attempted.
fn record(
    report: &TurnReport,
    convo: &mut Conversation,
    chat: &Chat,
    with_context: bool,
) -> anyhow::Result<bool> {
    if !report.acted() {
        return Ok(false);
    }
    convo.push_system(report.feedback());
    if report.refresh_requested() || (with_context && report.applied() > 0) {
        refresh_context(chat, convo)?;
    }
    Ok(true)
}

/// Stream the assistant reply, echoing prose until the first directive
/// marker. Directives completed mid-stream are collected in order.
async fn stream_reply(
    client: &ChatClient,
    convo: &Conversation,
) -> anyhow::Result<(String, Vec<ParseItem>)> {
    let mut stream = client.stream(&convo.messages()).await?;
    let mut buffer = DirectiveBuffer::new();
    let mut items = Vec::new();
    let mut shown = 0;
    let mut out = std::io::stdout();

    println!();
    while let Some(delta) = stream.next().await {
        items.extend(buffer.push(&delta?));
        let end = visible_prefix(buffer.text(), false);
        if end > shown {
            write!(out, "{}", &buffer.text()[shown..end])?;
            out.flush()?;
            shown = end;
        }
    }

    let (text, rest) = buffer.finish();
    items.extend(rest);
    let end = visible_prefix(&text, true);
    if end > shown {
        write!(out, "{}", &text[shown..end])?;
    }
    if end < text.len() {
        let prose = strip_directives(&text[end..]);
        if !prose.trim().is_empty() {
            write!(out, "\n{}", prose.trim())?;
        }
    }
    writeln!(out)?;
    Ok((text, items))
}

/// How much of `text` can be echoed: everything before the first `>>>`.
/// While streaming, trailing `>` characters are held back in case they are
/// the start of a marker.
fn visible_prefix(text: &str, complete: bool) -> usize {
    if let Some(i) = text.find(OPEN_MARKER) {
        return i;
    }
    if complete {
        return text.len();
    }
    text.trim_end_matches('>').len()
}

fn refresh_context(chat: &Chat, convo: &mut Conversation) -> anyhow::Result<()> {
    let session = chat.session();
    let snapshot = Scanner::new(&session.config().context)
        .scan(session.cwd(), session.cwd())
        .context("failed to scan the project")?;
    tracing::info!(
        files = snapshot.files.len(),
        skipped = snapshot.skipped.len(),
        chars = snapshot.char_count(),
        "project context loaded"
    );
    convo.replace_context(format!(
        "Working directory: `{}` (relative to the project root)\n\n{}",
        session.relative_cwd(),
        snapshot.render()
    ));
    println!(
        "context: {} file(s) from {}",
        snapshot.files.len(),
        session.relative_cwd()
    );
    Ok(())
}
