//! Bounded, non-interactive shell execution.
//!
//! Commands proposed by the assistant run through the platform shell
//! (`sh -c` or `cmd /C`) with captured output and a hard timeout. Before a
//! command runs, [`NonInteractiveCommand::normalize`] decides how prompts are
//! suppressed: an auto-confirm flag for known scaffolders, a stdin of blank
//! lines for other prompt-prone commands, or a null stdin.

use std::fmt;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Result, VibeError};

/// Blank lines fed to commands that may prompt; each accepts one default.
const BLANK_LINES: usize = 64;
/// How long to wait for output readers after the shell itself has exited.
const READER_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// ShellPlatform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellPlatform {
    Posix,
    Windows,
}

impl ShellPlatform {
    pub fn current() -> Self {
        if cfg!(windows) {
            ShellPlatform::Windows
        } else {
            ShellPlatform::Posix
        }
    }

    pub fn program(self) -> &'static str {
        match self {
            ShellPlatform::Posix => "sh",
            ShellPlatform::Windows => "cmd",
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            ShellPlatform::Posix => "-c",
            ShellPlatform::Windows => "/C",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ShellPlatform::Posix => "posix",
            ShellPlatform::Windows => "windows",
        }
    }
}

impl fmt::Display for ShellPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NonInteractiveCommand
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PromptStrategy {
    /// The command carries a flag that answers its prompts.
    AutoConfirm { flag: String },
    /// Prompts read blank lines and take their defaults.
    BlankLines,
    /// No prompts expected; stdin is closed.
    NullStdin,
}

/// A shell command ready to run without a terminal attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonInteractiveCommand {
    /// The command as proposed.
    pub original: String,
    /// The command that will actually run.
    pub command: String,
    pub strategy: PromptStrategy,
    pub platform: ShellPlatform,
}

/// Scaffolders that accept an auto-confirm flag, matched by substring.
const AUTO_CONFIRM: &[(&str, &str)] = &[
    ("create-next-app", "--yes"),
    ("create astro", "--yes"),
    ("create-astro", "--yes"),
    ("create-remix", "--yes"),
    ("create-expo-app", "--yes"),
    ("shadcn", "--yes"),
    ("create t3-app", "--CI"),
    ("create-t3-app", "--CI"),
];

const PROMPT_PRONE: &[&str] = &[" create ", " init", "create-", "degit", "nuxi"];

fn has_flag(command: &str, flags: &[&str]) -> bool {
    command
        .split_whitespace()
        .any(|w| flags.iter().any(|f| w == *f))
}

impl NonInteractiveCommand {
    pub fn normalize(command: &str, platform: ShellPlatform) -> Self {
        let original = command.trim().to_string();
        let lower = original.to_ascii_lowercase();
        let (command, strategy) = Self::select(&original, &lower);
        if command != original {
            tracing::debug!(from = %original, to = %command, "command normalized");
        }
        Self {
            original,
            command,
            strategy,
            platform,
        }
    }

    fn select(original: &str, lower: &str) -> (String, PromptStrategy) {
        let yes = ["--yes", "-y"];

        if let Some((_, flag)) = AUTO_CONFIRM.iter().find(|(needle, _)| lower.contains(needle)) {
            let already = has_flag(original, &yes) || has_flag(original, &[flag]);
            let command = if already {
                original.to_string()
            } else {
                format!("{original} {flag}")
            };
            return (
                command,
                PromptStrategy::AutoConfirm {
                    flag: flag.to_string(),
                },
            );
        }

        if lower.contains("create vite") || lower.contains("create-vite") {
            let mut command = original.to_string();
            if !lower.contains("--template") {
                let sep = if lower.starts_with("npm ") && !has_flag(original, &["--"]) {
                    " --"
                } else {
                    ""
                };
                command = format!("{command}{sep} --template react-ts");
            }
            return (
                command,
                PromptStrategy::AutoConfirm {
                    flag: "--template".to_string(),
                },
            );
        }

        let words: Vec<&str> = lower.split_whitespace().collect();
        if words.len() == 2
            && words[1] == "init"
            && ["npm", "yarn", "pnpm", "bun"].contains(&words[0])
        {
            return (
                format!("{original} -y"),
                PromptStrategy::AutoConfirm {
                    flag: "-y".to_string(),
                },
            );
        }

        if words.first() == Some(&"npx") && !has_flag(original, &yes) {
            let rest = original.trim_start()[3..].trim_start();
            let command = format!("npx --yes {rest}");
            let strategy = if PROMPT_PRONE.iter().any(|p| lower.contains(p)) {
                PromptStrategy::BlankLines
            } else {
                PromptStrategy::AutoConfirm {
                    flag: "--yes".to_string(),
                }
            };
            return (command, strategy);
        }

        let padded = format!(" {lower}");
        if PROMPT_PRONE.iter().any(|p| padded.contains(p)) {
            return (original.to_string(), PromptStrategy::BlankLines);
        }

        (original.to_string(), PromptStrategy::NullStdin)
    }

    fn stdin(&self) -> Result<Stdio> {
        match self.strategy {
            PromptStrategy::BlankLines => {
                let mut file = tempfile::tempfile()?;
                file.write_all("\n".repeat(BLANK_LINES).as_bytes())?;
                file.seek(SeekFrom::Start(0))?;
                Ok(Stdio::from(file))
            }
            PromptStrategy::AutoConfirm { .. } | PromptStrategy::NullStdin => Ok(Stdio::null()),
        }
    }
}

impl fmt::Display for NonInteractiveCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command)
    }
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShellOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub truncated: bool,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout and stderr joined for display, stderr last.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let err = self.stderr.trim_end();
        if !err.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(err);
        }
        if self.truncated {
            out.push_str("\n... [output truncated]");
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunResult {
    Completed(ShellOutput),
    TimedOut(Duration),
}

#[derive(Debug, Clone, Copy)]
pub struct ShellRunner {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

impl ShellRunner {
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    pub async fn run(&self, cmd: &NonInteractiveCommand, cwd: &Path) -> Result<RunResult> {
        let mut command = tokio::process::Command::new(cmd.platform.program());
        command
            .arg(cmd.platform.flag())
            .arg(&cmd.command)
            .current_dir(cwd)
            .env("npm_config_yes", "true")
            .stdin(cmd.stdin()?)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything the shell started.
        #[cfg(unix)]
        command.process_group(0);

        tracing::debug!(command = %cmd.command, cwd = %cwd.display(), "spawning");
        let mut child = command.spawn().map_err(|source| VibeError::Spawn {
            command: cmd.command.clone(),
            source,
        })?;

        let cap = self.max_output_bytes;
        let stdout_task = tokio::spawn(read_capped(child.stdout.take(), cap));
        let stderr_task = tokio::spawn(read_capped(child.stderr.take(), cap));

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                let (stdout, t1) = join_reader(stdout_task).await;
                let (stderr, t2) = join_reader(stderr_task).await;
                Ok(RunResult::Completed(ShellOutput {
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    truncated: t1 || t2,
                }))
            }
            Err(_) => {
                tracing::warn!(command = %cmd.command, secs = self.timeout.as_secs(), "command timed out; killing");
                if let Some(pid) = child.id() {
                    kill_tree(pid);
                }
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed-out command");
                }
                stdout_task.abort();
                stderr_task.abort();
                Ok(RunResult::TimedOut(self.timeout))
            }
        }
    }
}

/// Kill the process group led by `pid` (the shell and all its descendants).
#[cfg(unix)]
fn kill_tree(pid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // Safety: kill(2) with a negative pid signals the group; no memory is touched.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        tracing::warn!(
            pid,
            error = %std::io::Error::last_os_error(),
            "failed to kill process group"
        );
    }
}

#[cfg(windows)]
fn kill_tree(pid: u32) {
    let status = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        tracing::warn!(pid, error = %e, "taskkill failed");
    }
}

async fn read_capped<R>(reader: Option<R>, cap: usize) -> (String, bool)
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return (String::new(), false);
    };
    let mut kept = Vec::new();
    let mut truncated = false;
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let room = cap.saturating_sub(kept.len());
                if n > room {
                    truncated = true;
                }
                kept.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
    let mut text = String::from_utf8_lossy(&kept).into_owned();
    if truncated {
        truncate_at_char_boundary(&mut text, cap);
    }
    (text, truncated)
}

async fn join_reader(task: tokio::task::JoinHandle<(String, bool)>) -> (String, bool) {
    match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => (String::new(), false),
        // A background process still holds the pipe open.
        Err(_) => (String::new(), true),
    }
}

/// Shorten `s` to at most `max` bytes without splitting a character.
pub fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn normalize(cmd: &str) -> NonInteractiveCommand {
        NonInteractiveCommand::normalize(cmd, ShellPlatform::Posix)
    }

    #[test]
    fn scaffolder_gets_yes_flag() {
        let n = normalize("npx create-next-app@latest web");
        assert_eq!(n.command, "npx create-next-app@latest web --yes");
        assert_eq!(
            n.strategy,
            PromptStrategy::AutoConfirm {
                flag: "--yes".into()
            }
        );
    }

    #[test]
    fn existing_yes_flag_is_kept() {
        let n = normalize("npx create-next-app@latest web -y");
        assert_eq!(n.command, "npx create-next-app@latest web -y");
    }

    #[test]
    fn vite_without_template_gets_default() {
        assert_eq!(
            normalize("npm create vite@latest app").command,
            "npm create vite@latest app -- --template react-ts"
        );
        assert_eq!(
            normalize("pnpm create vite app").command,
            "pnpm create vite app --template react-ts"
        );
        assert_eq!(
            normalize("npm create vite@latest app -- --template vue").command,
            "npm create vite@latest app -- --template vue"
        );
    }

    #[test]
    fn bare_init_gets_y() {
        let n = normalize("npm init");
        assert_eq!(n.command, "npm init -y");
    }

    #[test]
    fn npx_gets_yes() {
        let n = normalize("npx prettier --write .");
        assert_eq!(n.command, "npx --yes prettier --write .");
    }

    #[test]
    fn prompt_prone_commands_get_blank_lines() {
        assert_eq!(normalize("npm create qwik@latest app").strategy, PromptStrategy::BlankLines);
        assert_eq!(normalize("git init").strategy, PromptStrategy::BlankLines);
    }

    #[test]
    fn plain_commands_get_null_stdin() {
        let n = normalize("  ls -la ");
        assert_eq!(n.command, "ls -la");
        assert_eq!(n.strategy, PromptStrategy::NullStdin);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let mut s = "héllo".to_string();
        truncate_at_char_boundary(&mut s, 2);
        assert_eq!(s, "h");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_captures_output_and_exit_code() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(Duration::from_secs(10), 1024);
        let result = runner
            .run(&normalize("echo out; echo err >&2; exit 3"), dir.path())
            .await
            .unwrap();
        let RunResult::Completed(out) = result else {
            panic!("expected completion");
        };
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "out");
        assert_eq!(out.stderr.trim(), "err");
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_uses_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let runner = ShellRunner::new(Duration::from_secs(10), 1024);
        let RunResult::Completed(out) = runner.run(&normalize("ls"), dir.path()).await.unwrap()
        else {
            panic!("expected completion");
        };
        assert!(out.stdout.contains("marker.txt"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_times_out_and_kills() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(Duration::from_millis(200), 1024);
        let start = std::time::Instant::now();
        let result = runner.run(&normalize("sleep 30"), dir.path()).await.unwrap();
        assert_eq!(result, RunResult::TimedOut(Duration::from_millis(200)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_grandchildren() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(Duration::from_millis(500), 1024);
        let result = runner
            .run(
                &normalize("sh -c 'sleep 2; touch survived.txt'; echo x"),
                dir.path(),
            )
            .await
            .unwrap();
        assert!(matches!(result, RunResult::TimedOut(_)));
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("survived.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_truncates_large_output() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(Duration::from_secs(10), 16);
        let RunResult::Completed(out) = runner
            .run(&normalize("printf '%0100d' 0"), dir.path())
            .await
            .unwrap()
        else {
            panic!("expected completion");
        };
        assert_eq!(out.stdout.len(), 16);
        assert!(out.truncated);
        assert!(out.combined().ends_with("[output truncated]"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blank_lines_answer_prompts() {
        let dir = TempDir::new().unwrap();
        let runner = ShellRunner::new(Duration::from_secs(10), 1024);
        let cmd = NonInteractiveCommand {
            original: "read a; echo got".into(),
            command: "read a; echo \"got[$a]\"".into(),
            strategy: PromptStrategy::BlankLines,
            platform: ShellPlatform::Posix,
        };
        let RunResult::Completed(out) = runner.run(&cmd, dir.path()).await.unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(out.stdout.trim(), "got[]");
    }
}
