pub mod apply;
pub mod backups;
pub mod chat;
pub mod config;
pub mod parse;

use std::path::Path;

use anyhow::Context;
use vibe_core::config::{Config, WarnLevel};
use vibe_core::session::Session;

/// Load config and open a session at `root`. Config errors are fatal;
/// warnings go to the log.
pub(crate) fn open_session(root: &Path) -> anyhow::Result<Session> {
    let config = Config::load(root).context("failed to load .vibe/config.yaml")?;
    for w in config.validate() {
        match w.level {
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
            WarnLevel::Error => anyhow::bail!("invalid config: {}", w.message),
        }
    }
    Session::open(root, config).with_context(|| format!("cannot open project at {}", root.display()))
}

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}
