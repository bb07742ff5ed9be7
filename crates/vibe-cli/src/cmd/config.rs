use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use vibe_core::config::{Config, ConfigWarning, WarnLevel};
use vibe_core::{io, paths};

use crate::output::print_json;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write .vibe/config.yaml with defaults (kept if it already exists)
    Init,

    /// Print the effective configuration and any warnings
    Show,

    /// Check the config for mistakes; exits non-zero on errors
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => init(root),
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path) -> anyhow::Result<()> {
    let path = paths::config_path(root);
    let yaml = serde_yaml::to_string(&Config::default())?;
    let created = io::write_if_missing(&path, yaml.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    io::ensure_gitignore_entry(root, paths::GITIGNORE_ENTRY).context("failed to update .gitignore")?;

    if created {
        println!("Wrote {}", paths::CONFIG_FILE);
    } else {
        println!("{} already exists; left unchanged", paths::CONFIG_FILE);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        return print_json(&serde_json::json!({
            "config": config,
            "warnings": warnings,
        }));
    }
    print!("{}", serde_yaml::to_string(&config)?);
    print_warnings(&warnings);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        print_warnings(&warnings);
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}

fn print_warnings(warnings: &[ConfigWarning]) {
    for w in warnings {
        let prefix = match w.level {
            WarnLevel::Warning => "warning",
            WarnLevel::Error => "error",
        };
        println!("[{prefix}] {}", w.message);
    }
}
