use std::path::Path;

use anyhow::Context;
use clap::Subcommand;
use serde_json::json;
use vibe_core::backup::BackupStore;
use vibe_core::paths;
use vibe_core::validate;

use crate::output::{print_json, print_table};

#[derive(Subcommand)]
pub enum BackupsSubcommand {
    /// List backups, newest first
    List,

    /// Copy a backup back over a project path
    Restore {
        /// Backup file name as shown by `vibe backups list`
        name: String,
        /// Project-relative path to restore to
        path: String,
    },
}

pub fn run(root: &Path, subcmd: BackupsSubcommand, json: bool) -> anyhow::Result<()> {
    let store = BackupStore::new(paths::backups_dir(root));
    match subcmd {
        BackupsSubcommand::List => list(&store, json),
        BackupsSubcommand::Restore { name, path } => restore(root, &store, &name, &path, json),
    }
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

fn list(store: &BackupStore, json: bool) -> anyhow::Result<()> {
    let entries = store.list().context("failed to list backups")?;
    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        println!("No backups.");
        return Ok(());
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.name.clone(),
                e.taken_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                if e.is_dir { "dir" } else { "file" }.to_string(),
                e.key.clone(),
            ]
        })
        .collect();
    print_table(&["NAME", "TAKEN", "TYPE", "SOURCE"], rows);
    Ok(())
}

// ---------------------------------------------------------------------------
// restore
// ---------------------------------------------------------------------------

fn restore(root: &Path, store: &BackupStore, name: &str, rel: &str, json: bool) -> anyhow::Result<()> {
    let root = root
        .canonicalize()
        .with_context(|| format!("cannot open project at {}", root.display()))?;
    let target = validate::resolve(&root, &root, rel)?;
    validate::check_not_reserved(&root, &target, rel)?;
    let previous = store
        .restore(name, &target, rel)
        .with_context(|| format!("failed to restore {name}"))?;

    if json {
        print_json(&json!({
            "restored": name,
            "path": rel,
            "previous_backup": previous.as_ref().map(|b| &b.name),
        }))?;
    } else {
        println!("Restored {name} to {rel}.");
        if let Some(b) = previous {
            println!("The replaced content was backed up as {}.", b.name);
        }
    }
    Ok(())
}
