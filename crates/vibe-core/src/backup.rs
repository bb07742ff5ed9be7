//! Append-only snapshots taken before destructive mutations.
//!
//! Each backup lives directly under `.vibe/backups/` and is named
//! `<flattened-path>_<YYYYmmdd_HHMMSS>[.<n>].bak`. Files are snapshotted with
//! `create_new`, directories with a fresh `create_dir`, so an existing entry
//! is never overwritten; a name collision bumps the `.n` suffix instead.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

use crate::error::{Result, VibeError};
use crate::paths;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const EXTENSION: &str = ".bak";
const MAX_SUFFIX: u32 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    pub name: String,
    pub path: PathBuf,
    /// Root-relative path of what was backed up.
    pub source: String,
    pub is_dir: bool,
    pub bytes: u64,
}

/// A backup found on disk by [`BackupStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupEntry {
    pub name: String,
    pub path: PathBuf,
    /// Flattened source path as encoded in the name.
    pub key: String,
    pub taken_at: NaiveDateTime,
    pub seq: u32,
    pub is_dir: bool,
}

#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot `src` (a file or directory) under a fresh name keyed by `rel`.
    pub fn backup(&self, rel: &str, src: &Path) -> Result<BackupRecord> {
        self.snapshot(rel, src).map_err(|e| match e {
            VibeError::Io(source) => VibeError::Backup {
                path: rel.to_string(),
                source,
            },
            other => other,
        })
    }

    fn snapshot(&self, rel: &str, src: &Path) -> Result<BackupRecord> {
        crate::io::ensure_dir(&self.dir)?;
        let meta = std::fs::metadata(src)?;
        let stem = format!(
            "{}_{}",
            paths::flatten(rel),
            Local::now().format(TIMESTAMP_FORMAT)
        );

        for seq in 0..MAX_SUFFIX {
            let name = if seq == 0 {
                format!("{stem}{EXTENSION}")
            } else {
                format!("{stem}.{seq}{EXTENSION}")
            };
            let dest = self.dir.join(&name);

            let bytes = if meta.is_dir() {
                match std::fs::create_dir(&dest) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                    Err(e) => return Err(e.into()),
                }
                let copied = crate::io::copy_dir_all(src, &dest)
                    .and_then(|_| crate::io::disk_usage(&dest))
                    .map(|(bytes, _)| bytes);
                match copied {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = std::fs::remove_dir_all(&dest);
                        return Err(e);
                    }
                }
            } else {
                let out = match OpenOptions::new().write(true).create_new(true).open(&dest) {
                    Ok(f) => f,
                    Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                    Err(e) => return Err(e.into()),
                };
                match copy_file(src, out) {
                    Ok(n) => n,
                    Err(e) => {
                        let _ = std::fs::remove_file(&dest);
                        return Err(e.into());
                    }
                }
            };

            tracing::info!(source = rel, backup = %name, bytes, "backup written");
            return Ok(BackupRecord {
                name,
                path: dest,
                source: rel.to_string(),
                is_dir: meta.is_dir(),
                bytes,
            });
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free backup name for '{stem}'"),
        )
        .into())
    }

    /// All backups, newest first.
    pub fn list(&self) -> Result<Vec<BackupEntry>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(&self.dir)? {
            let dirent = dirent?;
            let name = dirent.file_name().to_string_lossy().into_owned();
            let Some((key, taken_at, seq)) = parse_name(&name) else {
                tracing::debug!(name, "ignoring unrecognized file in backups directory");
                continue;
            };
            entries.push(BackupEntry {
                is_dir: dirent.file_type()?.is_dir(),
                path: dirent.path(),
                name,
                key,
                taken_at,
                seq,
            });
        }
        entries.sort_by(|a, b| {
            b.taken_at
                .cmp(&a.taken_at)
                .then(b.seq.cmp(&a.seq))
                .then(a.key.cmp(&b.key))
        });
        Ok(entries)
    }

    pub fn find(&self, name: &str) -> Result<BackupEntry> {
        self.list()?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| VibeError::BackupNotFound(name.to_string()))
    }

    /// Put backup `name` back at `target`. Whatever currently sits at
    /// `target` is backed up first; that record is returned.
    pub fn restore(&self, name: &str, target: &Path, target_rel: &str) -> Result<Option<BackupRecord>> {
        let entry = self.find(name)?;
        let previous = if target.exists() {
            Some(self.backup(target_rel, target)?)
        } else {
            None
        };

        if entry.is_dir {
            if target.is_dir() {
                std::fs::remove_dir_all(target)?;
            } else if target.exists() {
                std::fs::remove_file(target)?;
            }
            crate::io::copy_dir_all(&entry.path, target)?;
        } else {
            if target.is_dir() {
                std::fs::remove_dir_all(target)?;
            }
            let data = std::fs::read(&entry.path)?;
            crate::io::atomic_write(target, &data)?;
        }
        tracing::info!(backup = name, target = target_rel, "backup restored");
        Ok(previous)
    }
}

fn copy_file(src: &Path, mut out: std::fs::File) -> std::io::Result<u64> {
    let mut input = std::fs::File::open(src)?;
    let n = std::io::copy(&mut input, &mut out)?;
    out.sync_all()?;
    Ok(n)
}

/// Split `<key>_<YYYYmmdd_HHMMSS>[.<n>].bak` into its parts.
fn parse_name(name: &str) -> Option<(String, NaiveDateTime, u32)> {
    let base = name.strip_suffix(EXTENSION)?;
    let (base, seq) = match base.rsplit_once('.') {
        Some((head, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => {
            (head, n.parse().ok()?)
        }
        _ => (base, 0),
    };
    if base.len() < TIMESTAMP_LEN + 2 || !base.is_char_boundary(base.len() - TIMESTAMP_LEN) {
        return None;
    }
    let (head, stamp) = base.split_at(base.len() - TIMESTAMP_LEN);
    let key = head.strip_suffix('_')?;
    let taken_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
    Some((key.to_string(), taken_at, seq))
}
