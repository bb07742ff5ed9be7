//! Repository snapshot sent to the assistant as context.
//!
//! The snapshot is a directory tree followed by every text file's content in
//! a fenced block. Heavy or generated paths, dot-directories, binary
//! extensions and oversized files are left out.

use std::ffi::OsStr;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::config::ContextConfig;
use crate::error::Result;

/// Dot-files that are still worth showing.
const KEPT_DOTFILES: &[&str] = &[".env.example", ".gitignore", ".prettierrc", ".eslintrc.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFile {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoSnapshot {
    pub tree: String,
    pub files: Vec<ContextFile>,
    /// Files left out for size or encoding.
    pub skipped: Vec<String>,
}

impl RepoSnapshot {
    pub fn char_count(&self) -> usize {
        self.files.iter().map(|f| f.content.chars().count()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::from("# Project Content\n\n## Directory Structure\n\n```\n");
        out.push_str(&self.tree);
        out.push_str("\n```\n");
        for f in &self.files {
            let lang = Path::new(&f.path)
                .extension()
                .and_then(OsStr::to_str)
                .unwrap_or("");
            let _ = write!(out, "\n### File: `{}`\n\n```{lang}\n{}", f.path, f.content);
            if !f.content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("```\n");
        }
        if !self.skipped.is_empty() {
            let _ = write!(out, "\n(skipped {} large or binary file(s))\n", self.skipped.len());
        }
        out
    }
}

pub struct Scanner<'a> {
    cfg: &'a ContextConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(cfg: &'a ContextConfig) -> Self {
        Self { cfg }
    }

    fn skip_name(&self, name: &str, is_dir: bool) -> bool {
        if self.cfg.skip_names.iter().any(|s| s == name) {
            return true;
        }
        if name.starts_with('.') && name != "." && (is_dir || !KEPT_DOTFILES.contains(&name)) {
            return true;
        }
        if !is_dir {
            if let Some(ext) = Path::new(name).extension().and_then(OsStr::to_str) {
                let ext = ext.to_ascii_lowercase();
                return self.cfg.skip_extensions.iter().any(|s| *s == ext);
            }
        }
        false
    }

    fn keep(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !self.skip_name(&name, entry.file_type().is_dir())
    }

    /// Snapshot everything under `dir`. Paths are shown relative to `base`.
    pub fn scan(&self, dir: &Path, base: &Path) -> Result<RepoSnapshot> {
        let mut files = Vec::new();
        let mut skipped = Vec::new();

        let walker = WalkDir::new(dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| self.keep(e));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = display_path(entry.path(), base);
            let size = entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX);
            if size > self.cfg.max_file_bytes {
                skipped.push(rel);
                continue;
            }
            match std::fs::read(entry.path()).map(String::from_utf8) {
                Ok(Ok(content)) => files.push(ContextFile { path: rel, content }),
                _ => skipped.push(rel),
            }
        }

        tracing::debug!(files = files.len(), skipped = skipped.len(), "repository scanned");
        Ok(RepoSnapshot {
            tree: self.tree(dir)?,
            files,
            skipped,
        })
    }

    /// Box-drawing tree of `dir`, directories first, names case-insensitive.
    pub fn tree(&self, dir: &Path) -> Result<String> {
        let mut out = String::new();
        self.tree_into(dir, "", &mut out)?;
        if out.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        Ok(out.trim_end().to_string())
    }

    fn tree_into(&self, dir: &Path, prefix: &str, out: &mut String) -> Result<()> {
        let mut children: Vec<(String, PathBuf, bool)> = Vec::new();
        let read = match std::fs::read_dir(dir) {
            Ok(r) => r,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                let _ = writeln!(out, "{prefix}[access denied]");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        for entry in read {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type()?.is_dir();
            if self.skip_name(&name, is_dir) {
                continue;
            }
            children.push((name, entry.path(), is_dir));
        }
        children.sort_by(|a, b| {
            b.2.cmp(&a.2)
                .then_with(|| a.0.to_lowercase().cmp(&b.0.to_lowercase()))
        });

        let count = children.len();
        for (i, (name, path, is_dir)) in children.into_iter().enumerate() {
            let last = i + 1 == count;
            let connector = if last { "└── " } else { "├── " };
            let slash = if is_dir { "/" } else { "" };
            let _ = writeln!(out, "{prefix}{connector}{name}{slash}");
            if is_dir {
                let extension = if last { "    " } else { "│   " };
                self.tree_into(&path, &format!("{prefix}{extension}"), out)?;
            }
        }
        Ok(())
    }
}

/// Names directly inside `dir`, one per line, directories first with a
/// trailing `/`. Nothing is filtered.
pub fn list_dir(dir: &Path) -> Result<String> {
    let mut entries: Vec<(bool, String)> = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let is_dir = entry.file_type()?.is_dir();
        entries.push((is_dir, entry.file_name().to_string_lossy().into_owned()));
    }
    if entries.is_empty() {
        return Ok("(empty directory)".to_string());
    }
    entries.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.to_lowercase().cmp(&b.1.to_lowercase())));
    let lines: Vec<String> = entries
        .into_iter()
        .map(|(is_dir, name)| if is_dir { format!("{name}/") } else { name })
        .collect();
    Ok(lines.join("\n"))
}

fn display_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let p = dir.path();
        std::fs::create_dir_all(p.join("src/components")).unwrap();
        std::fs::create_dir_all(p.join("node_modules/react")).unwrap();
        std::fs::create_dir_all(p.join(".git")).unwrap();
        std::fs::write(p.join("src/main.ts"), "console.log(1)\n").unwrap();
        std::fs::write(p.join("src/components/App.tsx"), "export {}").unwrap();
        std::fs::write(p.join("node_modules/react/index.js"), "x").unwrap();
        std::fs::write(p.join("package.json"), "{}\n").unwrap();
        std::fs::write(p.join("package-lock.json"), "{}").unwrap();
        std::fs::write(p.join("logo.png"), [0u8, 1, 2]).unwrap();
        std::fs::write(p.join(".gitignore"), "node_modules\n").unwrap();
        dir
    }

    #[test]
    fn scan_skips_heavy_and_binary_paths() {
        let dir = fixture();
        let cfg = ContextConfig::default();
        let snap = Scanner::new(&cfg).scan(dir.path(), dir.path()).unwrap();
        let paths: Vec<_> = snap.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![".gitignore", "package.json", "src/components/App.tsx", "src/main.ts"]
        );
    }

    #[test]
    fn list_dir_shows_one_level_unfiltered() {
        let dir = fixture();
        assert_eq!(
            list_dir(dir.path()).unwrap(),
            ".git/\nnode_modules/\nsrc/\n.gitignore\nlogo.png\npackage-lock.json\npackage.json"
        );
        let empty = TempDir::new().unwrap();
        assert_eq!(list_dir(empty.path()).unwrap(), "(empty directory)");
    }

    #[test]
    fn oversized_files_are_reported_as_skipped() {
        let dir = fixture();
        let cfg = ContextConfig {
            max_file_bytes: 5,
            ..ContextConfig::default()
        };
        let snap = Scanner::new(&cfg).scan(dir.path(), dir.path()).unwrap();
        assert!(snap.skipped.contains(&"src/main.ts".to_string()));
        assert!(snap.files.iter().any(|f| f.path == "package.json"));
    }

    #[test]
    fn tree_lists_directories_first() {
        let dir = fixture();
        let cfg = ContextConfig::default();
        let tree = Scanner::new(&cfg).tree(dir.path()).unwrap();
        assert_eq!(
            tree,
            "├── src/\n│   ├── components/\n│   │   └── App.tsx\n│   └── main.ts\n├── .gitignore\n└── package.json"
        );
    }

    #[test]
    fn render_fences_each_file() {
        let dir = fixture();
        let cfg = ContextConfig::default();
        let blob = Scanner::new(&cfg).scan(dir.path(), dir.path()).unwrap().render();
        assert!(blob.starts_with("# Project Content"));
        assert!(blob.contains("### File: `src/main.ts`\n\n```ts\nconsole.log(1)\n```"));
        assert!(!blob.contains("node_modules/react"));
    }

    #[test]
    fn empty_directory_tree() {
        let dir = TempDir::new().unwrap();
        let cfg = ContextConfig::default();
        assert_eq!(Scanner::new(&cfg).tree(dir.path()).unwrap(), "(empty directory)");
    }
}
