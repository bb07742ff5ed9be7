use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory,
/// creating parent directories first. Readers see the old content or the new
/// content, never a prefix.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Add `entry` to `root/.gitignore` if no line already matches it exactly.
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<()> {
    let gitignore = root.join(".gitignore");
    let existing = if gitignore.exists() {
        std::fs::read_to_string(&gitignore)?
    } else {
        String::new()
    };
    if existing.lines().any(|l| l.trim() == entry) {
        return Ok(());
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&gitignore)?;
    writeln!(f, "{sep}{entry}")?;
    Ok(())
}

/// Recursively copy a directory tree. Symlinks are recreated as links with
/// the same target, dangling ones included; nothing behind them is copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<u64> {
    let mut files = 0;
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(std::io::Error::from)?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.path_is_symlink() {
            copy_symlink(entry.path(), &target)?;
            files += 1;
        } else {
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = std::fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dst)?;
    Ok(())
}

#[cfg(windows)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = std::fs::read_link(src)?;
    if std::fs::metadata(src).map(|m| m.is_dir()).unwrap_or(false) {
        std::os::windows::fs::symlink_dir(target, dst)?;
    } else {
        std::os::windows::fs::symlink_file(target, dst)?;
    }
    Ok(())
}

/// Total size in bytes and file count under `path` (a file counts as one).
pub fn disk_usage(path: &Path) -> Result<(u64, u64)> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_dir() {
        return Ok((meta.len(), 1));
    }
    let mut bytes = 0;
    let mut files = 0;
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            bytes += entry.metadata().map_err(std::io::Error::from)?.len();
            files += 1;
        }
    }
    Ok((bytes, files))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        atomic_write(&path, b"hello\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("src/components/ui/button.tsx");
        atomic_write(&path, b"export {}").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "old").unwrap();
        atomic_write(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, b"original").unwrap();
        assert!(!write_if_missing(&path, b"new").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn gitignore_entry_is_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "node_modules").unwrap();
        ensure_gitignore_entry(dir.path(), ".vibe/").unwrap();
        ensure_gitignore_entry(dir.path(), ".vibe/").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(content, "node_modules\n.vibe/\n");
    }

    #[test]
    fn copy_dir_all_copies_nested_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(src.join("a/b")).unwrap();
        std::fs::write(src.join("top.txt"), "1").unwrap();
        std::fs::write(src.join("a/b/deep.txt"), "2").unwrap();

        let dst = dir.path().join("dst");
        assert_eq!(copy_dir_all(&src, &dst).unwrap(), 2);
        assert_eq!(std::fs::read_to_string(dst.join("a/b/deep.txt")).unwrap(), "2");
    }

    #[cfg(unix)]
    #[test]
    fn copy_dir_all_recreates_symlinks() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("pkg");
        std::fs::create_dir_all(src.join("real")).unwrap();
        std::fs::write(src.join("real/index.js"), "x").unwrap();
        std::os::unix::fs::symlink("real", src.join("link")).unwrap();
        std::os::unix::fs::symlink("gone.txt", src.join("dangling")).unwrap();

        let dst = dir.path().join("copy");
        assert_eq!(copy_dir_all(&src, &dst).unwrap(), 3);
        assert_eq!(
            std::fs::read_link(dst.join("link")).unwrap(),
            Path::new("real")
        );
        assert!(dst.join("link/index.js").exists());
        assert_eq!(
            std::fs::read_link(dst.join("dangling")).unwrap(),
            Path::new("gone.txt")
        );
    }

    #[test]
    fn disk_usage_counts_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a"), "abc").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b"), "de").unwrap();
        assert_eq!(disk_usage(dir.path()).unwrap(), (5, 2));
        assert_eq!(disk_usage(&dir.path().join("a")).unwrap(), (3, 1));
    }
}
