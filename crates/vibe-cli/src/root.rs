use std::path::{Path, PathBuf};

use vibe_core::paths::VIBE_DIR;

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `VIBE_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of the cwd holding `.vibe/`
/// 3. Nearest ancestor of the cwd holding `.git/`
/// 4. The cwd itself
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, VIBE_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn nearest_marker_above_start() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".vibe")).unwrap();
        let deep = dir.path().join("src/deep");
        std::fs::create_dir_all(&deep).unwrap();
        assert_eq!(find_upward(&deep, ".vibe").as_deref(), Some(dir.path()));
        assert_eq!(find_upward(&deep, "no-such-marker-dir"), None);
    }

    #[test]
    fn marker_must_be_a_directory() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("pkg");
        std::fs::create_dir_all(sub.join(".git")).unwrap();
        std::fs::write(dir.path().join(".git"), "gitdir: elsewhere").unwrap();
        assert_eq!(find_upward(&sub, ".git").as_deref(), Some(sub.as_path()));
    }
}
