use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const VIBE_DIR: &str = ".vibe";
pub const BACKUPS_DIR: &str = ".vibe/backups";
pub const CONFIG_FILE: &str = ".vibe/config.yaml";
pub const ENV_FILE: &str = ".env";

/// Gitignore line covering everything vibe writes under the root.
pub const GITIGNORE_ENTRY: &str = ".vibe/";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn vibe_dir(root: &Path) -> PathBuf {
    root.join(VIBE_DIR)
}

pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(BACKUPS_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn env_path(root: &Path) -> PathBuf {
    root.join(ENV_FILE)
}

/// Turn a relative path into a single file-name component for backup keys:
/// `src/app/page.tsx` becomes `src_app_page.tsx`.
pub fn flatten(rel: &str) -> String {
    let flat: String = rel
        .trim_matches(|c| c == '/' || c == '\\')
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();
    if flat.is_empty() || flat == "." {
        "root".to_string()
    } else {
        flat
    }
}

// ---------------------------------------------------------------------------
// Project names
// ---------------------------------------------------------------------------

static PROJECT_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn project_name_re() -> &'static Regex {
    PROJECT_NAME_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").expect("static regex")
    })
}

pub fn is_valid_project_name(name: &str) -> bool {
    name.len() <= 214 && project_name_re().is_match(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
