use std::path::{Path, PathBuf};

use crate::backup::BackupStore;
use crate::config::{CommandPolicy, Config};
use crate::error::Result;
use crate::gate::DirectiveId;
use crate::package_manager::PackageManager;
use crate::paths;
use crate::shell::{ShellPlatform, ShellRunner};

/// Everything one interactive session knows about its environment.
///
/// The root is fixed for the life of the session; the working directory moves
/// with CD and CREATE but never leaves the root. The package manager is
/// re-detected whenever the working directory changes.
#[derive(Debug)]
pub struct Session {
    root: PathBuf,
    cwd: PathBuf,
    package_manager: PackageManager,
    platform: ShellPlatform,
    config: Config,
    policy: CommandPolicy,
    backups: BackupStore,
    next_id: u64,
}

impl Session {
    pub fn open(root: &Path, config: Config) -> Result<Self> {
        let root = root.canonicalize()?;
        let policy = config.command_policy()?;
        let backups = BackupStore::new(paths::backups_dir(&root));
        let package_manager = PackageManager::detect(&root);
        let platform = ShellPlatform::current();
        tracing::debug!(
            root = %root.display(),
            package_manager = %package_manager,
            platform = %platform,
            "session opened"
        );
        Ok(Self {
            cwd: root.clone(),
            root,
            package_manager,
            platform,
            config,
            policy,
            backups,
            next_id: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Working directory relative to the root, `.` at the root itself.
    pub fn relative_cwd(&self) -> String {
        self.relative(&self.cwd)
    }

    /// Display form of a path inside the root, with `/` separators.
    pub fn relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }

    pub fn package_manager(&self) -> PackageManager {
        self.package_manager
    }

    pub fn platform(&self) -> ShellPlatform {
        self.platform
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn policy(&self) -> &CommandPolicy {
        &self.policy
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    pub fn runner(&self) -> ShellRunner {
        ShellRunner::new(self.config.command_timeout(), self.config.max_output_bytes)
    }

    /// Move the working directory. `dir` must already be canonical and
    /// inside the root.
    pub(crate) fn set_cwd(&mut self, dir: PathBuf) {
        debug_assert!(dir.starts_with(&self.root));
        self.package_manager = PackageManager::detect(&dir);
        tracing::info!(cwd = %self.relative(&dir), package_manager = %self.package_manager, "working directory changed");
        self.cwd = dir;
    }

    pub(crate) fn next_id(&mut self) -> DirectiveId {
        self.next_id += 1;
        DirectiveId::new(self.next_id)
    }
}
