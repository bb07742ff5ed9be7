//! JavaScript package-manager detection.
//!
//! The manager is chosen from the lockfile present in the working directory
//! (bun > pnpm > yarn), falling back to npm. Availability on `PATH` is probed
//! separately with `which` so previews can warn before a command fails.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

const LOCKFILES: &[(&str, PackageManager)] = &[
    ("bun.lockb", PackageManager::Bun),
    ("bun.lock", PackageManager::Bun),
    ("pnpm-lock.yaml", PackageManager::Pnpm),
    ("yarn.lock", PackageManager::Yarn),
];

impl PackageManager {
    pub fn all() -> &'static [PackageManager] {
        &[
            PackageManager::Npm,
            PackageManager::Pnpm,
            PackageManager::Yarn,
            PackageManager::Bun,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }

    /// Detect from lockfiles in `dir`. Defaults to npm.
    pub fn detect(dir: &Path) -> PackageManager {
        for (file, pm) in LOCKFILES {
            if dir.join(file).is_file() {
                tracing::debug!(lockfile = file, manager = pm.as_str(), "package manager detected");
                return *pm;
            }
        }
        PackageManager::Npm
    }

    pub fn is_available(self) -> bool {
        which::which(self.as_str()).is_ok()
    }

    /// `npm install a b`, `pnpm add a b`, ...
    pub fn install_command(self, packages: &[String]) -> String {
        let verb = match self {
            PackageManager::Npm => "install",
            _ => "add",
        };
        let mut cmd = format!("{} {verb}", self.as_str());
        for p in packages {
            cmd.push(' ');
            cmd.push_str(p);
        }
        cmd
    }

    /// Invoke a `create-<tool>` initializer. npm needs `--` before arguments
    /// meant for the initializer; the others forward them as-is.
    pub fn create_command(self, tool: &str, name: &str, args: &[String]) -> String {
        let mut cmd = match self {
            PackageManager::Npm => format!("npm create --yes {tool}@latest {name}"),
            PackageManager::Pnpm => format!("pnpm create {tool}@latest {name}"),
            PackageManager::Yarn => format!("yarn create {tool} {name}"),
            PackageManager::Bun => format!("bun create {tool}@latest {name}"),
        };
        if !args.is_empty() {
            if self == PackageManager::Npm {
                cmd.push_str(" --");
            }
            for a in args {
                cmd.push(' ');
                cmd.push_str(a);
            }
        }
        cmd
    }

    /// Run a package binary without installing it: `npx --yes`, `pnpm dlx`, ...
    pub fn exec_command(self, package: &str, args: &[String]) -> String {
        let mut cmd = match self {
            PackageManager::Npm => format!("npx --yes {package}"),
            PackageManager::Pnpm => format!("pnpm dlx {package}"),
            PackageManager::Yarn => format!("yarn dlx {package}"),
            PackageManager::Bun => format!("bunx {package}"),
        };
        for a in args {
            cmd.push(' ');
            cmd.push_str(a);
        }
        cmd
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageManager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageManager::all()
            .iter()
            .copied()
            .find(|pm| pm.as_str() == s)
            .ok_or_else(|| format!("unknown package manager: {s}"))
    }
}
