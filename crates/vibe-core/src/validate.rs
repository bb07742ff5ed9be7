//! Turning untrusted directives into checked, resolved plans.
//!
//! Nothing here touches the file system beyond `metadata`/`canonicalize`;
//! a [`PlannedDirective`] is what the preview renders and the gate approves.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::directive::Directive;
use crate::error::ValidationFailure;
use crate::gate::DirectiveId;
use crate::paths;
use crate::scaffold;
use crate::session::Session;
use crate::shell::NonInteractiveCommand;

/// Characters that would let an argument break out of its word.
const SHELL_METACHARACTERS: &[char] = &[
    ';', '&', '|', '$', '`', '<', '>', '(', ')', '{', '}', '\'', '"', '\\', '*', '?', '!', '#',
    '%', '\n', '\r', '\0',
];

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Write {
        path: PathBuf,
        rel: String,
        content: String,
    },
    Delete {
        path: PathBuf,
        rel: String,
    },
    Shell {
        command: NonInteractiveCommand,
        purpose: ShellPurpose,
    },
    Read {
        path: PathBuf,
        rel: String,
    },
    Cd {
        path: PathBuf,
        rel: String,
    },
    Tree {
        path: PathBuf,
        rel: String,
    },
    ListFiles {
        path: PathBuf,
        rel: String,
    },
    Refresh {
        path: PathBuf,
        rel: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum ShellPurpose {
    Run,
    Install,
    /// Adds shadcn/ui components through the package manager's runner.
    Component,
    /// On success the session enters `project_dir` if it was created.
    Create { project_dir: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Risk {
    pub dangerous: bool,
    pub long_running: bool,
}

/// A validated directive, bound to an id the gate can approve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDirective {
    pub id: DirectiveId,
    pub directive: Directive,
    pub action: Action,
    pub risk: Risk,
}

/// Validate `directive` against the session and resolve its targets.
pub fn plan(
    session: &mut Session,
    directive: Directive,
) -> std::result::Result<PlannedDirective, ValidationFailure> {
    let (action, risk) = plan_action(session, &directive)?;
    Ok(PlannedDirective {
        id: session.next_id(),
        directive,
        action,
        risk,
    })
}

fn plan_action(
    session: &Session,
    directive: &Directive,
) -> std::result::Result<(Action, Risk), ValidationFailure> {
    let root = session.root();
    let cwd = session.cwd();

    let action = match directive {
        Directive::Write { path, content } => {
            let resolved = resolve(root, cwd, path)?;
            check_not_reserved(root, &resolved, path)?;
            if resolved.is_dir() {
                return Err(ValidationFailure::IsADirectory(path.clone()));
            }
            Action::Write {
                rel: session.relative(&resolved),
                path: resolved,
                content: content.clone(),
            }
        }
        Directive::Delete { path } => {
            let resolved = resolve_existing(root, cwd, path)?;
            if resolved == root {
                return Err(ValidationFailure::EscapesRoot(path.clone()));
            }
            check_not_reserved(root, &resolved, path)?;
            Action::Delete {
                rel: session.relative(&resolved),
                path: resolved,
            }
        }
        Directive::Read { path } => {
            let resolved = resolve_readable(root, cwd, path)?;
            Action::Read {
                rel: session.relative(&resolved),
                path: resolved,
            }
        }
        Directive::Cd { path } => {
            let resolved = resolve_cd(root, cwd, path)?;
            check_not_reserved(root, &resolved, path)?;
            Action::Cd {
                rel: session.relative(&resolved),
                path: resolved,
            }
        }
        Directive::Tree => Action::Tree {
            path: cwd.to_path_buf(),
            rel: session.relative_cwd(),
        },
        Directive::ListFiles => Action::ListFiles {
            path: cwd.to_path_buf(),
            rel: session.relative_cwd(),
        },
        Directive::Refresh => Action::Refresh {
            path: cwd.to_path_buf(),
            rel: session.relative_cwd(),
        },
        Directive::Shadcn { components } => {
            if components.is_empty() {
                return Err(ValidationFailure::EmptyCommand);
            }
            let mut args = vec!["add".to_string()];
            for c in components {
                check_argument(c)?;
                args.push(c.clone());
            }
            args.push("--yes".to_string());
            let command = session.package_manager().exec_command("shadcn@latest", &args);
            Action::Shell {
                command: NonInteractiveCommand::normalize(&command, session.platform()),
                purpose: ShellPurpose::Component,
            }
        }
        Directive::Run { command } => {
            let command = command.trim();
            if command.is_empty() {
                return Err(ValidationFailure::EmptyCommand);
            }
            if command.contains('\0') {
                return Err(ValidationFailure::NulByte);
            }
            if let Some(target) = plain_cd_target(command) {
                let resolved = resolve_cd(root, cwd, target)?;
                check_not_reserved(root, &resolved, target)?;
                Action::Cd {
                    rel: session.relative(&resolved),
                    path: resolved,
                }
            } else {
                Action::Shell {
                    command: NonInteractiveCommand::normalize(command, session.platform()),
                    purpose: ShellPurpose::Run,
                }
            }
        }
        Directive::Install { packages } => {
            if packages.is_empty() {
                return Err(ValidationFailure::EmptyCommand);
            }
            for p in packages {
                check_argument(p)?;
            }
            let command = session.package_manager().install_command(packages);
            Action::Shell {
                command: NonInteractiveCommand::normalize(&command, session.platform()),
                purpose: ShellPurpose::Install,
            }
        }
        Directive::Create {
            template,
            name,
            options,
        } => {
            if !paths::is_valid_project_name(name) {
                return Err(ValidationFailure::InvalidProjectName(name.clone()));
            }
            if let Some(options) = options {
                for word in options.split_whitespace() {
                    check_argument(word)?;
                }
            }
            let command = scaffold::create_command(
                template,
                name,
                options.as_deref(),
                session.package_manager(),
            )?;
            Action::Shell {
                command: NonInteractiveCommand::normalize(&command, session.platform()),
                purpose: ShellPurpose::Create {
                    project_dir: cwd.join(name),
                },
            }
        }
    };

    let risk = match &action {
        Action::Shell { command, .. } => Risk {
            dangerous: session.policy().is_dangerous(&command.command),
            long_running: session.policy().is_long_running(&command.command),
        },
        _ => Risk::default(),
    };
    Ok((action, risk))
}

/// `cd <dir>` with nothing chained after it.
fn plain_cd_target(command: &str) -> Option<&str> {
    let rest = command.strip_prefix("cd")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let target = rest.trim();
    if target.is_empty()
        || target.contains(char::is_whitespace)
        || target.contains(SHELL_METACHARACTERS)
    {
        return None;
    }
    Some(target)
}

// ---------------------------------------------------------------------------
// Path checks
// ---------------------------------------------------------------------------

/// Reject anything that is not a plain relative path.
pub fn check_relative(raw: &str) -> std::result::Result<(), ValidationFailure> {
    if raw.trim().is_empty() {
        return Err(ValidationFailure::EmptyPath);
    }
    if raw.contains('\0') {
        return Err(ValidationFailure::NulByte);
    }
    let p = Path::new(raw);
    let drive_letter = raw.len() >= 2 && raw.as_bytes()[1] == b':';
    if p.is_absolute() || p.has_root() || raw.starts_with('\\') || raw.starts_with('~') || drive_letter
    {
        return Err(ValidationFailure::AbsolutePath(raw.to_string()));
    }
    if p.components().any(|c| matches!(c, Component::ParentDir))
        || raw.split(['/', '\\']).any(|seg| seg == "..")
    {
        return Err(ValidationFailure::EscapesRoot(raw.to_string()));
    }
    Ok(())
}

/// Resolve `raw` against `base` and make sure the result stays inside `root`
/// even through symlinks. The target itself need not exist; a symlink in the
/// final position is kept as the link rather than followed.
pub fn resolve(root: &Path, base: &Path, raw: &str) -> std::result::Result<PathBuf, ValidationFailure> {
    check_relative(raw)?;
    let joined = base.join(raw);
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => {
            let mut resolved = contain(root, parent, raw)?;
            resolved.push(name);
            Ok(resolved)
        }
        _ => contain(root, &joined, raw),
    }
}

/// Like [`resolve`], but the target must exist.
pub fn resolve_existing(
    root: &Path,
    base: &Path,
    raw: &str,
) -> std::result::Result<PathBuf, ValidationFailure> {
    let resolved = resolve(root, base, raw)?;
    if std::fs::symlink_metadata(&resolved).is_err() {
        return Err(ValidationFailure::NotFound(raw.to_string()));
    }
    Ok(resolved)
}

/// An existing target whose content will be read: symlinks are followed all
/// the way and must still land inside `root`.
pub fn resolve_readable(
    root: &Path,
    base: &Path,
    raw: &str,
) -> std::result::Result<PathBuf, ValidationFailure> {
    check_relative(raw)?;
    let resolved = contain(root, &base.join(raw), raw)?;
    if !resolved.exists() {
        return Err(ValidationFailure::NotFound(raw.to_string()));
    }
    Ok(resolved)
}

/// CD targets may climb with `..` as long as they land inside the root.
pub fn resolve_cd(root: &Path, base: &Path, raw: &str) -> std::result::Result<PathBuf, ValidationFailure> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationFailure::EmptyPath);
    }
    if raw.contains('\0') {
        return Err(ValidationFailure::NulByte);
    }
    let p = Path::new(raw);
    if p.is_absolute() || p.has_root() || raw.starts_with('~') {
        return Err(ValidationFailure::AbsolutePath(raw.to_string()));
    }

    let mut joined = base.to_path_buf();
    for component in p.components() {
        match component {
            Component::ParentDir => {
                if joined == root || !joined.pop() {
                    return Err(ValidationFailure::EscapesRoot(raw.to_string()));
                }
            }
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(ValidationFailure::AbsolutePath(raw.to_string()));
            }
        }
    }

    let resolved = contain(root, &joined, raw)?;
    if !resolved.exists() {
        return Err(ValidationFailure::NotFound(raw.to_string()));
    }
    if !resolved.is_dir() {
        return Err(ValidationFailure::NotADirectory(raw.to_string()));
    }
    Ok(resolved)
}

/// Canonicalize the deepest existing ancestor of `path`, re-append the rest,
/// and require the result to start with `root`.
fn contain(root: &Path, path: &Path, raw: &str) -> std::result::Result<PathBuf, ValidationFailure> {
    let mut existing = path.to_path_buf();
    let mut rest: Vec<std::ffi::OsString> = Vec::new();
    let canonical = loop {
        match existing.canonicalize() {
            Ok(c) => break c,
            Err(_) => {
                let Some(name) = existing.file_name() else {
                    return Err(ValidationFailure::EscapesRoot(raw.to_string()));
                };
                rest.push(name.to_os_string());
                if !existing.pop() {
                    return Err(ValidationFailure::EscapesRoot(raw.to_string()));
                }
            }
        }
    };

    let mut resolved = canonical;
    for part in rest.into_iter().rev() {
        resolved.push(part);
    }
    if !resolved.starts_with(root) {
        tracing::warn!(path = raw, "path resolves outside the project root");
        return Err(ValidationFailure::EscapesRoot(raw.to_string()));
    }
    Ok(resolved)
}

/// Only the backup store and config loader write under `.vibe/`.
pub fn check_not_reserved(
    root: &Path,
    resolved: &Path,
    raw: &str,
) -> std::result::Result<(), ValidationFailure> {
    if resolved.starts_with(paths::vibe_dir(root)) {
        return Err(ValidationFailure::ReservedPath(raw.to_string()));
    }
    Ok(())
}

/// Reject package names and options that could inject shell syntax.
pub fn check_argument(arg: &str) -> std::result::Result<(), ValidationFailure> {
    if arg.is_empty() || arg.contains(SHELL_METACHARACTERS) || arg.starts_with('~') {
        return Err(ValidationFailure::UnsafeArgument(arg.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        Session::open(dir.path(), Config::default()).unwrap()
    }

    #[test]
    fn relative_paths_pass() {
        for p in ["a.txt", "src/main.rs", "./x", "dir/", "a..b.txt"] {
            check_relative(p).unwrap_or_else(|e| panic!("{p}: {e}"));
        }
    }

    #[test]
    fn unsafe_paths_fail() {
        assert_eq!(check_relative(""), Err(ValidationFailure::EmptyPath));
        assert_eq!(check_relative("a\0b"), Err(ValidationFailure::NulByte));
        assert!(matches!(check_relative("/etc/passwd"), Err(ValidationFailure::AbsolutePath(_))));
        assert!(matches!(check_relative("C:\\x"), Err(ValidationFailure::AbsolutePath(_))));
        assert!(matches!(check_relative("~/.ssh"), Err(ValidationFailure::AbsolutePath(_))));
        assert!(matches!(check_relative("../x"), Err(ValidationFailure::EscapesRoot(_))));
        assert!(matches!(check_relative("a/../../x"), Err(ValidationFailure::EscapesRoot(_))));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_caught() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert!(matches!(
            resolve(&root, &root, "link/file.txt"),
            Err(ValidationFailure::EscapesRoot(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn read_through_symlink_must_stay_inside() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("s")).unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert!(matches!(
            resolve_readable(&root, &root, "s"),
            Err(ValidationFailure::EscapesRoot(_))
        ));
        // Deleting the link itself stays inside the root.
        assert_eq!(resolve_existing(&root, &root, "s").unwrap(), root.join("s"));
    }

    #[test]
    fn resolve_allows_new_nested_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let p = resolve(&root, &root, "new/deep/file.txt").unwrap();
        assert_eq!(p, root.join("new/deep/file.txt"));
    }

    #[test]
    fn delete_of_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let err = plan(
            &mut s,
            Directive::Delete {
                path: "missing.txt".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err, ValidationFailure::NotFound("missing.txt".into()));
    }

    #[test]
    fn vibe_dir_is_off_limits() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "old").unwrap();
        let mut s = session(&dir);
        let name = s.backups().backup("a.txt", &file).unwrap().name;

        let write = plan(
            &mut s,
            Directive::Write {
                path: format!(".vibe/backups/{name}"),
                content: "clobbered".into(),
            },
        );
        assert!(matches!(write, Err(ValidationFailure::ReservedPath(_))));

        let delete = plan(
            &mut s,
            Directive::Delete {
                path: ".vibe/backups".into(),
            },
        );
        assert!(matches!(delete, Err(ValidationFailure::ReservedPath(_))));

        let cd = plan(&mut s, Directive::Cd { path: "./.vibe".into() });
        assert!(matches!(cd, Err(ValidationFailure::ReservedPath(_))));

        // Names that merely start with .vibe are fine.
        plan(
            &mut s,
            Directive::Write {
                path: ".viberc".into(),
                content: String::new(),
            },
        )
        .unwrap();
    }

    #[test]
    fn write_onto_directory_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let mut s = session(&dir);
        let err = plan(
            &mut s,
            Directive::Write {
                path: "src".into(),
                content: String::new(),
            },
        )
        .unwrap_err();
        assert_eq!(err, ValidationFailure::IsADirectory("src".into()));
    }

    #[test]
    fn cd_may_climb_but_not_leave_root() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("web/src")).unwrap();
        let root = dir.path().canonicalize().unwrap();
        let web = root.join("web");
        assert_eq!(resolve_cd(&root, &web, "..").unwrap(), root);
        assert_eq!(resolve_cd(&root, &web, "src").unwrap(), web.join("src"));
        assert!(matches!(
            resolve_cd(&root, &root, ".."),
            Err(ValidationFailure::EscapesRoot(_))
        ));
        assert!(matches!(
            resolve_cd(&root, &root, "nope"),
            Err(ValidationFailure::NotFound(_))
        ));
    }

    #[test]
    fn cd_onto_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("f"), "").unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(
            resolve_cd(&root, &root, "f"),
            Err(ValidationFailure::NotADirectory("f".into()))
        );
    }

    #[test]
    fn run_cd_becomes_cd_action() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("backend")).unwrap();
        let mut s = session(&dir);
        let planned = plan(
            &mut s,
            Directive::Run {
                command: "cd backend".into(),
            },
        )
        .unwrap();
        assert!(matches!(planned.action, Action::Cd { ref rel, .. } if rel == "backend"));

        let chained = plan(
            &mut s,
            Directive::Run {
                command: "cd backend && npm i".into(),
            },
        )
        .unwrap();
        assert!(matches!(chained.action, Action::Shell { .. }));
    }

    #[test]
    fn create_validates_name_template_and_options() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let create = |template: &str, name: &str, options: Option<&str>| Directive::Create {
            template: template.into(),
            name: name.into(),
            options: options.map(str::to_string),
        };

        assert_eq!(
            plan(&mut s, create("vite-react", "../evil", None)).unwrap_err(),
            ValidationFailure::InvalidProjectName("../evil".into())
        );
        assert_eq!(
            plan(&mut s, create("angular", "web", None)).unwrap_err(),
            ValidationFailure::UnknownTemplate("angular".into())
        );
        assert_eq!(
            plan(&mut s, create("vite-react", "web", Some("--x; rm -rf /"))).unwrap_err(),
            ValidationFailure::UnsafeArgument("--x;".into())
        );

        let ok = plan(&mut s, create("vite-react", "web", None)).unwrap();
        let Action::Shell { command, purpose } = ok.action else {
            panic!("expected shell action");
        };
        assert!(command.command.contains("vite@latest web"));
        assert_eq!(
            purpose,
            ShellPurpose::Create {
                project_dir: s.root().join("web")
            }
        );
    }

    #[test]
    fn shadcn_uses_package_runner() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let planned = plan(
            &mut s,
            Directive::Shadcn {
                components: vec!["button".into(), "dialog".into()],
            },
        )
        .unwrap();
        let Action::Shell { command, purpose } = planned.action else {
            panic!("expected shell action");
        };
        assert_eq!(purpose, ShellPurpose::Component);
        assert_eq!(command.command, "npx --yes shadcn@latest add button dialog --yes");

        let injected = plan(
            &mut s,
            Directive::Shadcn {
                components: vec!["button;rm".into()],
            },
        );
        assert!(matches!(injected, Err(ValidationFailure::UnsafeArgument(_))));
    }

    #[test]
    fn install_rejects_injection() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let err = plan(
            &mut s,
            Directive::Install {
                packages: vec!["react".into(), "$(curl x)".into()],
            },
        )
        .unwrap_err();
        assert!(matches!(err, ValidationFailure::UnsafeArgument(_)));

        let ok = plan(
            &mut s,
            Directive::Install {
                packages: vec!["@types/node@^20".into()],
            },
        )
        .unwrap();
        let Action::Shell { command, .. } = ok.action else {
            panic!("expected shell action");
        };
        assert_eq!(command.command, "npm install @types/node@^20");
    }

    #[test]
    fn risk_is_classified() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);
        let rm = plan(
            &mut s,
            Directive::Run {
                command: "rm -rf build".into(),
            },
        )
        .unwrap();
        assert!(rm.risk.dangerous);
        let dev = plan(
            &mut s,
            Directive::Run {
                command: "npm run dev".into(),
            },
        )
        .unwrap();
        assert!(dev.risk.long_running);
        assert!(!dev.risk.dangerous);
    }
}
