//! Project templates for the CREATE directive.
//!
//! Each template maps to either a `<pm> create <tool>` initializer or a
//! one-shot package binary (`npx`, `pnpm dlx`, ...). Every entry carries the
//! flags needed to run without prompting.

use crate::error::ValidationFailure;
use crate::package_manager::PackageManager;

const NAME: &str = "{name}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initializer {
    /// `<pm> create <tool> <name> [args]`
    Create(&'static str),
    /// `<pm exec> <package> [args]`; `{name}` in args is substituted.
    Exec(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub name: &'static str,
    pub initializer: Initializer,
    pub args: &'static [&'static str],
}

pub const TEMPLATES: &[Template] = &[
    Template {
        name: "vite-react",
        initializer: Initializer::Create("vite"),
        args: &["--template", "react"],
    },
    Template {
        name: "vite-react-ts",
        initializer: Initializer::Create("vite"),
        args: &["--template", "react-ts"],
    },
    Template {
        name: "vite-vue",
        initializer: Initializer::Create("vite"),
        args: &["--template", "vue"],
    },
    Template {
        name: "vite-vue-ts",
        initializer: Initializer::Create("vite"),
        args: &["--template", "vue-ts"],
    },
    Template {
        name: "vite-svelte",
        initializer: Initializer::Create("vite"),
        args: &["--template", "svelte"],
    },
    Template {
        name: "vite-svelte-ts",
        initializer: Initializer::Create("vite"),
        args: &["--template", "svelte-ts"],
    },
    Template {
        name: "react",
        initializer: Initializer::Create("vite"),
        args: &["--template", "react-ts"],
    },
    Template {
        name: "vue",
        initializer: Initializer::Create("vite"),
        args: &["--template", "vue-ts"],
    },
    Template {
        name: "svelte",
        initializer: Initializer::Create("vite"),
        args: &["--template", "svelte-ts"],
    },
    Template {
        name: "next",
        initializer: Initializer::Exec("create-next-app@latest"),
        args: &[NAME, "--typescript", "--tailwind", "--app", "--yes"],
    },
    Template {
        name: "next-js",
        initializer: Initializer::Exec("create-next-app@latest"),
        args: &[NAME, "--javascript", "--tailwind", "--app", "--yes"],
    },
    Template {
        name: "next-pages",
        initializer: Initializer::Exec("create-next-app@latest"),
        args: &[NAME, "--typescript", "--tailwind", "--src-dir", "--yes"],
    },
    Template {
        name: "astro",
        initializer: Initializer::Create("astro"),
        args: &["--template", "minimal", "--yes", "--install"],
    },
    Template {
        name: "astro-blog",
        initializer: Initializer::Create("astro"),
        args: &["--template", "blog", "--yes", "--install"],
    },
    Template {
        name: "remix",
        initializer: Initializer::Exec("create-remix@latest"),
        args: &[NAME, "--template", "remix", "--yes"],
    },
    Template {
        name: "nuxt",
        initializer: Initializer::Exec("nuxi@latest"),
        args: &["init", NAME],
    },
    Template {
        name: "expo",
        initializer: Initializer::Exec("create-expo-app@latest"),
        args: &[NAME, "--template", "blank-typescript", "--yes"],
    },
    Template {
        name: "t3",
        initializer: Initializer::Create("t3-app"),
        args: &["--noGit", "--CI"],
    },
    Template {
        name: "solid",
        initializer: Initializer::Exec("degit"),
        args: &["solidjs/templates/ts", NAME],
    },
    Template {
        name: "qwik",
        initializer: Initializer::Create("qwik"),
        args: &[],
    },
];

pub fn find(name: &str) -> Option<&'static Template> {
    let name = name.to_ascii_lowercase();
    TEMPLATES.iter().find(|t| t.name == name)
}

pub fn template_names() -> Vec<&'static str> {
    TEMPLATES.iter().map(|t| t.name).collect()
}

impl Template {
    /// The full create command for project `name` with the given package
    /// manager. `extra` options are appended after the template's own flags.
    pub fn command(&self, pm: PackageManager, name: &str, extra: &[String]) -> String {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|a| if *a == NAME { name.to_string() } else { a.to_string() })
            .collect();
        args.extend(extra.iter().cloned());
        match self.initializer {
            Initializer::Create(tool) => pm.create_command(tool, name, &args),
            Initializer::Exec(package) => pm.exec_command(package, &args),
        }
    }
}

/// Resolve a CREATE directive into a concrete command.
pub fn create_command(
    template: &str,
    name: &str,
    options: Option<&str>,
    pm: PackageManager,
) -> Result<String, ValidationFailure> {
    let t = find(template).ok_or_else(|| ValidationFailure::UnknownTemplate(template.to_string()))?;
    let extra: Vec<String> = options
        .map(|o| o.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    Ok(t.command(pm, name, &extra))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vite_template_uses_detected_manager() {
        assert_eq!(
            create_command("vite-react-ts", "web", None, PackageManager::Npm).unwrap(),
            "npm create --yes vite@latest web -- --template react-ts"
        );
        assert_eq!(
            create_command("vite-react-ts", "web", None, PackageManager::Bun).unwrap(),
            "bun create vite@latest web --template react-ts"
        );
    }

    #[test]
    fn exec_templates_place_name() {
        assert_eq!(
            create_command("next", "site", None, PackageManager::Npm).unwrap(),
            "npx --yes create-next-app@latest site --typescript --tailwind --app --yes"
        );
        assert_eq!(
            create_command("nuxt", "shop", None, PackageManager::Pnpm).unwrap(),
            "pnpm dlx nuxi@latest init shop"
        );
        assert_eq!(
            create_command("solid", "app", None, PackageManager::Bun).unwrap(),
            "bunx degit solidjs/templates/ts app"
        );
    }

    #[test]
    fn options_are_appended() {
        assert_eq!(
            create_command("astro", "blog", Some("--git  --skip-houston"), PackageManager::Yarn)
                .unwrap(),
            "yarn create astro blog --template minimal --yes --install --git --skip-houston"
        );
    }

    #[test]
    fn aliases_and_case() {
        assert!(find("react").is_some());
        assert!(find("Vite-React").is_some());
    }

    #[test]
    fn unknown_template_is_rejected() {
        assert_eq!(
            create_command("angular", "x", None, PackageManager::Npm),
            Err(ValidationFailure::UnknownTemplate("angular".to_string()))
        );
    }

    #[test]
    fn every_template_is_listed_once() {
        let names = template_names();
        let mut dedup = names.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(names.len(), dedup.len());
        assert_eq!(names.len(), 20);
    }
}
