use crate::error::{Result, VibeError};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ContextConfig
// ---------------------------------------------------------------------------

/// What the repository scanner leaves out of the context blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_skip_names")]
    pub skip_names: Vec<String>,
    #[serde(default = "default_skip_extensions")]
    pub skip_extensions: Vec<String>,
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

fn default_skip_names() -> Vec<String> {
    [
        "node_modules",
        ".git",
        ".vibe",
        ".vs",
        ".idea",
        ".vscode",
        "__pycache__",
        ".venv",
        "venv",
        "dist",
        "build",
        "coverage",
        "target",
        ".next",
        ".nuxt",
        ".output",
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "bun.lockb",
        "bun.lock",
        ".DS_Store",
        "Thumbs.db",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_skip_extensions() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp", "woff", "woff2", "ttf", "eot",
        "otf", "exe", "dll", "so", "dylib", "pyc", "class", "jar", "pdf", "zip", "tar", "gz",
        "mp3", "mp4", "wasm",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_file_bytes() -> u64 {
    100 * 1024
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            skip_names: default_skip_names(),
            skip_extensions: default_skip_extensions(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
    #[serde(default = "default_dangerous_patterns")]
    pub dangerous_patterns: Vec<String>,
    #[serde(default = "default_long_running_patterns")]
    pub long_running_patterns: Vec<String>,
    #[serde(default)]
    pub context: ContextConfig,
}

fn default_model() -> String {
    "google/gemini-2.5-flash".to_string()
}

fn default_api_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_history_turns() -> usize {
    15
}

fn default_command_timeout_secs() -> u64 {
    300
}

fn default_max_output_bytes() -> usize {
    16 * 1024
}

fn default_dangerous_patterns() -> Vec<String> {
    [
        r"\brm\s+(-[A-Za-z]*[rR]|--recursive)",
        r"(^|[;&|]\s*)(sudo\s+)?(rm|del|rd)\s",
        r"\brmdir\s+/s\b",
        r"\bdel\s+/[sSqQ]",
        r"\bRemove-Item\b.*-Recurse",
        r"\bmkfs(\.\w+)?\b",
        r"\bformat\s+[A-Za-z]:",
        r"\bdd\s+.*\bof=",
        r"\bdiskpart\b",
        r"\b(shutdown|reboot|halt|poweroff)\b",
        r"\bgit\s+push\b.*(--force\b|-f\b)",
        r"\bgit\s+reset\s+--hard\b",
        r"\bgit\s+clean\s+-[A-Za-z]*f",
        r"\bchmod\s+-R\s+777\b",
        r">\s*/dev/sd[a-z]",
        r":\(\)\s*\{\s*:\|:&\s*\};:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_long_running_patterns() -> Vec<String> {
    [
        r"\b(npm|pnpm|yarn|bun)\s+(run\s+)?(dev|start|serve|watch)\b",
        r"\bpython3?\s+manage\.py\s+runserver\b",
        r"\buvicorn\b",
        r"\bnodemon\b",
        r"\bflask\s+run\b",
        r"\bnext\s+dev\b",
        r"^\s*(npx\s+)?vite(\s+(dev|serve|preview))?(\s+--\S+)*\s*$",
        r"\bcargo\s+watch\b",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_base_url: default_api_base_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_history_turns: default_max_history_turns(),
            command_timeout_secs: default_command_timeout_secs(),
            max_output_bytes: default_max_output_bytes(),
            dangerous_patterns: default_dangerous_patterns(),
            long_running_patterns: default_long_running_patterns(),
            context: ContextConfig::default(),
        }
    }
}

impl Config {
    /// Load `.vibe/config.yaml`, falling back to defaults when it is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Compile the command classification patterns. Invalid patterns are an
    /// error here; `validate` reports them as warnings instead.
    pub fn command_policy(&self) -> Result<CommandPolicy> {
        Ok(CommandPolicy {
            dangerous: compile_all(&self.dangerous_patterns)?,
            long_running: compile_all(&self.long_running_patterns)?,
        })
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        for (field, patterns) in [
            ("dangerous_patterns", &self.dangerous_patterns),
            ("long_running_patterns", &self.long_running_patterns),
        ] {
            for pattern in patterns {
                if let Err(e) = Regex::new(pattern) {
                    warnings.push(ConfigWarning {
                        level: WarnLevel::Error,
                        message: format!("{field}: invalid regex '{pattern}': {e}"),
                    });
                }
            }
        }

        if self.dangerous_patterns.is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "dangerous_patterns is empty; destructive commands get a plain y/n prompt"
                    .to_string(),
            });
        }

        if self.command_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "command_timeout_secs must be greater than zero".to_string(),
            });
        }

        if self.max_output_bytes == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "max_output_bytes is 0; command output will not be captured".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("temperature {} is outside 0.0..=2.0", self.temperature),
            });
        }

        if self.max_history_turns == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "max_history_turns is 0; the model will only see the latest message"
                    .to_string(),
            });
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!("api_base_url '{}' is not an http(s) URL", self.api_base_url),
            });
        }

        warnings
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|source| VibeError::InvalidPattern {
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// CommandPolicy
// ---------------------------------------------------------------------------

/// Compiled command classification used by preview and the gate.
#[derive(Debug, Clone)]
pub struct CommandPolicy {
    dangerous: Vec<Regex>,
    long_running: Vec<Regex>,
}

impl CommandPolicy {
    pub fn is_dangerous(&self, command: &str) -> bool {
        self.dangerous.iter().any(|re| re.is_match(command))
    }

    pub fn is_long_running(&self, command: &str) -> bool {
        self.long_running.iter().any(|re| re.is_match(command))
    }
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Config::default()
            .command_policy()
            .unwrap_or_else(|_| CommandPolicy {
                dangerous: Vec::new(),
                long_running: Vec::new(),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.max_history_turns, 15);
        assert_eq!(cfg.command_timeout_secs, 300);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = paths::config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "model: openai/gpt-4o\ncontext:\n  max_file_bytes: 10\n").unwrap();

        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.model, "openai/gpt-4o");
        assert_eq!(cfg.context.max_file_bytes, 10);
        assert_eq!(cfg.context.skip_names, default_skip_names());
        assert_eq!(cfg.api_base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::default();
        cfg.command_timeout_secs = 5;
        cfg.save(dir.path()).unwrap();
        assert_eq!(Config::load(dir.path()).unwrap().command_timeout_secs, 5);
    }

    #[test]
    fn default_config_has_no_warnings() {
        assert!(Config::default().validate().is_empty());
    }

    #[test]
    fn validate_reports_bad_regex_and_zero_timeout() {
        let cfg = Config {
            dangerous_patterns: vec!["(unclosed".to_string()],
            command_timeout_secs: 0,
            ..Config::default()
        };
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Error));
        assert!(cfg.command_policy().is_err());
    }

    #[test]
    fn default_policy_flags_destructive_commands() {
        let policy = CommandPolicy::default();
        for cmd in [
            "rm -rf node_modules",
            "rm -r build",
            "sudo mkfs.ext4 /dev/sda1",
            "dd if=/dev/zero of=/dev/sda",
            "git push --force origin main",
            "rmdir /s /q dist",
            "shutdown now",
        ] {
            assert!(policy.is_dangerous(cmd), "expected dangerous: {cmd}");
        }
        for cmd in ["npm test", "ls -la", "git push origin main", "cargo build"] {
            assert!(!policy.is_dangerous(cmd), "expected safe: {cmd}");
        }
    }

    #[test]
    fn default_policy_flags_dev_servers() {
        let policy = CommandPolicy::default();
        for cmd in [
            "npm run dev",
            "npm start",
            "pnpm dev",
            "bun run dev",
            "python manage.py runserver",
            "uvicorn app:app --reload",
        ] {
            assert!(policy.is_long_running(cmd), "expected long-running: {cmd}");
        }
        assert!(!policy.is_long_running("npm run build"));
    }
}
