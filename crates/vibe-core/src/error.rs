use thiserror::Error;

/// Reasons a directive is rejected before it ever reaches the preview stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("empty path")]
    EmptyPath,

    #[error("path contains a NUL byte")]
    NulByte,

    #[error("path '{0}' must be relative to the project root")]
    AbsolutePath(String),

    #[error("path '{0}' escapes the project root")]
    EscapesRoot(String),

    #[error("'{0}' does not exist")]
    NotFound(String),

    #[error("'{0}' is not a directory")]
    NotADirectory(String),

    #[error("'{0}' is inside vibe's own .vibe directory")]
    ReservedPath(String),

    #[error("'{0}' is a directory")]
    IsADirectory(String),

    #[error("unknown project template '{0}'")]
    UnknownTemplate(String),

    #[error("invalid project name '{0}': use letters, digits, '.', '_' or '-'")]
    InvalidProjectName(String),

    #[error("unsafe argument '{0}': shell metacharacters are not allowed")]
    UnsafeArgument(String),

    #[error("empty command")]
    EmptyCommand,
}

#[derive(Debug, Error)]
pub enum VibeError {
    #[error("backup of '{path}' failed: {source}")]
    Backup {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("approval was issued for a different directive")]
    ApprovalMismatch,

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, VibeError>;
