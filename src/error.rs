use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Problems with setting definitions or the values fed into them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),

    #[error("Setting name '{0}' is already defined")]
    DuplicateName(String),

    #[error("Setting name '{0}' is reserved for a framework option")]
    Reserved(String),

    #[error("Invalid value for '{name}': {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Unknown configuration variable '{key}' in {path} (line {line})")]
    UnknownKey {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("{}", join_messages(.0))]
    UnknownKeys(Vec<ConfigError>),

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Malformed configuration file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Subcommand '{0}' is already registered")]
    DuplicateSubcommand(String),

    #[error("{}", required_messages(.0))]
    MissingRequired(Vec<String>),
}

fn required_messages(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("Setting {n} has no value, but one is required"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn join_messages(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Everything that can end a run with a non-zero exit status.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{name}: {source}")]
    Input { name: String, source: io::Error },

    #[error("{0}")]
    Usage(String),

    /// Raised on purpose by application code to fail with a clean message.
    #[error("{0}")]
    Application(String),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Unexpected(Box<dyn std::error::Error + Send + Sync>),
}

impl AppError {
    pub fn application(msg: impl Into<String>) -> Self {
        AppError::Application(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        AppError::Usage(msg.into())
    }

    pub fn unexpected<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        AppError::Unexpected(err.into())
    }

    /// User-facing errors get a one-line report; the rest get full detail.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AppError::Unexpected(_))
    }

    /// Writing to a closed pipe (e.g. `prog | head`) is not worth a message.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, AppError::Io(e) if e.kind() == io::ErrorKind::BrokenPipe)
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Usage(_) => 2,
            _ => 1,
        }
    }
}
