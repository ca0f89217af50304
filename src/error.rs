use thiserror::Error;

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// A mandatory line could not be claimed or configured
    #[error("Resource unavailable [{line}]: {reason}")]
    ResourceUnavailable { line: String, reason: String },

    /// A line read or write failed
    #[error("Hardware write error [{line}]: {reason}")]
    HardwareWrite { line: String, reason: String },

    /// A mandatory configuration field is absent
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registration error: {0}")]
    Registration(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl AppError {
    pub(crate) fn unavailable(line: impl ToString, reason: impl ToString) -> Self {
        Self::ResourceUnavailable {
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn hardware(line: impl ToString, reason: impl ToString) -> Self {
        Self::HardwareWrite {
            line: line.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
