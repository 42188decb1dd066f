//! Error types for Dirgroup

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Group is not under any configured group location: {0}")]
    UnsupportedGroup(String),

    #[error("Malformed name: {0}")]
    MalformedName(String),

    // Directory errors
    #[error("Directory error from provider '{provider}' while reading '{name}': {message}")]
    Directory {
        provider: String,
        name: String,
        message: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn directory(
        provider: impl Into<String>,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Directory {
            provider: provider.into(),
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::UnsupportedGroup(_) => "UnsupportedGroup",
            Error::MalformedName(_) => "MalformedName",
            Error::Directory { .. } => "DirectoryError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "InternalError",
            Error::Other(_) => "InternalError",
        }
    }

    /// Whether the caller can fix this by correcting input or configuration,
    /// as opposed to a runtime condition of the directory.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::UnsupportedGroup(_)
                | Error::MalformedName(_)
                | Error::Config(_)
        )
    }
}
