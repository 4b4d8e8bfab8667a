//! Error types for fbsync

use std::path::PathBuf;

use thiserror::Error;

/// Result type for fbsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for fbsync
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Malformed script {}: {reason}", .file.display())]
    MalformedScript { file: PathBuf, reason: String },

    #[error("Failed executing {object} ({}): {message}", .file.display())]
    Execution {
        object: String,
        file: PathBuf,
        message: String,
    },

    #[error(
        "No progress applying procedures; still pending: {}. Last error: {cause}",
        .pending.join(", ")
    )]
    Stall { pending: Vec<String>, cause: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert TOML deserialization errors to fbsync errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Config(error.to_string())
    }
}
