use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read check-in config {path}: {source}")]
    Read { source: io::Error, path: PathBuf },
    #[error("malformed check-in config {path}: {source}")]
    Toml {
        source: toml::de::Error,
        path: PathBuf,
    },
    #[error("invalid check-in config {path}: {reason}")]
    Invalid { reason: String, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
