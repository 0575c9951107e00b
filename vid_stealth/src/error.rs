use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StealthError {
    #[error("Unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("Invalid range for '{name}': {reason}")]
    InvalidRange { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Input folder doesn't exist: {0}")]
    InputDirMissing(PathBuf),

    #[error("No video files found in {0}")]
    NoInputFiles(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StealthError {
    /// Conditions that stop a batch before any file is touched.
    pub fn is_batch_abort(&self) -> bool {
        matches!(
            self,
            StealthError::InputDirMissing(_) | StealthError::NoInputFiles(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StealthError>;
