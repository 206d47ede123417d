//! Core error types

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to read configuration file {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to serialize values: {0}")]
    PayloadSerialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid values: {message}")]
    ValuesNormalization { message: String },

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
