//! CLI error types with exit code handling
//!
//! Library errors are folded into [`CliError`], which carries the help text
//! shown by miette and the process exit code.

use bosun_core::CoreError;
use bosun_helm::{ErrorKind, HelmError};
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// The configuration document could not be used
    #[error("Configuration error: {message}")]
    #[diagnostic(code(bosun::cli::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A required executable or plugin is missing or too old
    #[error("{message}")]
    #[diagnostic(code(bosun::cli::unavailable))]
    Unavailable {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A helm invocation failed
    #[error("{message}")]
    #[diagnostic(
        code(bosun::cli::execution),
        help("re-run with --loglevel debug to see every helm invocation")
    )]
    Execution { message: String },

    /// The post-render overlay could not be staged
    #[error("Overlay error: {message}")]
    #[diagnostic(code(bosun::cli::overlay))]
    Overlay { message: String },

    /// IO error (working directory, file permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(bosun::cli::io))]
    Io { message: String },

    /// Invalid arguments or options
    #[error("{message}")]
    #[diagnostic(code(bosun::cli::usage))]
    Usage {
        message: String,
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::Unavailable { .. } => exit_codes::UNAVAILABLE,
            CliError::Execution { .. } => exit_codes::EXECUTION_ERROR,
            CliError::Overlay { .. } => exit_codes::OVERLAY_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
        }
    }

    /// Create a usage error with help text
    pub fn usage_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ReadConfig { .. } => CliError::Config {
                message: err.to_string(),
                help: Some("check the --config path or BOSUN_CONFIG".to_string()),
            },
            CoreError::Io(_) => CliError::Io {
                message: err.to_string(),
            },
            _ => CliError::Config {
                message: err.to_string(),
                help: None,
            },
        }
    }
}

impl From<HelmError> for CliError {
    fn from(err: HelmError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::DriverNotFound => CliError::Unavailable {
                message,
                help: Some("install helm or point --helm / BOSUN_HELM at it".to_string()),
            },
            ErrorKind::TransformToolNotFound => CliError::Unavailable {
                message,
                help: Some(
                    "install kustomize or point --kustomize / BOSUN_KUSTOMIZE at it".to_string(),
                ),
            },
            ErrorKind::PluginMissing => CliError::Unavailable {
                message,
                help: Some(
                    "helm plugin install https://github.com/databus23/helm-diff".to_string(),
                ),
            },
            ErrorKind::Unsupported => CliError::Unavailable {
                message,
                help: None,
            },
            ErrorKind::ExecutionFailure => CliError::Execution { message },
            ErrorKind::OverlayBuildFailure => CliError::Overlay { message },
            ErrorKind::Io => CliError::Io { message },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
