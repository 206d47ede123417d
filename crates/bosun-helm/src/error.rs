//! Error types for bosun-helm

use thiserror::Error;

use crate::exec::Invocation;

/// Result type for bosun-helm operations
pub type Result<T> = std::result::Result<T, HelmError>;

/// Errors raised while driving Helm
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HelmError {
    /// The Helm executable could not be resolved
    #[error("helm executable '{name}' not found: {reason}")]
    DriverNotFound { name: String, reason: String },

    /// The post-render transformation tool could not be resolved
    #[error("kustomize executable '{name}' not found: {reason}")]
    TransformToolNotFound { name: String, reason: String },

    /// The process could not be started at all
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited non-zero
    #[error("`{command}` failed ({}): {}", exit_display(.output), failure_text(.output))]
    ExecutionFailure { command: String, output: Invocation },

    /// A repository could not be reconciled
    #[error("repository '{name}': {source}")]
    Repository {
        name: String,
        #[source]
        source: Box<HelmError>,
    },

    /// The repository cache refresh failed
    #[error("refreshing repository cache: {source}")]
    Refresh {
        #[source]
        source: Box<HelmError>,
    },

    /// A release could not be reconciled
    #[error("release '{release}': {source}")]
    Release {
        release: String,
        #[source]
        source: Box<HelmError>,
    },

    /// Staging the post-render overlay failed
    #[error("building post-render overlay: {message}")]
    OverlayBuild { message: String },

    /// Writing the values payload failed
    #[error("writing values file: {0}")]
    Values(#[from] bosun_core::CoreError),

    /// The working directory could not be created or removed
    #[error("working directory: {0}")]
    WorkDir(#[source] std::io::Error),

    /// A required Helm plugin is not installed
    #[error("helm plugin '{plugin}' is required but not installed\nHint: see {url}")]
    PluginMissing { plugin: String, url: String },

    /// The detected Helm cannot perform the requested operation
    #[error("unsupported by {driver}: {feature}")]
    Unsupported { driver: String, feature: String },
}

/// Coarse classification of a failure, looking through reconciliation context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DriverNotFound,
    TransformToolNotFound,
    ExecutionFailure,
    OverlayBuildFailure,
    PluginMissing,
    Unsupported,
    Io,
}

impl HelmError {
    pub(crate) fn repository(name: &str, source: HelmError) -> Self {
        HelmError::Repository {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn release(release: impl Into<String>, source: HelmError) -> Self {
        HelmError::Release {
            release: release.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn overlay(message: impl Into<String>) -> Self {
        HelmError::OverlayBuild {
            message: message.into(),
        }
    }

    /// The root cause's kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            HelmError::DriverNotFound { .. } => ErrorKind::DriverNotFound,
            HelmError::TransformToolNotFound { .. } => ErrorKind::TransformToolNotFound,
            HelmError::Spawn { .. } | HelmError::ExecutionFailure { .. } => {
                ErrorKind::ExecutionFailure
            }
            HelmError::Repository { source, .. }
            | HelmError::Refresh { source }
            | HelmError::Release { source, .. } => source.kind(),
            HelmError::OverlayBuild { .. } | HelmError::Values(_) => ErrorKind::OverlayBuildFailure,
            HelmError::WorkDir(_) => ErrorKind::Io,
            HelmError::PluginMissing { .. } => ErrorKind::PluginMissing,
            HelmError::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// Captured output of the failed invocation, if the root cause was one
    pub fn invocation(&self) -> Option<&Invocation> {
        match self {
            HelmError::ExecutionFailure { output, .. } => Some(output),
            HelmError::Repository { source, .. }
            | HelmError::Refresh { source }
            | HelmError::Release { source, .. } => source.invocation(),
            _ => None,
        }
    }
}

fn exit_display(output: &Invocation) -> String {
    match output.exit_code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

fn failure_text(output: &Invocation) -> &str {
    if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(stderr: &str) -> HelmError {
        HelmError::ExecutionFailure {
            command: "helm repo add stable https://example/charts".to_string(),
            output: Invocation::failed(stderr, Some(1)),
        }
    }

    #[test]
    fn test_kind_looks_through_context() {
        let err = HelmError::repository("stable", failure("Error: boom"));
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);

        let err = HelmError::release("web", HelmError::overlay("missing patch"));
        assert_eq!(err.kind(), ErrorKind::OverlayBuildFailure);
    }

    #[test]
    fn test_invocation_is_preserved() {
        let err = HelmError::release("web", failure("Error: release: not found"));
        assert_eq!(err.invocation().unwrap().stderr, "Error: release: not found");
        assert_eq!(err.invocation().unwrap().exit_code, Some(1));
    }

    #[test]
    fn test_display_carries_context_and_stderr() {
        let err = HelmError::repository("stable", failure("Error: looks like the url is invalid"));
        let text = err.to_string();
        assert!(text.starts_with("repository 'stable': "));
        assert!(text.contains("exit code 1"));
        assert!(text.contains("looks like the url is invalid"));
    }
}
