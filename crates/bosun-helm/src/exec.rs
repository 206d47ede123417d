//! Process execution for the Helm driver

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{HelmError, Result};

/// Captured output of one driver invocation
///
/// Both streams are trimmed of surrounding whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl Invocation {
    /// A successful invocation with the given stdout
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into().trim().to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// A failed invocation with the given stderr
    pub fn failed(stderr: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into().trim().to_string(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into [`HelmError::ExecutionFailure`]
    pub fn into_result(self, command: impl Into<String>) -> Result<Invocation> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HelmError::ExecutionFailure {
                command: command.into(),
                output: self,
            })
        }
    }
}

/// Something that can run the driver with an argument vector
///
/// A non-zero exit must be reported as [`HelmError::ExecutionFailure`] with the
/// captured output attached, so callers can downgrade expected failures.
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> Result<Invocation>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, args: &[String]) -> Result<Invocation> {
        (**self).run(args)
    }
}

/// Runs a resolved executable as a child process
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    /// Resolve the Helm executable by name or path
    pub fn locate(name: &str) -> Result<Self> {
        let program = which::which(name).map_err(|e| HelmError::DriverNotFound {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(program = %program.display(), "resolved helm executable");
        Ok(Self { program })
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<Invocation> {
        let command = render_command(&self.program, args);
        tracing::debug!(command = %command, "executing");

        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| HelmError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let invocation = Invocation {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            exit_code: output.status.code(),
        };
        tracing::debug!(exit_code = ?invocation.exit_code, "execution complete");

        invocation.into_result(command)
    }
}

/// Human-readable command line, for messages only
pub fn render_command(program: &Path, args: &[String]) -> String {
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    std::iter::once(name)
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}
