//! Disposable working directories for transient release artifacts

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{HelmError, Result};

const PREFIX: &str = "bosun-exec-";

/// A uniquely named scratch directory owned by a single chart operation
///
/// The directory is created with owner-only permissions and removed when the
/// value is dropped. [`WorkDir::release`] removes it eagerly and reports
/// failures.
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}

impl WorkDir {
    /// Create a new directory under the system temporary directory
    pub fn acquire() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(PREFIX)
            .tempdir()
            .map_err(HelmError::WorkDir)?;
        tracing::debug!(path = %dir.path().display(), "acquired working directory");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file inside the directory
    pub fn join(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the directory tree
    pub fn release(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(HelmError::WorkDir)?;
        tracing::debug!(path = %path.display(), "released working directory");
        Ok(())
    }
}
