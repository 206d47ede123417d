//! Kustomize post-render pipeline
//!
//! Stages an overlay inside a release's working directory:
//!
//! ```text
//! <workdir>/
//!   deployment.yaml         copied resource
//!   1-deployment.yaml       second resource with the same base name
//!   replicas.yaml           copied patch file
//!   <random>.yaml           placeholder, written by the wrapper from stdin
//!   kustomization.yaml      resources + patches with staged names
//!   post-render.sh          wrapper handed to --post-renderer
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use bosun_core::{Overlay, Patch, VALUES_FILE_NAME};
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{HelmError, Result};

pub const KUSTOMIZATION_FILE_NAME: &str = "kustomization.yaml";
pub const SCRIPT_FILE_NAME: &str = "post-render.sh";

const RESERVED: [&str; 3] = [VALUES_FILE_NAME, KUSTOMIZATION_FILE_NAME, SCRIPT_FILE_NAME];

/// A staged post-render pipeline
#[derive(Debug, Clone)]
pub struct PostRenderer {
    /// Executable wrapper script
    pub script: PathBuf,
    /// File name the templated stream is written to
    pub placeholder: String,
    pub kustomization: PathBuf,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Kustomization {
    api_version: &'static str,
    kind: &'static str,
    resources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patches: Vec<Patch>,
}

/// Builds post-render pipelines around a kustomize executable
#[derive(Debug, Clone)]
pub struct OverlayBuilder {
    tool: String,
}

impl OverlayBuilder {
    /// `tool` is a kustomize executable name or path, resolved on each build
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }

    /// Stage `overlay` into `work_dir` and return the wrapper
    ///
    /// Resource and patch paths are relative to `config_root`.
    pub fn build(
        &self,
        work_dir: &Path,
        config_root: &Path,
        overlay: &Overlay,
    ) -> Result<PostRenderer> {
        let tool = which::which(&self.tool).map_err(|e| HelmError::TransformToolNotFound {
            name: self.tool.clone(),
            reason: e.to_string(),
        })?;

        let mut staging = Staging::default();

        let mut resources = Vec::with_capacity(overlay.resources.len() + 1);
        for resource in &overlay.resources {
            resources.push(staging.stage(config_root, resource)?);
        }

        let mut patches = overlay.patches.clone();
        for patch in &mut patches {
            if let Some(path) = &patch.path {
                patch.path = Some(staging.stage(config_root, path)?);
            }
        }

        let placeholder = staging.placeholder();
        resources.push(placeholder.clone());

        for (source, staged) in &staging.files {
            fs::copy(source, work_dir.join(staged)).map_err(|e| {
                HelmError::overlay(format!("copying '{}': {}", source.display(), e))
            })?;
        }

        let kustomization = Kustomization {
            api_version: "kustomize.config.k8s.io/v1beta1",
            kind: "Kustomization",
            resources,
            patches,
        };
        let document = serde_yaml::to_string(&kustomization)
            .map_err(|e| HelmError::overlay(format!("serializing kustomization: {}", e)))?;
        tracing::debug!(kustomization = %document, "generated kustomization");

        let kustomization_path = work_dir.join(KUSTOMIZATION_FILE_NAME);
        fs::write(&kustomization_path, document)
            .map_err(|e| {
                HelmError::overlay(format!("writing {}: {}", KUSTOMIZATION_FILE_NAME, e))
            })?;

        let script = work_dir.join(SCRIPT_FILE_NAME);
        write_script(&script, &wrapper_script(work_dir, &placeholder, &tool))?;

        tracing::debug!(script = %script.display(), "post-render pipeline ready");
        Ok(PostRenderer {
            script,
            placeholder,
            kustomization: kustomization_path,
        })
    }
}

/// Assigns collision-free names inside the working directory
#[derive(Default)]
struct Staging {
    /// Source path to staged name, in first-seen order
    files: IndexMap<PathBuf, String>,
    taken: HashSet<String>,
}

impl Staging {
    fn stage(&mut self, root: &Path, relative: &str) -> Result<String> {
        let source = root.join(relative);
        if let Some(staged) = self.files.get(&source) {
            return Ok(staged.clone());
        }

        let base = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| HelmError::overlay(format!("'{}' does not name a file", relative)))?;

        let mut staged = base.clone();
        let mut n = 0;
        while !self.is_free(&staged) {
            n += 1;
            staged = format!("{}-{}", n, base);
        }

        self.taken.insert(staged.clone());
        self.files.insert(source, staged.clone());
        Ok(staged)
    }

    fn is_free(&self, name: &str) -> bool {
        !RESERVED.contains(&name) && !self.taken.contains(name)
    }

    /// Random manifest name that no staged file uses
    fn placeholder(&mut self) -> String {
        loop {
            let name = format!("{}.yaml", hex::encode(rand::random::<[u8; 8]>()));
            if self.is_free(&name) {
                self.taken.insert(name.clone());
                return name;
            }
        }
    }
}

fn wrapper_script(work_dir: &Path, placeholder: &str, tool: &Path) -> String {
    format!(
        "#!/bin/sh\ncat > {}\nexec {} build {}\n",
        shell_quote(&work_dir.join(placeholder).display().to_string()),
        shell_quote(&tool.display().to_string()),
        shell_quote(&work_dir.display().to_string()),
    )
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn write_script(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| HelmError::overlay(format!("writing {}: {}", SCRIPT_FILE_NAME, e)))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .map_err(|e| {
                HelmError::overlay(format!("making {} executable: {}", SCRIPT_FILE_NAME, e))
            })?;
    }

    Ok(())
}
