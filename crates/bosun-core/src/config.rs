//! Configuration document loading, defaults and validation

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::chart::ChartConfig;
use crate::error::{CoreError, Result};
use crate::repository::RepositoryConfig;

/// The bosun configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BosunConfig {
    /// Kubernetes context used for release operations
    #[serde(default, rename = "kube-context")]
    pub kube_context: Option<String>,

    /// Log level requested by the document (the command line wins)
    #[serde(default)]
    pub loglevel: Option<String>,

    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,

    #[serde(default)]
    pub charts: Vec<ChartConfig>,

    /// Directory that overlay paths are relative to
    #[serde(skip)]
    root: PathBuf,
}

impl BosunConfig {
    /// Load, default and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        let root = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let config = Self::from_yaml(&content, root)?;
        tracing::debug!(
            path = %path.display(),
            repositories = config.repositories.len(),
            charts = config.charts.len(),
            "loaded configuration"
        );
        Ok(config)
    }

    /// Parse, default and validate a configuration document
    pub fn from_yaml(yaml: &str, root: impl Into<PathBuf>) -> Result<Self> {
        let mut config: Self = serde_yaml::from_str(yaml)?;
        config.root = root.into();
        config.apply_defaults();
        config.validate()?;
        Ok(config)
    }

    /// Directory the configuration was loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Empty optional strings mean "not set"
    fn apply_defaults(&mut self) {
        clear_if_blank(&mut self.kube_context);
        clear_if_blank(&mut self.loglevel);

        for chart in &mut self.charts {
            clear_if_blank(&mut chart.namespace);
            clear_if_blank(&mut chart.repo);
            clear_if_blank(&mut chart.version);
        }
    }

    fn validate(&self) -> Result<()> {
        let mut repo_names = HashSet::new();
        for repo in &self.repositories {
            if repo.name.trim().is_empty() {
                return Err(CoreError::validation("repository name must not be empty"));
            }
            if repo.state.is_present() && repo.url.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "repository '{}' is present but has no url",
                    repo.name
                )));
            }
            if !repo_names.insert(repo.name.as_str()) {
                return Err(CoreError::validation(format!(
                    "repository '{}' is declared more than once",
                    repo.name
                )));
            }
        }

        let mut releases = HashSet::new();
        for chart in &self.charts {
            if chart.release.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "chart '{}' has no release name",
                    chart.name
                )));
            }
            if chart.name.trim().is_empty() {
                return Err(CoreError::validation(format!(
                    "release '{}' has no chart name",
                    chart.release
                )));
            }
            if !releases.insert((chart.namespace.as_deref(), chart.release.as_str())) {
                return Err(CoreError::validation(format!(
                    "release '{}' is declared more than once",
                    chart.long_name()
                )));
            }
            if let Some(overlay) = &chart.overlay {
                if overlay.resources.iter().any(|r| r.trim().is_empty()) {
                    return Err(CoreError::validation(format!(
                        "release '{}' has an empty overlay resource path",
                        chart.long_name()
                    )));
                }
                for patch in &overlay.patches {
                    match (&patch.path, &patch.patch) {
                        (Some(_), None) | (None, Some(_)) => {}
                        (Some(_), Some(_)) => {
                            return Err(CoreError::validation(format!(
                                "release '{}' has a patch with both 'path' and inline 'patch'",
                                chart.long_name()
                            )));
                        }
                        (None, None) => {
                            return Err(CoreError::validation(format!(
                                "release '{}' has a patch with neither 'path' nor inline 'patch'",
                                chart.long_name()
                            )));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

fn clear_if_blank(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
        *field = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::State;
    use tempfile::TempDir;

    const DEMO: &str = r#"
kube-context: staging
repositories:
  - name: stable
    url: https://charts.helm.sh/stable
  - name: legacy
    state: absent
charts:
  - name: concourse
    namespace: ci
    release: concourse
    repo: stable
    version: "14.0.0"
    values:
      replicaCount: 2
      ingress:
        enabled: true
  - name: old-thing
    release: old-thing
    repo: ""
    state: absent
"#;

    #[test]
    fn test_defaults_are_applied() {
        let config = BosunConfig::from_yaml(DEMO, ".").unwrap();

        assert_eq!(config.kube_context.as_deref(), Some("staging"));
        assert_eq!(config.repositories[0].state, State::Present);
        assert_eq!(config.repositories[1].state, State::Absent);
        assert_eq!(config.charts[0].state, State::Present);
        assert_eq!(config.charts[1].repo, None);
        assert_eq!(config.charts[1].chart_reference(), "old-thing");
    }

    #[test]
    fn test_boolean_is_not_coerced() {
        let config = BosunConfig::from_yaml(DEMO, ".").unwrap();
        let values = &config.charts[0].values;
        assert_eq!(values.get("ingress.enabled").unwrap(), &serde_json::Value::Bool(true));
        assert_eq!(values.get("replicaCount").unwrap(), 2);
    }

    #[test]
    fn test_load_sets_root_to_config_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bosun.yaml");
        std::fs::write(&path, DEMO).unwrap();

        let config = BosunConfig::load(&path).unwrap();
        assert_eq!(config.root(), dir.path());
    }

    #[test]
    fn test_load_missing_file() {
        let err = BosunConfig::load(Path::new("/nonexistent/bosun.yaml")).unwrap_err();
        assert!(matches!(err, CoreError::ReadConfig { .. }));
    }

    #[test]
    fn test_duplicate_repository_is_rejected() {
        let yaml = r#"
repositories:
  - name: stable
    url: a
  - name: stable
    url: b
"#;
        let err = BosunConfig::from_yaml(yaml, ".").unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_present_repository_requires_url() {
        let err = BosunConfig::from_yaml("repositories:\n  - name: stable\n", ".").unwrap_err();
        assert!(err.to_string().contains("no url"));
    }

    #[test]
    fn test_same_release_in_different_namespaces_is_allowed() {
        let yaml = r#"
charts:
  - name: nginx
    release: web
    namespace: a
  - name: nginx
    release: web
    namespace: b
"#;
        assert!(BosunConfig::from_yaml(yaml, ".").is_ok());
    }

    #[test]
    fn test_duplicate_release_is_rejected() {
        let yaml = r#"
charts:
  - name: nginx
    release: web
    namespace: a
  - name: other
    release: web
    namespace: a
"#;
        let err = BosunConfig::from_yaml(yaml, ".").unwrap_err();
        assert!(err.to_string().contains("a/web"));
    }

    #[test]
    fn test_patch_requires_exactly_one_source() {
        let yaml = r#"
charts:
  - name: nginx
    release: web
    overlay:
      patches:
        - target:
            kind: Deployment
"#;
        let err = BosunConfig::from_yaml(yaml, ".").unwrap_err();
        assert!(err.to_string().contains("neither"));
    }

    #[test]
    fn test_chart_requires_release() {
        let err = BosunConfig::from_yaml("charts:\n  - name: nginx\n    release: \"\"\n", ".")
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }
}
