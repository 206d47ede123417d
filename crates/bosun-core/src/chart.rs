//! Chart release definitions and overlay declarations

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::repository::State;
use crate::values::Values;

/// A release of a chart as declared in the configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Chart name, or a path/URL when no repository is given
    pub name: String,

    /// Target namespace (driver default when unset)
    #[serde(default)]
    pub namespace: Option<String>,

    /// Release name
    pub release: String,

    /// Repository the chart is fetched from
    #[serde(default)]
    pub repo: Option<String>,

    #[serde(default)]
    pub state: State,

    /// Chart version (latest when unset)
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub values: Values,

    /// Post-render overlay applied to the templated manifests
    #[serde(default, alias = "kustomize")]
    pub overlay: Option<Overlay>,
}

impl ChartConfig {
    /// Chart reference handed to the driver
    ///
    /// Accepts the usual forms:
    /// 1. By chart reference: `example/mariadb`
    /// 2. By path to a packaged chart: `./nginx-1.2.3.tgz`
    /// 3. By path to an unpacked chart directory: `./nginx`
    /// 4. By absolute URL: `https://example.com/charts/nginx-1.2.3.tgz`
    ///
    /// Only the first form is built here, from `repo` and `name`.
    pub fn chart_reference(&self) -> String {
        match &self.repo {
            Some(repo) => format!("{}/{}", repo, self.name),
            None => self.name.clone(),
        }
    }

    /// `namespace/release`, for messages
    pub fn long_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.release),
            None => self.release.clone(),
        }
    }

    /// The declared overlay, if it has anything to apply
    pub fn active_overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref().filter(|o| !o.is_empty())
    }

    pub fn is_present(&self) -> bool {
        self.state.is_present()
    }
}

/// Kustomize-style overlay: extra resources and patches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    /// Resource file paths, relative to the configuration file
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<Patch>,
}

impl Overlay {
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.patches.is_empty()
    }
}

/// A patch, either read from a file or given inline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Inline patch text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Selector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<BTreeMap<String, bool>>,
}

/// Selects the resources a patch applies to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_selector: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<String>,
}
