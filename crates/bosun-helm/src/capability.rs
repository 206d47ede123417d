//! Driver capability detection and the per-generation argument table
//!
//! Helm 2 and Helm 3 spell several operations differently. The generation is
//! detected once per run and every verb is assembled here, so the reconcilers
//! never branch on the driver version themselves.

use std::path::Path;
use std::sync::LazyLock;

use bosun_core::ChartConfig;
use regex::Regex;
use semver::Version;

use crate::error::Result;
use crate::exec::{CommandRunner, Invocation};

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v(\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)").expect("version pattern is valid")
});

/// First Helm release with `--post-renderer`
const POST_RENDER_SINCE: Version = Version::new(3, 1, 0);

/// Major Helm generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generation {
    V2,
    V3,
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::V2 => write!(f, "helm 2"),
            Generation::V3 => write!(f, "helm 3"),
        }
    }
}

/// What the detected driver can do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub generation: Generation,
    /// Parsed client version, when the driver reported one
    pub version: Option<Version>,
}

impl Capabilities {
    /// Ask the driver for its client version
    pub fn detect<R: CommandRunner>(runner: &R) -> Result<Self> {
        let args = vec![
            "version".to_string(),
            "--short".to_string(),
            "--client".to_string(),
        ];
        let output = runner.run(&args)?;
        let capabilities = Self::parse(&output.stdout);
        tracing::debug!(
            generation = %capabilities.generation,
            version = ?capabilities.version,
            "detected helm"
        );
        Ok(capabilities)
    }

    /// Interpret `helm version --short --client` output
    ///
    /// Helm 2 prints `Client: v2.17.0+ga690bad`, Helm 3 prints
    /// `v3.14.2+gc309b6f`. Anything unrecognised is assumed to be Helm 3.
    pub fn parse(output: &str) -> Self {
        let version = VERSION_PATTERN
            .captures(output)
            .and_then(|caps| Version::parse(&caps[1]).ok());

        if version.is_none() {
            tracing::warn!(output = %output, "could not parse helm version; assuming helm 3");
        }

        let generation = match &version {
            Some(v) if v.major == 2 => Generation::V2,
            _ => Generation::V3,
        };

        Self {
            generation,
            version,
        }
    }

    /// Capabilities for a generation with an unknown exact version
    pub fn assume(generation: Generation) -> Self {
        Self {
            generation,
            version: None,
        }
    }

    /// Whether `--post-renderer` is available
    pub fn supports_post_render(&self) -> bool {
        match self.generation {
            Generation::V2 => false,
            Generation::V3 => self
                .version
                .as_ref()
                .is_none_or(|v| *v >= POST_RENDER_SINCE),
        }
    }

    /// Whether `template` needs the chart fetched locally first
    pub fn templates_from_local_chart(&self) -> bool {
        self.generation == Generation::V2
    }
}

/// Staged inputs for a release invocation
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    pub values_file: &'a Path,
    pub post_renderer: Option<&'a Path>,
}

impl Generation {
    pub fn repo_list(&self) -> Vec<String> {
        args(&["repo", "list"])
    }

    pub fn repo_add(&self, name: &str, url: &str) -> Vec<String> {
        args(&["repo", "add", name, url])
    }

    pub fn repo_remove(&self, name: &str) -> Vec<String> {
        args(&["repo", "remove", name])
    }

    pub fn repo_update(&self) -> Vec<String> {
        args(&["repo", "update"])
    }

    pub fn plugin_list(&self) -> Vec<String> {
        args(&["plugin", "list"])
    }

    /// Install-or-upgrade
    pub fn upgrade(&self, chart: &ChartConfig, payload: Payload<'_>) -> Vec<String> {
        let mut out = args(&["upgrade", &chart.release, &chart.chart_reference(), "--install"]);
        push_namespace(&mut out, chart);
        push_payload(&mut out, chart, payload);
        out
    }

    pub fn uninstall(&self, chart: &ChartConfig) -> Vec<String> {
        match self {
            Generation::V2 => args(&["delete", "--purge", &chart.release]),
            Generation::V3 => {
                let mut out = args(&["uninstall", &chart.release]);
                push_namespace(&mut out, chart);
                out
            }
        }
    }

    pub fn status(&self, chart: &ChartConfig) -> Vec<String> {
        let mut out = args(&["status", &chart.release]);
        if *self == Generation::V3 {
            push_namespace(&mut out, chart);
        }
        out
    }

    /// Download and unpack a chart into `destination`
    pub fn fetch(&self, chart: &ChartConfig, destination: &Path) -> Vec<String> {
        let verb = match self {
            Generation::V2 => "fetch",
            Generation::V3 => "pull",
        };
        let mut out = args(&[verb, &chart.chart_reference(), "--untar", "--destination"]);
        out.push(destination.display().to_string());
        if let Some(version) = &chart.version {
            out.extend(args(&["--version", version]));
        }
        out
    }

    /// Render a release locally
    ///
    /// `local_chart` is the unpacked chart directory, required by Helm 2.
    pub fn template(
        &self,
        chart: &ChartConfig,
        payload: Payload<'_>,
        local_chart: Option<&Path>,
    ) -> Vec<String> {
        match (self, local_chart) {
            (Generation::V2, Some(dir)) => {
                let mut out = vec!["template".to_string(), dir.display().to_string()];
                push_namespace(&mut out, chart);
                out.extend(args(&["--name", &chart.release, "--values"]));
                out.push(payload.values_file.display().to_string());
                out
            }
            _ => {
                let mut out = args(&["template", &chart.release, &chart.chart_reference()]);
                push_namespace(&mut out, chart);
                push_payload(&mut out, chart, payload);
                out
            }
        }
    }

    /// Preview an upgrade through the `diff` plugin
    pub fn diff(&self, chart: &ChartConfig, payload: Payload<'_>) -> Vec<String> {
        let mut out = args(&["diff", "upgrade", &chart.release, &chart.chart_reference()]);
        push_namespace(&mut out, chart);
        push_payload(&mut out, chart, payload);
        out
    }

    /// Whether a failed status query means the release does not exist
    ///
    /// Helm 3 reports `Error: release: not found`, Helm 2 reports
    /// `Error: release: "web" not found`.
    pub fn is_release_not_found(&self, output: &Invocation) -> bool {
        let stderr = output.stderr.as_str();
        match self {
            Generation::V2 => stderr.contains("release:") && stderr.contains("not found"),
            Generation::V3 => stderr.contains("release: not found"),
        }
    }

    /// Whether a failed `repo list` only means nothing is configured
    pub fn is_empty_repo_list(&self, output: &Invocation) -> bool {
        output.stderr.contains("no repositories to show")
    }
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn push_namespace(out: &mut Vec<String>, chart: &ChartConfig) {
    if let Some(namespace) = &chart.namespace {
        out.extend(args(&["--namespace", namespace]));
    }
}

fn push_payload(out: &mut Vec<String>, chart: &ChartConfig, payload: Payload<'_>) {
    out.push("--values".to_string());
    out.push(payload.values_file.display().to_string());
    if let Some(version) = &chart.version {
        out.extend(args(&["--version", version]));
    }
    if let Some(script) = payload.post_renderer {
        out.push("--post-renderer".to_string());
        out.push(script.display().to_string());
    }
}
