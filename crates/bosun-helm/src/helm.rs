//! Typed facade over the Helm executable
//!
//! [`Helm`] pairs a [`CommandRunner`] with the detected [`Capabilities`] and
//! exposes one method per driver verb. Release-level verbs receive the
//! configured kube context and any pass-through arguments.

use bosun_core::ChartConfig;
use std::path::Path;

use crate::capability::{Capabilities, Generation, Payload};
use crate::error::{HelmError, Result};
use crate::exec::{CommandRunner, Invocation, ProcessRunner};
use crate::repos::{ObservedRepository, parse_repo_list};

/// Explicit runtime settings for the driver and its post-render tool
#[derive(Debug, Clone)]
pub struct HelmSettings {
    /// Helm executable name or path
    pub helm: String,
    /// Kustomize executable name or path
    pub kustomize: String,
    pub kube_context: Option<String>,
    /// Appended verbatim to release-level verbs
    pub extra_args: Vec<String>,
}

impl Default for HelmSettings {
    fn default() -> Self {
        Self {
            helm: "helm".to_string(),
            kustomize: "kustomize".to_string(),
            kube_context: None,
            extra_args: Vec::new(),
        }
    }
}

/// Handle to a Helm driver
#[derive(Debug)]
pub struct Helm<R = ProcessRunner> {
    runner: R,
    capabilities: Capabilities,
    kube_context: Option<String>,
    extra_args: Vec<String>,
}

impl Helm<ProcessRunner> {
    /// Resolve the executable named in `settings` and detect its generation
    pub fn connect(settings: &HelmSettings) -> Result<Self> {
        let runner = ProcessRunner::locate(&settings.helm)?;
        Self::with_runner(runner, settings)
    }
}

impl<R: CommandRunner> Helm<R> {
    /// Wrap an existing runner, detecting capabilities through it
    pub fn with_runner(runner: R, settings: &HelmSettings) -> Result<Self> {
        let capabilities = Capabilities::detect(&runner)?;
        Ok(Self::with_capabilities(runner, capabilities, settings))
    }

    /// Wrap an existing runner with known capabilities
    pub fn with_capabilities(
        runner: R,
        capabilities: Capabilities,
        settings: &HelmSettings,
    ) -> Self {
        Self {
            runner,
            capabilities,
            kube_context: settings.kube_context.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn generation(&self) -> Generation {
        self.capabilities.generation
    }

    fn run(&self, args: Vec<String>) -> Result<Invocation> {
        self.runner.run(&args)
    }

    /// Run a verb that targets a cluster
    fn run_release_verb(&self, mut args: Vec<String>) -> Result<Invocation> {
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        args.extend(self.extra_args.iter().cloned());
        self.runner.run(&args)
    }

    /// Currently configured repositories, read fresh
    pub fn repo_list(&self) -> Result<Vec<ObservedRepository>> {
        match self.run(self.generation().repo_list()) {
            Ok(output) => Ok(parse_repo_list(&output.stdout)),
            Err(HelmError::ExecutionFailure { output, .. })
                if self.generation().is_empty_repo_list(&output) =>
            {
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub fn repo_add(&self, name: &str, url: &str) -> Result<Invocation> {
        self.run(self.generation().repo_add(name, url))
    }

    pub fn repo_remove(&self, name: &str) -> Result<Invocation> {
        self.run(self.generation().repo_remove(name))
    }

    pub fn repo_update(&self) -> Result<Invocation> {
        self.run(self.generation().repo_update())
    }

    /// Probe a release with a status query
    ///
    /// The driver's "release not found" failure means `false`; any other
    /// failure is returned.
    pub fn release_exists(&self, chart: &ChartConfig) -> Result<bool> {
        match self.status(chart) {
            Ok(_) => Ok(true),
            Err(HelmError::ExecutionFailure { output, .. })
                if self.generation().is_release_not_found(&output) =>
            {
                tracing::debug!(release = %chart.long_name(), "release not found");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn status(&self, chart: &ChartConfig) -> Result<Invocation> {
        self.run_release_verb(self.generation().status(chart))
    }

    pub fn upgrade(&self, chart: &ChartConfig, payload: Payload<'_>) -> Result<Invocation> {
        self.run_release_verb(self.generation().upgrade(chart, payload))
    }

    pub fn uninstall(&self, chart: &ChartConfig) -> Result<Invocation> {
        self.run_release_verb(self.generation().uninstall(chart))
    }

    pub fn fetch(&self, chart: &ChartConfig, destination: &Path) -> Result<Invocation> {
        self.run(self.generation().fetch(chart, destination))
    }

    pub fn template(
        &self,
        chart: &ChartConfig,
        payload: Payload<'_>,
        local_chart: Option<&Path>,
    ) -> Result<Invocation> {
        self.run_release_verb(self.generation().template(chart, payload, local_chart))
    }

    pub fn diff(&self, chart: &ChartConfig, payload: Payload<'_>) -> Result<Invocation> {
        self.run_release_verb(self.generation().diff(chart, payload))
    }

    /// Whether a plugin with this name appears in `plugin list`
    pub fn plugin_installed(&self, plugin: &str) -> Result<bool> {
        let output = self.run(self.generation().plugin_list())?;
        Ok(output
            .stdout
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .any(|name| name == plugin))
    }
}
