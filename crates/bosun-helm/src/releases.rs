//! Release reconciliation
//!
//! Releases are handled one at a time, in configuration order. Each present
//! release gets its own [`WorkDir`] holding the values payload and, when an
//! overlay is declared, the post-render pipeline. The directory is released
//! before the next release starts, whatever the outcome.

use std::path::{Path, PathBuf};

use bosun_core::ChartConfig;

use crate::capability::Payload;
use crate::error::{HelmError, Result};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::helm::Helm;
use crate::overlay::OverlayBuilder;
use crate::report::{Observer, ReleaseOutcome};
use crate::workdir::WorkDir;

pub const DIFF_PLUGIN: &str = "diff";
pub const DIFF_PLUGIN_URL: &str = "https://github.com/databus23/helm-diff";

/// Artifacts staged for one release invocation
#[derive(Debug)]
pub struct StagedRelease {
    workdir: WorkDir,
    pub values_file: PathBuf,
    pub post_renderer: Option<PathBuf>,
}

impl StagedRelease {
    pub fn payload(&self) -> Payload<'_> {
        Payload {
            values_file: &self.values_file,
            post_renderer: self.post_renderer.as_deref(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.workdir.path()
    }

    pub fn release(self) -> Result<()> {
        self.workdir.release()
    }
}

/// Drives releases towards their declared state
pub struct ReleaseReconciler<'h, R = ProcessRunner> {
    helm: &'h Helm<R>,
    config_root: PathBuf,
    overlays: OverlayBuilder,
}

impl<'h, R: CommandRunner> ReleaseReconciler<'h, R> {
    /// Overlay paths are resolved against `config_root`
    pub fn new(
        helm: &'h Helm<R>,
        config_root: impl Into<PathBuf>,
        overlays: OverlayBuilder,
    ) -> Self {
        Self {
            helm,
            config_root: config_root.into(),
            overlays,
        }
    }

    /// Install, upgrade or uninstall every release
    pub fn sync(
        &self,
        charts: &[ChartConfig],
        observer: impl Observer,
    ) -> Result<Vec<ReleaseOutcome>> {
        self.each(charts, observer, |chart| self.sync_one(chart))
    }

    /// Render every present release locally
    ///
    /// Absent releases are reported as [`ReleaseOutcome::NotRendered`].
    pub fn template(
        &self,
        charts: &[ChartConfig],
        observer: impl Observer,
    ) -> Result<Vec<ReleaseOutcome>> {
        self.each(charts, observer, |chart| self.template_one(chart))
    }

    /// Query the driver status of every release
    pub fn status(
        &self,
        charts: &[ChartConfig],
        observer: impl Observer,
    ) -> Result<Vec<ReleaseOutcome>> {
        self.each(charts, observer, |chart| {
            let output = self.helm.status(chart)?;
            Ok(ReleaseOutcome::Status {
                release: chart.long_name(),
                output: output.stdout,
            })
        })
    }

    /// Preview upgrades of every present release with the diff plugin
    pub fn diff(
        &self,
        charts: &[ChartConfig],
        observer: impl Observer,
    ) -> Result<Vec<ReleaseOutcome>> {
        if !self.helm.plugin_installed(DIFF_PLUGIN)? {
            return Err(HelmError::PluginMissing {
                plugin: DIFF_PLUGIN.to_string(),
                url: DIFF_PLUGIN_URL.to_string(),
            });
        }
        self.each(charts, observer, |chart| self.diff_one(chart))
    }

    fn each<F>(
        &self,
        charts: &[ChartConfig],
        mut observer: impl Observer,
        mut handle: F,
    ) -> Result<Vec<ReleaseOutcome>>
    where
        F: FnMut(&ChartConfig) -> Result<ReleaseOutcome>,
    {
        let mut outcomes = Vec::with_capacity(charts.len());
        for chart in charts {
            let outcome = handle(chart).map_err(|e| HelmError::release(chart.long_name(), e))?;
            observer.on_release(&outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    fn sync_one(&self, chart: &ChartConfig) -> Result<ReleaseOutcome> {
        let release = chart.long_name();

        if !chart.is_present() {
            if !self.helm.release_exists(chart)? {
                tracing::info!(release = %release, "release absent and not installed; skipping");
                return Ok(ReleaseOutcome::Skipped {
                    release,
                    reason: "not installed".to_string(),
                });
            }
            tracing::info!(release = %release, "uninstalling release");
            let output = self.helm.uninstall(chart)?;
            return Ok(ReleaseOutcome::Uninstalled {
                release,
                output: output.stdout,
            });
        }

        tracing::info!(release = %release, chart = %chart.chart_reference(), "upgrading release");
        let staged = self.stage(chart)?;
        let result = self.helm.upgrade(chart, staged.payload());
        let output = settle(&release, result, staged.release())?;

        Ok(ReleaseOutcome::Upgraded {
            release,
            output: output.stdout,
        })
    }

    fn template_one(&self, chart: &ChartConfig) -> Result<ReleaseOutcome> {
        let release = chart.long_name();
        if !chart.is_present() {
            tracing::debug!(release = %release, "release absent; not rendering");
            return Ok(ReleaseOutcome::NotRendered { release });
        }

        let staged = self.stage(chart)?;
        let result = self.render(chart, &staged);
        let output = settle(&release, result, staged.release())?;

        Ok(ReleaseOutcome::Rendered {
            release,
            manifests: output,
        })
    }

    fn render(&self, chart: &ChartConfig, staged: &StagedRelease) -> Result<String> {
        let output = if self.helm.capabilities().templates_from_local_chart() {
            self.helm.fetch(chart, staged.dir())?;
            let local = staged.dir().join(chart_dir_name(chart));
            self.helm.template(chart, staged.payload(), Some(&local))?
        } else {
            self.helm.template(chart, staged.payload(), None)?
        };
        Ok(output.stdout)
    }

    fn diff_one(&self, chart: &ChartConfig) -> Result<ReleaseOutcome> {
        let release = chart.long_name();
        if !chart.is_present() {
            return Ok(ReleaseOutcome::Skipped {
                release,
                reason: "absent".to_string(),
            });
        }

        let staged = self.stage(chart)?;
        let result = self.helm.diff(chart, staged.payload());
        let output = settle(&release, result, staged.release())?;

        Ok(ReleaseOutcome::Diffed {
            release,
            output: output.stdout,
        })
    }

    /// Acquire a working directory and write the release's inputs into it
    pub fn stage(&self, chart: &ChartConfig) -> Result<StagedRelease> {
        let workdir = WorkDir::acquire()?;
        let values_file = chart.values.write_file(workdir.path())?;

        let post_renderer = match chart.active_overlay() {
            Some(overlay) => {
                let capabilities = self.helm.capabilities();
                if !capabilities.supports_post_render() {
                    return Err(HelmError::Unsupported {
                        driver: match &capabilities.version {
                            Some(version) => format!("helm {}", version),
                            None => capabilities.generation.to_string(),
                        },
                        feature: "post-render overlays need helm 3.1.0 or later".to_string(),
                    });
                }
                let renderer = self.overlays.build(workdir.path(), &self.config_root, overlay)?;
                Some(renderer.script)
            }
            None => None,
        };

        Ok(StagedRelease {
            workdir,
            values_file,
            post_renderer,
        })
    }
}

/// Combine an operation's result with its working-directory cleanup
///
/// Cleanup is best effort: a failure to remove the directory is logged and
/// never overrides the operation's own result.
fn settle<T>(release: &str, result: Result<T>, cleanup: Result<()>) -> Result<T> {
    if let Err(e) = cleanup {
        tracing::warn!(release = %release, error = %e, "could not remove working directory");
    }
    result
}

/// Directory a fetched chart unpacks into
fn chart_dir_name(chart: &ChartConfig) -> &str {
    chart.name.rsplit('/').next().unwrap_or(&chart.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capabilities, Generation};
    use crate::error::ErrorKind;
    use crate::helm::HelmSettings;
    use crate::report::Recorder;
    use crate::testing::ScriptedHelm;
    use bosun_core::{Overlay, State, Values};

    fn chart(release: &str, state: State) -> ChartConfig {
        ChartConfig {
            name: "nginx".to_string(),
            repo: Some("stable".to_string()),
            release: release.to_string(),
            namespace: Some("edge".to_string()),
            state,
            ..Default::default()
        }
    }

    fn helm(driver: &ScriptedHelm) -> Helm<&ScriptedHelm> {
        Helm::with_runner(driver, &HelmSettings::default()).unwrap()
    }

    fn reconciler<'h, 'd>(
        helm: &'h Helm<&'d ScriptedHelm>,
    ) -> ReleaseReconciler<'h, &'d ScriptedHelm> {
        ReleaseReconciler::new(helm, ".", OverlayBuilder::new("kustomize"))
    }

    #[test]
    fn test_absent_and_not_installed_is_skipped() {
        let driver = ScriptedHelm::new();
        let helm = helm(&driver);
        let outcomes = reconciler(&helm)
            .sync(&[chart("web", State::Absent)], ())
            .unwrap();

        assert!(matches!(
            &outcomes[0],
            ReleaseOutcome::Skipped { release, .. } if release == "edge/web"
        ));
        assert!(driver.calls_matching("uninstall").is_empty());
    }

    #[test]
    fn test_absent_and_installed_is_uninstalled() {
        let driver = ScriptedHelm::new().with_release(Some("edge"), "web");
        let helm = helm(&driver);
        let outcomes = reconciler(&helm)
            .sync(&[chart("web", State::Absent)], ())
            .unwrap();

        assert!(matches!(outcomes[0], ReleaseOutcome::Uninstalled { .. }));
        assert_eq!(
            driver.calls_matching("uninstall"),
            vec!["uninstall web --namespace edge"]
        );
        assert!(!driver.has_release(Some("edge"), "web"));
    }

    #[test]
    fn test_helm2_uninstall_purges() {
        let driver = ScriptedHelm::new()
            .with_version("Client: v2.17.0+ga690bad")
            .with_release(None, "web");
        let helm = helm(&driver);
        let mut absent = chart("web", State::Absent);
        absent.namespace = None;

        reconciler(&helm).sync(&[absent], ()).unwrap();
        assert_eq!(driver.calls_matching("delete"), vec!["delete --purge web"]);
    }

    #[test]
    fn test_present_release_is_upgraded_with_values() {
        let driver = ScriptedHelm::new();
        let helm = helm(&driver);
        let mut web = chart("web", State::Present);
        web.values = Values::from_yaml("replicaCount: 2\ningress:\n  enabled: true\n").unwrap();

        let outcomes = reconciler(&helm).sync(&[web], ()).unwrap();
        assert!(outcomes[0].is_mutation());
        assert!(driver.has_release(Some("edge"), "web"));

        let (path, content) = driver.values_files().remove(0);
        assert_eq!(path.file_name().unwrap(), "values.yaml");
        let parsed: serde_yaml::Value = serde_yaml::from_str(&content).unwrap();
        assert_eq!(parsed["replicaCount"].as_u64(), Some(2));
        assert_eq!(parsed["ingress"]["enabled"].as_bool(), Some(true));
    }

    #[test]
    fn test_working_directory_is_released_after_each_release() {
        let driver =
            ScriptedHelm::new().fail_on("upgrade api", "Error: UPGRADE FAILED: timed out");
        let helm = helm(&driver);
        let charts = [chart("web", State::Present), chart("api", State::Present)];

        let err = reconciler(&helm).sync(&charts, ()).unwrap_err();
        assert!(matches!(&err, HelmError::Release { release, .. } if release == "edge/api"));

        let seen = driver.values_files();
        assert_eq!(seen.len(), 2);
        assert_ne!(seen[0].0.parent(), seen[1].0.parent());
        for (path, _) in seen {
            assert!(!path.parent().unwrap().exists());
        }
    }

    #[test]
    fn test_failure_halts_remaining_releases() {
        let driver =
            ScriptedHelm::new().fail_on("status api", "Error: Kubernetes cluster unreachable");
        let helm = helm(&driver);
        let charts = [
            chart("web", State::Present),
            chart("api", State::Absent),
            chart("worker", State::Present),
        ];

        let mut recorder = Recorder::default();
        let err = reconciler(&helm).sync(&charts, &mut recorder).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
        assert_eq!(recorder.releases.len(), 1);
        assert!(driver.calls_matching("upgrade worker").is_empty());
    }

    #[test]
    fn test_second_sync_issues_no_uninstall() {
        let driver = ScriptedHelm::new().with_release(Some("edge"), "old");
        let helm = helm(&driver);
        let charts = [chart("old", State::Absent)];

        reconciler(&helm).sync(&charts, ()).unwrap();
        reconciler(&helm).sync(&charts, ()).unwrap();
        assert_eq!(driver.calls_matching("uninstall").len(), 1);
    }

    #[test]
    fn test_template_renders_present_and_lists_absent() {
        let driver = ScriptedHelm::new();
        let helm = helm(&driver);
        let charts = [chart("web", State::Present), chart("old", State::Absent)];

        let outcomes = reconciler(&helm).template(&charts, ()).unwrap();
        assert!(matches!(
            &outcomes[0],
            ReleaseOutcome::Rendered { manifests, .. } if manifests.contains("name: web")
        ));
        assert_eq!(
            outcomes[1],
            ReleaseOutcome::NotRendered {
                release: "edge/old".to_string()
            }
        );
        assert!(driver.calls_matching("upgrade").is_empty());
    }

    #[test]
    fn test_helm2_template_fetches_chart_first() {
        let driver = ScriptedHelm::new().with_version("Client: v2.17.0+ga690bad");
        let helm = helm(&driver);

        reconciler(&helm).template(&[chart("web", State::Present)], ()).unwrap();

        let calls = driver.calls();
        assert_eq!(calls[1][0], "fetch");
        assert_eq!(calls[2][0], "template");
        assert!(calls[2][1].ends_with("/nginx"));
        assert!(calls[2].contains(&"--name".to_string()));
    }

    #[test]
    fn test_status_reports_every_release() {
        let driver = ScriptedHelm::new().with_release(Some("edge"), "web");
        let helm = helm(&driver);

        let outcomes = reconciler(&helm)
            .status(&[chart("web", State::Present)], ())
            .unwrap();
        assert!(matches!(
            &outcomes[0],
            ReleaseOutcome::Status { output, .. } if output.contains("deployed")
        ));
    }

    #[test]
    fn test_diff_requires_plugin() {
        let driver = ScriptedHelm::new();
        let helm = helm(&driver);
        let err = reconciler(&helm)
            .diff(&[chart("web", State::Present)], ())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PluginMissing);
        assert!(driver.calls_matching("diff").is_empty());
    }

    #[test]
    fn test_diff_with_plugin() {
        let driver = ScriptedHelm::new().with_plugin("diff");
        let helm = helm(&driver);
        let outcomes = reconciler(&helm)
            .diff(&[chart("web", State::Present), chart("old", State::Absent)], ())
            .unwrap();

        assert!(matches!(outcomes[0], ReleaseOutcome::Diffed { .. }));
        assert!(matches!(outcomes[1], ReleaseOutcome::Skipped { .. }));
        assert_eq!(driver.calls_matching("diff upgrade").len(), 1);
    }

    #[test]
    fn test_overlay_on_helm2_is_unsupported() {
        let driver = ScriptedHelm::new();
        let helm = Helm::with_capabilities(
            &driver,
            Capabilities::assume(Generation::V2),
            &HelmSettings::default(),
        );
        let mut web = chart("web", State::Present);
        web.overlay = Some(Overlay {
            resources: vec!["extra.yaml".to_string()],
            patches: vec![],
        });

        let err = reconciler(&helm).sync(&[web], ()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert!(driver.calls_matching("upgrade").is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_overlay_adds_post_renderer() {
        use std::os::unix::fs::PermissionsExt;

        let config = tempfile::TempDir::new().unwrap();
        let tool = config.path().join("kustomize");
        std::fs::write(&tool, "#!/bin/sh\ncat\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(config.path().join("extra.yaml"), "kind: ConfigMap\n").unwrap();

        let driver = ScriptedHelm::new();
        let helm = helm(&driver);
        let reconciler = ReleaseReconciler::new(
            &helm,
            config.path(),
            OverlayBuilder::new(tool.display().to_string()),
        );

        let mut web = chart("web", State::Present);
        web.overlay = Some(Overlay {
            resources: vec!["extra.yaml".to_string()],
            patches: vec![],
        });
        reconciler.sync(&[web], ()).unwrap();

        let upgrade = &driver.calls_matching("upgrade web")[0];
        assert!(upgrade.contains("--post-renderer "));
        assert!(upgrade.ends_with("/post-render.sh"));
    }

    #[test]
    fn test_cleanup_failure_does_not_fail_the_release() {
        let busy = || Err(HelmError::WorkDir(std::io::Error::other("directory busy")));

        let output = settle("edge/web", Ok("upgraded"), busy()).unwrap();
        assert_eq!(output, "upgraded");

        let failed: Result<&str> = Err(HelmError::overlay("bad patch"));
        let err = settle("edge/web", failed, busy()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OverlayBuildFailure);
    }
}
