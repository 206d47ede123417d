//! CLI commands

use bosun_core::BosunConfig;
use bosun_helm::{Helm, HelmSettings, OverlayBuilder, ReleaseReconciler, RepositoryReconciler};

use crate::display::Progress;
use crate::error::Result;

pub mod diff;
pub mod status;
pub mod sync;
pub mod template;

/// A loaded configuration bound to a connected driver
pub struct Session {
    pub config: BosunConfig,
    pub helm: Helm,
    kustomize: String,
}

impl Session {
    pub fn open(config: BosunConfig, settings: &HelmSettings) -> Result<Self> {
        let helm = Helm::connect(settings)?;
        tracing::info!(
            generation = %helm.capabilities().generation,
            charts = config.charts.len(),
            repositories = config.repositories.len(),
            "session ready"
        );
        Ok(Self {
            config,
            helm,
            kustomize: settings.kustomize.clone(),
        })
    }

    pub fn sync_repositories(&self, progress: &mut Progress) -> Result<()> {
        RepositoryReconciler::new(&self.helm).reconcile(&self.config.repositories, progress)?;
        Ok(())
    }

    pub fn releases(&self) -> ReleaseReconciler<'_> {
        ReleaseReconciler::new(
            &self.helm,
            self.config.root(),
            OverlayBuilder::new(self.kustomize.clone()),
        )
    }
}
