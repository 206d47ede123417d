//! Outcomes reported by the reconcilers

/// A mutating repository operation that completed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoAction {
    Removed { name: String },
    Added { name: String, url: String },
    Refreshed,
}

impl std::fmt::Display for RepoAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoAction::Removed { name } => write!(f, "removed repository {}", name),
            RepoAction::Added { name, url } => write!(f, "added repository {} ({})", name, url),
            RepoAction::Refreshed => write!(f, "refreshed repository cache"),
        }
    }
}

/// What happened to one release
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Installed or upgraded; carries the driver output
    Upgraded { release: String, output: String },
    Uninstalled { release: String, output: String },
    /// Nothing to do
    Skipped { release: String, reason: String },
    /// Rendered manifests
    Rendered { release: String, manifests: String },
    /// Absent release, excluded from rendering
    NotRendered { release: String },
    Status { release: String, output: String },
    Diffed { release: String, output: String },
}

impl ReleaseOutcome {
    pub fn release(&self) -> &str {
        match self {
            ReleaseOutcome::Upgraded { release, .. }
            | ReleaseOutcome::Uninstalled { release, .. }
            | ReleaseOutcome::Skipped { release, .. }
            | ReleaseOutcome::Rendered { release, .. }
            | ReleaseOutcome::NotRendered { release }
            | ReleaseOutcome::Status { release, .. }
            | ReleaseOutcome::Diffed { release, .. } => release,
        }
    }

    /// Whether the outcome changed cluster state
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ReleaseOutcome::Upgraded { .. } | ReleaseOutcome::Uninstalled { .. }
        )
    }
}

/// Receives outcomes as they happen
///
/// Reconcilers stop at the first failure, so an observer sees everything that
/// completed before it.
pub trait Observer {
    fn on_repository(&mut self, _action: &RepoAction) {}
    fn on_release(&mut self, _outcome: &ReleaseOutcome) {}
}

impl Observer for () {}

/// Collects every outcome in order
#[derive(Debug, Default)]
pub struct Recorder {
    pub repositories: Vec<RepoAction>,
    pub releases: Vec<ReleaseOutcome>,
}

impl Observer for Recorder {
    fn on_repository(&mut self, action: &RepoAction) {
        self.repositories.push(action.clone());
    }

    fn on_release(&mut self, outcome: &ReleaseOutcome) {
        self.releases.push(outcome.clone());
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn on_repository(&mut self, action: &RepoAction) {
        (**self).on_repository(action)
    }

    fn on_release(&mut self, outcome: &ReleaseOutcome) {
        (**self).on_release(outcome)
    }
}
