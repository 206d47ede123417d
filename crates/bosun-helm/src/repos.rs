//! Repository reconciliation
//!
//! Each desired repository is compared against a fresh driver listing and
//! brought in line with remove and add operations. A single cache refresh
//! follows if anything was added.

use bosun_core::RepositoryConfig;

use crate::error::{HelmError, Result};
use crate::exec::{CommandRunner, ProcessRunner};
use crate::helm::Helm;
use crate::report::{Observer, RepoAction};

/// A repository as reported by `repo list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedRepository {
    pub name: String,
    pub url: String,
}

impl ObservedRepository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Parse the tabular `repo list` output
///
/// The `NAME URL` header and lines with fewer than two columns are skipped.
pub fn parse_repo_list(output: &str) -> Vec<ObservedRepository> {
    output
        .lines()
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let name = columns.next()?;
            let url = columns.next()?;
            if name == "NAME" && url == "URL" {
                return None;
            }
            Some(ObservedRepository::new(name, url))
        })
        .collect()
}

/// Brings the driver's repositories in line with the configuration
pub struct RepositoryReconciler<'h, R = ProcessRunner> {
    helm: &'h Helm<R>,
}

impl<'h, R: CommandRunner> RepositoryReconciler<'h, R> {
    pub fn new(helm: &'h Helm<R>) -> Self {
        Self { helm }
    }

    /// Reconcile every descriptor in order, stopping at the first failure
    pub fn reconcile(
        &self,
        desired: &[RepositoryConfig],
        mut observer: impl Observer,
    ) -> Result<Vec<RepoAction>> {
        let mut actions = Vec::new();
        let mut added = false;

        for repo in desired {
            for action in self.reconcile_one(repo)? {
                added |= matches!(action, RepoAction::Added { .. });
                observer.on_repository(&action);
                actions.push(action);
            }
        }

        if added {
            tracing::info!("refreshing repository cache");
            self.helm
                .repo_update()
                .map_err(|e| HelmError::Refresh { source: Box::new(e) })?;
            let action = RepoAction::Refreshed;
            observer.on_repository(&action);
            actions.push(action);
        }

        Ok(actions)
    }

    fn reconcile_one(&self, repo: &RepositoryConfig) -> Result<Vec<RepoAction>> {
        let wrap = |e| HelmError::repository(&repo.name, e);

        let observed = self.helm.repo_list().map_err(wrap)?;
        let current = observed.iter().find(|o| o.name == repo.name);
        let exists = current.is_some();
        let full_match = current.is_some_and(|o| o.url == repo.url);
        let present = repo.state.is_present();

        let mut actions = Vec::new();

        if exists && (!full_match || !present) {
            tracing::info!(repository = %repo.name, "removing repository");
            self.helm.repo_remove(&repo.name).map_err(wrap)?;
            actions.push(RepoAction::Removed {
                name: repo.name.clone(),
            });
        }

        if present && !full_match {
            tracing::info!(repository = %repo.name, url = %repo.url, "adding repository");
            self.helm.repo_add(&repo.name, &repo.url).map_err(wrap)?;
            actions.push(RepoAction::Added {
                name: repo.name.clone(),
                url: repo.url.clone(),
            });
        }

        if actions.is_empty() {
            tracing::debug!(repository = %repo.name, state = %repo.state, "repository up to date");
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::helm::HelmSettings;
    use crate::report::Recorder;
    use crate::testing::ScriptedHelm;

    fn reconcile(driver: &ScriptedHelm, desired: &[RepositoryConfig]) -> Result<Vec<RepoAction>> {
        let helm = Helm::with_runner(driver, &HelmSettings::default())?;
        RepositoryReconciler::new(&helm).reconcile(desired, ())
    }

    #[test]
    fn test_parse_repo_list() {
        let output = concat!(
            "NAME   \tURL\n",
            "stable \thttps://example/charts\n",
            "broken\n",
            "local  \thttp://127.0.0.1:8879/charts",
        );
        assert_eq!(
            parse_repo_list(output),
            vec![
                ObservedRepository::new("stable", "https://example/charts"),
                ObservedRepository::new("local", "http://127.0.0.1:8879/charts"),
            ]
        );
        assert!(parse_repo_list("").is_empty());
    }

    #[test]
    fn test_add_into_empty_driver() {
        let driver = ScriptedHelm::new();
        let actions = reconcile(
            &driver,
            &[RepositoryConfig::present("stable", "https://example/charts")],
        )
        .unwrap();

        assert_eq!(
            actions,
            vec![
                RepoAction::Added {
                    name: "stable".to_string(),
                    url: "https://example/charts".to_string(),
                },
                RepoAction::Refreshed,
            ]
        );
        assert_eq!(driver.calls_matching("repo add").len(), 1);
        assert_eq!(driver.calls_matching("repo remove").len(), 0);
        assert_eq!(driver.calls_matching("repo update").len(), 1);
    }

    #[test]
    fn test_changed_url_is_removed_then_added() {
        let driver = ScriptedHelm::new().with_repository("stable", "https://old");
        let actions =
            reconcile(&driver, &[RepositoryConfig::present("stable", "https://new")]).unwrap();

        assert_eq!(actions.len(), 3);
        assert!(matches!(actions[0], RepoAction::Removed { .. }));
        assert!(matches!(actions[1], RepoAction::Added { .. }));
        assert_eq!(actions[2], RepoAction::Refreshed);
        assert_eq!(driver.repositories(), vec![("stable".to_string(), "https://new".to_string())]);
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let driver = ScriptedHelm::new().with_repository("old", "https://old");
        let desired = vec![
            RepositoryConfig::present("stable", "https://example/charts"),
            RepositoryConfig::absent("old"),
        ];

        reconcile(&driver, &desired).unwrap();
        let before = driver.calls().len();

        let actions = reconcile(&driver, &desired).unwrap();
        assert!(actions.is_empty());

        let mutating = driver.calls()[before..]
            .iter()
            .filter(|args| args[0] == "repo" && args[1] != "list")
            .count();
        assert_eq!(mutating, 0);
    }

    #[test]
    fn test_absent_and_missing_does_nothing() {
        let driver = ScriptedHelm::new();
        let actions = reconcile(&driver, &[RepositoryConfig::absent("gone")]).unwrap();
        assert!(actions.is_empty());
        assert!(driver.calls_matching("repo update").is_empty());
    }

    #[test]
    fn test_remove_only_does_not_refresh() {
        let driver = ScriptedHelm::new().with_repository("gone", "https://gone");
        let actions = reconcile(&driver, &[RepositoryConfig::absent("gone")]).unwrap();
        assert_eq!(actions, vec![RepoAction::Removed { name: "gone".to_string() }]);
        assert!(driver.calls_matching("repo update").is_empty());
    }

    #[test]
    fn test_listing_is_read_per_entry() {
        let driver = ScriptedHelm::new();
        reconcile(
            &driver,
            &[
                RepositoryConfig::present("a", "https://a"),
                RepositoryConfig::present("b", "https://b"),
            ],
        )
        .unwrap();
        assert_eq!(driver.calls_matching("repo list").len(), 2);
    }

    #[test]
    fn test_failure_aborts_with_repository_context() {
        let driver = ScriptedHelm::new().fail_on(
            "repo add b",
            "Error: looks like \"https://b\" is not a valid chart repository",
        );
        let err = reconcile(
            &driver,
            &[
                RepositoryConfig::present("a", "https://a"),
                RepositoryConfig::present("b", "https://b"),
                RepositoryConfig::present("c", "https://c"),
            ],
        )
        .unwrap_err();

        assert!(matches!(&err, HelmError::Repository { name, .. } if name == "b"));
        assert_eq!(err.kind(), ErrorKind::ExecutionFailure);
        assert!(driver.calls_matching("repo add c").is_empty());
        assert!(driver.calls_matching("repo update").is_empty());
    }

    #[test]
    fn test_refresh_failure_is_reported() {
        let driver = ScriptedHelm::new().fail_on("repo update", "Error: timeout");
        let err = reconcile(&driver, &[RepositoryConfig::present("a", "https://a")]).unwrap_err();
        assert!(matches!(err, HelmError::Refresh { .. }));
    }

    #[test]
    fn test_observer_sees_actions_in_order() {
        let driver = ScriptedHelm::new();
        let helm = Helm::with_runner(&driver, &HelmSettings::default()).unwrap();
        let mut recorder = Recorder::default();
        RepositoryReconciler::new(&helm)
            .reconcile(&[RepositoryConfig::present("a", "https://a")], &mut recorder)
            .unwrap();
        assert_eq!(recorder.repositories.len(), 2);
        assert_eq!(recorder.repositories[1], RepoAction::Refreshed);
    }
}
