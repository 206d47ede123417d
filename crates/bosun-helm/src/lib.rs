//! Bosun Helm - driving the Helm CLI towards a declared state
//!
//! This crate provides:
//! - **Process Execution**: Run the Helm executable and capture trimmed output
//! - **Working Directories**: Owner-only scratch space, removed on every exit path
//! - **Capabilities**: Helm 2 / Helm 3 detection and the per-generation verb table
//! - **Repository Reconciliation**: Remove/add repositories, then refresh once
//! - **Release Reconciliation**: Upgrade, uninstall, template, status and diff per release
//! - **Post-Render Overlays**: Kustomize pipelines wired through `--post-renderer`
//! - **Testing**: An in-memory driver double for reconciler tests

pub mod capability;
pub mod error;
pub mod exec;
pub mod helm;
pub mod overlay;
pub mod releases;
pub mod report;
pub mod repos;
pub mod testing;
pub mod workdir;

pub use capability::{Capabilities, Generation, Payload};
pub use error::{ErrorKind, HelmError, Result};
pub use exec::{CommandRunner, Invocation, ProcessRunner};
pub use helm::{Helm, HelmSettings};
pub use overlay::{OverlayBuilder, PostRenderer};
pub use releases::{ReleaseReconciler, StagedRelease};
pub use report::{Observer, Recorder, ReleaseOutcome, RepoAction};
pub use repos::{ObservedRepository, RepositoryReconciler};
pub use workdir::WorkDir;
