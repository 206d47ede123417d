//! Bosun Core - configuration model for the declarative Helm orchestrator
//!
//! This crate provides the typed, defaulted and validated view of a bosun
//! configuration document:
//! - `BosunConfig`: the document, loaded from YAML
//! - `RepositoryConfig`: a chart repository and its desired state
//! - `ChartConfig`: a release, its values and an optional post-render overlay
//! - `Values`: release values, normalized to text keys

pub mod chart;
pub mod config;
pub mod error;
pub mod repository;
pub mod values;

pub use chart::{ChartConfig, Overlay, Patch, Selector};
pub use config::BosunConfig;
pub use error::{CoreError, Result};
pub use repository::{RepositoryConfig, State};
pub use values::{VALUES_FILE_NAME, Values};
