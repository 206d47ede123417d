//! Repository definitions

use serde::{Deserialize, Serialize};

/// Desired state of a repository or release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl State {
    pub fn is_present(self) -> bool {
        matches!(self, State::Present)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Present => write!(f, "present"),
            State::Absent => write!(f, "absent"),
        }
    }
}

/// A chart repository as declared in the configuration
///
/// Two repositories are equal when name and URL match; `state` is ignored.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Unique name for this repository
    pub name: String,

    /// Repository URL
    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub state: State,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>, state: State) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            state,
        }
    }

    /// Shorthand for a present repository
    pub fn present(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new(name, url, State::Present)
    }

    /// Shorthand for an absent repository
    pub fn absent(name: impl Into<String>) -> Self {
        Self::new(name, String::new(), State::Absent)
    }
}

impl PartialEq for RepositoryConfig {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.url == other.url
    }
}
