//! In-memory Helm double for reconciler tests
//!
//! [`ScriptedHelm`] answers the subset of verbs bosun issues, keeps a model
//! of repositories and releases, and records every argument vector it sees.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::exec::{CommandRunner, Invocation};

#[derive(Debug, Default)]
struct Model {
    version: String,
    repositories: Vec<(String, String)>,
    releases: Vec<(Option<String>, String)>,
    plugins: Vec<String>,
    failures: Vec<(String, String)>,
    calls: Vec<Vec<String>>,
    values: Vec<(PathBuf, String)>,
}

/// Scripted stand-in for the Helm executable
#[derive(Debug)]
pub struct ScriptedHelm {
    model: Mutex<Model>,
}

impl Default for ScriptedHelm {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedHelm {
    /// A Helm 3 driver with no repositories, releases or plugins
    pub fn new() -> Self {
        Self {
            model: Mutex::new(Model {
                version: "v3.14.2+gc309b6f".to_string(),
                ..Default::default()
            }),
        }
    }

    /// Output of `version --short --client`
    pub fn with_version(self, version: &str) -> Self {
        self.model().version = version.to_string();
        self
    }

    pub fn with_repository(self, name: &str, url: &str) -> Self {
        self.model()
            .repositories
            .push((name.to_string(), url.to_string()));
        self
    }

    pub fn with_release(self, namespace: Option<&str>, name: &str) -> Self {
        self.model()
            .releases
            .push((namespace.map(str::to_string), name.to_string()));
        self
    }

    pub fn with_plugin(self, name: &str) -> Self {
        self.model().plugins.push(name.to_string());
        self
    }

    /// Fail any invocation whose joined arguments start with `prefix`
    pub fn fail_on(self, prefix: &str, stderr: &str) -> Self {
        self.model()
            .failures
            .push((prefix.to_string(), stderr.to_string()));
        self
    }

    /// Every argument vector received, in order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.model().calls.clone()
    }

    /// Joined invocations starting with `prefix`
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.model()
            .calls
            .iter()
            .map(|args| args.join(" "))
            .filter(|line| line.starts_with(prefix))
            .collect()
    }

    pub fn repositories(&self) -> Vec<(String, String)> {
        self.model().repositories.clone()
    }

    pub fn has_release(&self, namespace: Option<&str>, name: &str) -> bool {
        let model = self.model();
        find_release(&model, namespace, name).is_some()
    }

    /// `--values` files seen, with their content at call time
    pub fn values_files(&self) -> Vec<(PathBuf, String)> {
        self.model().values.clone()
    }

    fn model(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CommandRunner for ScriptedHelm {
    fn run(&self, args: &[String]) -> Result<Invocation> {
        let mut model = self.model();
        model.calls.push(args.to_vec());

        if let Some(path) = flag(args, "--values") {
            let path = PathBuf::from(path);
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            model.values.push((path, content));
        }

        let line = args.join(" ");
        let command = format!("helm {}", line);

        let failure = model
            .failures
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()));
        if let Some((_, stderr)) = failure {
            return Invocation::failed(stderr.clone(), Some(1)).into_result(command);
        }

        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        let namespace = flag(args, "--namespace");

        let output = match words.as_slice() {
            ["version", ..] => Invocation::succeeded(model.version.clone()),
            ["repo", "list", ..] if model.repositories.is_empty() => {
                Invocation::failed("Error: no repositories to show", Some(1))
            }
            ["repo", "list", ..] => {
                let mut out = "NAME\tURL".to_string();
                for (name, url) in &model.repositories {
                    out.push_str(&format!("\n{}\t{}", name, url));
                }
                Invocation::succeeded(out)
            }
            ["repo", "add", name, url, ..] => {
                model.repositories.retain(|(n, _)| n.as_str() != *name);
                model.repositories.push((name.to_string(), url.to_string()));
                Invocation::succeeded(format!("\"{}\" has been added to your repositories", name))
            }
            ["repo", "remove", name, ..] => {
                if model.repositories.iter().any(|(n, _)| n.as_str() == *name) {
                    model.repositories.retain(|(n, _)| n.as_str() != *name);
                    Invocation::succeeded(format!(
                        "\"{}\" has been removed from your repositories",
                        name
                    ))
                } else {
                    Invocation::failed(format!("Error: no repo named \"{}\" found", name), Some(1))
                }
            }
            ["repo", "update", ..] => {
                Invocation::succeeded("Update Complete. \u{2388}Happy Helming!\u{2388}")
            }
            ["plugin", "list", ..] => {
                let mut out = "NAME\tVERSION\tDESCRIPTION".to_string();
                for plugin in &model.plugins {
                    out.push_str(&format!("\n{}\t1.0.0\t{} plugin", plugin, plugin));
                }
                Invocation::succeeded(out)
            }
            ["status", release, ..] => {
                if find_release(&model, namespace, release).is_some() {
                    Invocation::succeeded(format!("NAME: {}\nSTATUS: deployed", release))
                } else {
                    Invocation::failed("Error: release: not found", Some(1))
                }
            }
            ["upgrade", release, ..] => {
                if find_release(&model, namespace, release).is_none() {
                    model
                        .releases
                        .push((namespace.map(str::to_string), release.to_string()));
                }
                Invocation::succeeded(format!(
                    "Release \"{}\" has been upgraded. Happy Helming!",
                    release
                ))
            }
            ["uninstall", release, ..] => match find_release(&model, namespace, release) {
                Some(index) => {
                    model.releases.remove(index);
                    Invocation::succeeded(format!("release \"{}\" uninstalled", release))
                }
                None => Invocation::failed(
                    format!(
                        "Error: uninstall: Release not loaded: {}: release: not found",
                        release
                    ),
                    Some(1),
                ),
            },
            ["delete", "--purge", release, ..] => {
                match model.releases.iter().position(|(_, n)| n.as_str() == *release) {
                    Some(index) => {
                        model.releases.remove(index);
                        Invocation::succeeded(format!("release \"{}\" deleted", release))
                    }
                    None => Invocation::failed(
                        format!("Error: release: \"{}\" not found", release),
                        Some(1),
                    ),
                }
            }
            ["fetch" | "pull", chart, ..] => {
                if let Some(destination) = flag(args, "--destination") {
                    let name = chart.rsplit('/').next().unwrap_or(*chart);
                    let _ = std::fs::create_dir_all(PathBuf::from(destination).join(name));
                }
                Invocation::succeeded("")
            }
            ["template", target, ..] => {
                let release = flag(args, "--name").unwrap_or(*target);
                Invocation::succeeded(format!(
                    "---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}",
                    release
                ))
            }
            ["diff", "upgrade", release, ..] => {
                Invocation::succeeded(format!("default, {}, ConfigMap (v1) has changed:", release))
            }
            _ => Invocation::failed(format!("Error: unknown command \"{}\"", line), Some(1)),
        };

        output.into_result(command)
    }
}

fn find_release(model: &Model, namespace: Option<&str>, name: &str) -> Option<usize> {
    model
        .releases
        .iter()
        .position(|(ns, n)| n == name && ns.as_deref() == namespace)
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
