//! Terminal output for reconciliation progress
//!
//! Progress lines go to stderr. Driver output (release notes, manifests,
//! status, diffs) goes to stdout so it can be piped.

use bosun_helm::{Observer, ReleaseOutcome, RepoAction};
use console::style;

/// Prints outcomes as the reconcilers report them
#[derive(Debug, Default)]
pub struct Progress {
    /// Releases left out of a template run
    pub not_rendered: Vec<String>,
}

impl Observer for Progress {
    fn on_repository(&mut self, action: &RepoAction) {
        match action {
            RepoAction::Removed { name } => {
                eprintln!("{} removed repository {}", style("-").red(), style(name).cyan());
            }
            RepoAction::Added { name, url } => {
                eprintln!(
                    "{} added repository {} {}",
                    style("+").green(),
                    style(name).cyan(),
                    style(url).dim()
                );
            }
            RepoAction::Refreshed => {
                eprintln!("{} repository cache refreshed", style("✓").green());
            }
        }
    }

    fn on_release(&mut self, outcome: &ReleaseOutcome) {
        match outcome {
            ReleaseOutcome::Upgraded { release, output } => {
                eprintln!("{} {} upgraded", style("✓").green(), style(release).cyan());
                print_output(output);
            }
            ReleaseOutcome::Uninstalled { release, output } => {
                eprintln!("{} {} uninstalled", style("✓").green(), style(release).cyan());
                print_output(output);
            }
            ReleaseOutcome::Skipped { release, reason } => {
                eprintln!(
                    "{} {} skipped ({})",
                    style("→").blue(),
                    style(release).cyan(),
                    style(reason).dim()
                );
            }
            ReleaseOutcome::NotRendered { release } => {
                self.not_rendered.push(release.clone());
            }
            ReleaseOutcome::Rendered { manifests: output, .. }
            | ReleaseOutcome::Status { output, .. }
            | ReleaseOutcome::Diffed { output, .. } => print_output(output),
        }
    }
}

impl Progress {
    /// Closing note for a template run
    pub fn finish_template(&self) {
        if self.not_rendered.is_empty() {
            return;
        }
        eprintln!(
            "\n{} not rendered (state: absent):",
            style("⚠").yellow().bold()
        );
        for release in &self.not_rendered {
            eprintln!("  {} {}", style("→").blue(), release);
        }
    }
}

fn print_output(output: &str) {
    if !output.is_empty() {
        println!("{}", output);
    }
}
