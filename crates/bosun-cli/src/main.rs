//! Bosun CLI - declarative orchestration of Helm repositories and releases

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, reload};

use bosun_core::BosunConfig;
use bosun_helm::HelmSettings;

mod commands;
mod display;
mod error;
mod exit_codes;

use commands::Session;
use error::{CliError, Result};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Parser)]
#[command(name = "bosun")]
#[command(author = "Bosun Contributors")]
#[command(version)]
#[command(about = "Declarative orchestration of Helm repositories and releases", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration document
    #[arg(short, long, global = true, env = "BOSUN_CONFIG")]
    config: Option<PathBuf>,

    /// Helm executable name or path
    #[arg(long, global = true, env = "BOSUN_HELM", default_value = "helm")]
    helm: String,

    /// Kustomize executable name or path, used for overlays
    #[arg(long, global = true, env = "BOSUN_KUSTOMIZE", default_value = "kustomize")]
    kustomize: String,

    /// Log level (trace, debug, info, warn, error); overrides the document
    #[arg(long, global = true, env = "BOSUN_LOGLEVEL")]
    loglevel: Option<String>,
}

/// Arguments after `--`, appended to release-level helm verbs
#[derive(Args)]
struct Passthrough {
    #[arg(last = true)]
    helm_args: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile repositories, then install, upgrade or uninstall releases
    Sync {
        #[command(flatten)]
        passthrough: Passthrough,
    },

    /// Synchronize repositories and render every present release locally
    Template {
        #[command(flatten)]
        passthrough: Passthrough,
    },

    /// Show the helm status of every release
    Status {
        #[command(flatten)]
        passthrough: Passthrough,
    },

    /// Preview upgrades with the helm-diff plugin
    Diff {
        #[command(flatten)]
        passthrough: Passthrough,
    },
}

impl Commands {
    fn passthrough(&self) -> &[String] {
        match self {
            Commands::Sync { passthrough }
            | Commands::Template { passthrough }
            | Commands::Status { passthrough }
            | Commands::Diff { passthrough } => &passthrough.helm_args,
        }
    }
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let path = cli.config.as_deref().ok_or_else(|| {
        CliError::usage_with_help(
            "no configuration document given",
            "pass --config <FILE> or set BOSUN_CONFIG",
        )
    })?;

    let logging = Logging::init(cli.loglevel.as_deref());
    let config = BosunConfig::load(path)?;
    logging.apply_document_level(config.loglevel.as_deref());

    let settings = HelmSettings {
        helm: cli.helm.clone(),
        kustomize: cli.kustomize.clone(),
        kube_context: config.kube_context.clone(),
        extra_args: cli.command.passthrough().to_vec(),
    };
    let session = Session::open(config, &settings)?;

    match cli.command {
        Commands::Sync { .. } => commands::sync::run(&session),
        Commands::Template { .. } => commands::template::run(&session),
        Commands::Status { .. } => commands::status::run(&session),
        Commands::Diff { .. } => commands::diff::run(&session),
    }
}

/// The installed stderr subscriber
///
/// Installed before the configuration is read so load-time warnings are
/// shown. The filter sits behind a reload layer so the document's `loglevel`
/// can apply once it is known.
struct Logging {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` or `--loglevel` chose the level
    pinned: bool,
}

impl Logging {
    fn init(flag: Option<&str>) -> Self {
        let (filter, from_env) = match EnvFilter::try_from_default_env() {
            Ok(filter) => (filter, true),
            Err(_) => (EnvFilter::new(effective_level(flag)), false),
        };
        let (filter, handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        warn_unknown(flag);
        Self {
            handle,
            pinned: from_env || flag.is_some(),
        }
    }

    /// Switch to the document's level unless one was already chosen
    fn apply_document_level(&self, level: Option<&str>) {
        let Some(requested) = level else { return };
        if self.pinned {
            tracing::debug!(level = %requested, "document log level overridden");
            return;
        }

        warn_unknown(level);
        if let Err(e) = self.handle.reload(EnvFilter::new(effective_level(level))) {
            tracing::warn!(error = %e, "could not apply document log level");
        }
    }
}

/// A known level, or `info`
fn effective_level(level: Option<&str>) -> String {
    match level.map(str::to_ascii_lowercase) {
        Some(level) if LOG_LEVELS.contains(&level.as_str()) => level,
        _ => "info".to_string(),
    }
}

fn warn_unknown(level: Option<&str>) {
    let Some(requested) = level else { return };
    if !LOG_LEVELS.contains(&requested.to_ascii_lowercase().as_str()) {
        tracing::warn!(requested = %requested, "unknown log level; using info");
    }
}
