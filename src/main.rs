//! Modforge bootstrap binary
//!
//! Parses the launch arguments, publishes them on the blackboard, and hands
//! off to the engine. Fatal engine errors terminate the process with a
//! non-zero status; per-module failures are warnings in the log stream.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use modforge::blackboard::Blackboard;
use modforge::config::EngineConfig;
use modforge::engine::Engine;
use modforge::module::locator::EnumerationOrder;
use modforge::module::traits::{LoggingLifecycleSink, LoggingModuleFactory};
use modforge::utils::init_logging;

#[derive(Parser, Debug)]
#[command(name = "modforge", version, about = "Module loading and code instrumentation engine")]
struct Cli {
    /// Host archive to launch
    #[arg(long)]
    host_archive: PathBuf,

    /// Canonical name of the host entry point artifact
    #[arg(long)]
    host_entry_point: String,

    /// Host version advertised to modules
    #[arg(long, default_value = "0")]
    host_version: String,

    /// Directory scanned for module packages
    #[arg(long, default_value = "modules")]
    module_dir: PathBuf,

    /// Directory holding the engine's support libraries
    #[arg(long, default_value = "libraries")]
    library_dir: PathBuf,

    /// Extra excluded namespace prefixes
    #[arg(long = "exclude")]
    excluded_prefixes: Vec<String>,

    /// Sort the module directory lexicographically instead of using
    /// filesystem order
    #[arg(long)]
    sorted_modules: bool,

    /// Verbose diagnostics
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.debug { Some("debug") } else { None });

    let config = EngineConfig {
        debug: cli.debug,
        host_archive: cli.host_archive,
        host_entry_point: cli.host_entry_point,
        host_version: cli.host_version,
        module_dir: cli.module_dir,
        library_dir: cli.library_dir,
        excluded_prefixes: cli.excluded_prefixes,
        enumeration_order: if cli.sorted_modules {
            EnumerationOrder::Lexicographic
        } else {
            EnumerationOrder::Filesystem
        },
    };

    let blackboard = Arc::new(Blackboard::new());
    config.install(&blackboard)?;

    let mut engine = Engine::from_blackboard(
        blackboard,
        Arc::new(LoggingModuleFactory),
        Arc::new(LoggingLifecycleSink),
    )?;

    match engine.run().await {
        Ok(report) => {
            for error in &report.errors {
                tracing::warn!("{}", error);
            }
            tracing::info!("Loaded modules: {}", report.loaded.join(", "));
            if report.entry_artifact.is_none() {
                tracing::warn!("No host entry point artifact was resolved");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    }
}
