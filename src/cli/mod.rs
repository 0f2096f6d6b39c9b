//! Command-line interface.
//!
//! `telemetry-repo import` loads exported documents or archives into a fresh
//! repository, prints what landed, and can write everything back out as a
//! single archive.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, RepositoryError, Result};
use crate::export::{export_archive, import_file};
use crate::repository::{AddContext, TelemetryRepository};
use crate::resource::ResourceKind;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// In-memory OTLP telemetry repository
#[derive(Parser, Debug)]
#[command(name = "telemetry-repo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/telemetry-repo/config.yaml)
    #[arg(short, long, env = "TELEMETRY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "TELEMETRY_DEBUG", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Import JSON documents or zip archives and print a summary
    Import {
        /// Files to import
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write the imported telemetry to this zip archive
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Validate configuration and exit
    CheckConfig,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("telemetry-repo").join("config.yaml"))
    }

    /// Loads configuration from the explicit path, else the default location,
    /// else defaults. Only an explicitly named file must exist.
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => Self::default_config_path().filter(|path| path.exists()),
        };

        if let Some(config_path) = config_path {
            match tokio::fs::read_to_string(&config_path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                },
                Err(e) if self.config.is_some() => {
                    return Err(RepositoryError::config(format!(
                        "Failed to read config file {:?}: {}",
                        config_path, e
                    )));
                },
                Err(_) => {},
            }
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging based on configuration.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_log_level = std::env::var("TELEMETRY_LOG_LEVEL")
            .unwrap_or_else(|_| config.logging.level.as_str().to_string());
        let log_level = if self.debug {
            "debug"
        } else {
            env_log_level.as_str()
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        let (stderr_layer, file_layer) = match &config.logging.file {
            Some(path) => {
                let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true);
                (None, Some(layer))
            },
            None => {
                let layer = tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(config.logging.structured)
                    .with_thread_ids(config.logging.structured)
                    .with_line_number(config.logging.structured)
                    .compact();
                (Some(layer), None)
            },
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| RepositoryError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Run the requested command.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(&config)?;

    match &cli.command {
        Command::CheckConfig => {
            println!("Configuration is valid!");
            println!("  Max traces: {}", config.storage.max_traces);
            println!("  Max logs per resource: {}", config.storage.max_logs_per_resource);
            println!("  Max points per series: {}", config.storage.max_metric_points);
            println!("  Max page size: {}", config.query.max_page_size);
            Ok(())
        },
        Command::Import { files, export } => run_import(config, files, export.as_deref()),
    }
}

fn run_import(config: Config, files: &[PathBuf], export: Option<&Path>) -> Result<()> {
    let repo = TelemetryRepository::new(config)?;
    let mut totals = AddContext::new();
    let mut imported = 0;
    let mut skipped = 0;

    for path in files {
        match import_file(&repo, path) {
            Ok(summary) => {
                tracing::info!(
                    file = %path.display(),
                    documents = summary.files_imported,
                    skipped = summary.files_skipped,
                    accepted = summary.ctx.success_count,
                    rejected = summary.ctx.failure_count,
                    "Imported file"
                );
                imported += summary.files_imported;
                skipped += summary.files_skipped;
                totals.merge(&summary.ctx);
            },
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "Skipping unreadable file");
                skipped += 1;
            },
        }
    }

    print_summary(&repo, imported, skipped, &totals);

    if let Some(out) = export {
        let file = std::fs::File::create(out)?;
        export_archive(&repo, file)?;
        println!("Exported archive to {}", out.display());
    }
    Ok(())
}

fn print_summary(repo: &TelemetryRepository, imported: usize, skipped: usize, ctx: &AddContext) {
    let stats = repo.stats();
    println!("Documents imported: {}  skipped: {}", imported, skipped);
    println!("Items accepted: {}  rejected: {}", ctx.success_count, ctx.failure_count);
    if let Some(error) = &ctx.last_error {
        println!("Last rejection: {}", error);
    }
    println!(
        "Traces: {}  Spans: {}  Logs: {}  Metric points: {}",
        stats.traces, stats.spans, stats.logs, stats.metric_points
    );

    println!("Resources:");
    for view in repo.get_resources() {
        let indent = match view.kind {
            ResourceKind::Instance => "    ",
            ResourceKind::Singleton | ResourceKind::Grouping => "  ",
        };
        println!("{}{} ({:?})", indent, view.display_name, view.kind);
    }
}
