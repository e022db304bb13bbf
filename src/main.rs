//! # PharmaGuard CLI (`pharmaguard`)
//!
//! ## Usage
//!
//! ```bash
//! pharmaguard --config ./config/pharmaguard.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pharmaguard serve` | Start the HTTP server |
//! | `pharmaguard analyze <file> --drugs <list>` | Run one analysis and print the JSON |
//! | `pharmaguard logs list [--limit N]` | Print the analysis history |
//! | `pharmaguard logs clear` | Delete the analysis history |
//!
//! ## Examples
//!
//! ```bash
//! # Serve with the engine on another host
//! ANALYSIS_SERVICE_URL=http://engine:8000/analyze pharmaguard serve
//!
//! # One-off analysis without HTTP
//! pharmaguard analyze ./patient.vcf --drugs WARFARIN,CLOPIDOGREL
//!
//! # Last five history rows
//! pharmaguard logs list --limit 5
//! ```

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use pharmaguard::config::{self, Config};
use pharmaguard::log_store::FileLogStore;
use pharmaguard::orchestrator::AnalysisOrchestrator;
use pharmaguard::server;
use pharmaguard::telemetry;
use pharmaguard::upload::UploadedFile;
use pharmaguard_core::store::LogStore;

/// PharmaGuard: pharmacogenomic analysis gateway for VCF uploads.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/pharmaguard.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "pharmaguard",
    about = "PharmaGuard: pharmacogenomic analysis gateway for VCF uploads",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/pharmaguard.toml`. A missing file means
    /// built-in defaults plus environment overrides.
    #[arg(long, global = true, default_value = "./config/pharmaguard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server]` host and port (`PORT` overrides).
    Serve,

    /// Analyze a local VCF file without going through HTTP.
    ///
    /// The file is copied to temporary storage first, so the original is
    /// never modified. The result is also appended to the history.
    Analyze {
        /// Path to the VCF file.
        file: PathBuf,

        /// Comma-separated drug names, or a JSON array.
        #[arg(long)]
        drugs: String,
    },

    /// Inspect or clear the analysis history.
    Logs {
        #[command(subcommand)]
        action: LogsAction,
    },
}

#[derive(Subcommand)]
enum LogsAction {
    /// Print history entries as JSON, oldest first.
    List {
        /// Only print the most recent N entries.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Delete every history entry.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Analyze { file, drugs } => {
            run_analyze(&cfg, file, &drugs).await?;
        }
        Commands::Logs { action } => {
            let store = FileLogStore::from_config(&cfg.storage);
            match action {
                LogsAction::List { limit } => {
                    let entries = store.list().await?;
                    let skip = limit.map_or(0, |n| entries.len().saturating_sub(n));
                    println!("{}", serde_json::to_string_pretty(&entries[skip..])?);
                    eprintln!("{} of {} entries", entries.len() - skip, entries.len());
                }
                LogsAction::Clear => {
                    store.clear().await?;
                    println!("Cleared analysis history at {}", store.path().display());
                }
            }
        }
    }

    Ok(())
}

async fn run_analyze(cfg: &Config, file: PathBuf, drugs: &str) -> anyhow::Result<()> {
    let orchestrator = AnalysisOrchestrator::from_config(cfg)?;
    let upload = UploadedFile::copy_from(cfg.upload.dir.as_deref(), &file).await?;

    let analysis = orchestrator
        .run(Some(upload), Some(drugs))
        .await
        .map_err(|e| anyhow!("{}: {}", e.error_type(), e))?;

    println!("{}", serde_json::to_string_pretty(&analysis.body)?);
    eprintln!(
        "source: {}, patient: {}, logged: {}",
        analysis.source, analysis.patient_id, analysis.logged
    );
    Ok(())
}
