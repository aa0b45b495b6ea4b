//! Sentinel CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use sentinel::{
    error::{AppError, Result},
    models::{AtsBackend, Competitor, CompetitorList, Config},
    pipeline::{self, Prober},
    storage::{LocalStorage, ProbeStorage},
};

/// Sentinel - competitor pricing and hiring probe
#[derive(Parser, Debug)]
#[command(
    name = "sentinel",
    version,
    about = "Competitor pricing history and hiring signal probe"
)]
struct Cli {
    /// Path to configuration file (default: {storage_dir}/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to storage directory for reports and snapshots
    #[arg(short, long, global = true)]
    storage_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Probe competitors for pricing changes and hiring activity
    Probe {
        /// Competitor list file with [[competitors]] tables
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Comma-separated competitor names (hiring fallback only)
        #[arg(long, value_delimiter = ',')]
        competitors: Vec<String>,

        /// How far back the pricing baseline lies
        #[arg(short, long)]
        months: Option<u32>,

        /// Explicit job board URL, bypasses detection
        #[arg(long)]
        ats_url: Option<String>,

        /// Job board type for --ats-url (greenhouse, lever, ashby)
        #[arg(long)]
        ats_type: Option<AtsBackend>,

        /// Competitor the override applies to when several are given
        #[arg(long)]
        ats_for: Option<String>,
    },

    /// Compare two stored hiring snapshots
    Compare {
        /// Older snapshot file
        old: PathBuf,

        /// Newer snapshot file
        new: PathBuf,
    },

    /// Validate configuration and competitor list
    Validate {
        /// Competitor list file to check as well
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// An explicit config path must load; the default location may be absent.
fn load_config(explicit: Option<&Path>, storage_dir: Option<&Path>) -> Result<Config> {
    let config = match explicit {
        Some(path) => Config::load(path).map_err(|e| {
            AppError::config(format!("Cannot load config {}: {e}", path.display()))
        })?,
        None => {
            let dir = storage_dir.unwrap_or_else(|| Path::new("storage"));
            Config::load_or_default(dir.join("config.toml"))
        }
    };
    config.validate()?;
    Ok(config)
}

fn gather_competitors(
    file: Option<&Path>,
    names: &[String],
    ats_url: Option<String>,
    ats_type: Option<AtsBackend>,
    ats_for: Option<&str>,
) -> Result<CompetitorList> {
    let mut list = match file {
        Some(path) => CompetitorList::load(path)?,
        None => CompetitorList::default(),
    };
    list.competitors.extend(
        names
            .iter()
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
            .map(Competitor::named),
    );

    if ats_url.is_some() || ats_type.is_some() {
        let target = match ats_for {
            Some(name) => list
                .competitors
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
                .ok_or_else(|| AppError::config(format!("--ats-for '{name}' is not in the list")))?,
            None if list.competitors.len() == 1 => &mut list.competitors[0],
            None => {
                return Err(AppError::config(
                    "--ats-url applies to one competitor; name it with --ats-for",
                ));
            }
        };
        target.ats_url = ats_url;
        target.ats_type = ats_type;
    }

    list.validate()?;
    Ok(list)
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref(), cli.storage_dir.as_deref())?;
    let storage_dir = cli
        .storage_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.storage_dir));
    let storage = LocalStorage::new(&storage_dir);

    match cli.command {
        Command::Probe {
            file,
            competitors,
            months,
            ats_url,
            ats_type,
            ats_for,
        } => {
            let list = gather_competitors(
                file.as_deref(),
                &competitors,
                ats_url,
                ats_type,
                ats_for.as_deref(),
            )?;
            let months = months.unwrap_or(config.probe.lookback_months);

            let prober = Prober::new(&config)?;
            let (report, summary) =
                pipeline::run_probe(&prober, &storage, &list.competitors, months).await?;

            println!("{}", serde_json::to_string_pretty(&report)?);
            log::info!(
                "Probed {} competitor(s); report at {} (sha256 {})",
                report.competitor_count,
                summary.location,
                &summary.sha256[..12]
            );
        }

        Command::Compare { old, new } => {
            let old = storage.load_snapshot_file(&old).await?;
            let new = storage.load_snapshot_file(&new).await?;
            if !old.company.eq_ignore_ascii_case(&new.company) {
                log::warn!("Comparing snapshots of different companies: {} vs {}", old.company, new.company);
            }

            let trend = pipeline::compare_hiring(&old, &new);
            log::info!("{}: {}", new.company, trend.summary);
            println!("{}", serde_json::to_string_pretty(&trend)?);
        }

        Command::Validate { file } => {
            log::info!("Validating configuration...");
            if let Some(path) = file {
                let list = CompetitorList::load(&path)?;
                list.validate()?;
                log::info!("✓ {} competitor(s) in {}", list.competitors.len(), path.display());
            }
            log::info!("All validations passed!");
        }
    }

    Ok(())
}

/// Main entry point for the CLI application.
///
/// Only configuration errors produce a failing exit status; anything that
/// goes wrong once probing has started is reported and logged instead.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ AppError::Config(_)) => {
            log::error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            log::error!("{}", e);
            ExitCode::SUCCESS
        }
    }
}
