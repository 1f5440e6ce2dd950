//! equipstat - equipment measurement statistics
//!
//! A CLI that uploads equipment CSV files into a local bounded store and
//! renders reports for the retained datasets.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, storage, unknown dataset, unreadable file, etc.)
//!   2 - At least one upload was rejected as invalid input

use anyhow::{Context, Result};
use equipstat::analysis::dominant_type;
use equipstat::batch::{self, BatchOutcome};
use equipstat::cli::{Args, Command};
use equipstat::config::{Config, CONFIG_FILE_NAME};
use equipstat::report::format_2dp;
use equipstat::{DatasetListing, EquipmentService, JsonFileBackend, RetentionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if args.command == Command::InitConfig {
        return handle_init_config();
    }

    // Load configuration before logging so general.verbose can raise the level
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("equipstat v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .equipstat.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize retention, storage path and report output.");
    Ok(())
}

/// Initialize logging at `level`.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Execute the requested command. Returns the process exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    config.validate()?;

    let backend = JsonFileBackend::open(&config.storage.path).with_context(|| {
        format!("Failed to open store: {}", config.storage.path.display())
    })?;
    let store = RetentionStore::new(backend, config.retention.capacity)
        .context("Failed to initialize retention store")?;
    let service = Arc::new(EquipmentService::new(store, config.report.options()));

    let owner = args.owner_id();
    debug!(
        "Owner {} with capacity {}, store {}",
        owner,
        config.retention.capacity,
        config.storage.path.display()
    );

    match args.command {
        Command::Upload { files, dir } => {
            let paths = match dir {
                Some(dir) => batch::discover_csv_files(&dir)?,
                None => files,
            };

            if paths.is_empty() {
                println!("No CSV files to upload.");
                return Ok(0);
            }

            println!("📥 Uploading {} file(s) as {}", paths.len(), owner);
            let outcomes = batch::ingest_files(
                &service,
                &owner,
                paths,
                config.general.concurrency,
                !args.quiet,
            )
            .await;

            Ok(print_upload_outcomes(&outcomes))
        }

        Command::List { json } => {
            let listings = service.list(&owner)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listings)?);
            } else {
                print_listings(&listings);
            }
            Ok(0)
        }

        Command::Show { id } => {
            let record = service.detail(&owner, id)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(0)
        }

        Command::Report { id, format, output } => {
            let format = format.unwrap_or(config.report.format);
            let document = service.report(&owner, id, format)?;
            let output = output.unwrap_or_else(|| PathBuf::from(&document.filename));

            std::fs::write(&output, &document.bytes)
                .with_context(|| format!("Failed to write report to {}", output.display()))?;

            println!("✅ Report saved to: {} ({})", output.display(), document.content_type);
            Ok(0)
        }

        Command::Delete { id } => {
            service.delete(&owner, id)?;
            println!("🗑️  Deleted dataset {}", id);
            Ok(0)
        }

        Command::InitConfig => Ok(0),
    }
}

/// Print one line per uploaded file. Returns the exit code for the batch.
fn print_upload_outcomes(outcomes: &[BatchOutcome]) -> i32 {
    let mut rejected = 0;
    let mut failed = 0;

    for outcome in outcomes {
        match &outcome.result {
            Ok(response) => {
                let summary = &response.summary;
                let dominant = dominant_type(summary)
                    .map(|(name, count)| format!(", mostly {} ({})", name, count))
                    .unwrap_or_default();
                println!(
                    "   ✅ {} → dataset {}: {} rows, flowrate {} / pressure {} / temperature {}{}",
                    outcome.path.display(),
                    response.id,
                    summary.total_count,
                    format_2dp(summary.avg_flowrate),
                    format_2dp(summary.avg_pressure),
                    format_2dp(summary.avg_temperature),
                    dominant
                );
            }
            Err(e) if outcome.is_rejected() => {
                rejected += 1;
                println!("   ⛔ {} rejected: {:#}", outcome.path.display(), e);
            }
            Err(e) => {
                failed += 1;
                println!("   ❌ {} failed: {:#}", outcome.path.display(), e);
            }
        }
    }

    println!(
        "\n📊 {} uploaded, {} rejected, {} failed",
        outcomes.len() - rejected - failed,
        rejected,
        failed
    );

    if failed > 0 {
        1
    } else if rejected > 0 {
        eprintln!("\n⛔ Some uploads were rejected (exit code 2).");
        2
    } else {
        0
    }
}

/// Print retained datasets as a table.
fn print_listings(listings: &[DatasetListing]) {
    if listings.is_empty() {
        println!("No datasets retained.");
        return;
    }

    println!(
        "{:>6}  {:<20}  {:<30}  {:>6}  {:>10}  {:>10}  {:>11}",
        "ID", "Uploaded", "File", "Rows", "Flowrate", "Pressure", "Temperature"
    );
    for listing in listings {
        println!(
            "{:>6}  {:<20}  {:<30}  {:>6}  {:>10}  {:>10}  {:>11}",
            listing.id,
            listing.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            listing.filename,
            listing.total_count,
            format_2dp(listing.avg_flowrate),
            format_2dp(listing.avg_pressure),
            format_2dp(listing.avg_temperature)
        );
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before the subscriber is installed, so problems go to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}
