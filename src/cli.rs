//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{DatasetId, OwnerId};
use crate::report::ReportFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// equipstat - equipment measurement statistics
///
/// Upload equipment CSV files, keep each owner's most recent datasets,
/// and render Markdown/JSON reports.
///
/// Examples:
///   equipstat --owner alice upload plant_a.csv plant_b.csv
///   equipstat --owner alice upload --dir ./measurements
///   equipstat --owner alice list
///   equipstat --owner alice report 12 --format json --output report.json
///   equipstat init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Owner the datasets belong to
    ///
    /// Supplied by the caller's authentication; equipstat does not verify it.
    #[arg(long, global = true, env = "EQUIPSTAT_OWNER", value_name = "OWNER")]
    pub owner: Option<String>,

    /// JSON snapshot file used as the dataset store
    #[arg(long, global = true, env = "EQUIPSTAT_STORE", value_name = "FILE")]
    pub store: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .equipstat.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Datasets retained per owner
    #[arg(long, global = true, value_name = "COUNT")]
    pub capacity: Option<usize>,

    /// Number of files prepared concurrently
    #[arg(long, global = true, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Upload one or more CSV files
    Upload {
        /// CSV files to upload
        #[arg(value_name = "FILES", required_unless_present = "dir")]
        files: Vec<PathBuf>,

        /// Upload every *.csv file under a directory
        #[arg(long, value_name = "DIR", conflicts_with = "files")]
        dir: Option<PathBuf>,
    },

    /// List retained datasets, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one dataset as JSON
    Show {
        id: DatasetId,
    },

    /// Render a dataset report
    Report {
        id: DatasetId,

        /// Output format (markdown, json). Defaults to the config file setting.
        #[arg(long, value_name = "FORMAT")]
        format: Option<ReportFormat>,

        /// Write the report here instead of equipment_report_<ID>.<ext>
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Delete a retained dataset
    Delete {
        id: DatasetId,
    },

    /// Generate a default .equipstat.toml configuration file
    InitConfig,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Owner for data commands. Only valid after [`Args::validate`].
    pub fn owner_id(&self) -> OwnerId {
        OwnerId::new(self.owner.as_deref().unwrap_or_default().trim())
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Skip the rest for init-config
        if self.command == Command::InitConfig {
            return Ok(());
        }

        if self.owner.as_deref().map(str::trim).unwrap_or_default().is_empty() {
            return Err("An owner is required (--owner or EQUIPSTAT_OWNER)".to_string());
        }

        if self.capacity == Some(0) {
            return Err("Capacity must be at least 1".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Validate upload directory if provided
        if let Command::Upload { dir: Some(ref dir), .. } = self.command {
            if !dir.is_dir() {
                return Err(format!("Upload directory does not exist: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the config file's `general.verbose`; `--quiet` wins over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            owner: Some("alice".to_string()),
            store: None,
            config: None,
            capacity: None,
            concurrency: None,
            verbose: false,
            quiet: false,
            command,
        }
    }

    #[test]
    fn test_parse_upload_files() {
        let args = Args::try_parse_from([
            "equipstat", "--owner", "alice", "upload", "a.csv", "b.csv",
        ])
        .unwrap();

        assert_eq!(args.owner.as_deref(), Some("alice"));
        assert_eq!(
            args.command,
            Command::Upload {
                files: vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")],
                dir: None,
            }
        );
    }

    #[test]
    fn test_parse_report_format() {
        let args = Args::try_parse_from([
            "equipstat", "report", "7", "--format", "json", "--owner", "bob",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Report {
                id: 7,
                format: Some(ReportFormat::Json),
                output: None,
            }
        );
        assert_eq!(args.owner_id(), OwnerId::from("bob"));
    }

    #[test]
    fn test_upload_requires_input() {
        assert!(Args::try_parse_from(["equipstat", "upload"]).is_err());
    }

    #[test]
    fn test_validation_requires_owner() {
        let mut args = make_args(Command::List { json: false });
        args.owner = Some("  ".to_string());
        assert!(args.validate().is_err());

        args.owner = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_needs_no_owner() {
        let mut args = make_args(Command::InitConfig);
        args.owner = None;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_capacity() {
        let mut args = make_args(Command::List { json: false });
        args.capacity = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::List { json: false });
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::List { json: false });
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_log_level_follows_config_verbose() {
        let mut args = make_args(Command::List { json: false });
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
