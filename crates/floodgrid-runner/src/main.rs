//! `floodgrid` command-line interface.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use floodgrid_cluster::{parse_date, GenerationMode, PointFilter, RiskLevel, SubClusterRequest};
use floodgrid_runner::commands::{self, GenerateArgs};
use floodgrid_runner::{Result, RunnerError};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "floodgrid", version, about = "Geohash clustering of flood-forecast points")]
struct Cli {
    /// YAML configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest points and regenerate clusters into a snapshot file
    Generate {
        /// JSON array of raw points
        #[arg(short, long)]
        points: PathBuf,

        /// Snapshot file to update (created if absent)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Only regenerate this date (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Override the configured generation mode
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },

    /// Clusters at a zoom level, optionally inside a bounding box
    Clusters {
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(short, long)]
        zoom: u8,

        /// Bounding box as north,south,east,west
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// low, medium, high or extreme
        #[arg(long)]
        risk: Option<RiskLevel>,
    },

    /// Children of a parent cluster at a finer zoom level
    SubClusters {
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Parent cluster geohash
        #[arg(long)]
        parent: String,

        #[arg(long)]
        parent_zoom: u8,

        #[arg(long)]
        child_zoom: u8,

        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        #[arg(long)]
        risk: Option<RiskLevel>,
    },

    /// Raw points from a points file, filtered
    Points {
        #[arg(short, long)]
        points: PathBuf,

        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,

        /// Bounding box as north,south,east,west
        #[arg(long, allow_hyphen_values = true)]
        bbox: Option<String>,

        #[arg(long)]
        min_forecast: Option<f64>,

        #[arg(long)]
        max_forecast: Option<f64>,
    },

    /// Cluster (and optionally point) statistics
    Summary {
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Also summarize this points file
        #[arg(short, long)]
        points: Option<PathBuf>,
    },

    /// Remove one date's clusters from a snapshot file
    Purge {
        #[arg(short, long)]
        snapshot: PathBuf,

        #[arg(long, value_parser = parse_date)]
        date: NaiveDate,
    },

    /// Encode a coordinate as a geohash
    Encode {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        #[arg(long, allow_hyphen_values = true)]
        lon: f64,

        #[arg(short, long, default_value = "6")]
        precision: usize,
    },

    /// Decode a geohash into its bounding box
    Decode { geohash: String },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Flat,
    Hierarchical,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Flat => GenerationMode::Flat,
            ModeArg::Hierarchical => GenerationMode::Hierarchical,
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = commands::load_runner_config(cli.config.as_deref())?;

    match cli.command {
        Command::Generate {
            points,
            snapshot,
            date,
            mode,
        } => {
            let report = commands::generate(
                &config,
                &GenerateArgs {
                    points,
                    snapshot,
                    date,
                    mode: mode.map(GenerationMode::from),
                },
            )?;
            print_json(&report)?;
            if !report.run.is_success() {
                return Err(RunnerError::GenerationFailed {
                    failed: report.run.failures.len(),
                });
            }
        }
        Command::Clusters {
            snapshot,
            zoom,
            bbox,
            date,
            risk,
        } => {
            let bounds = bbox.as_deref().map(commands::parse_bbox).transpose()?;
            print_json(&commands::clusters(&snapshot, zoom, bounds, date, risk)?)?;
        }
        Command::SubClusters {
            snapshot,
            parent,
            parent_zoom,
            child_zoom,
            date,
            risk,
        } => {
            let request = SubClusterRequest {
                parent_geohash: parent,
                parent_zoom,
                child_zoom,
                date,
                risk_level: risk,
            };
            print_json(&commands::sub_clusters(&snapshot, &request)?)?;
        }
        Command::Points {
            points,
            date,
            bbox,
            min_forecast,
            max_forecast,
        } => {
            let filter = PointFilter {
                date,
                bounds: bbox.as_deref().map(commands::parse_bbox).transpose()?,
                min_forecast,
                max_forecast,
            };
            print_json(&commands::points(&points, &filter)?)?;
        }
        Command::Summary { snapshot, points } => {
            print_json(&commands::summary(&snapshot, points.as_deref())?)?;
        }
        Command::Purge { snapshot, date } => {
            let removed = commands::purge(&snapshot, date)?;
            print_json(&serde_json::json!({ "date": date, "removed": removed }))?;
        }
        Command::Encode {
            lat,
            lon,
            precision,
        } => {
            print_json(&commands::encode(lat, lon, precision)?)?;
        }
        Command::Decode { geohash } => {
            print_json(&commands::decode(&geohash)?)?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    floodgrid_metrics::describe_metrics();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
