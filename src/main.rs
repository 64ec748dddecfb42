mod config;
mod fetcher;
mod poller;
mod position;
mod storage;
mod web;
mod windows;

use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::{Config, DEFAULT_CONFIG_PATH};
use crate::fetcher::{Fetcher, HttpTransport};
use crate::storage::{SampleSource, SampleStore};
use crate::web::api::iss::parse_datetime;
use crate::windows::{daylight_windows, TimeRange};

#[derive(Parser)]
#[command(name = "iss-o-mat")]
#[command(about = "ISS position tracker and daylight window finder")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the position source and serve the HTTP API
    Serve,
    /// Print stored daylight windows
    Windows {
        /// Range start (RFC 3339)
        #[arg(long, value_parser = parse_datetime)]
        start: Option<DateTime<Utc>>,
        /// Range end (RFC 3339), defaults to now
        #[arg(long, value_parser = parse_datetime)]
        end: Option<DateTime<Utc>>,
        /// Range length when no start is given, e.g. "1day" or "6h"
        #[arg(long, value_parser = humantime::parse_duration)]
        span: Option<std::time::Duration>,
    },
    /// Fetch the current position once and print it
    Fetch,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Serve => serve(config).await,
        Commands::Windows { start, end, span } => print_windows(&config, start, end, span),
        Commands::Fetch => fetch(&config).await,
    }
}

async fn serve(config: Config) -> ExitCode {
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", e);
        }
        log::info!("Shutting down");
    };

    match web::run_server(config, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_windows(
    config: &Config,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    span: Option<std::time::Duration>,
) -> ExitCode {
    let span = match span {
        Some(d) => match Duration::from_std(d) {
            Ok(d) => d,
            Err(e) => {
                eprintln!("Invalid span: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => match Duration::try_seconds(config.api.default_time_window_seconds) {
            Some(d) => d,
            None => {
                eprintln!("Invalid api.default_time_window_seconds");
                return ExitCode::FAILURE;
            }
        },
    };
    let Some(range) = TimeRange::resolve(start, end, span, Utc::now()) else {
        eprintln!("Span reaches before the earliest representable time");
        return ExitCode::FAILURE;
    };

    let store = match SampleStore::open_existing(&config.storage.path) {
        Ok(Some(store)) => store,
        Ok(None) => {
            log::warn!(
                "No database at {}, nothing has been recorded yet",
                config.storage.path.display()
            );
            println!("0 daylight windows ({} to {})", range.start, range.end);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Storage error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let samples = match store.samples_between(range.start, range.end) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Storage error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let windows = daylight_windows(&samples);
    println!(
        "{} daylight windows from {} samples ({} to {})",
        windows.len(),
        samples.len(),
        range.start,
        range.end
    );
    for (i, window) in windows.iter().enumerate() {
        let edge = |t: Option<DateTime<Utc>>| match t {
            Some(t) => t.to_rfc3339(),
            None => "unbounded".to_string(),
        };
        let duration = match window.duration() {
            Some(d) => format!("{}s", d.num_seconds()),
            None => "?".to_string(),
        };
        println!(
            "  {}: {} -> {} ({})",
            i + 1,
            edge(window.start),
            edge(window.end),
            duration
        );
    }
    ExitCode::SUCCESS
}

async fn fetch(config: &Config) -> ExitCode {
    let target = config.source.target();
    let transport = match HttpTransport::new(&target) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Invalid source configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match Fetcher::new(transport, target.url).fetch().await {
        Some(sample) => match serde_json::to_string_pretty(&sample) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Error encoding position: {}", e);
                ExitCode::FAILURE
            }
        },
        None => {
            eprintln!("Could not fetch the current position");
            ExitCode::FAILURE
        }
    }
}
