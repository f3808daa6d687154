//! CLI entry point for the signal resilience tool.
//!
//! Provides subcommands for reconstructing signal cycles and green ratios
//! from SPaT logs, simulating movement backlog, and computing resilience
//! indices from joined demand/capacity series.

use anyhow::Result;
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use signal_resilience::batch::CancelFlag;
use signal_resilience::config::PipelineConfig;
use signal_resilience::output::{append_records, print_json, print_pretty, write_records};
use signal_resilience::parser::read_log;
use signal_resilience::resilience::types::parse_time_bin;
use signal_resilience::resilience::{backlog_pipeline, resilience_pipeline};
use signal_resilience::series::{SeriesFilter, group_series, load_series};
use signal_resilience::signal::green_ratio_pipeline;
use std::ffi::OsStr;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "signal_resilience")]
#[command(about = "Signal cycle reconstruction and movement resilience analysis", long_about = None)]
struct Cli {
    /// JSON file overriding the default thresholds
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconstruct phase cycles from a SPaT log and write green ratios
    GreenRatio {
        /// SPaT log, one JSON document per line (.gz accepted)
        #[arg(value_name = "SPAT_LOG")]
        input: String,

        /// CSV file to write green ratio records to
        #[arg(short, long, default_value = "green_ratio.csv")]
        output: String,

        /// Only decode these phase ids (repeatable)
        #[arg(short, long = "phase", value_name = "PHASE_ID")]
        phases: Vec<u32>,

        /// Maximum number of phase groups processed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Simulate carried-forward backlog for each movement series
    Backlog {
        /// Joined demand/capacity CSV
        #[arg(value_name = "SERIES_CSV")]
        input: String,

        /// CSV file to write backlog rows to
        #[arg(short, long, default_value = "backlog.csv")]
        output: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Maximum number of movement groups processed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Compute resilience indices for each movement series
    Resilience {
        /// Joined demand/capacity CSV
        #[arg(value_name = "SERIES_CSV")]
        input: String,

        /// CSV file to append metrics rows to
        #[arg(short, long, default_value = "resilience.csv")]
        output: String,

        #[command(flatten)]
        window: WindowArgs,

        /// Maximum number of movement groups processed at once
        #[arg(short, long, default_value_t = 4)]
        concurrency: usize,

        /// Also log the metrics as pretty JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// Analysis window and movement selection shared by series commands.
#[derive(Args)]
struct WindowArgs {
    /// First time bin to include, e.g. "2025-03-07 06:00:00"
    #[arg(long, value_parser = parse_time_arg)]
    begin: Option<NaiveDateTime>,

    /// Last time bin to include
    #[arg(long, value_parser = parse_time_arg)]
    end: Option<NaiveDateTime>,

    /// Approach direction, or a combined form such as "S-L"
    #[arg(long)]
    direction: Option<String>,

    /// Movement name or short code (L, T, R)
    #[arg(long)]
    movement: Option<String>,
}

impl WindowArgs {
    fn filter(&self) -> SeriesFilter {
        SeriesFilter::new(
            self.begin,
            self.end,
            self.direction.as_deref(),
            self.movement.as_deref(),
        )
    }
}

fn parse_time_arg(value: &str) -> std::result::Result<NaiveDateTime, String> {
    parse_time_bin(value).ok_or_else(|| format!("expected 'YYYY-MM-DD HH:MM:SS', got '{value}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Human-readable progress on stderr, full debug trail in a daily JSON file.
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/signal_resilience.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("signal_resilience.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load_or_default(cli.config.as_deref())?;

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing groups already in flight");
            on_interrupt.cancel();
        }
    });

    match cli.command {
        Commands::GreenRatio {
            input,
            output,
            phases,
            concurrency,
        } => {
            let raw = read_log(&input, &phases)?;
            let records = green_ratio_pipeline(&raw, &config.signal, concurrency, &cancel).await?;
            write_records(&output, &records)?;
        }
        Commands::Backlog {
            input,
            output,
            window,
            concurrency,
        } => {
            let groups = group_series(load_series(&input)?, &window.filter());
            let rows = backlog_pipeline(groups, &config.resilience, concurrency, &cancel).await?;
            write_records(&output, &rows)?;
        }
        Commands::Resilience {
            input,
            output,
            window,
            concurrency,
            json,
        } => {
            let groups = group_series(load_series(&input)?, &window.filter());
            let metrics =
                resilience_pipeline(groups, &config.resilience, concurrency, &cancel).await?;

            if json {
                print_json(&metrics)?;
            } else {
                print_pretty(&metrics);
            }

            append_records(&output, &metrics)?;
            info!(output = %output, movements = metrics.len(), "Resilience metrics appended");
        }
    }

    if cancel.is_cancelled() {
        warn!("Run was interrupted; outputs hold partial results");
    }

    Ok(())
}
