//! Application entry point for the `codemetal-linkaudit` service.
//!
//! This binary orchestrates the startup sequence of the link-audit engine:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Loading the mesh reference table once (built-in or `MESH_REFERENCE_PATH`)
//! - Either serving the HTTP API (`serve`, the default) or running a single
//!   batch summary over a file (`summarize`)
//!
//! # Environment Variables
//! - `SENSOR_API_URL` (optional) – readings source for `GET /summary`
//! - `MESH_REFERENCE_PATH` (optional) – mesh reference CSV
//! - `LINKAUDIT_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `LINKAUDIT_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! See `config.rs` for the full list.
use std::{
    env,
    fs::File,
    io,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::Router;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use linkaudit::{config, export, pipeline, routes, Config, MeshReference, PipelineError};

/// Packet-loss and link-quality audit for LoRa sensor gateways
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,

    /// Summarize one reading table and write the result as CSV
    Summarize {
        /// Reading table (.csv or .json)
        #[arg(short, long)]
        input: PathBuf,

        /// Gateway tier: bg or mg
        #[arg(short, long)]
        tier: Option<String>,

        /// Resampling frequency, e.g. 1D, W, MS
        #[arg(short, long)]
        freq: Option<String>,

        /// Summary CSV path (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also write the cleaned readings to this CSV
        #[arg(long)]
        readings_output: Option<PathBuf>,
    },
}

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();
    let args = Args::parse();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let reference = Arc::new(load_reference(&cfg)?);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(reference, cfg).await,
        Command::Summarize {
            input,
            tier,
            freq,
            output,
            readings_output,
        } => summarize_file(
            &cfg,
            &reference,
            &input,
            tier.as_deref(),
            freq.as_deref(),
            output,
            readings_output,
        ),
    }
}

fn load_reference(cfg: &Config) -> Result<MeshReference> {
    // ---
    let reference = match &cfg.mesh_reference_path {
        Some(path) => MeshReference::from_path(path)
            .with_context(|| format!("Failed to load mesh reference '{}'", path))?,
        None => MeshReference::builtin().context("Built-in mesh reference is invalid")?,
    };
    tracing::info!("Mesh reference ready: {} entries", reference.len());
    Ok(reference)
}

async fn serve(reference: Arc<MeshReference>, cfg: Config) -> Result<()> {
    // ---
    let addr: SocketAddr = cfg.bind_addr;

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(reference, cfg);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn summarize_file(
    cfg: &Config,
    reference: &MeshReference,
    input: &Path,
    tier: Option<&str>,
    freq: Option<&str>,
    output: Option<PathBuf>,
    readings_output: Option<PathBuf>,
) -> Result<()> {
    // ---
    let options = cfg.run_options(tier, freq)?;
    let readings = export::read_readings_path(input)
        .with_context(|| format!("Failed to read readings from '{}'", input.display()))?;

    let report = match pipeline::run(&readings, &options, reference) {
        Ok(report) => report,
        Err(PipelineError::EmptyInput) => {
            tracing::warn!(
                "No data found in '{}', nothing written",
                input.display()
            );
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(path) = readings_output {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        export::write_readings_csv(file, &report.readings)?;
        tracing::info!(
            "Wrote {} cleaned readings to {}",
            report.readings.len(),
            path.display()
        );
    }

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create '{}'", path.display()))?;
            export::write_summary_csv(file, report.tier, &report.rows)?;
            tracing::info!("Wrote {} summary rows to {}", report.rows.len(), path.display());
        }
        None => export::write_summary_csv(io::stdout().lock(), report.tier, &report.rows)?,
    }

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Output on stderr so `summarize` can stream CSV on stdout
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `LINKAUDIT_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by `RUST_LOG`, else the `LINKAUDIT_LOG_LEVEL` env var
///
/// Called once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("LINKAUDIT_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    // Determine if we should use colors
    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => io::stderr().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to LINKAUDIT_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("LINKAUDIT_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
