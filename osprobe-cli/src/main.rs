//! osprobe - OS-family detection from indirect host signals
//!
//! Composition root: resolves configuration, binds host probes to the
//! configured rule tables, runs the fusion engine once, and reports the
//! ranked result. All scoring logic lives in `osprobe-core`; this binary is
//! the Result Reporter collaborator plus an optional debug handle.

mod handle;
mod probes;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use osprobe_core::{DetectionEngine, DetectorConfig, EngineOptions};
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "osprobe", version, about = "Detect the host OS family from indirect signals")]
struct Args {
    /// Detector configuration TOML (defaults to the built-in tables)
    #[arg(short, long, env = "OSPROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Await sources one at a time for a deterministic trace order
    #[arg(long)]
    sequential: bool,

    /// Override the per-probe timeout in milliseconds
    #[arg(long)]
    probe_timeout_ms: Option<u64>,

    /// Emit the full report as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Include the per-step trace in the output
    #[arg(long)]
    trace: bool,

    /// Keep a debug handle and dump engine internals on exit
    #[arg(long)]
    debug_handle: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let config = DetectorConfig::from_toml_str(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?;
            info!(path = %path.display(), "Loaded detector config");
            config
        }
        None => {
            debug!("Using built-in detection tables");
            DetectorConfig::default_os_detection()
        }
    };

    if args.sequential {
        config.run_concurrently = false;
    }
    if let Some(ms) = args.probe_timeout_ms {
        config.probe_timeout_ms = ms;
        config.validate().context("invalid probe timeout override")?;
    }

    let hypotheses = config.hypothesis_set()?.into_shared();
    let sources = probes::build_sources(&config)?;
    debug!(
        hypotheses = hypotheses.len(),
        sources = sources.len(),
        "Engine assembled"
    );

    let engine = DetectionEngine::new(hypotheses, sources, EngineOptions::from_config(&config))?
        .with_step_listener(|step| {
            debug!(
                source = step.source.as_str(),
                fired = step.fired(),
                elapsed_ms = step.elapsed_ms,
                "Source completed"
            );
        });

    let debug_handle = args.debug_handle.then(handle::DebugHandle::new);

    let report = engine.run().await?;
    if let Some(handle) = &debug_handle {
        handle.record(&report);
    }

    if args.json {
        println!("{}", report::render_json(&report)?);
    } else {
        print!("{}", report::render_text(&report, args.trace));
    }

    if let Some(handle) = &debug_handle {
        eprintln!("{}", handle.dump());
    }

    Ok(())
}
