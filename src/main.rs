//! Circuit breaker simulator.
//!
//! Drives a breaker against a simulated flaky dependency so thresholds can be
//! tuned before they guard a real one.
//!
//! ```text
//!   calls ──▶ CircuitBreaker::fire ──▶ simulated dependency
//!                    │                   (ok / error / stall)
//!                    ▼
//!             tracing events ──▶ stdout
//!                    │
//!                    ▼
//!             BreakerSet::stats ──▶ JSON report
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use thiserror::Error;

use circuit_guard::config::{load_config, BreakerConfig, GuardConfig};
use circuit_guard::observability::logging::init_logging;
use circuit_guard::{BreakerError, BreakerOptions, BreakerSet, CircuitBreaker};

#[derive(Parser)]
#[command(name = "circuit-guard")]
#[command(about = "Drive a circuit breaker against a simulated flaky dependency", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Breaker definition to use; defaults apply if it is not configured.
    #[arg(short, long, default_value = "simulated")]
    breaker: String,

    /// Number of calls to make.
    #[arg(long, default_value_t = 100)]
    calls: u32,

    /// Probability (0-1) that the dependency returns an error.
    #[arg(long, default_value_t = 0.3)]
    failure_rate: f64,

    /// Probability (0-1) that the dependency stalls past the timeout.
    #[arg(long, default_value_t = 0.05)]
    stall_rate: f64,

    /// Latency of a normal call in milliseconds.
    #[arg(long, default_value_t = 10)]
    latency_ms: u64,

    /// Pause between calls in milliseconds.
    #[arg(long, default_value_t = 50)]
    interval_ms: u64,

    /// Serve a cached value while the dependency is unavailable.
    #[arg(long)]
    fallback: bool,
}

#[derive(Debug, Error)]
#[error("simulated dependency failed on call {0}")]
struct DependencyError(u32);

#[derive(Debug, Default)]
struct Tally {
    ok: u32,
    fallback: u32,
    failed: u32,
    timed_out: u32,
    rejected: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GuardConfig::default(),
    };
    init_logging(&config.observability)?;

    tracing::info!("circuit-guard v{} starting", env!("CARGO_PKG_VERSION"));

    let definition = config
        .breaker(&cli.breaker)
        .cloned()
        .unwrap_or_else(|| BreakerConfig::named(cli.breaker.clone()));
    let options = BreakerOptions::from(&definition);

    tracing::info!(
        breaker = %definition.name,
        timeout_ms = definition.timeout_ms,
        error_threshold_percentage = definition.error_threshold_percentage,
        reset_timeout_ms = definition.reset_timeout_ms,
        volume_threshold = definition.volume_threshold,
        "Configuration loaded"
    );

    let failure_rate = cli.failure_rate.clamp(0.0, 1.0);
    let stall_rate = cli.stall_rate.clamp(0.0, 1.0);
    let latency = Duration::from_millis(cli.latency_ms);
    let stall = options.timeout * 2;

    let breaker = Arc::new(CircuitBreaker::new(
        move |call: u32| {
            let roll: f64 = rand::thread_rng().gen();
            async move {
                if roll < stall_rate {
                    tokio::time::sleep(stall).await;
                    Ok(call)
                } else if roll < stall_rate + failure_rate {
                    tokio::time::sleep(latency).await;
                    Err(DependencyError(call))
                } else {
                    tokio::time::sleep(latency).await;
                    Ok(call)
                }
            }
        },
        options,
    ));
    if cli.fallback {
        breaker.set_fallback_fn(|_call: u32| Ok(0));
    }

    let breakers = BreakerSet::new();
    breakers.register(breaker.clone());

    let mut tally = Tally::default();
    let mut ticker = tokio::time::interval(Duration::from_millis(cli.interval_ms.max(1)));
    for call in 1..=cli.calls {
        ticker.tick().await;
        match breaker.fire(call).await {
            Ok(0) => tally.fallback += 1,
            Ok(_) => tally.ok += 1,
            Err(BreakerError::CircuitOpen { .. }) => tally.rejected += 1,
            Err(BreakerError::Timeout { .. }) => tally.timed_out += 1,
            Err(err) => {
                tracing::debug!(error = %err, "Call failed");
                tally.failed += 1;
            }
        }
    }

    tracing::info!(
        ok = tally.ok,
        fallback = tally.fallback,
        failed = tally.failed,
        timed_out = tally.timed_out,
        rejected = tally.rejected,
        "Simulation finished"
    );
    println!("{}", serde_json::to_string_pretty(&breakers.stats())?);
    Ok(())
}
