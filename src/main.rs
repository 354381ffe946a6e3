use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pulsemeter::daemon::Daemon;
use pulsemeter::gpio::LineSource;
use pulsemeter::settings::{Overrides, Settings};

#[derive(Parser, Debug)]
#[command(name = "pulsemeter", version)]
#[command(about = "Count GPIO pulses and publish per-second, per-minute and per-hour rates")]
struct Args {
    /// Settings file (TOML, YAML or JSON). Environment variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Drive the counter from a synthetic pulse train at this rate instead of GPIO
    #[arg(long, value_name = "HZ")]
    simulate: Option<f64>,

    /// Broker address `host[:port]`, or `none` (overrides MQTT_ADDRESS)
    #[arg(short, long)]
    broker: Option<String>,

    /// Serve the pull sink even when the broker is connected
    #[arg(long)]
    force_pull: bool,

    /// Scale factor for the *_mult fields (overrides PULSE_MULTIPLIER)
    #[arg(short, long)]
    multiplier: Option<f64>,

    /// Debounce in milliseconds, 0 disables (overrides BOUNCE_TIME)
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Log filter, e.g. "debug" or "pulsemeter_sdk=debug" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            broker: self.broker.clone(),
            force_pull: self.force_pull,
            multiplier: self.multiplier,
            debounce_ms: self.debounce_ms,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let settings = Settings::load(args.config.as_deref(), &args.overrides())
        .context("Failed to load settings")?;
    info!(
        uuid = %settings.uuid,
        pin = settings.gpio_pin,
        reset_pin = settings.reset_pin,
        multiplier = settings.multiplier,
        debounce_ms = settings.debounce.as_millis() as u64,
        "Settings loaded"
    );

    let source = match args.simulate {
        Some(hz) => LineSource::Simulated(hz),
        None => LineSource::Hardware,
    };

    let daemon = Daemon::start(&settings, source).await?;
    daemon.run_until(wait_for_signal()).await
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolve on SIGINT or SIGTERM.
async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
        info!("Received termination signal");
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received termination signal");
        Ok(())
    }
}
