//! Frequency-response sweep runner.
//!
//! Loads the sweep configuration, opens the instrument channels over VISA,
//! runs the sweep and prints the resulting magnitude series. Progress is
//! logged per point; set `RUST_LOG=info` to watch a long sweep advance.

use anyhow::{Context, Result};
use clap::Parser;

use bode_sweep::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "bode_sweep", version, about = "Sweep a sine excitation and record the frequency response of a circuit")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: String,

    /// Override the sweep start frequency in Hz
    #[arg(long)]
    start_hz: Option<f64>,

    /// Override the sweep end frequency in Hz
    #[arg(long)]
    end_hz: Option<f64>,

    /// Override the plan density in points per decade
    #[arg(long)]
    points_per_decade: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut settings = Settings::load_from(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config))?;
    if let Some(start_hz) = cli.start_hz {
        settings.sweep.start_hz = start_hz;
    }
    if let Some(end_hz) = cli.end_hz {
        settings.sweep.end_hz = end_hz;
    }
    if let Some(density) = cli.points_per_decade {
        settings.sweep.points_per_decade = density;
    }
    settings.validate()?;

    run(settings).await
}

#[cfg(feature = "instrument_visa")]
async fn run(settings: Settings) -> Result<()> {
    use bode_sweep::adapters::{InstrumentChannel, VisaChannel};
    use bode_sweep::config::CaptureVendor;
    use bode_sweep::instrument::{
        CaptureDevice, Keysight33500, KeysightE36200, RigolDs1000z, SiglentSds,
    };
    use bode_sweep::sweep::{SweepOrchestrator, SweepStatus};
    use std::sync::Arc;

    let timeout = settings.instruments.timeout;
    let source_channel: Arc<dyn InstrumentChannel> =
        Arc::new(VisaChannel::open(&settings.instruments.source, timeout).await?);
    let capture_channel: Arc<dyn InstrumentChannel> =
        Arc::new(VisaChannel::open(&settings.instruments.capture, timeout).await?);

    let capture: Box<dyn CaptureDevice> = match settings.instruments.capture_vendor {
        CaptureVendor::Siglent => Box::new(SiglentSds::new(capture_channel)),
        CaptureVendor::Rigol => Box::new(RigolDs1000z::new(capture_channel)),
    };

    let mut orchestrator = SweepOrchestrator::new(
        settings.sweep.clone(),
        settings.capture.clone(),
        settings.acquisition_config(),
        Box::new(Keysight33500::new(source_channel)),
        capture,
    );

    if let Some(supply_resource) = &settings.instruments.supply {
        let supply_channel: Arc<dyn InstrumentChannel> =
            Arc::new(VisaChannel::open(supply_resource, timeout).await?);
        orchestrator = orchestrator.with_supply(
            Box::new(KeysightE36200::new(supply_channel)),
            settings.supply.clone(),
        );
    }

    // Ctrl-C cancels cooperatively: the running point finishes its check,
    // channels are released, and the partial series is still printed.
    let cancel = orchestrator.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = orchestrator.run().await?;

    println!("frequency_hz,amplitude_vpp,gain_db,degraded");
    for point in &result.points {
        let gain = if point.gain_db.is_finite() {
            format!("{:.3}", point.gain_db)
        } else {
            "-inf".to_string()
        };
        println!(
            "{:.3},{:.6},{},{}",
            point.frequency_hz, point.amplitude_vpp, gain, point.degraded
        );
    }

    match result.status {
        SweepStatus::Completed => {
            println!(
                "# sweep completed: {} points, {} degraded",
                result.points.len(),
                result.degraded_count()
            );
            Ok(())
        }
        SweepStatus::Cancelled => {
            println!("# sweep cancelled: {} points collected", result.points.len());
            Ok(())
        }
        SweepStatus::Aborted => {
            let cause = result
                .failure
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!(
                "sweep aborted after {} points: {}",
                result.points.len(),
                cause
            )
        }
    }
}

#[cfg(not(feature = "instrument_visa"))]
async fn run(_settings: Settings) -> Result<()> {
    anyhow::bail!("VISA support not enabled. Rebuild with --features instrument_visa")
}
