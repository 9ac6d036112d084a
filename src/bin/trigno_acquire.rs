// src/bin/trigno_acquire.rs
//! Record Trigno EMG and accelerometer streams to CSV

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use trigno_core::acquisition::AcquisitionHarness;
use trigno_core::config::{ConfigLoader, SystemConfig};
use trigno_core::error::TrignoResult;
use trigno_core::hal::simulator::{SimulatorConfig, TcuSimulator};

#[derive(Parser)]
#[command(name = "trigno-acquire")]
#[command(about = "Delsys Trigno acquisition - records EMG and IMU streams to CSV")]
struct Args {
    #[arg(long, help = "TOML configuration file layered over the defaults")]
    config: Option<PathBuf>,

    #[arg(long, help = "Directory for the CSV files")]
    output_dir: Option<PathBuf>,

    #[arg(long, help = "Host running the Trigno Control Utility")]
    host: Option<String>,

    #[arg(long, help = "Stop after this many seconds instead of waiting for Ctrl-C")]
    duration_secs: Option<u64>,

    #[arg(long, help = "Record from an in-process TCU simulator")]
    simulate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("trigno-acquire failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> TrignoResult<()> {
    let mut loader = match &args.config {
        Some(path) => ConfigLoader::with_paths(vec![path.clone()]),
        None => ConfigLoader::new(),
    };
    let mut config: SystemConfig = loader.load_system_config()?;

    if let Some(output_dir) = args.output_dir {
        config.recording.output_dir = output_dir;
    }
    if let Some(host) = args.host {
        config.connection.host = host;
    }

    // Held until the end of the run; dropping it closes the listeners
    let _simulator = if args.simulate {
        let simulator = TcuSimulator::spawn(SimulatorConfig {
            chunk_interval: Some(Duration::from_millis(5)),
            ..SimulatorConfig::default()
        })
        .await?;
        config.connection = simulator.connection_config();
        Some(simulator)
    } else {
        None
    };

    let harness = AcquisitionHarness::launch(&config).await?;
    info!(
        "Recording {:?} into {}",
        harness.families(),
        config.recording.output_dir.display()
    );

    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => info!("Duration elapsed"),
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupted");
        }
    }

    harness.stop();
    for report in harness.join().await? {
        info!(
            "{}: {} reads, {} rows, {} reconnects in {:.1?}",
            report.family, report.reads, report.rows_written, report.reconnects, report.elapsed
        );
    }
    Ok(())
}
