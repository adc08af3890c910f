use std::io::{self, BufReader};
use std::sync::mpsc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spectral_fingerprint::acquisition::{AcquisitionLoop, Shutdown, StopReason};
use spectral_fingerprint::args::Args;
use spectral_fingerprint::classifier::Classifier;
use spectral_fingerprint::config::AppConfig;
use spectral_fingerprint::display::ConsoleDisplay;
use spectral_fingerprint::history::RollingHistory;
use spectral_fingerprint::labeling::{spawn_command_reader, ConsolePrompt, LabelCoordinator, LabelRequest};
use spectral_fingerprint::serial_link::{list_ports, SerialLink, SerialPortConnector};
use spectral_fingerprint::store::FingerprintStore;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    if args.list {
        let ports = list_ports().context("Failed to enumerate serial ports")?;
        println!("Available Serial Ports:");
        println!("{:<24} | {:<40}", "Port", "Type");
        println!("{}", "-".repeat(60));
        for port in ports {
            println!("{:<24} | {:?}", port.port_name, port.port_type);
        }
        return Ok(());
    }

    // 0. Load Config
    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // 1. Fingerprint library (empty on missing or corrupt file)
    let store = FingerprintStore::load(&config.store.path);

    // 2. Serial link, fatal if the sensor is not there
    let connector = SerialPortConnector {
        path: config.serial.port.clone(),
        baud_rate: config.serial.baud_rate,
        timeout: config.serial.timeout(),
    };
    let link = SerialLink::open(connector).context("Serial connection error")?;

    // 3. Shutdown + operator input
    let shutdown = Shutdown::new();
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.trigger()).context("Failed to install interrupt handler")?;
    }

    let request = LabelRequest::new();
    let (tx_text, rx_text) = mpsc::channel::<String>();
    // Not joined on exit: it may be blocked on stdin.
    let _reader = spawn_command_reader(BufReader::new(io::stdin()), request.clone(), Some(tx_text), shutdown.clone())
        .context("Failed to start command reader")?;
    let labeling = LabelCoordinator::new(request, ConsolePrompt::new(rx_text, shutdown.clone()));

    // 4. Loop
    println!("{}", "Starting acquisition. Type 'l' + Enter to label an unknown object, Ctrl+C to exit.".green());
    let mut acquisition = AcquisitionLoop::new(
        link,
        store,
        labeling,
        ConsoleDisplay::new(config.output.show_values),
        shutdown,
    )
    .with_classifier(Classifier::new(config.classifier.distance_threshold))
    .with_history(RollingHistory::new(config.history.capacity))
    .with_forwarding(config.output.forward_results);

    match acquisition.run() {
        StopReason::Interrupted => info!("Gracefully shutting down..."),
        StopReason::LinkFailed => bail!("Serial link lost and could not be re-established"),
    }

    Ok(())
}
