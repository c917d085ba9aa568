//! CLI entry point for the blink link.
//!
//! Thin consumer of the library, mostly useful for bench testing a board
//! without the GUI:
//!
//! ```bash
//! blinkctl list
//! blinkctl get --port /dev/ttyUSB0
//! blinkctl set --port /dev/ttyUSB0 --interval 250
//! blinkctl monitor --port /dev/ttyUSB0
//! ```

use anyhow::{bail, Result};
use blink_link::protocol::{BLINK_MAX_MS, BLINK_MIN_MS};
use blink_link::{LinkSession, Settings};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blinkctl")]
#[command(about = "Serial control for the STM32 LED blink firmware", long_about = None)]
struct Cli {
    /// Optional TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available serial ports
    List,

    /// Query the current blink interval
    Get {
        /// Serial port, e.g. /dev/ttyUSB0 or COM3
        #[arg(long)]
        port: String,
    },

    /// Set the blink interval
    Set {
        #[arg(long)]
        port: String,

        /// Interval in milliseconds (50-2000)
        #[arg(long)]
        interval: u32,
    },

    /// Stream link traffic until Ctrl-C
    Monitor {
        #[arg(long)]
        port: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone())),
        )
        .init();

    match cli.command {
        Commands::List => list_ports(),
        Commands::Get { port } => get_interval(&port, settings).await,
        Commands::Set { port, interval } => set_interval(&port, interval, settings).await,
        Commands::Monitor { port } => monitor(&port, settings).await,
    }
}

fn list_ports() -> Result<()> {
    let ports = blink_link::ports::list_ports();
    if ports.is_empty() {
        println!("No serial ports detected");
    } else {
        for port in ports {
            println!("{}", port.identifier);
        }
    }
    Ok(())
}

async fn get_interval(port: &str, settings: Settings) -> Result<()> {
    let session = LinkSession::new(settings.link);
    let mut device = session.watch_device();

    session.connect(port).await?;
    session.request_speed().await?;

    // The report is fire-and-forget; give the device one timeout window.
    let reported = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if device.changed().await.is_err() {
                break None;
            }
            let state = *device.borrow();
            if state.confirmed {
                break Some(state.blink_interval_ms);
            }
        }
    })
    .await;

    session.disconnect().await?;

    match reported {
        Ok(Some(interval_ms)) => {
            println!("{interval_ms} ms");
            Ok(())
        }
        _ => bail!("No blink report received from {port}"),
    }
}

async fn set_interval(port: &str, interval: u32, settings: Settings) -> Result<()> {
    // The library encodes whatever it is given; validation is the
    // consumer's job, and this is the consumer.
    if !(BLINK_MIN_MS..=BLINK_MAX_MS).contains(&interval) {
        bail!("Interval must be between {BLINK_MIN_MS} and {BLINK_MAX_MS} ms");
    }

    let session = LinkSession::new(settings.link);
    session.connect(port).await?;
    session.set_speed(interval).await?;

    // Best-effort wait for the device echo before hanging up.
    let mut device = session.watch_device();
    let _ = tokio::time::timeout(Duration::from_secs(2), async {
        while !device.borrow().confirmed {
            if device.changed().await.is_err() {
                break;
            }
        }
    })
    .await;

    let state = session.device_state();
    session.disconnect().await?;

    if state.confirmed {
        println!("Device confirmed {} ms", state.blink_interval_ms);
    } else {
        println!("Sent BLINK={interval}, no confirmation received");
    }
    Ok(())
}

async fn monitor(port: &str, settings: Settings) -> Result<()> {
    let session = LinkSession::new(settings.link);
    let mut feed = session.subscribe_log();

    session.connect(port).await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            entry = feed.recv() => match entry {
                Ok(entry) => println!("{entry}"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    eprintln!("... {missed} entries dropped ...");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    session.disconnect().await?;
    Ok(())
}
