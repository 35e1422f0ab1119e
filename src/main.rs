//! DrishtiIO - Sensor client daemon
//!
//! - `drishti-io scan`: broadcast an AutoIP scan and list what answered
//! - `drishti-io grab`: open a CoLa2 session on the control port, pull frames
//!   from the stream port and log statistics until Ctrl-C
//!
//! Settings come from a TOML file (`--config`); without one the defaults
//! target a sensor on its factory address.

use clap::{Parser, Subcommand};
use drishti_io::acquisition::{BlobStream, Frame, FrameGrabber};
use drishti_io::config::AppConfig;
use drishti_io::discovery;
use drishti_io::error::{Error, Result};
use drishti_io::protocol::SessionHandler;
use drishti_io::transport::{TcpConnector, TcpTransport};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Interval between statistics log lines in `grab`
const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "drishti-io")]
#[command(about = "Talk to networked depth sensors")]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover sensors on the local network
    Scan {
        /// Override the scan window in milliseconds
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
    /// Acquire frames until interrupted
    Grab {
        /// Override the sensor host
        #[arg(long)]
        host: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    // RUST_LOG wins over the configured level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("DrishtiIO v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        log::info!("Using config: {}", path);
    }

    match args.command {
        Commands::Scan { timeout_ms } => run_scan(&config, timeout_ms),
        Commands::Grab { host } => {
            let mut config = config;
            if let Some(host) = host {
                config.device.host = host;
            }
            run_grab(&config)
        }
    }
}

fn run_scan(config: &AppConfig, timeout_ms: Option<u64>) -> Result<()> {
    let timeout = timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.discovery.timeout());

    let devices = discovery::scan(
        timeout,
        &config.discovery.broadcast_address,
        config.discovery.port,
    )?;

    if devices.is_empty() {
        println!("No devices found");
    }
    for device in &devices {
        println!("{}", device);
    }
    Ok(())
}

fn run_grab(config: &AppConfig) -> Result<()> {
    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let control_address = config.device.control_address();
    log::info!("Connecting control channel to {}", control_address);
    let control = TcpTransport::connect(&control_address, config.device.connect_timeout())?;
    let mut session = SessionHandler::new(control);
    if !session.open_session(config.device.session_timeout_s) {
        return Err(Error::SessionRejected(format!(
            "device at {} refused the session",
            control_address
        )));
    }

    let connector = TcpConnector::new(
        config.device.stream_address(),
        config.device.connect_timeout(),
    );
    let stream = BlobStream::new(connector, config.acquisition.max_frame_size);
    let mut grabber = FrameGrabber::start(stream, &config.acquisition)?;

    log::info!("DrishtiIO running. Press Ctrl-C to stop.");

    let mut frame = Frame::default();
    let mut received: u64 = 0;
    let mut last_report = Instant::now();

    while running.load(Ordering::Relaxed) {
        if grabber.get_next_frame(&mut frame, config.acquisition.frame_timeout()) {
            received += 1;
            log::debug!(
                "Frame {} ({} bytes)",
                frame.sequence,
                frame.payload.len()
            );
        }

        if let Err(e) = session.keep_alive() {
            log::warn!("Keep-alive failed: {}", e);
        }

        if last_report.elapsed() >= STATS_INTERVAL {
            let stats = grabber.stats();
            log::info!(
                "Frames: {} consumed, {} published, {} overwritten | links: {} connects, {} failures, {} losses",
                received,
                stats.frames_published,
                stats.frames_overwritten,
                stats.connects,
                stats.connect_failures,
                stats.link_losses
            );
            last_report = Instant::now();
        }
    }

    grabber.stop()?;
    session.close_session();
    log::info!("DrishtiIO stopped");
    Ok(())
}
