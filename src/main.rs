//! ibbq-web - iBBQ bluetooth thermometer web interface.
//!
//! Run with: `cargo run --bin ibbq-web -- --config ibbqweb.json`

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use ibbq_rust_ble::config::DEFAULT_CONFIG_PATH;
use ibbq_rust_ble::web::{self, AppState, PoweroffHook};
use ibbq_rust_ble::{BleTransport, Config, DeviceAddress, DeviceEvent, DeviceManager, DeviceSession};

/// iBBQ bluetooth thermometer web interface.
#[derive(Parser, Debug)]
#[command(name = "ibbq-web")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Thermometer address (overrides config).
    #[arg(short, long)]
    address: Option<DeviceAddress>,

    /// HTTP port (overrides config).
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory of static viewer files (overrides config).
    #[arg(short, long)]
    webroot: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `ibbq_rust_ble=trace` (overrides RUST_LOG).
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = match &args.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load configuration, writing the file back normalized
    let file_config = Config::load_or_default(&args.config)?;
    if args.config.exists() {
        if let Err(e) = file_config.save(&args.config) {
            warn!("Could not rewrite {}: {}", args.config.display(), e);
        }
    }

    // Override config with CLI args
    let mut config = file_config.clone();
    if let Some(address) = args.address {
        config.address = Some(address);
    }
    if let Some(port) = args.port {
        config.http_port = port;
    }
    if let Some(webroot) = args.webroot {
        config.webroot = Some(webroot);
    }

    config.validate()?;

    // Certificates are read once; replacing them needs a restart
    let tls = match config.tls_paths() {
        Some((cert, key)) => Some(web::load_tls(cert, key).await.with_context(|| {
            format!(
                "Failed to load TLS certificate {} and key {}",
                cert.display(),
                key.display()
            )
        })?),
        None => None,
    };

    // Device session and reconnect loop
    let transport = BleTransport::new()
        .await
        .context("Bluetooth is required")?;
    let mut session = DeviceSession::new(transport).with_unit(config.unit);
    if let Some(address) = &config.address {
        info!("Using thermometer at {}", address);
        session = session.with_address(address.clone());
    }
    let session = Arc::new(session);

    let log_sink = tokio::spawn(log_events(session.subscribe_events()));
    let persist = {
        let path = args.config.clone();
        let file_config = Mutex::new(file_config);
        session.on_event(move |event| persist_unit(event, &path, &file_config))
    };

    let manager = DeviceManager::new(session.clone()).with_address(config.address.clone());

    // Web server
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let state = AppState {
        device: session.clone(),
        presets: Arc::new(config.alarm_presets.clone()),
        poweroff: config.allow_poweroff.then(poweroff_hook),
        shutdown: stop_rx,
    };
    let app = web::router(state, config.webroot.as_deref());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let shutdown = {
        let stop_tx = stop_tx.clone();
        async move {
            shutdown_signal().await;
            info!("Shutting down");
            let _ = stop_tx.send(true);
        }
    };

    match tls {
        Some(tls) => {
            info!("Listening on https://{}", addr);
            manager.start();
            web::serve_tls(addr, tls, app, shutdown)
                .await
                .with_context(|| format!("HTTPS server on {} failed", addr))?;
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to listen on {}", addr))?;
            info!("Listening on http://{}", addr);
            manager.start();
            web::serve(listener, app, shutdown).await?;
        }
    }

    if let Err(e) = manager.stop().await {
        warn!("Error while disconnecting: {}", e);
    }
    persist.unregister();
    log_sink.abort();

    Ok(())
}

/// Render device events into the log.
async fn log_events(mut events: broadcast::Receiver<DeviceEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Event log fell behind, {} events dropped", missed);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event {
            DeviceEvent::Connected { address } => info!("Connected to {}", address),
            DeviceEvent::Disconnected { address } => match address {
                Some(address) => warn!("Disconnected from {}", address),
                None => warn!("Disconnected"),
            },
            DeviceEvent::AlarmRaised { probes } => warn!("ALARM: probes {:?}", probes),
            DeviceEvent::AlarmSilenced { until, from_device } => info!(
                "Alarm silenced until {} ({})",
                until.format("%H:%M:%S"),
                if from_device { "thermometer" } else { "viewer" }
            ),
            DeviceEvent::BatteryUpdated { level, .. } => info!("Battery: {}", level),
            DeviceEvent::BatteryCurveWarning {
                cur_voltage_mv,
                max_voltage_mv,
                reason,
            } => warn!(
                "Battery curve warning ({} of {} mV): {}",
                cur_voltage_mv, max_voltage_mv, reason
            ),
            DeviceEvent::UnitChanged { unit } => info!("Unit changed to {}", unit),
            DeviceEvent::TargetTemperatureChanged { probe, target } => match target {
                Some(t) => info!("Probe {} alarm at {} C", probe, t.max_temp_c),
                None => info!("Probe {} alarm cleared", probe),
            },
            DeviceEvent::HistoryCleared => info!("History cleared"),
            DeviceEvent::Unrecognized { data } => debug!("Unrecognized notification {:02X?}", data),
        }
    }
}

/// Write a changed unit back to the config file.
fn persist_unit(event: &DeviceEvent, path: &Path, file_config: &Mutex<Config>) {
    let DeviceEvent::UnitChanged { unit } = event else {
        return;
    };

    let mut config = file_config.lock();
    if config.unit == *unit {
        return;
    }
    config.unit = *unit;
    match config.save(path) {
        Ok(()) => debug!("Saved unit {} to {}", unit, path.display()),
        Err(e) => warn!("Could not save unit: {}", e),
    }
}

fn poweroff_hook() -> PoweroffHook {
    Arc::new(|| {
        tokio::spawn(async {
            match tokio::process::Command::new("sudo")
                .arg("poweroff")
                .status()
                .await
            {
                Ok(status) if status.success() => info!("Poweroff requested"),
                Ok(status) => warn!("poweroff exited with {}", status),
                Err(e) => warn!("Failed to run poweroff: {}", e),
            }
        });
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
