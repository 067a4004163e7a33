use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use feeder_core::actuator::StdDelay;
use feeder_core::{FeederConfig, SystemClock};
use feeder_server::sim::{SimulatedBattery, SimulatedButton, SimulatedNetwork, SimulatedServo};
use feeder_server::{FeederServer, FileSettings, Hardware, ServerConfig};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Network the simulated radio can join.
const SIMULATED_SSID: &str = "FeederSim";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,feeder_server=debug,feeder_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Fish feeder simulator starting...");

    let config = load_config()?;
    let addr = config.bind_addr;
    let ui_dir = config.ui_dir.clone();

    let storage = FileSettings::open(&config.settings_path)
        .with_context(|| format!("opening {}", config.settings_path.display()))?;
    let hardware = Hardware {
        actuator: Box::new(SimulatedServo::new()),
        battery: Box::new(SimulatedBattery::default()),
        network: Box::new(SimulatedNetwork::with_network(SIMULATED_SSID)),
        button: Box::new(SimulatedButton::new()),
        clock: Arc::new(SystemClock),
        delay: StdDelay,
    };

    let (handle, _feeder_thread) = FeederServer::new(config, Arc::new(storage), hardware).spawn()?;

    let mut app = feeder_web::create_router(handle);
    if let Some(dir) = ui_dir {
        tracing::info!("Serving web UI from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app.layer(TraceLayer::new_for_http());

    let http_handle = tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Failed to bind {}: {}", addr, e);
                return;
            }
        };
        tracing::info!("HTTP server listening on {}", addr);
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    tracing::info!("Feeder ready!");
    tracing::info!("   Status:   curl http://localhost:{}/api/status", addr.port());
    tracing::info!("   Feed now: curl http://localhost:{}/api/feedNow", addr.port());
    tracing::info!("   Join the simulated network with ssid={}", SIMULATED_SSID);

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Defaults, then `FEEDER_CONFIG` (a JSON `FeederConfig`), then the
/// `FEEDER_ADDR`, `FEEDER_SETTINGS` and `FEEDER_UI_DIR` overrides.
fn load_config() -> anyhow::Result<ServerConfig> {
    let mut config = ServerConfig::default();

    if let Ok(path) = std::env::var("FEEDER_CONFIG") {
        let text = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
        config.feeder =
            FeederConfig::from_json(&text).with_context(|| format!("parsing {}", path))?;
        tracing::info!("Loaded feeder configuration from {}", path);
    }
    if let Ok(addr) = std::env::var("FEEDER_ADDR") {
        config.bind_addr = addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid FEEDER_ADDR {}", addr))?;
    }
    if let Ok(path) = std::env::var("FEEDER_SETTINGS") {
        config.settings_path = PathBuf::from(path);
    }
    if let Ok(dir) = std::env::var("FEEDER_UI_DIR") {
        config.ui_dir = Some(PathBuf::from(dir));
    }

    tracing::debug!(?config, "Server configuration");
    Ok(config)
}
