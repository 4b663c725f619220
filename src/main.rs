//! Station Monitor - Main Entry Point
//!
//! Desktop dashboard for sensor stations. Pass `--mock` (or build with the
//! `mock-backend` feature) to run against the in-memory demo backend.

use anyhow::Context as _;
use station_monitor::{
    backend::{
        mock::{demo_sensors, spawn_demo_ingest},
        session::FileSessionStore,
        DashBackend, FrontendReceiver, MockBackend, RestBackend, SessionManager,
    },
    config::{ensure_app_data_dir, AppState, BackendConfig},
    StationMonitorApp,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Interval between generated readings in demo mode
const DEMO_INGEST_PERIOD: Duration = Duration::from_secs(5);

fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,station_monitor=debug"));

    // Daily log file next to the app state; console only if the data dir is unusable
    let (file_layer, guard) = match ensure_app_data_dir() {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join("logs"), "station-monitor.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!("File logging disabled: {}", e);
            (None, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

fn build_backend(use_mock: bool) -> anyhow::Result<(DashBackend, FrontendReceiver)> {
    if use_mock {
        tracing::info!("Using the in-memory demo backend");
        let mock = Arc::new(MockBackend::seeded_demo().context("Seeding demo backend")?);
        let ingest = mock.clone();
        let (backend, frontend) = DashBackend::new(mock);

        let backend = backend.with_background_task(Box::pin(async move {
            let cancel = CancellationToken::new();
            // Stops the ingest task when the worker drops this future
            let _guard = cancel.clone().drop_guard();
            if let Err(e) = spawn_demo_ingest(ingest, demo_sensors(), DEMO_INGEST_PERIOD, cancel).await {
                tracing::warn!("Demo ingest task ended abnormally: {}", e);
            }
        }));
        return Ok((backend, frontend));
    }

    let config = BackendConfig::load().context("Loading backend configuration")?;
    tracing::info!("Using backend at {}", config.url);
    let store = FileSessionStore::in_app_data_dir().context("Opening session store")?;
    let client = RestBackend::new(config, SessionManager::new(Box::new(store)))
        .context("Creating backend client")?;
    Ok(DashBackend::new(Arc::new(client)))
}

fn main() -> anyhow::Result<()> {
    let _log_guard = init_logging();

    tracing::info!("Starting Station Monitor");

    let use_mock = cfg!(feature = "mock-backend") || std::env::args().any(|arg| arg == "--mock");

    // Load application state (preferences, last view)
    let app_state = AppState::load_or_default();

    let (backend, frontend) = build_backend(use_mock)?;
    let stop = backend.stop_handle();
    let backend_handle = std::thread::Builder::new()
        .name("backend".into())
        .spawn(move || backend.run())
        .context("Spawning backend thread")?;

    // Configure eframe options
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("Station Monitor"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Station Monitor",
        native_options,
        Box::new(|cc| Ok(Box::new(StationMonitorApp::new(cc, frontend, app_state)))),
    );

    // Signal backend to stop and wait for it
    tracing::info!("Shutting down...");
    stop.store(false, std::sync::atomic::Ordering::SeqCst);
    if backend_handle.join().is_err() {
        tracing::error!("Backend thread panicked");
    }

    result.map_err(|e| anyhow::anyhow!("UI error: {}", e))
}
