use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use notification_cell::services::dispatch::NotificationService;
use notification_cell::services::tokens::ResponseTokenService;
use reschedule_cell::services::workflow::WorkflowEngine;
use scheduling_cell::services::calendar::CalendarProviderRegistry;
use scheduling_cell::services::slots::SlotGenerator;
use shared_config::AppConfig;
use shared_storage::{MemoryStorage, Storage};

const TOKEN_SWEEP_INTERVAL_SECS: u64 = 600;
const EXPIRY_SWEEP_INTERVAL_SECS: u64 = 3600;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting appointment reminder engine API");

    // Load configuration
    let config = AppConfig::from_env();

    // Wire the engine: in-memory storage, calendar adapters for whatever the
    // environment is configured with, and the default notification channels.
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let calendars = Arc::new(CalendarProviderRegistry::from_config(&config));
    let tokens = Arc::new(ResponseTokenService::new());
    let notifications = Arc::new(NotificationService::with_default_channels(Arc::clone(
        &tokens,
    )));
    let engine = Arc::new(WorkflowEngine::new(
        storage,
        SlotGenerator::new(),
        calendars,
        notifications,
    ));

    spawn_maintenance_tasks(Arc::clone(&engine), tokens);

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(engine)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.expect("failed to bind");
    axum::serve(listener, app).await.expect("server error");
}

/// Background sweeps: expired response tokens every ten minutes, stale
/// rescheduling requests every hour.
fn spawn_maintenance_tasks(engine: Arc<WorkflowEngine>, tokens: Arc<ResponseTokenService>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(TOKEN_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let evicted = tokens.sweep_expired().await;
            if evicted > 0 {
                info!(evicted, "token sweep evicted expired entries");
            }
        }
    });

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(EXPIRY_SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            match engine.process_expired_requests().await {
                Ok(expired) if expired > 0 => info!(expired, "expiry sweep resolved stale requests"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "expiry sweep failed"),
            }
        }
    });
}
