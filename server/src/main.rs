use axum::{Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use ndpredict_server::{AppState, Config, api_routes};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application start time for uptime calculation
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Update gauges that are not tied to a request (called periodically)
fn update_gauge_metrics(state: &AppState) {
    metrics::gauge!("ndpredict_registry_objects").set(state.registry.len() as f64);
    let stats = state.chunk_cache.stats();
    metrics::gauge!("ndpredict_chunk_cache_entry_count").set(stats.entry_count as f64);

    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);
    metrics::gauge!("ndpredict_uptime_seconds").set(uptime as f64);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Record server start time
    START_TIME.set(Instant::now()).ok();

    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ndpredict=debug,ndpredict_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, workers={}, chunk_size={}",
        config.host, config.port, config.prediction.worker_threads, config.encoding.chunk_size
    );

    let app_state = AppState::from_config(&config)?;

    // Periodic update of gauge metrics (every 5 seconds)
    let metrics_state = app_state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            update_gauge_metrics(&metrics_state);
        }
    });

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/metrics/prometheus", get(prometheus_metrics))
        .merge(api_routes(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("ndpredict server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
