//! Polyhouse Monitor
//!
//! Main entry point for the monitoring server.

use polyhouse_monitor::{
    alerts::AlertEngine,
    classifier::{AnalysisSuite, OfflineClassifier, RemoteClassifier, VisionClassifier},
    frame_buffer::FrameBuffer,
    frame_source::{self, FrameProducer, FrameSource, SyntheticSource, VideoFileSource},
    orchestrator::MonitorOrchestrator,
    realtime_hub::RealtimeHub,
    sensors::{MetricsSource, SimulatedSensors},
    state::{AppConfig, AppState},
    web_api,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polyhouse_monitor=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Polyhouse Monitor v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = AppConfig::default();
    tracing::info!(
        host = %config.host,
        port = config.port,
        video_path = %config.video_path.display(),
        greenhouse_id = %config.greenhouse_id,
        cycle_secs = config.cycle_secs,
        "Configuration loaded"
    );

    // Frame pipeline: shared buffer refilled by the background producer
    let frame_buffer = Arc::new(FrameBuffer::new(frame_source::placeholder()));

    let source: Box<dyn FrameSource> = match VideoFileSource::open(&config.video_path) {
        Ok(video) => Box::new(video),
        Err(e) => {
            tracing::warn!(error = %e, "Video source unavailable, degrading to synthetic frames");
            Box::new(SyntheticSource::new())
        }
    };
    let frame_mode = source.describe();

    let producer = Arc::new(FrameProducer::new(frame_buffer.clone()));
    producer.start(source).await;
    tracing::info!(source = frame_mode, "Frame producer started");

    // Vision classifier: remote model server, or permanent degraded mode
    let classifier: Arc<dyn VisionClassifier> = match &config.classifier_url {
        Some(url) => {
            tracing::info!(url = %url, "Using remote classifier");
            Arc::new(RemoteClassifier::new(url.clone()))
        }
        None => {
            tracing::warn!("CLASSIFIER_URL not set, classification runs in degraded mode");
            Arc::new(OfflineClassifier)
        }
    };
    let analysis = Arc::new(AnalysisSuite::new(classifier.clone()));

    // Sensor source: the simulated variant ships with the server; a live
    // hardware variant plugs in behind the same trait
    let simulator = Arc::new(SimulatedSensors::new(
        config.greenhouse_id.clone(),
        frame_buffer.clone(),
    ));
    let metrics_source: Arc<dyn MetricsSource> = simulator.clone();

    let hub = Arc::new(RealtimeHub::new());

    let orchestrator = Arc::new(
        MonitorOrchestrator::new(
            metrics_source,
            analysis,
            AlertEngine::default(),
            hub.clone(),
        )
        .with_period(Duration::from_secs(config.cycle_secs)),
    );
    orchestrator.start().await;
    tracing::info!("Orchestrator started");

    // Create application state
    let state = AppState {
        config: config.clone(),
        frame_buffer,
        producer: producer.clone(),
        hub,
        orchestrator: orchestrator.clone(),
        classifier,
        simulator: Some(simulator),
        frame_source: frame_mode,
    };

    let app = web_api::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    // Cooperative teardown: stop the cycle, then join the producer so the
    // visual source is released before exit
    orchestrator.stop().await;
    producer.stop().await;

    Ok(())
}
