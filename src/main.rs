use exp_ocr_server::models::roi::RoiLayout;
use exp_ocr_server::routes::{router, AppState};
use exp_ocr_server::services::config::ConfigManager;
use exp_ocr_server::services::dispatcher::OcrDispatcher;
use exp_ocr_server::services::engine::{TesseractEngine, TextRecognizer};
use exp_ocr_server::services::pool::{EngineFactory, EnginePool};
use exp_ocr_server::services::preprocessing::Preprocessor;
use std::sync::Arc;
use tokio::sync::Notify;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("exp_ocr_server=info,tower_http=info")),
        )
        .init();

    let config = match ConfigManager::new() {
        Ok(manager) => {
            tracing::info!(path = %manager.config_file_path().display(), "loading configuration");
            manager.load().map_err(|e| format!("config error: {}", e))?
        }
        Err(e) => {
            tracing::warn!(error = %e, "config directory unavailable, using defaults");
            Default::default()
        }
    };
    config.validate().map_err(|e| format!("config error: {}", e))?;

    let engine_config = config.engine.clone();
    let factory: Arc<EngineFactory> = Arc::new(move |index| {
        tracing::info!(index, "loading recognition engine");
        Ok(Box::new(TesseractEngine::load(&engine_config)?) as Box<dyn TextRecognizer>)
    });

    let pool = Arc::new(EnginePool::initialize(config.engine.pool_size, factory).await?);
    let dispatcher = Arc::new(OcrDispatcher::new(
        Arc::clone(&pool),
        config.confidence.box_score_threshold,
    ));

    let shutdown = Arc::new(Notify::new());
    let state = AppState {
        dispatcher: Arc::clone(&dispatcher),
        preprocessor: Arc::new(Preprocessor::new(config.preprocessing.clone())),
        layout: Arc::new(RoiLayout::inventory_grid()),
        config: Arc::new(config.clone()),
        shutdown: Arc::clone(&shutdown),
    };

    // The overlay client runs in a webview on another origin.
    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr, "ocr server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    // Listener is closed; finish what is in flight before releasing the
    // engines.
    dispatcher.drain().await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal(notify: Arc<Notify>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("ctrl-c received"),
        _ = terminate => tracing::info!("sigterm received"),
        _ = notify.notified() => tracing::info!("shutdown endpoint triggered"),
    }
}
