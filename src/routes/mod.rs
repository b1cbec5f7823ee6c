pub mod ocr;

use crate::models::config::AppConfig;
use crate::models::roi::RoiLayout;
use crate::services::dispatcher::OcrDispatcher;
use crate::services::preprocessing::Preprocessor;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::Notify;

/// Shared handler state. Everything is immutable after startup except the
/// dispatcher's internal cursor and drain flag.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<OcrDispatcher>,
    pub preprocessor: Arc<Preprocessor>,
    pub layout: Arc<RoiLayout>,
    pub config: Arc<AppConfig>,
    /// Fired by the /shutdown endpoint; the serve loop listens on it.
    pub shutdown: Arc<Notify>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(ocr::health))
        .route("/ocr", post(ocr::run_ocr))
        .route("/recognize/level", post(ocr::recognize_level))
        .route("/recognize/exp", post(ocr::recognize_exp))
        .route("/recognize/hp_potion", post(ocr::recognize_hp_potion))
        .route("/recognize/mp_potion", post(ocr::recognize_mp_potion))
        .route("/shutdown", post(ocr::shutdown))
        .with_state(state)
}
