use crate::error::ApiError;
use crate::models::detection::{merge_text, Detection};
use crate::models::ocr_result::{ExpResult, LevelResult, PotionResult};
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use base64::Engine as _;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct OcrRequest {
    pub image_base64: String,
    /// Optional named layout region to crop before recognition.
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeRequest {
    pub image_base64: String,
    /// When true the image is a full client frame and the target region
    /// is cropped out of it; when false it is already a tight crop.
    #[serde(default)]
    pub full_frame: bool,
}

#[derive(Debug, Serialize)]
pub struct OcrResponse {
    pub boxes: Vec<Detection>,
    pub raw_text: String,
}

fn decode_base64_image(data: &str) -> Result<DynamicImage, ApiError> {
    // Clients sometimes send a data URL; only the payload matters.
    let payload = match data.split_once("base64,") {
        Some((_, rest)) => rest,
        None => data,
    };

    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 image: {}", e)))?;

    image::load_from_memory(&bytes)
        .map_err(|e| ApiError::BadRequest(format!("undecodable image data: {}", e)))
}

/// Preprocess, dispatch, and confidence-gate one crop. The shared tail of
/// every recognition endpoint.
async fn recognize(
    state: &AppState,
    image: DynamicImage,
) -> Result<(Vec<Detection>, String), ApiError> {
    let processed = state.preprocessor.preprocess(&image);
    let detections = state.dispatcher.submit(processed).await?;
    crate::services::parser::gate_confidence(&detections, state.config.confidence.min_confidence)?;
    let raw_text = merge_text(&detections);
    Ok((detections, raw_text))
}

/// Crop the region a potion slot occupies out of a full client frame.
fn crop_slot(state: &AppState, image: &DynamicImage, slot: &str) -> Result<DynamicImage, ApiError> {
    let roi = state
        .layout
        .map_region(slot, image.width(), image.height())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown inventory slot '{}'", slot)))?;
    Ok(roi.crop(image))
}

/// Raw recognition: detection boxes plus merged text, no field parsing.
/// The confidence gate does not apply here; callers asking for raw boxes
/// want to see the low-scoring reads too.
pub async fn run_ocr(
    State(state): State<AppState>,
    Json(request): Json<OcrRequest>,
) -> Result<Json<OcrResponse>, ApiError> {
    let image = decode_base64_image(&request.image_base64)?;

    let target = match request.region.as_deref() {
        Some(name) => {
            let roi = state
                .layout
                .map_region(name, image.width(), image.height())
                .ok_or_else(|| ApiError::BadRequest(format!("unknown region '{}'", name)))?;
            roi.crop(&image)
        }
        None => image,
    };

    let processed = state.preprocessor.preprocess(&target);
    let boxes = state.dispatcher.submit(processed).await?;
    let raw_text = merge_text(&boxes);

    Ok(Json(OcrResponse { boxes, raw_text }))
}

pub async fn recognize_level(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<LevelResult>, ApiError> {
    if request.full_frame {
        return Err(ApiError::BadRequest(
            "level recognition expects a pre-cropped image".to_string(),
        ));
    }

    let image = decode_base64_image(&request.image_base64)?;
    let (_, raw_text) = recognize(&state, image).await?;
    let level = crate::services::parser::parse_level(&raw_text, &state.config.parser)?;

    Ok(Json(LevelResult { level, raw_text }))
}

pub async fn recognize_exp(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<ExpResult>, ApiError> {
    if request.full_frame {
        return Err(ApiError::BadRequest(
            "exp recognition expects a pre-cropped image".to_string(),
        ));
    }

    let image = decode_base64_image(&request.image_base64)?;
    let (_, raw_text) = recognize(&state, image).await?;
    let exp = crate::services::parser::parse_exp(&raw_text)?;

    Ok(Json(ExpResult {
        absolute: exp.absolute,
        percentage: exp.percentage,
        raw_text,
    }))
}

pub async fn recognize_hp_potion(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<PotionResult>, ApiError> {
    let slot = state.config.potion.hp_potion_slot.clone();
    recognize_potion(state, request, &slot).await
}

pub async fn recognize_mp_potion(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<PotionResult>, ApiError> {
    let slot = state.config.potion.mp_potion_slot.clone();
    recognize_potion(state, request, &slot).await
}

async fn recognize_potion(
    state: AppState,
    request: RecognizeRequest,
    slot: &str,
) -> Result<Json<PotionResult>, ApiError> {
    let image = decode_base64_image(&request.image_base64)?;

    let target = if request.full_frame {
        crop_slot(&state, &image, slot)?
    } else {
        image
    };

    let (_, raw_text) = recognize(&state, target).await?;
    let count = crate::services::parser::parse_potion_count(&raw_text)?;

    Ok(Json(PotionResult { count, raw_text }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "engine": state.dispatcher.pool().engine_kind(),
        "pool_size": state.dispatcher.pool().len(),
        "confidence_threshold": state.config.confidence.min_confidence,
    }))
}

/// Remote shutdown used by the overlay client when it exits. The response
/// is sent before the listener stops; the drain happens after.
pub async fn shutdown(State(state): State<AppState>) -> Json<Value> {
    tracing::info!("shutdown requested over HTTP");
    state.shutdown.notify_one();
    Json(json!({ "status": "shutting down" }))
}
