use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors raised by the recognition engines and their pool.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal at startup: the process must not serve traffic with a
    /// partially loaded pool.
    #[error("engine load failed: {0}")]
    Load(String),

    /// Per-request failure; does not affect other in-flight requests or
    /// the pool's health.
    #[error("inference failed: {0}")]
    Inference(String),

    /// New submissions are rejected once the drain has started.
    #[error("server is shutting down")]
    ShuttingDown,
}

/// Per-request parse and confidence failures. Always surfaced to the
/// caller, never retried; the caller owns retry policy.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("no digits found in raw text '{raw}'")]
    NoDigitsFound { raw: String },

    #[error("value {value} out of valid range {min}-{max} (raw text '{raw}')")]
    OutOfRange {
        value: u64,
        min: u64,
        max: u64,
        raw: String,
    },

    #[error("ambiguous format in raw text '{raw}'")]
    AmbiguousFormat { raw: String },

    #[error("aggregate confidence {aggregate:.3} below threshold {threshold:.3}")]
    LowConfidence { aggregate: f64, threshold: f64 },
}

impl ParseError {
    /// Stable machine-readable tag for the HTTP error body.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::NoDigitsFound { .. } => "no_digits_found",
            ParseError::OutOfRange { .. } => "out_of_range",
            ParseError::AmbiguousFormat { .. } => "ambiguous_format",
            ParseError::LowConfidence { .. } => "low_confidence",
        }
    }
}

/// Unified error type for the HTTP surface.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Parse(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Engine(EngineError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Parse(e) => e.kind(),
            ApiError::Engine(EngineError::ShuttingDown) => "shutting_down",
            ApiError::Engine(EngineError::Load(_)) => "engine_load_error",
            ApiError::Engine(EngineError::Inference(_)) => "inference_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = json!({
            "error": self.kind(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_kinds() {
        let err = ParseError::NoDigitsFound {
            raw: "LV.".to_string(),
        };
        assert_eq!(err.kind(), "no_digits_found");

        let err = ParseError::LowConfidence {
            aggregate: 0.5,
            threshold: 0.75,
        };
        assert_eq!(err.kind(), "low_confidence");
    }

    #[test]
    fn test_parse_error_detail_includes_raw_text() {
        let err = ParseError::OutOfRange {
            value: 0,
            min: 1,
            max: 300,
            raw: "LV. 0".to_string(),
        };
        assert!(err.to_string().contains("LV. 0"));
        assert!(err.to_string().contains("1-300"));
    }

    #[test]
    fn test_api_error_status_mapping() {
        let parse: ApiError = ParseError::AmbiguousFormat {
            raw: "???".to_string(),
        }
        .into();
        assert_eq!(parse.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let engine: ApiError = EngineError::Inference("boom".to_string()).into();
        assert_eq!(engine.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let draining: ApiError = EngineError::ShuttingDown.into();
        assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);

        let bad = ApiError::BadRequest("not base64".to_string());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
    }
}
