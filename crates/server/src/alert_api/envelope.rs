//! The `{success, message?, data?, error?}` envelope every alert-API
//! handler responds with (§6).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use stupid_alert_engine::EngineError;
use stupid_core::store::StoreError;

#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope { success: true, message: None, data: Some(data), error: None }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Envelope { success: true, message: Some(message.into()), data: Some(data), error: None }
    }
}

impl Envelope<()> {
    pub fn failed(error: impl Into<String>) -> Self {
        Envelope { success: false, message: None, data: None, error: Some(error.into()) }
    }
}

/// Maps engine/store failures to HTTP status per §7's propagation policy:
/// validation → 400, not-found → 404, everything else → 500/503.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(Envelope::<()>::failed(self.message))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        match &e {
            EngineError::Validation(_) => ApiError { status: StatusCode::BAD_REQUEST, message: e.to_string() },
            EngineError::Store(se) if se.is_not_found() => {
                ApiError { status: StatusCode::NOT_FOUND, message: e.to_string() }
            }
            EngineError::AlreadyExists(_) => ApiError { status: StatusCode::CONFLICT, message: e.to_string() },
            EngineError::Stopped => {
                ApiError { status: StatusCode::SERVICE_UNAVAILABLE, message: e.to_string() }
            }
            EngineError::Store(_) => {
                ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: e.to_string() }
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            ApiError { status: StatusCode::NOT_FOUND, message: e.to_string() }
        } else {
            ApiError { status: StatusCode::INTERNAL_SERVER_ERROR, message: e.to_string() }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_404() {
        let err: ApiError = StoreError::NotFound("rule:x".into()).into();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn store_other_maps_to_500() {
        let err: ApiError = StoreError::Unavailable("connection refused".into()).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn engine_already_exists_maps_to_409() {
        let err: ApiError = EngineError::AlreadyExists("dup".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn engine_stopped_maps_to_503() {
        let err: ApiError = EngineError::Stopped.into();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn ok_envelope_omits_error_field() {
        let env = Envelope::ok(42);
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"], 42);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_envelope_omits_data_field() {
        let env = Envelope::<()>::failed("boom");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }
}
