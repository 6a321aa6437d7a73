use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use tableforge_core::EngineError;

pub fn engine_error_to_response(err: EngineError) -> axum::response::Response {
    match err {
        EngineError::NotFound(msg) => json_error(StatusCode::NOT_FOUND, msg),
        EngineError::BadInput(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        EngineError::Unauthorized => {
            json_error(StatusCode::FORBIDDEN, "Invalid or missing ENGINE_KEY")
        }
        EngineError::Internal(msg) => {
            tracing::error!("internal error: {msg}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, msg)
        }
    }
}

pub fn json_error(status: StatusCode, detail: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "detail": detail.into(),
        })),
    )
        .into_response()
}
