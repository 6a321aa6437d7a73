//! Pre-shared key authentication.
//!
//! Every request under `/v1` must carry the configured key in the
//! `X-ENGINE-KEY` header. There are no principals or roles; possession of
//! the key is the whole contract.

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, middleware::Next, response::Response};

use tableforge_core::EngineError;

use crate::app::errors;

pub const ENGINE_KEY_HEADER: &str = "x-engine-key";

#[derive(Clone)]
pub struct AuthState {
    pub engine_key: Arc<String>,
}

pub async fn engine_key_middleware(
    State(state): State<AuthState>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    match extract_key(req.headers()) {
        Some(key) if key == state.engine_key.as_str() => next.run(req).await,
        _ => errors::engine_error_to_response(EngineError::Unauthorized),
    }
}

fn extract_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(ENGINE_KEY_HEADER)?.to_str().ok()
}
