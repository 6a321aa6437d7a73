use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_engine::Engine;

use crate::app::errors;
use crate::app::routes::common::parse_campaign_id;

pub async fn advance_turn(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.advance_turn(&campaign_id).await {
        Ok(advance) => (StatusCode::OK, Json(advance)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
