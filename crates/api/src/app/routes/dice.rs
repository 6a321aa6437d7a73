use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_engine::{Engine, rolls::RollRequest};

use crate::app::errors;
use crate::app::routes::common::parse_campaign_id;

pub async fn roll(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Json(body): Json<RollRequest>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.roll(&campaign_id, body).await {
        Ok(roll) => (StatusCode::OK, Json(roll)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
