use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_engine::Engine;

use crate::app::routes::common::parse_campaign_id;
use crate::app::{dto, errors};

pub async fn director_next(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Json(body): Json<dto::DirectorNextRequest>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine
        .next_context(&campaign_id, body.max_events, body.max_memories)
        .await
    {
        Ok(package) => (StatusCode::OK, Json(package)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
