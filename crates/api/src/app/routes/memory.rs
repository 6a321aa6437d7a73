use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_core::MemoryScope;
use tableforge_engine::{Engine, memory::MemoryWrite};

use crate::app::routes::common::parse_campaign_id;
use crate::app::{dto, errors};

pub async fn write_memory(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Json(body): Json<MemoryWrite>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.write_memory(&campaign_id, body).await {
        Ok(memory) => (StatusCode::OK, Json(memory)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn read_memory(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Query(query): Query<dto::MemoryReadQuery>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let scope = query.scope.as_deref().map(MemoryScope::parse);

    match engine
        .read_memory(&campaign_id, &query.viewer, scope.as_ref())
        .await
    {
        Ok(memories) => (StatusCode::OK, Json(memories)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
