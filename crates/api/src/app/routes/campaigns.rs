use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_engine::Engine;

use crate::app::routes::common::parse_campaign_id;
use crate::app::{dto, errors};

pub async fn create_campaign(
    Extension(engine): Extension<Arc<Engine>>,
    Json(body): Json<dto::CreateCampaignRequest>,
) -> axum::response::Response {
    match engine.create_campaign(body.name, body.actors).await {
        Ok(created) => (StatusCode::OK, Json(dto::campaign_to_json(&created))).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn get_state(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Query(query): Query<dto::ViewerQuery>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.campaign_state(&campaign_id, &query.viewer).await {
        Ok(state) => (StatusCode::OK, Json(state)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn mutate(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Json(body): Json<dto::MutateRequest>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.mutate(&campaign_id, body.mutations).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
