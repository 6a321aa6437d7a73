use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};

use tableforge_core::EventId;
use tableforge_engine::{Engine, events::EventCreate};

use crate::app::routes::common::parse_campaign_id;
use crate::app::{dto, errors};

pub async fn create_event(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Json(body): Json<EventCreate>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match engine.append_event(&campaign_id, body).await {
        Ok(event) => (StatusCode::OK, Json(event)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}

pub async fn list_events(
    Extension(engine): Extension<Arc<Engine>>,
    Path(campaign_id): Path<String>,
    Query(query): Query<dto::EventsQuery>,
) -> axum::response::Response {
    let campaign_id = match parse_campaign_id(&campaign_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // A cursor that does not parse cannot reference a stored event; treat
    // it as "no cursor" like any other unknown id.
    let after: Option<EventId> = query.after.as_deref().and_then(|raw| raw.parse().ok());

    match engine
        .list_events(&campaign_id, &query.viewer, after.as_ref())
        .await
    {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => errors::engine_error_to_response(e),
    }
}
