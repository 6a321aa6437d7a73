use axum::{
    Router,
    routing::{get, post},
};

pub mod campaigns;
pub mod common;
pub mod dice;
pub mod director;
pub mod events;
pub mod memory;
pub mod system;
pub mod turns;

/// Router for all key-protected endpoints, under `/v1/campaigns`.
pub fn router() -> Router {
    Router::new()
        .route("/v1/campaigns", post(campaigns::create_campaign))
        .route("/v1/campaigns/:campaign_id/state", get(campaigns::get_state))
        .route("/v1/campaigns/:campaign_id/mutate", post(campaigns::mutate))
        .route(
            "/v1/campaigns/:campaign_id/events",
            post(events::create_event).get(events::list_events),
        )
        .route("/v1/campaigns/:campaign_id/roll", post(dice::roll))
        .route(
            "/v1/campaigns/:campaign_id/memory/write",
            post(memory::write_memory),
        )
        .route(
            "/v1/campaigns/:campaign_id/memory/read",
            get(memory::read_memory),
        )
        .route(
            "/v1/campaigns/:campaign_id/turn/advance",
            post(turns::advance_turn),
        )
        .route(
            "/v1/campaigns/:campaign_id/director/next",
            post(director::director_next),
        )
}
