//! Request DTOs and JSON mapping helpers.
//!
//! Response bodies are mostly the core types serialized directly; the
//! helpers here cover the few shapes that combine several records.

use serde::Deserialize;

use tableforge_core::ActorId;
use tableforge_engine::campaigns::{ActorSpec, CampaignWithActors};
use tableforge_engine::state::MutationItem;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub actors: Vec<ActorSpec>,
}

#[derive(Debug, Deserialize)]
pub struct MutateRequest {
    /// Requesting actor; carried on the wire, the pipeline keys off payloads.
    pub actor_id: ActorId,
    pub mutations: Vec<MutationItem>,
}

#[derive(Debug, Deserialize)]
pub struct DirectorNextRequest {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_max_memories")]
    pub max_memories: usize,
}

fn default_max_events() -> usize {
    50
}

fn default_max_memories() -> usize {
    30
}

#[derive(Debug, Deserialize)]
pub struct ViewerQuery {
    pub viewer: ActorId,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub viewer: ActorId,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MemoryReadQuery {
    pub viewer: ActorId,
    pub scope: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn campaign_to_json(created: &CampaignWithActors) -> serde_json::Value {
    serde_json::json!({
        "id": created.campaign.id,
        "name": created.campaign.name,
        "created_at": created.campaign.created_at,
        "turn_owner": created.campaign.turn_owner,
        "ai_only_streak": created.campaign.ai_only_streak,
        "actors": created.actors,
    })
}
