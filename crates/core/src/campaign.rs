//! Campaigns and their actor rosters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CampaignId};

/// What kind of participant an actor is.
///
/// `Dm` and `Player` actors may be AI-driven; `Human` never is.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    Dm,
    Player,
    Human,
}

impl ActorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorType::Dm => "dm",
            ActorType::Player => "player",
            ActorType::Human => "human",
        }
    }

    pub fn is_dm(&self) -> bool {
        matches!(self, ActorType::Dm)
    }
}

/// A named participant in a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub actor_type: ActorType,
    pub is_ai: bool,
}

/// A single session's persistent world: actors, log, memory, state.
///
/// `floor_lock`/`floor_lock_at` record who was handed the floor on the last
/// turn advance. Nothing reads them today; the write is kept for schema
/// compatibility with downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub state_json: String,
    pub turn_owner: ActorId,
    pub ai_only_streak: u32,
    pub floor_lock: Option<ActorId>,
    pub floor_lock_at: Option<DateTime<Utc>>,
}

/// The canonical turn order: DM actors sorted by id, then everyone else
/// sorted by id.
///
/// This is deliberately not creation order — it pins the DM to position 0
/// so a fresh campaign always opens on the DM's turn, and it is stable
/// under roster listing order.
pub fn canonical_turn_order(actors: &[Actor]) -> Vec<ActorId> {
    let mut dms: Vec<&Actor> = actors.iter().filter(|a| a.actor_type.is_dm()).collect();
    let mut rest: Vec<&Actor> = actors.iter().filter(|a| !a.actor_type.is_dm()).collect();
    dms.sort_by(|a, b| a.id.cmp(&b.id));
    rest.sort_by(|a, b| a.id.cmp(&b.id));
    dms.into_iter().chain(rest).map(|a| a.id.clone()).collect()
}
