//! Campaign key/value state and per-actor read cursors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CampaignId, EventId};

/// One row of a campaign's key/value state (HP, inventory, flags, clock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateEntry {
    pub campaign_id: CampaignId,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Key conventions used by the mutation pipeline.
pub mod keys {
    use crate::id::ActorId;

    /// `hp:<actor_id>` — integer as text.
    pub fn hp(actor: &ActorId) -> String {
        format!("hp:{actor}")
    }

    /// `inventory:<actor_id>` — JSON array of item strings.
    pub fn inventory(actor: &ActorId) -> String {
        format!("inventory:{actor}")
    }

    /// `flag:<name>` — JSON scalar.
    pub fn flag(name: &str) -> String {
        format!("flag:{name}")
    }

    /// Free-form in-game clock.
    pub const TIME_CURRENT: &str = "time:current";
}

/// Where an actor's reading of the filtered log last stopped.
///
/// Created lazily on the first director request for the actor. Advances
/// forward only, in per-campaign event order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCursor {
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub last_seen_event_id: Option<EventId>,
}
