//! Persisted dice rolls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CampaignId, RollId};

/// A dice roll as stored: the expression, why it was rolled, the total, and
/// the human-readable breakdown. The roll endpoint also appends a public
/// `roll` event so the result lands in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub id: RollId,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub expr: String,
    pub reason: String,
    pub result: i64,
    pub breakdown: String,
    pub created_at: DateTime<Utc>,
}
