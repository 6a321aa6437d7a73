//! Campaign creation and lookup.
//!
//! A campaign is created with its full actor roster in one store
//! transaction; the core never adds or removes actors afterwards.

use chrono::Utc;
use serde::Deserialize;

use tableforge_core::{
    Actor, ActorId, ActorType, Campaign, CampaignId, EngineError, EngineResult,
    canonical_turn_order,
};

use crate::{Engine, store_err};

/// One roster entry in a campaign-creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct ActorSpec {
    pub id: ActorId,
    pub name: String,
    pub actor_type: ActorType,
    pub is_ai: bool,
}

/// A campaign together with its roster, as returned from creation.
#[derive(Debug, Clone)]
pub struct CampaignWithActors {
    pub campaign: Campaign,
    pub actors: Vec<Actor>,
}

impl Engine {
    /// Create a campaign with its roster. The initial turn owner is position
    /// 0 of the canonical order, which puts the first DM on the floor.
    pub async fn create_campaign(
        &self,
        name: String,
        roster: Vec<ActorSpec>,
    ) -> EngineResult<CampaignWithActors> {
        let mut actors: Vec<Actor> = Vec::with_capacity(roster.len());
        for spec in roster {
            if actors.iter().any(|a| a.id == spec.id) {
                return Err(EngineError::bad_input(format!(
                    "duplicate actor id: {}",
                    spec.id
                )));
            }

            // Humans are never AI; downgrade rather than reject.
            let is_ai = if spec.actor_type == ActorType::Human && spec.is_ai {
                tracing::warn!(actor = %spec.id, "human actor flagged is_ai; forcing false");
                false
            } else {
                spec.is_ai
            };

            actors.push(Actor {
                id: spec.id,
                name: spec.name,
                actor_type: spec.actor_type,
                is_ai,
            });
        }

        let dm_count = actors.iter().filter(|a| a.actor_type.is_dm()).count();
        if dm_count != 1 {
            tracing::warn!(dm_count, "campaign created without exactly one dm");
        }

        let order = canonical_turn_order(&actors);
        let campaign = Campaign {
            id: CampaignId::new(),
            name,
            created_at: Utc::now(),
            state_json: "{}".to_string(),
            turn_owner: order.first().cloned().unwrap_or_else(|| ActorId::new("")),
            ai_only_streak: 0,
            floor_lock: None,
            floor_lock_at: None,
        };

        self.store()
            .create_campaign(campaign.clone(), actors.clone())
            .await
            .map_err(store_err)?;

        Ok(CampaignWithActors { campaign, actors })
    }

    pub async fn campaign_with_actors(
        &self,
        campaign_id: &CampaignId,
    ) -> EngineResult<CampaignWithActors> {
        let campaign = self.require_campaign(campaign_id).await?;
        let actors = self
            .store()
            .list_actors(campaign_id)
            .await
            .map_err(store_err)?;
        Ok(CampaignWithActors { campaign, actors })
    }
}
