//! Dice rolls: evaluate, persist, and log into the event stream.

use chrono::Utc;
use serde::Deserialize;

use tableforge_core::{
    ActorId, CampaignId, EngineError, EngineResult, Roll, RollId, Visibility,
    event::EVENT_TYPE_ROLL,
};
use tableforge_infra::NewEvent;

use crate::{Engine, store_err};

#[derive(Debug, Clone, Deserialize)]
pub struct RollRequest {
    pub expr: String,
    pub reason: String,
    pub actor_id: ActorId,
}

impl Engine {
    /// Roll dice for an actor: the result is persisted as a `Roll` row and
    /// announced in the log as a public `roll` event.
    pub async fn roll(&self, campaign_id: &CampaignId, request: RollRequest) -> EngineResult<Roll> {
        let lock = self.lock_for(campaign_id);
        let _guard = lock.lock().await;

        self.require_campaign(campaign_id).await?;

        let outcome = tableforge_dice::roll(&request.expr)
            .map_err(|e| EngineError::bad_input(e.to_string()))?;

        let roll = Roll {
            id: RollId::new(),
            campaign_id: *campaign_id,
            actor_id: request.actor_id.clone(),
            expr: request.expr.clone(),
            reason: request.reason.clone(),
            result: outcome.result,
            breakdown: outcome.breakdown.clone(),
            created_at: Utc::now(),
        };
        self.store().insert_roll(roll.clone()).await.map_err(store_err)?;

        self.store()
            .append_event(NewEvent {
                campaign_id: *campaign_id,
                actor_id: request.actor_id,
                event_type: EVENT_TYPE_ROLL.to_string(),
                content: format!(
                    "Roll {} for {}: {}",
                    request.expr, request.reason, outcome.breakdown
                ),
                visibility: Visibility::Public,
            })
            .await
            .map_err(store_err)?;

        Ok(roll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{engine, standard_roster};

    async fn seeded() -> (crate::Engine, CampaignId) {
        let engine = engine();
        let created = engine
            .create_campaign("c".into(), standard_roster())
            .await
            .unwrap();
        (engine, created.campaign.id)
    }

    #[tokio::test]
    async fn roll_lands_in_range_and_logs_an_event() {
        let (engine, cid) = seeded().await;
        let roll = engine
            .roll(
                &cid,
                RollRequest {
                    expr: "1d20".to_string(),
                    reason: "attack".to_string(),
                    actor_id: ActorId::new("player1"),
                },
            )
            .await
            .unwrap();

        assert!((1..=20).contains(&roll.result));
        assert!(roll.breakdown.contains(&roll.result.to_string()));

        let events = engine
            .list_events(&cid, &ActorId::new("player1"), None)
            .await
            .unwrap();
        let logged = events
            .iter()
            .find(|e| e.event_type == EVENT_TYPE_ROLL)
            .expect("roll event");
        assert!(logged.content.contains("Roll 1d20 for attack:"));
        assert!(logged.content.contains(&roll.breakdown));
    }

    #[tokio::test]
    async fn malformed_expression_is_bad_input_and_logs_nothing() {
        let (engine, cid) = seeded().await;
        let err = engine
            .roll(
                &cid,
                RollRequest {
                    expr: "notadice".to_string(),
                    reason: "test".to_string(),
                    actor_id: ActorId::new("dm"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadInput(_)));

        let events = engine
            .list_events(&cid, &ActorId::new("dm"), None)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn roll_in_missing_campaign_is_not_found() {
        let (engine, _) = seeded().await;
        let err = engine
            .roll(
                &CampaignId::new(),
                RollRequest {
                    expr: "1d6".to_string(),
                    reason: "test".to_string(),
                    actor_id: ActorId::new("dm"),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
