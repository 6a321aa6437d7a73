//! Turn management: round-robin ownership and the anti-ramble breaker.

use chrono::Utc;
use serde::Serialize;

use tableforge_core::{
    ActorId, CampaignId, EngineError, EngineResult, EventId, Visibility, canonical_turn_order,
    event::EVENT_TYPE_SYSTEM_REFOCUS,
};
use tableforge_infra::NewEvent;

use crate::{Engine, store_err};

/// Content of the synthetic event injected when AI actors have monopolised
/// the recent past.
pub const REFOCUS_CONTENT: &str =
    "[SYSTEM] Anti-ramble triggered: Human player, please take action.";

/// Result of one turn advance.
#[derive(Debug, Clone, Serialize)]
pub struct TurnAdvance {
    pub turn_owner: ActorId,
    pub ai_only_streak: u32,
    pub refocus_triggered: bool,
    pub last_event_id: Option<EventId>,
}

impl Engine {
    /// Advance the turn: update the AI-only streak from the latest event,
    /// inject a refocus event when the streak hits the limit, then hand the
    /// floor to the next actor in canonical order.
    pub async fn advance_turn(&self, campaign_id: &CampaignId) -> EngineResult<TurnAdvance> {
        let lock = self.lock_for(campaign_id);
        let _guard = lock.lock().await;

        let mut campaign = self.require_campaign(campaign_id).await?;

        let actors = self
            .store()
            .list_actors(campaign_id)
            .await
            .map_err(store_err)?;
        if actors.is_empty() {
            return Err(EngineError::not_found("No actors in campaign"));
        }
        let order = canonical_turn_order(&actors);

        let last_event = self
            .store()
            .recent_events(campaign_id, 1)
            .await
            .map_err(store_err)?
            .into_iter()
            .next();

        // The streak counts consecutive AI-authored tail events. A synthetic
        // author ("system") has no actor row and counts as non-AI.
        let mut streak = campaign.ai_only_streak;
        if let Some(last) = &last_event {
            let author_is_ai = actors
                .iter()
                .find(|a| a.id == last.actor_id)
                .map(|a| a.is_ai)
                .unwrap_or(false);
            if author_is_ai {
                streak += 1;
            } else {
                streak = 0;
            }
        }

        let mut refocus_triggered = false;
        if streak >= self.config().ai_only_streak_limit {
            refocus_triggered = true;
            self.store()
                .append_event(NewEvent {
                    campaign_id: *campaign_id,
                    actor_id: ActorId::system(),
                    event_type: EVENT_TYPE_SYSTEM_REFOCUS.to_string(),
                    content: REFOCUS_CONTENT.to_string(),
                    visibility: Visibility::Public,
                })
                .await
                .map_err(store_err)?;
            streak = 0;
        }

        let next_owner = match order.iter().position(|id| *id == campaign.turn_owner) {
            Some(idx) => order[(idx + 1) % order.len()].clone(),
            None => order[0].clone(),
        };

        campaign.turn_owner = next_owner.clone();
        campaign.ai_only_streak = streak;
        campaign.floor_lock = Some(next_owner.clone());
        campaign.floor_lock_at = Some(Utc::now());
        self.store()
            .update_campaign_turn(&campaign)
            .await
            .map_err(store_err)?;

        Ok(TurnAdvance {
            turn_owner: next_owner,
            ai_only_streak: streak,
            refocus_triggered,
            last_event_id: last_event.map(|e| e.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCreate;
    use crate::testing::{engine, standard_roster};

    async fn seeded() -> (crate::Engine, CampaignId) {
        let engine = engine();
        let created = engine
            .create_campaign("c".into(), standard_roster())
            .await
            .unwrap();
        (engine, created.campaign.id)
    }

    async fn say(engine: &crate::Engine, cid: &CampaignId, actor: &str, content: &str) {
        engine
            .append_event(
                cid,
                EventCreate {
                    actor_id: ActorId::new(actor),
                    event_type: "utterance".to_string(),
                    content: content.to_string(),
                    visibility: Visibility::Public,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn advance_cycles_in_canonical_order() {
        let (engine, cid) = seeded().await;

        // dm -> human1 -> player1 -> dm (non-dm actors sorted by id).
        let a = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(a.turn_owner, ActorId::new("human1"));
        let b = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(b.turn_owner, ActorId::new("player1"));
        let c = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(c.turn_owner, ActorId::new("dm"));
    }

    #[tokio::test]
    async fn streak_counts_ai_tail_events() {
        let (engine, cid) = seeded().await;

        say(&engine, &cid, "dm", "AI 1").await;
        let a = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(a.ai_only_streak, 1);
        assert!(!a.refocus_triggered);

        say(&engine, &cid, "player1", "AI 2").await;
        let b = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(b.ai_only_streak, 2);
    }

    #[tokio::test]
    async fn three_ai_turns_trigger_exactly_one_refocus() {
        let (engine, cid) = seeded().await;

        say(&engine, &cid, "dm", "AI 1").await;
        engine.advance_turn(&cid).await.unwrap();
        say(&engine, &cid, "player1", "AI 2").await;
        engine.advance_turn(&cid).await.unwrap();
        say(&engine, &cid, "dm", "AI 3").await;
        let third = engine.advance_turn(&cid).await.unwrap();

        assert!(third.refocus_triggered);
        assert_eq!(third.ai_only_streak, 0);

        let refocus: Vec<_> = engine
            .list_events(&cid, &ActorId::new("dm"), None)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| e.event_type == EVENT_TYPE_SYSTEM_REFOCUS)
            .collect();
        assert_eq!(refocus.len(), 1);
        assert_eq!(refocus[0].actor_id, ActorId::system());
        assert_eq!(refocus[0].visibility, Visibility::Public);
        assert_eq!(refocus[0].content, REFOCUS_CONTENT);
    }

    #[tokio::test]
    async fn human_event_resets_streak() {
        let (engine, cid) = seeded().await;

        say(&engine, &cid, "dm", "AI 1").await;
        engine.advance_turn(&cid).await.unwrap();
        say(&engine, &cid, "player1", "AI 2").await;
        engine.advance_turn(&cid).await.unwrap();

        say(&engine, &cid, "human1", "I open the door").await;
        let after_human = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(after_human.ai_only_streak, 0);
        assert!(!after_human.refocus_triggered);
    }

    #[tokio::test]
    async fn advance_reports_last_event_id() {
        let (engine, cid) = seeded().await;

        let empty = engine.advance_turn(&cid).await.unwrap();
        assert!(empty.last_event_id.is_none());

        say(&engine, &cid, "dm", "hello").await;
        let after = engine.advance_turn(&cid).await.unwrap();
        assert!(after.last_event_id.is_some());
    }

    #[tokio::test]
    async fn advancing_empty_campaign_fails() {
        let engine = engine();
        let created = engine.create_campaign("c".into(), vec![]).await.unwrap();
        let err = engine.advance_turn(&created.campaign.id).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(msg) if msg.contains("No actors")));
    }

    #[tokio::test]
    async fn floor_lock_follows_the_new_owner() {
        let (engine, cid) = seeded().await;
        let advance = engine.advance_turn(&cid).await.unwrap();
        let campaign = engine.campaign_with_actors(&cid).await.unwrap().campaign;
        assert_eq!(campaign.floor_lock, Some(advance.turn_owner));
        assert!(campaign.floor_lock_at.is_some());
    }
}
