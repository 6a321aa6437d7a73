//! Director: decides whether the current turn owner should act and, if so,
//! assembles everything the caller needs to drive it.
//!
//! Read-mostly with two side effects, both on the actor's read cursor. The
//! whole operation runs under the campaign lock so a concurrent append can
//! never slip between the cursor read and the cursor persist.

use serde::Serialize;
use serde_json::Value;

use tableforge_core::{
    Actor, ActorCursor, ActorId, ActorType, CampaignId, EngineError, EngineResult, Event, Memory,
    MemoryScope, event::EVENT_TYPE_SYSTEM_REFOCUS,
};

use crate::{Engine, store_err};

/// How many recent events the AI-player gate inspects for human input.
const HUMAN_INPUT_WINDOW: usize = 6;

/// How many trailing AI-authored events force a refocus.
const REFOCUS_TAIL: usize = 3;

pub const REASON_TURN_OWNER: &str = "turn_owner";
pub const REASON_REFOCUS: &str = "refocus";
pub const REASON_NO_TURN_OWNER: &str = "no_turn_owner";
pub const REASON_AWAIT_HUMAN_INPUT: &str = "await_human_input";

/// Memories grouped for the prompt, each bucket independently capped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DirectorMemories {
    pub world: Vec<Memory>,
    pub party: Vec<Memory>,
    pub private: Vec<Memory>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectorConstraints {
    pub must_ask_question: bool,
    pub max_output_sentences: u32,
}

/// The package returned to drive the next turn.
#[derive(Debug, Clone, Serialize)]
pub struct DirectorPackage {
    pub should_act: bool,
    pub actor_id: Option<ActorId>,
    pub actor_role: Option<ActorType>,
    pub reason: String,
    pub viewer_state: Value,
    pub visible_events: Vec<Event>,
    pub memories: DirectorMemories,
    pub constraints: DirectorConstraints,
}

impl DirectorPackage {
    fn declined(reason: &str) -> Self {
        Self {
            should_act: false,
            actor_id: None,
            actor_role: None,
            reason: reason.to_string(),
            viewer_state: Value::Object(Default::default()),
            visible_events: vec![],
            memories: DirectorMemories::default(),
            constraints: DirectorConstraints {
                must_ask_question: false,
                max_output_sentences: 6,
            },
        }
    }
}

impl Engine {
    /// Assemble the next acting context for the campaign's turn owner.
    pub async fn next_context(
        &self,
        campaign_id: &CampaignId,
        max_events: usize,
        max_memories: usize,
    ) -> EngineResult<DirectorPackage> {
        let lock = self.lock_for(campaign_id);
        let _guard = lock.lock().await;

        let campaign = self.require_campaign(campaign_id).await?;
        let actors = self
            .store()
            .list_actors(campaign_id)
            .await
            .map_err(store_err)?;

        // Step 1: resolve the speaker.
        let Some(actor) = actors.iter().find(|a| a.id == campaign.turn_owner).cloned() else {
            return Ok(DirectorPackage::declined(REASON_NO_TURN_OWNER));
        };

        // Step 2: gate AI players until a human has spoken recently or the
        // DM addressed them directly. DMs and humans are never gated.
        if actor.actor_type == ActorType::Player && actor.is_ai {
            let gated = !self.recent_human_input(campaign_id, &actors).await?
                && !self.directly_addressed(campaign_id, &actors, &actor).await?;
            if gated {
                return Ok(DirectorPackage::declined(REASON_AWAIT_HUMAN_INPUT));
            }
        }

        // Step 3: advance the cursor over the filtered log.
        let viewer_is_dm = actor.actor_type.is_dm();
        let mut cursor = match self
            .store()
            .get_cursor(campaign_id, &actor.id)
            .await
            .map_err(store_err)?
        {
            Some(cursor) => cursor,
            None => {
                let cursor = ActorCursor {
                    campaign_id: *campaign_id,
                    actor_id: actor.id.clone(),
                    last_seen_event_id: None,
                };
                self.store()
                    .upsert_cursor(cursor.clone())
                    .await
                    .map_err(store_err)?;
                cursor
            }
        };

        let visible_events: Vec<Event> = self
            .store()
            .list_events_after(campaign_id, cursor.last_seen_event_id.as_ref())
            .await
            .map_err(store_err)?
            .into_iter()
            .filter(|e| e.visibility.visible_to(&actor.id, viewer_is_dm))
            .take(max_events)
            .collect();

        // The cursor only ever lands on events the actor could see, so it
        // never skips past something it was not shown.
        if let Some(last) = visible_events.last() {
            cursor.last_seen_event_id = Some(last.id);
            self.store()
                .upsert_cursor(cursor)
                .await
                .map_err(store_err)?;
        }

        // Step 4: bucket the actor's readable memories.
        let memories = self
            .bucket_memories(campaign_id, &actor, viewer_is_dm, max_memories)
            .await?;

        // Step 5: refocus detection.
        let must_refocus = campaign.ai_only_streak >= REFOCUS_TAIL as u32
            || self.trailing_ai_events(campaign_id, &actors).await? >= REFOCUS_TAIL
            || self.last_event_is_refocus(campaign_id).await?;

        // Step 6: assemble.
        let viewer_state = self.campaign_state_locked(&campaign, &actors, &actor.id).await?;
        let viewer_state =
            serde_json::to_value(viewer_state).map_err(|e| EngineError::internal(e.to_string()))?;

        Ok(DirectorPackage {
            should_act: true,
            actor_id: Some(actor.id.clone()),
            actor_role: Some(actor.actor_type),
            reason: if must_refocus {
                REASON_REFOCUS.to_string()
            } else {
                REASON_TURN_OWNER.to_string()
            },
            viewer_state,
            visible_events,
            memories,
            constraints: DirectorConstraints {
                must_ask_question: must_refocus,
                max_output_sentences: 6,
            },
        })
    }

    /// Whether any of the last few events was authored by a non-AI actor.
    async fn recent_human_input(
        &self,
        campaign_id: &CampaignId,
        actors: &[Actor],
    ) -> EngineResult<bool> {
        let recent = self
            .store()
            .recent_events(campaign_id, HUMAN_INPUT_WINDOW)
            .await
            .map_err(store_err)?;
        Ok(recent.iter().any(|e| {
            actors
                .iter()
                .find(|a| a.id == e.actor_id)
                .is_some_and(|a| !a.is_ai)
        }))
    }

    /// Whether the latest DM-authored event mentions the actor by `@id` or
    /// by name, case-insensitively.
    async fn directly_addressed(
        &self,
        campaign_id: &CampaignId,
        actors: &[Actor],
        actor: &Actor,
    ) -> EngineResult<bool> {
        let dm_ids: Vec<&ActorId> = actors
            .iter()
            .filter(|a| a.actor_type.is_dm())
            .map(|a| &a.id)
            .collect();
        if dm_ids.is_empty() {
            return Ok(false);
        }

        let events = self
            .store()
            .list_events(campaign_id)
            .await
            .map_err(store_err)?;
        let Some(last_dm) = events.iter().rev().find(|e| dm_ids.contains(&&e.actor_id)) else {
            return Ok(false);
        };

        let content = last_dm.content.to_lowercase();
        let mention = format!("@{}", actor.id).to_lowercase();
        Ok(content.contains(&mention) || content.contains(&actor.name.to_lowercase()))
    }

    async fn bucket_memories(
        &self,
        campaign_id: &CampaignId,
        actor: &Actor,
        viewer_is_dm: bool,
        max_memories: usize,
    ) -> EngineResult<DirectorMemories> {
        let dm_omniscient = self.config().dm_omniscient_private;
        let readable = self
            .store()
            .list_memories(campaign_id, None)
            .await
            .map_err(store_err)?
            .into_iter()
            .filter(|m| m.readable_by(&actor.id, viewer_is_dm, dm_omniscient));

        // First-fit per bucket; overflow is dropped from that bucket only.
        let mut memories = DirectorMemories::default();
        for memory in readable {
            let bucket = match memory.scope {
                MemoryScope::World | MemoryScope::Public => &mut memories.world,
                MemoryScope::Party => &mut memories.party,
                MemoryScope::Private => &mut memories.private,
                _ => continue,
            };
            if bucket.len() < max_memories {
                bucket.push(memory);
            }
        }
        Ok(memories)
    }

    /// Length of the all-AI run at the tail of the log, capped at the
    /// refocus threshold. A missing author row (e.g. "system") breaks the run.
    async fn trailing_ai_events(
        &self,
        campaign_id: &CampaignId,
        actors: &[Actor],
    ) -> EngineResult<usize> {
        let recent = self
            .store()
            .recent_events(campaign_id, REFOCUS_TAIL)
            .await
            .map_err(store_err)?;
        let mut run = 0;
        for event in &recent {
            let is_ai = actors
                .iter()
                .find(|a| a.id == event.actor_id)
                .is_some_and(|a| a.is_ai);
            if is_ai {
                run += 1;
            } else {
                break;
            }
        }
        Ok(run)
    }

    async fn last_event_is_refocus(&self, campaign_id: &CampaignId) -> EngineResult<bool> {
        let last = self
            .store()
            .recent_events(campaign_id, 1)
            .await
            .map_err(store_err)?;
        Ok(last
            .first()
            .is_some_and(|e| e.event_type == EVENT_TYPE_SYSTEM_REFOCUS))
    }

    /// Campaign state built from data already loaded under the lock.
    async fn campaign_state_locked(
        &self,
        campaign: &tableforge_core::Campaign,
        actors: &[Actor],
        viewer: &ActorId,
    ) -> EngineResult<crate::state::CampaignState> {
        let viewer_is_dm = actors
            .iter()
            .find(|a| a.id == *viewer)
            .map(|a| a.actor_type.is_dm())
            .unwrap_or(false);

        let state_kv = self
            .store()
            .all_kv(&campaign.id)
            .await
            .map_err(store_err)?;
        let visible_events_count = self
            .store()
            .list_events(&campaign.id)
            .await
            .map_err(store_err)?
            .iter()
            .filter(|e| e.visibility.visible_to(viewer, viewer_is_dm))
            .count();

        Ok(crate::state::CampaignState {
            campaign_id: campaign.id,
            turn_owner: campaign.turn_owner.clone(),
            ai_only_streak: campaign.ai_only_streak,
            actors: actors.to_vec(),
            state_kv,
            visible_events_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCreate;
    use crate::memory::MemoryWrite;
    use crate::testing::{engine, engine_with, spec, standard_roster};
    use crate::EngineConfig;
    use tableforge_core::Visibility;

    async fn seeded() -> (crate::Engine, CampaignId) {
        let engine = engine();
        let created = engine
            .create_campaign("c".into(), standard_roster())
            .await
            .unwrap();
        (engine, created.campaign.id)
    }

    async fn say(engine: &crate::Engine, cid: &CampaignId, actor: &str, vis: &str, content: &str) {
        engine
            .append_event(
                cid,
                EventCreate {
                    actor_id: ActorId::new(actor),
                    event_type: "utterance".to_string(),
                    content: content.to_string(),
                    visibility: Visibility::parse(vis),
                },
            )
            .await
            .unwrap();
    }

    async fn remember(engine: &crate::Engine, cid: &CampaignId, actor: &str, scope: &str, text: &str) {
        engine
            .write_memory(
                cid,
                MemoryWrite {
                    actor_id: ActorId::new(actor),
                    scope: MemoryScope::parse(scope),
                    text: text.to_string(),
                    tags: vec![],
                },
            )
            .await
            .unwrap();
    }

    fn contents(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.content.as_str()).collect()
    }

    #[tokio::test]
    async fn cursor_advances_and_never_replays() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "event 1").await;
        say(&engine, &cid, "player1", "public", "event 2").await;

        let first = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(first.should_act);
        assert_eq!(first.actor_id, Some(ActorId::new("dm")));
        assert_eq!(contents(&first.visible_events), vec!["event 1", "event 2"]);

        let second = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(second.visible_events.is_empty());

        say(&engine, &cid, "human1", "public", "event 3").await;
        let third = engine.next_context(&cid, 50, 30).await.unwrap();
        assert_eq!(contents(&third.visible_events), vec!["event 3"]);
    }

    #[tokio::test]
    async fn max_events_caps_the_window_without_losing_history() {
        let (engine, cid) = seeded().await;
        for i in 0..5 {
            say(&engine, &cid, "dm", "public", &format!("e{i}")).await;
        }

        let first = engine.next_context(&cid, 2, 30).await.unwrap();
        assert_eq!(contents(&first.visible_events), vec!["e0", "e1"]);

        let second = engine.next_context(&cid, 2, 30).await.unwrap();
        assert_eq!(contents(&second.visible_events), vec!["e2", "e3"]);

        let third = engine.next_context(&cid, 2, 30).await.unwrap();
        assert_eq!(contents(&third.visible_events), vec!["e4"]);
    }

    #[tokio::test]
    async fn director_filters_private_context_for_player() {
        let engine = engine();
        let cid = engine
            .create_campaign(
                "c".into(),
                vec![
                    spec("dm", ActorType::Dm, true),
                    spec("player1", ActorType::Player, true),
                    spec("player2", ActorType::Player, true),
                ],
            )
            .await
            .unwrap()
            .campaign
            .id;

        // dm -> player1 so player1 is the speaker.
        let advance = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(advance.turn_owner, ActorId::new("player1"));

        say(&engine, &cid, "player2", "private:player2", "player2 secret").await;
        say(&engine, &cid, "player2", "party", "player2 party").await;
        say(&engine, &cid, "dm", "party", "@player1, react to this.").await;
        remember(&engine, &cid, "player2", "private", "player2 private memory").await;
        remember(&engine, &cid, "player2", "party", "player2 party memory").await;

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(package.should_act);
        let seen = contents(&package.visible_events);
        assert!(!seen.contains(&"player2 secret"));
        assert!(seen.contains(&"player2 party"));
        assert!(package.memories.private.is_empty());
        assert_eq!(package.memories.party.len(), 1);
    }

    #[tokio::test]
    async fn ai_player_blocked_until_addressed() {
        let engine = engine();
        let cid = engine
            .create_campaign(
                "c".into(),
                vec![
                    spec("dm", ActorType::Dm, true),
                    spec("player1", ActorType::Player, true),
                    spec("human", ActorType::Human, false),
                ],
            )
            .await
            .unwrap()
            .campaign
            .id;

        // dm -> human -> player1 (non-dm order is human, player1 by id).
        engine.advance_turn(&cid).await.unwrap();
        let advance = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(advance.turn_owner, ActorId::new("player1"));

        say(&engine, &cid, "dm", "public", "the cavern looms").await;

        let blocked = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(!blocked.should_act);
        assert_eq!(blocked.reason, REASON_AWAIT_HUMAN_INPUT);

        say(&engine, &cid, "dm", "party", "@player1 what do you do?").await;
        let allowed = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(allowed.should_act);
    }

    #[tokio::test]
    async fn ai_player_acts_after_recent_human_input() {
        let (engine, cid) = seeded().await;

        // dm -> human1 -> player1.
        engine.advance_turn(&cid).await.unwrap();
        let advance = engine.advance_turn(&cid).await.unwrap();
        assert_eq!(advance.turn_owner, ActorId::new("player1"));

        say(&engine, &cid, "human1", "public", "I kick the door").await;
        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(package.should_act);
    }

    #[tokio::test]
    async fn address_by_name_is_case_insensitive() {
        let engine = engine();
        let cid = engine
            .create_campaign(
                "c".into(),
                vec![
                    spec("dm", ActorType::Dm, true),
                    crate::campaigns::ActorSpec {
                        id: "player1".into(),
                        name: "Thorin".to_string(),
                        actor_type: ActorType::Player,
                        is_ai: true,
                    },
                    spec("human", ActorType::Human, false),
                ],
            )
            .await
            .unwrap()
            .campaign
            .id;

        engine.advance_turn(&cid).await.unwrap();
        engine.advance_turn(&cid).await.unwrap();

        say(&engine, &cid, "dm", "public", "THORIN, the troll turns to you").await;
        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(package.should_act);
    }

    #[tokio::test]
    async fn dm_is_never_gated() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "only AI spoke").await;
        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(package.should_act);
        assert_eq!(package.actor_role, Some(ActorType::Dm));
    }

    #[tokio::test]
    async fn missing_turn_owner_declines() {
        let engine = engine();
        let cid = engine
            .create_campaign("c".into(), vec![])
            .await
            .unwrap()
            .campaign
            .id;
        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(!package.should_act);
        assert_eq!(package.reason, REASON_NO_TURN_OWNER);
        assert!(package.visible_events.is_empty());
    }

    #[tokio::test]
    async fn missing_campaign_is_not_found() {
        let (engine, _) = seeded().await;
        let err = engine
            .next_context(&CampaignId::new(), 50, 30)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn refocus_reason_after_ai_streak() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "AI 1").await;
        engine.advance_turn(&cid).await.unwrap();
        say(&engine, &cid, "player1", "public", "AI 2").await;
        engine.advance_turn(&cid).await.unwrap();
        say(&engine, &cid, "dm", "public", "AI 3").await;
        engine.advance_turn(&cid).await.unwrap();

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert_eq!(package.reason, REASON_REFOCUS);
        assert!(package.constraints.must_ask_question);
        assert_eq!(package.constraints.max_output_sentences, 6);
    }

    #[tokio::test]
    async fn three_trailing_ai_events_force_refocus_without_advance() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "AI 1").await;
        say(&engine, &cid, "player1", "public", "AI 2").await;
        say(&engine, &cid, "dm", "public", "AI 3").await;

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert_eq!(package.reason, REASON_REFOCUS);
    }

    #[tokio::test]
    async fn two_ai_events_do_not_refocus() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "AI 1").await;
        say(&engine, &cid, "player1", "public", "AI 2").await;

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert_eq!(package.reason, REASON_TURN_OWNER);
        assert!(!package.constraints.must_ask_question);
    }

    #[tokio::test]
    async fn memory_buckets_group_and_cap() {
        let (engine, cid) = seeded().await;
        remember(&engine, &cid, "dm", "world", "w1").await;
        remember(&engine, &cid, "dm", "public", "w2").await;
        remember(&engine, &cid, "dm", "party", "p1").await;
        remember(&engine, &cid, "dm", "private", "dm own secret").await;
        remember(&engine, &cid, "dm", "dm_only", "gm notes").await;

        let package = engine.next_context(&cid, 50, 1).await.unwrap();
        // world bucket capped at 1, party fits, dm_only never bucketed.
        assert_eq!(package.memories.world.len(), 1);
        assert_eq!(package.memories.world[0].text, "w1");
        assert_eq!(package.memories.party.len(), 1);
        assert_eq!(package.memories.private.len(), 1);
    }

    #[tokio::test]
    async fn non_omniscient_dm_gets_no_foreign_private_memories() {
        let engine = engine_with(EngineConfig {
            dm_omniscient_private: false,
            ..EngineConfig::default()
        });
        let cid = engine
            .create_campaign("c".into(), standard_roster())
            .await
            .unwrap()
            .campaign
            .id;

        say(&engine, &cid, "player1", "private:player1", "hidden from dm").await;
        remember(&engine, &cid, "player1", "private", "hidden memory from dm").await;

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert!(package.memories.private.is_empty());
        // The private *event* stays visible: DM omniscience over events is
        // unconditional, only memories honor the toggle.
        assert_eq!(contents(&package.visible_events), vec!["hidden from dm"]);
    }

    #[tokio::test]
    async fn viewer_state_reports_visible_count() {
        let (engine, cid) = seeded().await;
        say(&engine, &cid, "dm", "public", "a").await;
        say(&engine, &cid, "dm", "dm_only", "b").await;

        let package = engine.next_context(&cid, 50, 30).await.unwrap();
        assert_eq!(package.viewer_state["visible_events_count"], 2);
        assert_eq!(package.viewer_state["turn_owner"], "dm");
    }
}
