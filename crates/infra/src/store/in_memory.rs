//! In-memory store.
//!
//! Intended for tests/dev. Not optimized for performance.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use tableforge_core::{
    Actor, ActorCursor, ActorId, Campaign, CampaignId, Event, EventId, Memory, MemoryId,
    MemoryScope, Roll,
};

use super::{NewEvent, NewMemory, Store, StoreError};

#[derive(Debug, Default)]
struct CampaignRecord {
    campaign: Option<Campaign>,
    actors: Vec<Actor>,
    events: Vec<Event>,
    memories: Vec<Memory>,
    rolls: Vec<Roll>,
    state_kv: BTreeMap<String, String>,
    cursors: HashMap<ActorId, ActorCursor>,
}

/// In-memory [`Store`] over per-campaign records.
///
/// Campaign records are append-only where the contract demands it (events,
/// memories, rolls are vecs in insertion order) and the event timestamp
/// shim runs under the same write lock as the append, so per-campaign
/// monotonicity holds without any extra coordination.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    campaigns: RwLock<HashMap<CampaignId, CampaignRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<CampaignId, CampaignRecord>>, StoreError>
    {
        self.campaigns
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<CampaignId, CampaignRecord>>, StoreError>
    {
        self.campaigns
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))
    }

    /// Wall clock shifted forward past `latest` when it would tie or regress.
    fn monotonic_now(latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let now = Utc::now();
        match latest {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        }
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_campaign(
        &self,
        campaign: Campaign,
        actors: Vec<Actor>,
    ) -> Result<(), StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns.entry(campaign.id).or_default();
        record.campaign = Some(campaign);
        record.actors = actors;
        Ok(())
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns.get(id).and_then(|r| r.campaign.clone()))
    }

    async fn update_campaign_turn(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns
            .get_mut(&campaign.id)
            .and_then(|r| r.campaign.as_mut())
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {}", campaign.id)))?;
        record.turn_owner = campaign.turn_owner.clone();
        record.ai_only_streak = campaign.ai_only_streak;
        record.floor_lock = campaign.floor_lock.clone();
        record.floor_lock_at = campaign.floor_lock_at;
        Ok(())
    }

    async fn list_actors(&self, campaign_id: &CampaignId) -> Result<Vec<Actor>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .map(|r| r.actors.clone())
            .unwrap_or_default())
    }

    async fn get_actor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<Actor>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .and_then(|r| r.actors.iter().find(|a| a.id == *actor_id).cloned()))
    }

    async fn append_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns
            .get_mut(&event.campaign_id)
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {}", event.campaign_id)))?;

        let created_at = Self::monotonic_now(record.events.last().map(|e| e.created_at));
        let stored = Event {
            id: EventId::new(),
            campaign_id: event.campaign_id,
            actor_id: event.actor_id,
            event_type: event.event_type,
            content: event.content,
            visibility: event.visibility,
            created_at,
        };
        record.events.push(stored.clone());
        Ok(stored)
    }

    async fn list_events(&self, campaign_id: &CampaignId) -> Result<Vec<Event>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .map(|r| r.events.clone())
            .unwrap_or_default())
    }

    async fn list_events_after(
        &self,
        campaign_id: &CampaignId,
        after: Option<&EventId>,
    ) -> Result<Vec<Event>, StoreError> {
        let campaigns = self.read()?;
        let Some(record) = campaigns.get(campaign_id) else {
            return Ok(vec![]);
        };

        // An unknown id means "no cursor": return everything rather than
        // silently hiding history.
        let after_ts = after.and_then(|id| {
            record
                .events
                .iter()
                .find(|e| e.id == *id)
                .map(|e| e.created_at)
        });

        Ok(match after_ts {
            Some(ts) => record
                .events
                .iter()
                .filter(|e| e.created_at > ts)
                .cloned()
                .collect(),
            None => record.events.clone(),
        })
    }

    async fn recent_events(
        &self,
        campaign_id: &CampaignId,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .map(|r| r.events.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn insert_memory(&self, memory: NewMemory) -> Result<Memory, StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns.get_mut(&memory.campaign_id).ok_or_else(|| {
            StoreError::backend(format!("unknown campaign: {}", memory.campaign_id))
        })?;

        let stored = Memory {
            id: MemoryId::new(),
            campaign_id: memory.campaign_id,
            actor_id: memory.actor_id,
            scope: memory.scope,
            text: memory.text,
            tags: memory.tags,
            created_at: Utc::now(),
        };
        record.memories.push(stored.clone());
        Ok(stored)
    }

    async fn list_memories(
        &self,
        campaign_id: &CampaignId,
        scope: Option<&MemoryScope>,
    ) -> Result<Vec<Memory>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .map(|r| {
                r.memories
                    .iter()
                    .filter(|m| scope.is_none_or(|s| m.scope == *s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert_roll(&self, roll: Roll) -> Result<(), StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns
            .get_mut(&roll.campaign_id)
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {}", roll.campaign_id)))?;
        record.rolls.push(roll);
        Ok(())
    }

    async fn get_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .and_then(|r| r.state_kv.get(key).cloned()))
    }

    async fn set_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {campaign_id}")))?;
        record.state_kv.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn all_kv(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .map(|r| r.state_kv.clone())
            .unwrap_or_default())
    }

    async fn get_cursor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<ActorCursor>, StoreError> {
        let campaigns = self.read()?;
        Ok(campaigns
            .get(campaign_id)
            .and_then(|r| r.cursors.get(actor_id).cloned()))
    }

    async fn upsert_cursor(&self, cursor: ActorCursor) -> Result<(), StoreError> {
        let mut campaigns = self.write()?;
        let record = campaigns.get_mut(&cursor.campaign_id).ok_or_else(|| {
            StoreError::backend(format!("unknown campaign: {}", cursor.campaign_id))
        })?;
        record.cursors.insert(cursor.actor_id.clone(), cursor);
        Ok(())
    }
}
