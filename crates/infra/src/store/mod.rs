//! The storage seam: one trait, no storage assumptions.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use tableforge_core::{
    Actor, ActorCursor, ActorId, Campaign, CampaignId, Event, EventId, Memory, MemoryScope, Roll,
    Visibility,
};

pub mod in_memory;

#[cfg(feature = "postgres")]
pub mod postgres;

/// An event ready to be appended (id and timestamp not yet assigned).
///
/// The store allocates both so that `created_at` can be made strictly
/// monotonic against what is already persisted for the campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub event_type: String,
    pub content: String,
    pub visibility: Visibility,
}

/// A memory entry ready to be written (id and timestamp assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMemory {
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub scope: MemoryScope,
    pub text: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing store failure (connection, lock poisoning, constraint).
    #[error("store failure: {0}")]
    Backend(String),

    /// A stored value could not be decoded into its domain type.
    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }
}

/// Per-campaign persistent state: roster, append-only event log, memories,
/// rolls, key/value state, and actor read cursors.
///
/// Contract highlights (the engine relies on these):
/// - `append_event` assigns a `created_at` strictly greater than every
///   `created_at` already stored for that campaign, shifting the wall clock
///   forward by one microsecond when it would tie or regress.
/// - `list_events` / `list_events_after` return ascending
///   `(created_at, insertion_order)`; an unknown `after` id means "no
///   cursor" and returns the full log.
/// - Events, memories and rolls are never updated or deleted.
#[async_trait]
pub trait Store: Send + Sync {
    /// Create a campaign together with its full actor roster, atomically.
    async fn create_campaign(&self, campaign: Campaign, actors: Vec<Actor>)
    -> Result<(), StoreError>;

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, StoreError>;

    /// Persist the turn fields written by a turn advance.
    async fn update_campaign_turn(&self, campaign: &Campaign) -> Result<(), StoreError>;

    async fn list_actors(&self, campaign_id: &CampaignId) -> Result<Vec<Actor>, StoreError>;

    async fn get_actor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<Actor>, StoreError>;

    /// Append to the campaign's log. Serialized per campaign; the assigned
    /// timestamp is strictly monotonic within the campaign.
    async fn append_event(&self, event: NewEvent) -> Result<Event, StoreError>;

    /// Full log, ascending `(created_at, insertion_order)`. Raw — no
    /// visibility filtering at this layer.
    async fn list_events(&self, campaign_id: &CampaignId) -> Result<Vec<Event>, StoreError>;

    /// Events strictly after the referenced event's `created_at`. `None` or
    /// an unknown id returns the full log.
    async fn list_events_after(
        &self,
        campaign_id: &CampaignId,
        after: Option<&EventId>,
    ) -> Result<Vec<Event>, StoreError>;

    /// The most recent `limit` events, newest first.
    async fn recent_events(
        &self,
        campaign_id: &CampaignId,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError>;

    async fn insert_memory(&self, memory: NewMemory) -> Result<Memory, StoreError>;

    /// Memories ascending by `(created_at, insertion_order)`, optionally
    /// restricted to one scope. Raw — callers apply the lattice.
    async fn list_memories(
        &self,
        campaign_id: &CampaignId,
        scope: Option<&MemoryScope>,
    ) -> Result<Vec<Memory>, StoreError>;

    async fn insert_roll(&self, roll: Roll) -> Result<(), StoreError>;

    async fn get_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
    ) -> Result<Option<String>, StoreError>;

    async fn set_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError>;

    async fn all_kv(&self, campaign_id: &CampaignId)
    -> Result<BTreeMap<String, String>, StoreError>;

    async fn get_cursor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<ActorCursor>, StoreError>;

    async fn upsert_cursor(&self, cursor: ActorCursor) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> Store for Arc<S>
where
    S: Store + ?Sized,
{
    async fn create_campaign(
        &self,
        campaign: Campaign,
        actors: Vec<Actor>,
    ) -> Result<(), StoreError> {
        (**self).create_campaign(campaign, actors).await
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, StoreError> {
        (**self).get_campaign(id).await
    }

    async fn update_campaign_turn(&self, campaign: &Campaign) -> Result<(), StoreError> {
        (**self).update_campaign_turn(campaign).await
    }

    async fn list_actors(&self, campaign_id: &CampaignId) -> Result<Vec<Actor>, StoreError> {
        (**self).list_actors(campaign_id).await
    }

    async fn get_actor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<Actor>, StoreError> {
        (**self).get_actor(campaign_id, actor_id).await
    }

    async fn append_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        (**self).append_event(event).await
    }

    async fn list_events(&self, campaign_id: &CampaignId) -> Result<Vec<Event>, StoreError> {
        (**self).list_events(campaign_id).await
    }

    async fn list_events_after(
        &self,
        campaign_id: &CampaignId,
        after: Option<&EventId>,
    ) -> Result<Vec<Event>, StoreError> {
        (**self).list_events_after(campaign_id, after).await
    }

    async fn recent_events(
        &self,
        campaign_id: &CampaignId,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        (**self).recent_events(campaign_id, limit).await
    }

    async fn insert_memory(&self, memory: NewMemory) -> Result<Memory, StoreError> {
        (**self).insert_memory(memory).await
    }

    async fn list_memories(
        &self,
        campaign_id: &CampaignId,
        scope: Option<&MemoryScope>,
    ) -> Result<Vec<Memory>, StoreError> {
        (**self).list_memories(campaign_id, scope).await
    }

    async fn insert_roll(&self, roll: Roll) -> Result<(), StoreError> {
        (**self).insert_roll(roll).await
    }

    async fn get_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        (**self).get_kv(campaign_id, key).await
    }

    async fn set_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        (**self).set_kv(campaign_id, key, value).await
    }

    async fn all_kv(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        (**self).all_kv(campaign_id).await
    }

    async fn get_cursor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<ActorCursor>, StoreError> {
        (**self).get_cursor(campaign_id, actor_id).await
    }

    async fn upsert_cursor(&self, cursor: ActorCursor) -> Result<(), StoreError> {
        (**self).upsert_cursor(cursor).await
    }
}
