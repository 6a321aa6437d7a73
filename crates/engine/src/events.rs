//! Event log service: appends and visibility-filtered listing.
//!
//! The log itself is raw; filtering happens here at read time so that every
//! consumer (the events endpoint and the director) shares one code path.

use serde::Deserialize;

use tableforge_core::{ActorId, CampaignId, EngineResult, Event, EventId, Visibility};
use tableforge_infra::NewEvent;

use crate::{Engine, store_err};

/// A client-supplied event, before the store assigns id and timestamp.
#[derive(Debug, Clone, Deserialize)]
pub struct EventCreate {
    pub actor_id: ActorId,
    pub event_type: String,
    pub content: String,
    pub visibility: Visibility,
}

impl Engine {
    /// Append to a campaign's log. Serialized against turn advances and
    /// director calls on the same campaign.
    pub async fn append_event(
        &self,
        campaign_id: &CampaignId,
        create: EventCreate,
    ) -> EngineResult<Event> {
        let lock = self.lock_for(campaign_id);
        let _guard = lock.lock().await;

        self.require_campaign(campaign_id).await?;

        // A private event must target an existing actor. Warn but accept:
        // the event simply stays visible to the DM alone.
        if let Visibility::Private(target) = &create.visibility {
            let known = self
                .store()
                .get_actor(campaign_id, target)
                .await
                .map_err(store_err)?
                .is_some();
            if !known {
                tracing::warn!(%campaign_id, target = %target, "private event targets unknown actor");
            }
        }

        self.store()
            .append_event(NewEvent {
                campaign_id: *campaign_id,
                actor_id: create.actor_id,
                event_type: create.event_type,
                content: create.content,
                visibility: create.visibility,
            })
            .await
            .map_err(store_err)
    }

    /// Events visible to `viewer`, ascending, optionally after a cursor
    /// event. An unknown viewer gets the non-DM lens.
    pub async fn list_events(
        &self,
        campaign_id: &CampaignId,
        viewer: &ActorId,
        after: Option<&EventId>,
    ) -> EngineResult<Vec<Event>> {
        self.require_campaign(campaign_id).await?;

        let viewer_is_dm = self
            .store()
            .get_actor(campaign_id, viewer)
            .await
            .map_err(store_err)?
            .map(|a| a.actor_type.is_dm())
            .unwrap_or(false);

        let events = self
            .store()
            .list_events_after(campaign_id, after)
            .await
            .map_err(store_err)?;

        Ok(events
            .into_iter()
            .filter(|e| e.visibility.visible_to(viewer, viewer_is_dm))
            .collect())
    }
}
