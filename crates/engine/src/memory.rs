//! Memory service: scoped writes and lattice-filtered reads.

use serde::Deserialize;

use tableforge_core::{ActorId, CampaignId, EngineResult, Memory, MemoryScope};
use tableforge_infra::NewMemory;

use crate::{Engine, store_err};

/// A client-supplied memory entry.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryWrite {
    pub actor_id: ActorId,
    pub scope: MemoryScope,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Engine {
    /// Persist a memory. Unknown scopes are stored as-is but will never be
    /// returned to any reader.
    pub async fn write_memory(
        &self,
        campaign_id: &CampaignId,
        write: MemoryWrite,
    ) -> EngineResult<Memory> {
        self.require_campaign(campaign_id).await?;

        if let MemoryScope::Other(raw) = &write.scope {
            tracing::warn!(%campaign_id, scope = %raw, "memory written with unknown scope; it will be unreadable");
        }

        self.store()
            .insert_memory(NewMemory {
                campaign_id: *campaign_id,
                actor_id: write.actor_id,
                scope: write.scope,
                text: write.text,
                tags: write.tags,
            })
            .await
            .map_err(store_err)
    }

    /// Memories `viewer` may read, ascending by recency, optionally
    /// restricted to one scope.
    pub async fn read_memory(
        &self,
        campaign_id: &CampaignId,
        viewer: &ActorId,
        scope: Option<&MemoryScope>,
    ) -> EngineResult<Vec<Memory>> {
        self.require_campaign(campaign_id).await?;

        let viewer_is_dm = self
            .store()
            .get_actor(campaign_id, viewer)
            .await
            .map_err(store_err)?
            .map(|a| a.actor_type.is_dm())
            .unwrap_or(false);

        let memories = self
            .store()
            .list_memories(campaign_id, scope)
            .await
            .map_err(store_err)?;

        let dm_omniscient = self.config().dm_omniscient_private;
        Ok(memories
            .into_iter()
            .filter(|m| m.readable_by(viewer, viewer_is_dm, dm_omniscient))
            .collect())
    }
}
