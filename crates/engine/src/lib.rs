//! The engine services: turn coordination, visibility-filtered reads, and
//! director package assembly over a [`Store`].
//!
//! One [`Engine`] instance serves every campaign. Operations on the same
//! campaign that read-modify-write (turn advance, director context, event
//! append, mutation batches) run under that campaign's lock from a
//! per-campaign lock registry; operations on different campaigns never
//! contend.

use std::sync::Arc;

use tableforge_core::{Campaign, CampaignId, EngineError, EngineResult};
use tableforge_infra::{Store, StoreError};

pub mod campaigns;
pub mod config;
pub mod director;
pub mod events;
mod locks;
pub mod memory;
pub mod rolls;
pub mod state;
pub mod turns;

pub use config::EngineConfig;

/// The turn-coordination and context-assembly engine.
pub struct Engine {
    store: Arc<dyn Store>,
    config: EngineConfig,
    locks: locks::CampaignLocks,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            locks: locks::CampaignLocks::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) fn lock_for(&self, campaign_id: &CampaignId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock_for(campaign_id)
    }

    /// Load a campaign or fail with the canonical not-found message.
    pub(crate) async fn require_campaign(&self, id: &CampaignId) -> EngineResult<Campaign> {
        self.store
            .get_campaign(id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| EngineError::campaign_not_found(id))
    }
}

pub(crate) fn store_err(err: StoreError) -> EngineError {
    EngineError::internal(err.to_string())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared fixtures for the service tests.

    use std::sync::Arc;

    use tableforge_core::ActorType;
    use tableforge_infra::InMemoryStore;

    use crate::campaigns::ActorSpec;
    use crate::{Engine, EngineConfig};

    pub fn engine() -> Engine {
        engine_with(EngineConfig::default())
    }

    pub fn engine_with(config: EngineConfig) -> Engine {
        Engine::new(Arc::new(InMemoryStore::new()), config)
    }

    pub fn spec(id: &str, actor_type: ActorType, is_ai: bool) -> ActorSpec {
        ActorSpec {
            id: id.into(),
            name: id.to_string(),
            actor_type,
            is_ai,
        }
    }

    /// The roster used by most scenarios: an AI DM, an AI player, a human.
    pub fn standard_roster() -> Vec<ActorSpec> {
        vec![
            spec("dm", ActorType::Dm, true),
            spec("player1", ActorType::Player, true),
            spec("human1", ActorType::Human, false),
        ]
    }
}
