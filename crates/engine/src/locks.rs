//! Per-campaign lock registry.
//!
//! Turn advances, director cursor windows, event appends and mutation
//! batches are serialized per campaign. The
//! registry hands out one async mutex per campaign id, created on first
//! use and shared for the life of the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tableforge_core::CampaignId;

#[derive(Debug, Default)]
pub(crate) struct CampaignLocks {
    inner: Mutex<HashMap<CampaignId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CampaignLocks {
    pub(crate) fn lock_for(&self, campaign_id: &CampaignId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(*campaign_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_campaign_shares_one_lock() {
        let locks = CampaignLocks::default();
        let id = CampaignId::new();
        let a = locks.lock_for(&id);
        let b = locks.lock_for(&id);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_campaigns_do_not_share() {
        let locks = CampaignLocks::default();
        let a = locks.lock_for(&CampaignId::new());
        let b = locks.lock_for(&CampaignId::new());
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
