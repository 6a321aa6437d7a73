//! Memory entries and the memory scope table.
//!
//! Scope is coarser than event visibility: it has no per-actor target, so a
//! `Private` memory belongs to its author. The one configuration-dependent
//! rule in the whole lattice lives here: whether the DM reads private
//! memories (`DM_OMNISCIENT_PRIVATE`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CampaignId, MemoryId};

/// Access-control label on a memory entry.
///
/// Unknown scopes are stored as `Other` and never returned to any reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum MemoryScope {
    World,
    Public,
    Party,
    Private,
    DmOnly,
    Other(String),
}

impl MemoryScope {
    pub fn as_wire(&self) -> String {
        match self {
            MemoryScope::World => "world".to_string(),
            MemoryScope::Public => "public".to_string(),
            MemoryScope::Party => "party".to_string(),
            MemoryScope::Private => "private".to_string(),
            MemoryScope::DmOnly => "dm_only".to_string(),
            MemoryScope::Other(raw) => raw.clone(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "world" => MemoryScope::World,
            "public" => MemoryScope::Public,
            "party" => MemoryScope::Party,
            "private" => MemoryScope::Private,
            "dm_only" => MemoryScope::DmOnly,
            _ => MemoryScope::Other(raw.to_string()),
        }
    }
}

impl From<MemoryScope> for String {
    fn from(value: MemoryScope) -> Self {
        value.as_wire()
    }
}

impl From<String> for MemoryScope {
    fn from(value: String) -> Self {
        MemoryScope::parse(&value)
    }
}

impl core::fmt::Display for MemoryScope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.as_wire())
    }
}

/// An immutable scoped memory entry.
///
/// `tags` are stored for downstream consumers; retrieval here is recency +
/// scope only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub id: MemoryId,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub scope: MemoryScope,
    pub text: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Memory {
    /// The memory scope table: `world`/`public`/`party` read by everyone,
    /// `dm_only` by DMs, `private` by the author — and by the DM only when
    /// `dm_omniscient_private` is on.
    pub fn readable_by(
        &self,
        viewer: &ActorId,
        viewer_is_dm: bool,
        dm_omniscient_private: bool,
    ) -> bool {
        match &self.scope {
            MemoryScope::World | MemoryScope::Public | MemoryScope::Party => true,
            MemoryScope::DmOnly => viewer_is_dm,
            MemoryScope::Private => {
                self.actor_id == *viewer || (viewer_is_dm && dm_omniscient_private)
            }
            MemoryScope::Other(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(author: &str, scope: MemoryScope) -> Memory {
        Memory {
            id: MemoryId::new(),
            campaign_id: CampaignId::new(),
            actor_id: ActorId::new(author),
            scope,
            text: "note".to_string(),
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn broad_scopes_readable_by_everyone() {
        for scope in [MemoryScope::World, MemoryScope::Public, MemoryScope::Party] {
            let m = memory("p1", scope);
            assert!(m.readable_by(&ActorId::new("p2"), false, true));
            assert!(m.readable_by(&ActorId::new("gm"), true, false));
        }
    }

    #[test]
    fn private_readable_by_author() {
        let m = memory("p1", MemoryScope::Private);
        assert!(m.readable_by(&ActorId::new("p1"), false, false));
        assert!(!m.readable_by(&ActorId::new("p2"), false, true));
    }

    #[test]
    fn dm_reads_private_only_when_omniscient() {
        let m = memory("p1", MemoryScope::Private);
        assert!(m.readable_by(&ActorId::new("gm"), true, true));
        assert!(!m.readable_by(&ActorId::new("gm"), true, false));
    }

    #[test]
    fn unknown_scope_readable_by_nobody() {
        let m = memory("p1", MemoryScope::Other("mystery".to_string()));
        assert!(!m.readable_by(&ActorId::new("p1"), false, true));
        assert!(!m.readable_by(&ActorId::new("gm"), true, true));
    }
}
