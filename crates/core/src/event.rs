//! Events and the event visibility lattice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ActorId, CampaignId, EventId};

/// Event types with reserved meaning. Any other string is legal.
pub const EVENT_TYPE_ROLL: &str = "roll";
pub const EVENT_TYPE_SYSTEM_REFOCUS: &str = "system_refocus";
pub const EVENT_TYPE_UTTERANCE: &str = "utterance";

/// Who may see an event.
///
/// Serialized to/from the wire strings `public`, `party`, `dm_only` and
/// `private:<actor_id>`. Anything else is preserved as `Other` and is
/// visible to no one — unknown labels fail closed rather than leaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Visibility {
    Public,
    Party,
    DmOnly,
    Private(ActorId),
    Other(String),
}

impl Visibility {
    /// The event visibility table: `public` and `party` are visible to
    /// everyone, `dm_only` to DMs, `private:<X>` to X and to DMs.
    pub fn visible_to(&self, viewer: &ActorId, viewer_is_dm: bool) -> bool {
        match self {
            Visibility::Public | Visibility::Party => true,
            Visibility::DmOnly => viewer_is_dm,
            Visibility::Private(target) => viewer == target || viewer_is_dm,
            Visibility::Other(_) => false,
        }
    }

    pub fn as_wire(&self) -> String {
        match self {
            Visibility::Public => "public".to_string(),
            Visibility::Party => "party".to_string(),
            Visibility::DmOnly => "dm_only".to_string(),
            Visibility::Private(actor) => format!("private:{actor}"),
            Visibility::Other(raw) => raw.clone(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "public" => Visibility::Public,
            "party" => Visibility::Party,
            "dm_only" => Visibility::DmOnly,
            _ => match raw.strip_prefix("private:") {
                Some(target) if !target.is_empty() => {
                    Visibility::Private(ActorId::new(target))
                }
                _ => Visibility::Other(raw.to_string()),
            },
        }
    }
}

impl From<Visibility> for String {
    fn from(value: Visibility) -> Self {
        value.as_wire()
    }
}

impl From<String> for Visibility {
    fn from(value: String) -> Self {
        Visibility::parse(&value)
    }
}

impl core::fmt::Display for Visibility {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.as_wire())
    }
}

/// An immutable entry in a campaign's append-only log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub campaign_id: CampaignId,
    pub actor_id: ActorId,
    pub event_type: String,
    pub content: String,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(id: &str) -> ActorId {
        ActorId::new(id)
    }

    #[test]
    fn public_and_party_visible_to_everyone() {
        for vis in [Visibility::Public, Visibility::Party] {
            assert!(vis.visible_to(&viewer("p1"), false));
            assert!(vis.visible_to(&viewer("gm"), true));
        }
    }

    #[test]
    fn dm_only_requires_dm_flag() {
        let vis = Visibility::DmOnly;
        assert!(vis.visible_to(&viewer("gm"), true));
        assert!(!vis.visible_to(&viewer("p1"), false));
    }

    #[test]
    fn private_visible_to_target_and_dm_only() {
        let vis = Visibility::Private(viewer("p1"));
        assert!(vis.visible_to(&viewer("p1"), false));
        assert!(vis.visible_to(&viewer("gm"), true));
        assert!(!vis.visible_to(&viewer("p2"), false));
    }

    #[test]
    fn unknown_visibility_fails_closed() {
        let vis = Visibility::parse("garbled");
        assert!(!vis.visible_to(&viewer("p1"), false));
        assert!(!vis.visible_to(&viewer("gm"), true));
    }

    #[test]
    fn private_with_empty_target_fails_closed() {
        let vis = Visibility::parse("private:");
        assert!(matches!(vis, Visibility::Other(_)));
        assert!(!vis.visible_to(&viewer("gm"), true));
    }

    #[test]
    fn wire_roundtrip() {
        for raw in ["public", "party", "dm_only", "private:p1", "weird"] {
            assert_eq!(Visibility::parse(raw).as_wire(), raw);
        }
    }

    #[test]
    fn serde_uses_wire_strings() {
        let vis: Visibility = serde_json::from_str("\"private:p1\"").unwrap();
        assert_eq!(vis, Visibility::Private(ActorId::new("p1")));
        assert_eq!(serde_json::to_string(&vis).unwrap(), "\"private:p1\"");
    }
}
