//! Engine configuration, read from the environment once at startup.

/// Process-wide engine configuration.
///
/// `dm_omniscient_private` is the only setting the visibility lattice
/// consults; everything else shapes turn management and auth.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pre-shared key expected in the `X-ENGINE-KEY` header.
    pub engine_key: String,
    /// Consecutive AI-authored turns tolerated before a refocus injection.
    pub ai_only_streak_limit: u32,
    /// Whether the DM reads players' private memories.
    pub dm_omniscient_private: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            engine_key: "dev-secret-key".to_string(),
            ai_only_streak_limit: 3,
            dm_omniscient_private: true,
        }
    }
}

impl EngineConfig {
    /// Read `ENGINE_KEY`, `AI_ONLY_STREAK_LIMIT` and `DM_OMNISCIENT_PRIVATE`
    /// from the environment, falling back to the defaults above.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let engine_key = std::env::var("ENGINE_KEY").unwrap_or_else(|_| {
            tracing::warn!("ENGINE_KEY not set; using insecure dev default");
            defaults.engine_key.clone()
        });

        let ai_only_streak_limit = std::env::var("AI_ONLY_STREAK_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.ai_only_streak_limit);

        let dm_omniscient_private = std::env::var("DM_OMNISCIENT_PRIVATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.dm_omniscient_private);

        Self {
            engine_key,
            ai_only_streak_limit,
            dm_omniscient_private,
        }
    }
}
