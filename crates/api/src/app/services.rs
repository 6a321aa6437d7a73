//! Store selection and engine construction.

use std::sync::Arc;

use tableforge_engine::{Engine, EngineConfig};
use tableforge_infra::InMemoryStore;

/// Build the engine over the configured store.
///
/// In-memory by default; `USE_PERSISTENT_STORE=true` selects Postgres when
/// the `postgres` feature is compiled in.
pub async fn build_engine(config: EngineConfig) -> Engine {
    let use_persistent = std::env::var("USE_PERSISTENT_STORE")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "postgres")]
        {
            return build_postgres_engine(config).await;
        }
        #[cfg(not(feature = "postgres"))]
        {
            tracing::warn!(
                "USE_PERSISTENT_STORE=true but postgres feature not enabled, falling back to in-memory"
            );
        }
    }

    Engine::new(Arc::new(InMemoryStore::new()), config)
}

#[cfg(feature = "postgres")]
async fn build_postgres_engine(config: EngineConfig) -> Engine {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORE=true");

    let store = tableforge_infra::PostgresStore::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    Engine::new(Arc::new(store), config)
}
