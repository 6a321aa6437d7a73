//! Postgres-backed store.
//!
//! Persists campaigns, the append-only event log, memories, rolls, state
//! key/value rows and actor cursors. Appends and turn-field updates run in
//! transactions that lock the campaign row (`SELECT … FOR UPDATE`), so the
//! per-campaign single-writer discipline holds even when several engine
//! processes share one database.
//!
//! Timestamp monotonicity is enforced in SQL: an insert takes
//! `GREATEST(now(), latest + 1 microsecond)` under the campaign row lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use tableforge_core::{
    Actor, ActorCursor, ActorId, ActorType, Campaign, CampaignId, Event, EventId, Memory,
    MemoryId, MemoryScope, Roll, Visibility,
};

use super::{NewEvent, NewMemory, Store, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS campaigns (
    id UUID PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL,
    state_json TEXT NOT NULL DEFAULT '{}',
    turn_owner TEXT NOT NULL DEFAULT '',
    ai_only_streak INT NOT NULL DEFAULT 0,
    floor_lock TEXT,
    floor_lock_at TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS actors (
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    actor_type TEXT NOT NULL,
    is_ai BOOLEAN NOT NULL,
    PRIMARY KEY (campaign_id, id)
);

CREATE TABLE IF NOT EXISTS events (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    actor_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    content TEXT NOT NULL,
    visibility TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_campaign_created
    ON events (campaign_id, created_at, seq);

CREATE TABLE IF NOT EXISTS memories (
    seq BIGSERIAL PRIMARY KEY,
    id UUID NOT NULL UNIQUE,
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    actor_id TEXT NOT NULL,
    scope TEXT NOT NULL,
    text TEXT NOT NULL,
    tags JSONB NOT NULL DEFAULT '[]',
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS rolls (
    id UUID PRIMARY KEY,
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    actor_id TEXT NOT NULL,
    expr TEXT NOT NULL,
    reason TEXT NOT NULL,
    result BIGINT NOT NULL,
    breakdown TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS state_kv (
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (campaign_id, key)
);

CREATE TABLE IF NOT EXISTS actor_cursors (
    campaign_id UUID NOT NULL REFERENCES campaigns(id),
    actor_id TEXT NOT NULL,
    last_seen_event_id UUID,
    PRIMARY KEY (campaign_id, actor_id)
);
"#;

/// Postgres [`Store`].
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and create the schema if it does not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::backend(format!("{operation}: {err}"))
}

fn actor_type_from_str(raw: &str) -> Result<ActorType, StoreError> {
    match raw {
        "dm" => Ok(ActorType::Dm),
        "player" => Ok(ActorType::Player),
        "human" => Ok(ActorType::Human),
        other => Err(StoreError::decode(format!("actor_type: {other}"))),
    }
}

fn campaign_from_row(row: &PgRow) -> Result<Campaign, StoreError> {
    Ok(Campaign {
        id: CampaignId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        state_json: row.try_get("state_json").map_err(decode)?,
        turn_owner: ActorId::new(row.try_get::<String, _>("turn_owner").map_err(decode)?),
        ai_only_streak: u32::try_from(row.try_get::<i32, _>("ai_only_streak").map_err(decode)?)
            .map_err(|_| StoreError::decode("negative ai_only_streak"))?,
        floor_lock: row
            .try_get::<Option<String>, _>("floor_lock")
            .map_err(decode)?
            .map(ActorId::new),
        floor_lock_at: row.try_get("floor_lock_at").map_err(decode)?,
    })
}

fn actor_from_row(row: &PgRow) -> Result<Actor, StoreError> {
    Ok(Actor {
        id: ActorId::new(row.try_get::<String, _>("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        actor_type: actor_type_from_str(&row.try_get::<String, _>("actor_type").map_err(decode)?)?,
        is_ai: row.try_get("is_ai").map_err(decode)?,
    })
}

fn event_from_row(row: &PgRow) -> Result<Event, StoreError> {
    Ok(Event {
        id: EventId::from_uuid(row.try_get("id").map_err(decode)?),
        campaign_id: CampaignId::from_uuid(row.try_get("campaign_id").map_err(decode)?),
        actor_id: ActorId::new(row.try_get::<String, _>("actor_id").map_err(decode)?),
        event_type: row.try_get("event_type").map_err(decode)?,
        content: row.try_get("content").map_err(decode)?,
        visibility: Visibility::parse(&row.try_get::<String, _>("visibility").map_err(decode)?),
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn memory_from_row(row: &PgRow) -> Result<Memory, StoreError> {
    let tags: serde_json::Value = row.try_get("tags").map_err(decode)?;
    let tags: Vec<String> =
        serde_json::from_value(tags).map_err(|e| StoreError::decode(format!("tags: {e}")))?;
    Ok(Memory {
        id: MemoryId::from_uuid(row.try_get("id").map_err(decode)?),
        campaign_id: CampaignId::from_uuid(row.try_get("campaign_id").map_err(decode)?),
        actor_id: ActorId::new(row.try_get::<String, _>("actor_id").map_err(decode)?),
        scope: MemoryScope::parse(&row.try_get::<String, _>("scope").map_err(decode)?),
        text: row.try_get("text").map_err(decode)?,
        tags,
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn decode(err: sqlx::Error) -> StoreError {
    StoreError::decode(err.to_string())
}

#[async_trait]
impl Store for PostgresStore {
    async fn create_campaign(
        &self,
        campaign: Campaign,
        actors: Vec<Actor>,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("create_campaign", e))?;

        sqlx::query(
            r#"
            INSERT INTO campaigns
                (id, name, created_at, state_json, turn_owner, ai_only_streak, floor_lock, floor_lock_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(campaign.id.as_uuid())
        .bind(&campaign.name)
        .bind(campaign.created_at)
        .bind(&campaign.state_json)
        .bind(campaign.turn_owner.as_str())
        .bind(i32::try_from(campaign.ai_only_streak).unwrap_or(i32::MAX))
        .bind(campaign.floor_lock.as_ref().map(|a| a.as_str().to_string()))
        .bind(campaign.floor_lock_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_campaign", e))?;

        for actor in &actors {
            sqlx::query(
                r#"
                INSERT INTO actors (campaign_id, id, name, actor_type, is_ai)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(campaign.id.as_uuid())
            .bind(actor.id.as_str())
            .bind(&actor.name)
            .bind(actor.actor_type.as_str())
            .bind(actor.is_ai)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_campaign", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("create_campaign", e))
    }

    async fn get_campaign(&self, id: &CampaignId) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query("SELECT * FROM campaigns WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_campaign", e))?;
        row.as_ref().map(campaign_from_row).transpose()
    }

    async fn update_campaign_turn(&self, campaign: &Campaign) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("update_campaign_turn", e))?;

        sqlx::query("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
            .bind(campaign.id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_campaign_turn", e))?
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {}", campaign.id)))?;

        sqlx::query(
            r#"
            UPDATE campaigns
            SET turn_owner = $2, ai_only_streak = $3, floor_lock = $4, floor_lock_at = $5
            WHERE id = $1
            "#,
        )
        .bind(campaign.id.as_uuid())
        .bind(campaign.turn_owner.as_str())
        .bind(i32::try_from(campaign.ai_only_streak).unwrap_or(i32::MAX))
        .bind(campaign.floor_lock.as_ref().map(|a| a.as_str().to_string()))
        .bind(campaign.floor_lock_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_campaign_turn", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("update_campaign_turn", e))
    }

    async fn list_actors(&self, campaign_id: &CampaignId) -> Result<Vec<Actor>, StoreError> {
        let rows = sqlx::query("SELECT * FROM actors WHERE campaign_id = $1 ORDER BY id")
            .bind(campaign_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_actors", e))?;
        rows.iter().map(actor_from_row).collect()
    }

    async fn get_actor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<Actor>, StoreError> {
        let row = sqlx::query("SELECT * FROM actors WHERE campaign_id = $1 AND id = $2")
            .bind(campaign_id.as_uuid())
            .bind(actor_id.as_str())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_actor", e))?;
        row.as_ref().map(actor_from_row).transpose()
    }

    async fn append_event(&self, event: NewEvent) -> Result<Event, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("append_event", e))?;

        // Campaign row lock serializes appends per campaign, which makes the
        // GREATEST() timestamp computation race-free.
        sqlx::query("SELECT id FROM campaigns WHERE id = $1 FOR UPDATE")
            .bind(event.campaign_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("append_event", e))?
            .ok_or_else(|| StoreError::backend(format!("unknown campaign: {}", event.campaign_id)))?;

        let id = EventId::new();
        let row = sqlx::query(
            r#"
            INSERT INTO events (id, campaign_id, actor_id, event_type, content, visibility, created_at)
            VALUES ($1, $2, $3, $4, $5, $6,
                GREATEST(
                    now(),
                    COALESCE(
                        (SELECT MAX(created_at) + INTERVAL '1 microsecond'
                         FROM events WHERE campaign_id = $2),
                        now()
                    )
                ))
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(event.campaign_id.as_uuid())
        .bind(event.actor_id.as_str())
        .bind(&event.event_type)
        .bind(&event.content)
        .bind(event.visibility.as_wire())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_event", e))?;

        let created_at = row.try_get("created_at").map_err(decode)?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("append_event", e))?;

        Ok(Event {
            id,
            campaign_id: event.campaign_id,
            actor_id: event.actor_id,
            event_type: event.event_type,
            content: event.content,
            visibility: event.visibility,
            created_at,
        })
    }

    async fn list_events(&self, campaign_id: &CampaignId) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM events WHERE campaign_id = $1 ORDER BY created_at ASC, seq ASC",
        )
        .bind(campaign_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_events", e))?;
        rows.iter().map(event_from_row).collect()
    }

    async fn list_events_after(
        &self,
        campaign_id: &CampaignId,
        after: Option<&EventId>,
    ) -> Result<Vec<Event>, StoreError> {
        // COALESCE to -infinity keeps the "unknown id means no cursor"
        // contract: a dangling reference returns the full log.
        let rows = sqlx::query(
            r#"
            SELECT * FROM events
            WHERE campaign_id = $1
              AND ($2::uuid IS NULL
                   OR created_at > COALESCE(
                        (SELECT created_at FROM events WHERE id = $2),
                        '-infinity'::timestamptz))
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(campaign_id.as_uuid())
        .bind(after.map(|id| *id.as_uuid()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_events_after", e))?;
        rows.iter().map(event_from_row).collect()
    }

    async fn recent_events(
        &self,
        campaign_id: &CampaignId,
        limit: usize,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM events WHERE campaign_id = $1
            ORDER BY created_at DESC, seq DESC
            LIMIT $2
            "#,
        )
        .bind(campaign_id.as_uuid())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_events", e))?;
        rows.iter().map(event_from_row).collect()
    }

    async fn insert_memory(&self, memory: NewMemory) -> Result<Memory, StoreError> {
        let id = MemoryId::new();
        let tags = serde_json::to_value(&memory.tags)
            .map_err(|e| StoreError::decode(format!("tags: {e}")))?;
        let row = sqlx::query(
            r#"
            INSERT INTO memories (id, campaign_id, actor_id, scope, text, tags, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, now())
            RETURNING created_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(memory.campaign_id.as_uuid())
        .bind(memory.actor_id.as_str())
        .bind(memory.scope.as_wire())
        .bind(&memory.text)
        .bind(tags)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_memory", e))?;

        Ok(Memory {
            id,
            campaign_id: memory.campaign_id,
            actor_id: memory.actor_id,
            scope: memory.scope,
            text: memory.text,
            tags: memory.tags,
            created_at: row.try_get("created_at").map_err(decode)?,
        })
    }

    async fn list_memories(
        &self,
        campaign_id: &CampaignId,
        scope: Option<&MemoryScope>,
    ) -> Result<Vec<Memory>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM memories
            WHERE campaign_id = $1 AND ($2::text IS NULL OR scope = $2)
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(campaign_id.as_uuid())
        .bind(scope.map(|s| s.as_wire()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_memories", e))?;
        rows.iter().map(memory_from_row).collect()
    }

    async fn insert_roll(&self, roll: Roll) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO rolls (id, campaign_id, actor_id, expr, reason, result, breakdown, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(roll.id.as_uuid())
        .bind(roll.campaign_id.as_uuid())
        .bind(roll.actor_id.as_str())
        .bind(&roll.expr)
        .bind(&roll.reason)
        .bind(roll.result)
        .bind(&roll.breakdown)
        .bind(roll.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_roll", e))?;
        Ok(())
    }

    async fn get_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
    ) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT value FROM state_kv WHERE campaign_id = $1 AND key = $2")
            .bind(campaign_id.as_uuid())
            .bind(key)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_kv", e))?;
        row.map(|r| r.try_get("value").map_err(decode)).transpose()
    }

    async fn set_kv(
        &self,
        campaign_id: &CampaignId,
        key: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO state_kv (campaign_id, key, value, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (campaign_id, key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(campaign_id.as_uuid())
        .bind(key)
        .bind(value)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_kv", e))?;
        Ok(())
    }

    async fn all_kv(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let rows = sqlx::query("SELECT key, value FROM state_kv WHERE campaign_id = $1")
            .bind(campaign_id.as_uuid())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("all_kv", e))?;

        let mut kv = BTreeMap::new();
        for row in rows {
            kv.insert(
                row.try_get("key").map_err(decode)?,
                row.try_get("value").map_err(decode)?,
            );
        }
        Ok(kv)
    }

    async fn get_cursor(
        &self,
        campaign_id: &CampaignId,
        actor_id: &ActorId,
    ) -> Result<Option<ActorCursor>, StoreError> {
        let row = sqlx::query(
            "SELECT last_seen_event_id FROM actor_cursors WHERE campaign_id = $1 AND actor_id = $2",
        )
        .bind(campaign_id.as_uuid())
        .bind(actor_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_cursor", e))?;

        row.map(|r| {
            Ok(ActorCursor {
                campaign_id: *campaign_id,
                actor_id: actor_id.clone(),
                last_seen_event_id: r
                    .try_get::<Option<Uuid>, _>("last_seen_event_id")
                    .map_err(decode)?
                    .map(EventId::from_uuid),
            })
        })
        .transpose()
    }

    async fn upsert_cursor(&self, cursor: ActorCursor) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO actor_cursors (campaign_id, actor_id, last_seen_event_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (campaign_id, actor_id)
            DO UPDATE SET last_seen_event_id = EXCLUDED.last_seen_event_id
            "#,
        )
        .bind(cursor.campaign_id.as_uuid())
        .bind(cursor.actor_id.as_str())
        .bind(cursor.last_seen_event_id.map(|id| *id.as_uuid()))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_cursor", e))?;
        Ok(())
    }
}
