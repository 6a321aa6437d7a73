//! Campaign state as seen by a viewer, and the key/value mutation pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tableforge_core::{
    Actor, ActorId, CampaignId, EngineError, EngineResult, state::keys,
};

use crate::{Engine, store_err};

/// A campaign's state through one actor's visibility lens.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignState {
    pub campaign_id: CampaignId,
    pub turn_owner: ActorId,
    pub ai_only_streak: u32,
    pub actors: Vec<Actor>,
    pub state_kv: BTreeMap<String, String>,
    /// Count of all events in the campaign the viewer may see, not just
    /// unseen ones.
    pub visible_events_count: usize,
}

/// One entry of a mutation batch.
#[derive(Debug, Clone, Deserialize)]
pub struct MutationItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationOutcome {
    #[serde(rename = "type")]
    pub kind: String,
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationReport {
    pub mutations_applied: usize,
    pub results: Vec<MutationOutcome>,
}

impl Engine {
    /// The state endpoint's payload: roster, key/value state, and how much
    /// of the log the viewer can see.
    pub async fn campaign_state(
        &self,
        campaign_id: &CampaignId,
        viewer: &ActorId,
    ) -> EngineResult<CampaignState> {
        let campaign = self.require_campaign(campaign_id).await?;
        let actors = self
            .store()
            .list_actors(campaign_id)
            .await
            .map_err(store_err)?;

        let viewer_is_dm = actors
            .iter()
            .find(|a| a.id == *viewer)
            .map(|a| a.actor_type.is_dm())
            .unwrap_or(false);

        let state_kv = self.store().all_kv(campaign_id).await.map_err(store_err)?;

        let visible_events_count = self
            .store()
            .list_events(campaign_id)
            .await
            .map_err(store_err)?
            .iter()
            .filter(|e| e.visibility.visible_to(viewer, viewer_is_dm))
            .count();

        Ok(CampaignState {
            campaign_id: *campaign_id,
            turn_owner: campaign.turn_owner,
            ai_only_streak: campaign.ai_only_streak,
            actors,
            state_kv,
            visible_events_count,
        })
    }

    /// Apply a mutation batch atomically: either every mutation commits or
    /// none does. An unknown mutation type aborts the whole batch.
    pub async fn mutate(
        &self,
        campaign_id: &CampaignId,
        mutations: Vec<MutationItem>,
    ) -> EngineResult<MutationReport> {
        let lock = self.lock_for(campaign_id);
        let _guard = lock.lock().await;

        self.require_campaign(campaign_id).await?;

        // Mutations are staged in an overlay and only written through once
        // the whole batch has validated.
        let mut staged: BTreeMap<String, String> = BTreeMap::new();
        let mut results = Vec::with_capacity(mutations.len());

        for mutation in mutations {
            let outcome = self
                .apply_one(campaign_id, &mutation, &mut staged)
                .await?;
            results.push(outcome);
        }

        for (key, value) in &staged {
            self.store()
                .set_kv(campaign_id, key, value)
                .await
                .map_err(store_err)?;
        }

        Ok(MutationReport {
            mutations_applied: results.len(),
            results,
        })
    }

    async fn apply_one(
        &self,
        campaign_id: &CampaignId,
        mutation: &MutationItem,
        staged: &mut BTreeMap<String, String>,
    ) -> EngineResult<MutationOutcome> {
        let payload = &mutation.payload;
        match mutation.kind.as_str() {
            "hp_set" => {
                let actor = ActorId::new(payload_str(payload, "actor_id")?);
                let hp = payload_i64(payload, "hp")?;
                let key = keys::hp(&actor);
                staged.insert(key.clone(), hp.to_string());
                Ok(outcome(&mutation.kind, key, hp.into()))
            }
            "hp_delta" => {
                let actor = ActorId::new(payload_str(payload, "actor_id")?);
                let delta = payload_i64(payload, "delta")?;
                let key = keys::hp(&actor);
                let current = self.read_staged(campaign_id, staged, &key).await?;
                let current: i64 = current
                    .as_deref()
                    .unwrap_or("0")
                    .parse()
                    .map_err(|_| EngineError::internal(format!("corrupt hp value at {key}")))?;
                let hp = current + delta;
                staged.insert(key.clone(), hp.to_string());
                Ok(outcome(&mutation.kind, key, hp.into()))
            }
            "inventory_add" => {
                let actor = ActorId::new(payload_str(payload, "actor_id")?);
                let item = payload_value(payload, "item")?;
                let key = keys::inventory(&actor);
                let mut items = self.read_inventory(campaign_id, staged, &key).await?;
                items.push(item);
                staged.insert(key.clone(), encode_json(&items)?);
                Ok(outcome(&mutation.kind, key, Value::Array(items)))
            }
            "inventory_remove" => {
                let actor = ActorId::new(payload_str(payload, "actor_id")?);
                let item = payload_value(payload, "item")?;
                let key = keys::inventory(&actor);
                let mut items = self.read_inventory(campaign_id, staged, &key).await?;
                // Remove the first matching item; absent items are a no-op.
                if let Some(idx) = items.iter().position(|i| *i == item) {
                    items.remove(idx);
                }
                staged.insert(key.clone(), encode_json(&items)?);
                Ok(outcome(&mutation.kind, key, Value::Array(items)))
            }
            "flag_set" => {
                let name = payload_str(payload, "key")?;
                let value = payload_value(payload, "value")?;
                let key = keys::flag(&name);
                staged.insert(key.clone(), encode_json(&value)?);
                Ok(outcome(&mutation.kind, key, value))
            }
            "time_advance" => {
                let amount = payload_value(payload, "amount")?;
                let unit = payload_value(payload, "unit")?;
                let clock = format!("{} {}", display_value(&amount), display_value(&unit));
                staged.insert(keys::TIME_CURRENT.to_string(), clock.clone());
                Ok(outcome(
                    &mutation.kind,
                    keys::TIME_CURRENT.to_string(),
                    Value::String(clock),
                ))
            }
            unknown => Err(EngineError::bad_input(format!(
                "Unknown mutation type: {unknown}"
            ))),
        }
    }

    /// Read a key through the staging overlay so that mutations within one
    /// batch observe each other.
    async fn read_staged(
        &self,
        campaign_id: &CampaignId,
        staged: &BTreeMap<String, String>,
        key: &str,
    ) -> EngineResult<Option<String>> {
        if let Some(value) = staged.get(key) {
            return Ok(Some(value.clone()));
        }
        self.store().get_kv(campaign_id, key).await.map_err(store_err)
    }

    async fn read_inventory(
        &self,
        campaign_id: &CampaignId,
        staged: &BTreeMap<String, String>,
        key: &str,
    ) -> EngineResult<Vec<Value>> {
        let raw = self
            .read_staged(campaign_id, staged, key)
            .await?
            .unwrap_or_else(|| "[]".to_string());
        serde_json::from_str(&raw)
            .map_err(|_| EngineError::internal(format!("corrupt inventory value at {key}")))
    }
}

fn outcome(kind: &str, key: String, value: Value) -> MutationOutcome {
    MutationOutcome {
        kind: kind.to_string(),
        key,
        value,
    }
}

fn payload_value(payload: &Value, key: &str) -> EngineResult<Value> {
    payload
        .get(key)
        .cloned()
        .ok_or_else(|| EngineError::bad_input(format!("mutation payload missing '{key}'")))
}

fn payload_str(payload: &Value, key: &str) -> EngineResult<String> {
    match payload_value(payload, key)? {
        Value::String(s) => Ok(s),
        other => Err(EngineError::bad_input(format!(
            "mutation payload field '{key}' must be a string, got {other}"
        ))),
    }
}

/// Accepts JSON numbers and numeric strings, matching what clients send.
fn payload_i64(payload: &Value, key: &str) -> EngineResult<i64> {
    match payload_value(payload, key)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| EngineError::bad_input(format!("'{key}' must be an integer"))),
        Value::String(s) => s
            .parse()
            .map_err(|_| EngineError::bad_input(format!("'{key}' must be an integer"))),
        other => Err(EngineError::bad_input(format!(
            "'{key}' must be an integer, got {other}"
        ))),
    }
}

/// Strings render bare; everything else renders as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn encode_json<T: Serialize>(value: &T) -> EngineResult<String> {
    serde_json::to_string(value).map_err(|e| EngineError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCreate;
    use crate::testing::{engine, standard_roster};
    use serde_json::json;
    use tableforge_core::Visibility;

    async fn seeded() -> (crate::Engine, CampaignId) {
        let engine = engine();
        let created = engine
            .create_campaign("c".into(), standard_roster())
            .await
            .unwrap();
        (engine, created.campaign.id)
    }

    fn item(kind: &str, payload: Value) -> MutationItem {
        MutationItem {
            kind: kind.to_string(),
            payload,
        }
    }

    #[tokio::test]
    async fn hp_set_and_delta_compose() {
        let (engine, cid) = seeded().await;
        let report = engine
            .mutate(
                &cid,
                vec![
                    item("hp_set", json!({"actor_id": "player1", "hp": 10})),
                    item("hp_delta", json!({"actor_id": "player1", "delta": -3})),
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.mutations_applied, 2);
        assert_eq!(report.results[1].value, json!(7));

        let state = engine
            .campaign_state(&cid, &ActorId::new("dm"))
            .await
            .unwrap();
        assert_eq!(state.state_kv.get("hp:player1").unwrap(), "7");
    }

    #[tokio::test]
    async fn inventory_add_then_remove() {
        let (engine, cid) = seeded().await;
        engine
            .mutate(
                &cid,
                vec![
                    item("inventory_add", json!({"actor_id": "player1", "item": "rope"})),
                    item("inventory_add", json!({"actor_id": "player1", "item": "torch"})),
                    item("inventory_remove", json!({"actor_id": "player1", "item": "rope"})),
                ],
            )
            .await
            .unwrap();

        let state = engine
            .campaign_state(&cid, &ActorId::new("dm"))
            .await
            .unwrap();
        assert_eq!(state.state_kv.get("inventory:player1").unwrap(), r#"["torch"]"#);
    }

    #[tokio::test]
    async fn removing_absent_item_is_a_noop() {
        let (engine, cid) = seeded().await;
        let report = engine
            .mutate(
                &cid,
                vec![item(
                    "inventory_remove",
                    json!({"actor_id": "player1", "item": "ghost"}),
                )],
            )
            .await
            .unwrap();
        assert_eq!(report.results[0].value, json!([]));
    }

    #[tokio::test]
    async fn flag_and_time_mutations() {
        let (engine, cid) = seeded().await;
        engine
            .mutate(
                &cid,
                vec![
                    item("flag_set", json!({"key": "gate_open", "value": true})),
                    item("time_advance", json!({"amount": 2, "unit": "hours"})),
                ],
            )
            .await
            .unwrap();

        let state = engine
            .campaign_state(&cid, &ActorId::new("dm"))
            .await
            .unwrap();
        assert_eq!(state.state_kv.get("flag:gate_open").unwrap(), "true");
        assert_eq!(state.state_kv.get("time:current").unwrap(), "2 hours");
    }

    #[tokio::test]
    async fn unknown_mutation_rolls_back_the_batch() {
        let (engine, cid) = seeded().await;
        let err = engine
            .mutate(
                &cid,
                vec![
                    item("hp_set", json!({"actor_id": "player1", "hp": 10})),
                    item("teleport", json!({})),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadInput(msg) if msg.contains("teleport")));

        // The earlier hp_set must not have leaked.
        let state = engine
            .campaign_state(&cid, &ActorId::new("dm"))
            .await
            .unwrap();
        assert!(state.state_kv.is_empty());
    }

    #[tokio::test]
    async fn missing_payload_field_is_bad_input() {
        let (engine, cid) = seeded().await;
        let err = engine
            .mutate(&cid, vec![item("hp_set", json!({"actor_id": "player1"}))])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::BadInput(_)));
    }

    #[tokio::test]
    async fn state_counts_only_visible_events() {
        let (engine, cid) = seeded().await;
        for (vis, content) in [("public", "a"), ("dm_only", "b"), ("private:player1", "c")] {
            engine
                .append_event(
                    &cid,
                    EventCreate {
                        actor_id: ActorId::new("dm"),
                        event_type: "utterance".to_string(),
                        content: content.to_string(),
                        visibility: Visibility::parse(vis),
                    },
                )
                .await
                .unwrap();
        }

        let dm = engine.campaign_state(&cid, &ActorId::new("dm")).await.unwrap();
        assert_eq!(dm.visible_events_count, 3);

        let human = engine
            .campaign_state(&cid, &ActorId::new("human1"))
            .await
            .unwrap();
        assert_eq!(human.visible_events_count, 1);

        let player = engine
            .campaign_state(&cid, &ActorId::new("player1"))
            .await
            .unwrap();
        assert_eq!(player.visible_events_count, 2);
    }

    #[tokio::test]
    async fn state_for_missing_campaign_is_not_found() {
        let (engine, _) = seeded().await;
        let err = engine
            .campaign_state(&CampaignId::new(), &ActorId::new("dm"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
