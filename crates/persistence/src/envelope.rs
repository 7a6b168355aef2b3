//! Versioned state blob.
//!
//! Saved scenarios are wrapped as `{version, saved_at, state}`. Older blobs
//! are upgraded once, at load, by [`upgrade`]; nothing downstream checks
//! for missing legacy fields.

use chrono::{DateTime, Utc};
use plan_core::Scenario;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::info;

/// Version written by this build.
pub const STATE_VERSION: &str = "finplan-state-v3";
/// Flat product volumes and a single simple OPEX amount at the top level.
pub const STATE_V1: &str = "finplan-state-v1";
/// Single funding round and top-level cash settings.
pub const STATE_V2: &str = "finplan-state-v2";

const EPOCH: &str = "1970-01-01T00:00:00Z";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("unknown state version: {0}")]
    UnknownVersion(String),
    #[error("malformed state blob: {0}")]
    Malformed(&'static str),
    #[error("state does not match the current schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// A scenario as persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    pub version: String,
    pub saved_at: DateTime<Utc>,
    pub state: Scenario,
}

impl SavedState {
    pub fn new(state: Scenario, saved_at: DateTime<Utc>) -> Self {
        SavedState {
            version: STATE_VERSION.to_string(),
            saved_at,
            state,
        }
    }

    pub fn to_value(&self) -> Result<Value, MigrationError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Upgrade a blob of any known version and deserialize it.
pub fn decode(blob: Value) -> Result<SavedState, MigrationError> {
    Ok(serde_json::from_value(upgrade(blob)?)?)
}

/// Rewrite a blob of any known version into the current layout.
///
/// Blobs without a version are treated as v1.
pub fn upgrade(mut blob: Value) -> Result<Value, MigrationError> {
    {
        let root = blob
            .as_object_mut()
            .ok_or(MigrationError::Malformed("expected an object"))?;
        let mut version = root
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(STATE_V1)
            .to_string();
        let state = root
            .get_mut("state")
            .and_then(Value::as_object_mut)
            .ok_or(MigrationError::Malformed("missing state object"))?;

        loop {
            match version.as_str() {
                STATE_VERSION => break,
                STATE_V1 => {
                    info!(from = STATE_V1, "upgrading saved state");
                    upgrade_v1(state);
                    version = STATE_V2.to_string();
                }
                STATE_V2 => {
                    info!(from = STATE_V2, "upgrading saved state");
                    upgrade_v2(state);
                    version = STATE_VERSION.to_string();
                }
                other => return Err(MigrationError::UnknownVersion(other.to_string())),
            }
        }

        root.insert("version".into(), Value::from(STATE_VERSION));
        root.entry("saved_at").or_insert_with(|| Value::from(EPOCH));
    }
    Ok(blob)
}

/// v1 -> v2: product `volumes` become a flat sales plan; `opex_base` and
/// `opex_growth` become the simple OPEX mode.
fn upgrade_v1(state: &mut Map<String, Value>) {
    if let Some(products) = state.get_mut("products").and_then(Value::as_array_mut) {
        for product in products.iter_mut().filter_map(Value::as_object_mut) {
            if product.contains_key("sales") {
                continue;
            }
            if let Some(volumes) = product.remove("volumes") {
                product.insert("sales".into(), json!({ "flat": { "volumes": volumes } }));
            }
        }
    }
    if let Some(base) = state.remove("opex_base") {
        let growth = state.remove("opex_growth").unwrap_or_else(|| Value::from(0));
        state.insert(
            "opex".into(),
            json!({ "simple": { "base_annual": base, "growth_rate": growth } }),
        );
    }
}

/// v2 -> v3: `funding_round` becomes `funding_rounds`; `initial_cash` and
/// `exclude_funding_from_treasury` move under `treasury`.
fn upgrade_v2(state: &mut Map<String, Value>) {
    if let Some(round) = state.remove("funding_round") {
        let rounds = if round.is_object() { vec![round] } else { vec![] };
        state.insert("funding_rounds".into(), Value::Array(rounds));
    }
    let cash = state.remove("initial_cash");
    let exclude = state.remove("exclude_funding_from_treasury");
    if cash.is_some() || exclude.is_some() {
        let mut treasury = Map::new();
        if let Some(cash) = cash {
            treasury.insert("initial_cash".into(), cash);
        }
        if let Some(exclude) = exclude {
            treasury.insert("exclude_funding".into(), exclude);
        }
        state.insert("treasury".into(), Value::Object(treasury));
    }
}
