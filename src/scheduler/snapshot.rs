//! Snapshot emission.
//!
//! A snapshot captures the kernel-visible state of the simulation at one
//! time step: the live agents and their lineage, digested into a stable
//! hash so two runs can be compared row for row. Snapshots are recorded
//! through the normal datum sink; a durable export format is the host's
//! concern.

use crate::core::ids::AgentId;
use crate::models::context::SimContext;
use crate::scheduler::engine::SimulationError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serializable snapshot payload.
#[derive(Debug, Clone, Serialize)]
pub struct SimSnapshot {
    pub time: i32,
    pub agents: Vec<AgentRow>,
}

/// One live agent's kernel-visible state.
#[derive(Debug, Clone, Serialize)]
pub struct AgentRow {
    pub id: AgentId,
    pub prototype: String,
    pub parent: Option<AgentId>,
}

/// Record a `Snapshot` datum for the current state.
pub fn snapshot(ctx: &mut SimContext, time: i32) -> Result<(), SimulationError> {
    let snap = SimSnapshot {
        time,
        agents: ctx
            .agents
            .values()
            .map(|a| AgentRow {
                id: a.id(),
                prototype: a.prototype().to_string(),
                parent: a.parent(),
            })
            .collect(),
    };

    let digest = compute_state_digest(&snap)?;
    let agent_count = snap.agents.len() as i64;
    ctx.new_datum("Snapshot")
        .add_val("Time", time)
        .add_val("AgentCount", agent_count)
        .add_val("Digest", digest)
        .record();
    Ok(())
}

/// Compute a deterministic SHA-256 hex digest of a serializable state.
///
/// Serializes through a canonical JSON form with recursively sorted
/// object keys, so the digest is independent of map iteration order.
pub fn compute_state_digest<T: Serialize>(state: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(state)
        .map_err(|e| SimulationError::Serialization(format!("snapshot serialization: {e}")))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| SimulationError::Serialization(format!("snapshot serialization: {e}")))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let snap = SimSnapshot {
            time: 3,
            agents: vec![AgentRow {
                id: AgentId(1),
                prototype: "Reactor".to_string(),
                parent: None,
            }],
        };
        let a = compute_state_digest(&snap).unwrap();
        let b = compute_state_digest(&snap).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn digest_distinguishes_states() {
        let a = SimSnapshot {
            time: 3,
            agents: Vec::new(),
        };
        let b = SimSnapshot {
            time: 4,
            agents: Vec::new(),
        };
        assert_ne!(
            compute_state_digest(&a).unwrap(),
            compute_state_digest(&b).unwrap()
        );
    }

    #[test]
    fn snapshot_records_a_row() {
        let mut ctx = SimContext::new();
        snapshot(&mut ctx, 5).unwrap();

        let rows = ctx.recorder().rows_for_table("Snapshot");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Time"), Some(&5i64.into()));
        assert_eq!(rows[0].get("AgentCount"), Some(&0i64.into()));
        assert!(rows[0].get("Digest").is_some());
    }
}
