//! Resolution semantics for each [`crate::model::ResolutionStrategy`],
//! grounded on the teacher's `MapMerge` reducer (shallow-merge with later
//! writer winning on overlapping keys), generalized to a three-way merge
//! plus the other four non-merge strategies.

use serde_json::Value;

use crate::model::{AccessLevel, Conflict, ConflictResolution, ResolutionStrategy};

use super::PartialUpdate;

/// Per-field merge: arrays become the set-union (insertion order preserved,
/// A's elements first); objects shallow-merge with B overwriting A on
/// overlapping keys; primitives resolve by "most recent wins" using
/// `lastModified`.
fn merge_value(field: &str, a: &Value, b: &Value, a_newer: bool) -> Value {
    match (a, b) {
        (Value::Array(a_items), Value::Array(b_items)) => {
            let mut merged = a_items.clone();
            for item in b_items {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Value::Array(merged)
        }
        (Value::Object(a_obj), Value::Object(b_obj)) => {
            let mut merged = a_obj.clone();
            for (k, v) in b_obj.iter() {
                merged.insert(k.clone(), v.clone());
            }
            Value::Object(merged)
        }
        _ => {
            let _ = field;
            if a_newer { a.clone() } else { b.clone() }
        }
    }
}

pub fn merge(base: &Conflict, a: &PartialUpdate, b: &PartialUpdate) -> ConflictResolution {
    let a_newer = a.last_modified.unwrap_or(0) >= b.last_modified.unwrap_or(0);
    let mut resolved = base
        .base_state
        .as_object()
        .cloned()
        .unwrap_or_default();

    for field in &base.affected_fields {
        let a_value = a.fields.get(field);
        let b_value = b.fields.get(field);
        let merged = match (a_value, b_value) {
            (Some(av), Some(bv)) => merge_value(field, av, bv, a_newer),
            (Some(av), None) => av.clone(),
            (None, Some(bv)) => bv.clone(),
            (None, None) => continue,
        };
        resolved.insert(field.clone(), merged);
    }

    ConflictResolution {
        conflict_id: base.conflict_id.clone(),
        strategy: ResolutionStrategy::Merge,
        resolved_state: Value::Object(resolved),
        confidence: 0.8,
        requires_review: false,
    }
}

pub fn timestamp_based(base: &Conflict, a: &PartialUpdate, b: &PartialUpdate) -> ConflictResolution {
    let a_newer = a.last_modified.unwrap_or(0) >= b.last_modified.unwrap_or(0);
    let winner = if a_newer { &base.state_a } else { &base.state_b };
    ConflictResolution {
        conflict_id: base.conflict_id.clone(),
        strategy: ResolutionStrategy::TimestampBased,
        resolved_state: winner.clone(),
        confidence: 0.9,
        requires_review: false,
    }
}

pub fn client_priority(
    base: &Conflict,
    a_level: AccessLevel,
    b_level: AccessLevel,
) -> ConflictResolution {
    let winner = if a_level.priority() >= b_level.priority() {
        &base.state_a
    } else {
        &base.state_b
    };
    ConflictResolution {
        conflict_id: base.conflict_id.clone(),
        strategy: ResolutionStrategy::ClientPriority,
        resolved_state: winner.clone(),
        confidence: 0.7,
        requires_review: true,
    }
}

pub fn rollback(base: &Conflict) -> ConflictResolution {
    ConflictResolution {
        conflict_id: base.conflict_id.clone(),
        strategy: ResolutionStrategy::Rollback,
        resolved_state: base.base_state.clone(),
        confidence: 1.0,
        requires_review: true,
    }
}

pub fn manual_intervention(base: &Conflict) -> ConflictResolution {
    ConflictResolution {
        conflict_id: base.conflict_id.clone(),
        strategy: ResolutionStrategy::ManualIntervention,
        resolved_state: base.base_state.clone(),
        confidence: 0.0,
        requires_review: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConflictSeverity, ConflictType};
    use serde_json::json;

    fn sample_conflict() -> Conflict {
        Conflict {
            conflict_id: "c1".into(),
            session_id: "s1".into(),
            client_a: "a".into(),
            client_b: "b".into(),
            state_a: json!({"tags": ["x", "y"]}),
            state_b: json!({"tags": ["x", "z"]}),
            base_state: json!({"tags": ["x"]}),
            affected_fields: vec!["tags".to_string()],
            severity: ConflictSeverity::Low,
            detected_at: 0,
            conflict_type: ConflictType::ConcurrentModification,
        }
    }

    #[test]
    fn merge_unions_arrays() {
        let conflict = sample_conflict();
        let a = PartialUpdate {
            client_id: "a".into(),
            fields: conflict.state_a.as_object().unwrap().clone(),
            last_modified: Some(10),
        };
        let b = PartialUpdate {
            client_id: "b".into(),
            fields: conflict.state_b.as_object().unwrap().clone(),
            last_modified: Some(11),
        };
        let resolution = merge(&conflict, &a, &b);
        let tags = resolution.resolved_state["tags"].as_array().unwrap();
        let tags: Vec<&str> = tags.iter().map(|v| v.as_str().unwrap()).collect();
        assert_eq!(tags, vec!["x", "y", "z"]);
        assert_eq!(resolution.confidence, 0.8);
    }

    #[test]
    fn rollback_returns_base() {
        let conflict = sample_conflict();
        let resolution = rollback(&conflict);
        assert_eq!(resolution.resolved_state, conflict.base_state);
        assert_eq!(resolution.confidence, 1.0);
    }
}
