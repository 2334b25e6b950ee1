//! C8: three-way conflict detection and resolution between two clients'
//! partial updates over a common base.

pub mod merge;

use miette::Diagnostic;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::model::{Conflict, ConflictSeverity, ConflictType, ResolutionStrategy};
use crate::utils::id_generator;

#[derive(Debug, Error, Diagnostic)]
pub enum ConflictError {
    #[error("conflict requires `lastModified` on both inputs")]
    #[diagnostic(
        code(reasoning_sessions::conflict::missing_timestamp),
        help("Stamp lastModified on both partial updates before calling updateStateWithConflictResolution.")
    )]
    MissingLastModified,
}

pub type Result<T> = std::result::Result<T, ConflictError>;

fn field_severity(field: &str) -> ConflictSeverity {
    match field {
        "currentStep" | "status" | "totalSteps" => ConflictSeverity::Critical,
        "steps" | "problem" | "strategy" => ConflictSeverity::High,
        "metadata" | "qualityMetrics" => ConflictSeverity::Medium,
        _ => ConflictSeverity::Low,
    }
}

fn jaccard_similarity(a: &serde_json::Map<String, serde_json::Value>, b: &serde_json::Map<String, serde_json::Value>) -> f64 {
    let common: Vec<&String> = a.keys().filter(|k| b.contains_key(*k)).collect();
    if common.is_empty() {
        return 1.0;
    }
    let matching = common.iter().filter(|k| a.get(**k) == b.get(**k)).count();
    matching as f64 / common.len() as f64
}

/// `lastModified` must be present on both partial updates (§9 open
/// question); callers are required to stamp it before invoking this.
pub struct PartialUpdate {
    pub client_id: String,
    pub fields: serde_json::Map<String, serde_json::Value>,
    pub last_modified: Option<i64>,
}

/// Detects field-level, step-overlap, and divergence conflicts between two
/// partial updates relative to `base`. Returns `None` when no conflict rises
/// above the detection thresholds.
pub fn detect(
    session_id: &str,
    base: &serde_json::Map<String, serde_json::Value>,
    a: &PartialUpdate,
    b: &PartialUpdate,
    conflict_threshold: f64,
    now: i64,
) -> Result<Option<Conflict>> {
    if a.last_modified.is_none() || b.last_modified.is_none() {
        return Err(ConflictError::MissingLastModified);
    }

    let mut affected_fields = Vec::new();
    let mut worst = ConflictSeverity::Low;
    let mut conflict_type = ConflictType::ConcurrentModification;

    for field in a.fields.keys() {
        if let Some(b_value) = b.fields.get(field) {
            if a.fields.get(field) != Some(b_value) {
                affected_fields.push(field.clone());
                let severity = field_severity(field);
                if severity > worst {
                    worst = severity;
                }
            }
        }
    }

    let a_step = a.fields.get("currentStep").and_then(|v| v.as_i64());
    let b_step = b.fields.get("currentStep").and_then(|v| v.as_i64());
    let base_step = base.get("currentStep").and_then(|v| v.as_i64());
    if let (Some(a_step), Some(b_step), Some(base_step)) = (a_step, b_step, base_step) {
        if a_step != b_step && a_step != base_step && b_step != base_step {
            worst = ConflictSeverity::High;
            conflict_type = ConflictType::StepOverlap;
        }
    }

    let sim_a = jaccard_similarity(base, &a.fields);
    let sim_b = jaccard_similarity(base, &b.fields);
    if sim_a < conflict_threshold && sim_b < conflict_threshold && worst < ConflictSeverity::Medium {
        worst = ConflictSeverity::Medium;
        conflict_type = ConflictType::StateDivergence;
    }

    if affected_fields.is_empty() && conflict_type == ConflictType::ConcurrentModification {
        return Ok(None);
    }

    Ok(Some(Conflict {
        conflict_id: id_generator::event_id(now),
        session_id: session_id.to_string(),
        client_a: a.client_id.clone(),
        client_b: b.client_id.clone(),
        state_a: serde_json::Value::Object(a.fields.clone()),
        state_b: serde_json::Value::Object(b.fields.clone()),
        base_state: serde_json::Value::Object(base.clone()),
        affected_fields,
        severity: worst,
        detected_at: now,
        conflict_type,
    }))
}

/// Deterministic strategy selection per the §4.8 table.
pub fn select_strategy(conflict: &Conflict, auto_resolution_enabled: bool) -> ResolutionStrategy {
    use ConflictSeverity::*;
    use ConflictType::*;

    match (conflict.severity, conflict.conflict_type) {
        (Critical, _) => ResolutionStrategy::ManualIntervention,
        (High, StepOverlap) => {
            if auto_resolution_enabled {
                ResolutionStrategy::TimestampBased
            } else {
                ResolutionStrategy::ManualIntervention
            }
        }
        (High, _) => ResolutionStrategy::ManualIntervention,
        (Medium, StateDivergence) => {
            if auto_resolution_enabled {
                ResolutionStrategy::Merge
            } else {
                ResolutionStrategy::ManualIntervention
            }
        }
        (Medium, _) => {
            if auto_resolution_enabled {
                ResolutionStrategy::TimestampBased
            } else {
                ResolutionStrategy::ManualIntervention
            }
        }
        (Low, _) => {
            if auto_resolution_enabled {
                ResolutionStrategy::Merge
            } else {
                ResolutionStrategy::TimestampBased
            }
        }
    }
}

/// Running statistics updated on each resolution, analogous to the
/// teacher's per-strategy success-rate tracking in the recovery ladder.
#[derive(Default)]
pub struct ConflictStats {
    pub conflicts_by_type: Mutex<FxHashMap<&'static str, u64>>,
    pub resolutions_by_strategy: Mutex<FxHashMap<&'static str, u64>>,
    pub total_resolution_time_ms: Mutex<u64>,
    pub resolution_count: Mutex<u64>,
    pub success_count: Mutex<u64>,
}

impl ConflictStats {
    fn type_label(t: ConflictType) -> &'static str {
        match t {
            ConflictType::ConcurrentModification => "concurrent_modification",
            ConflictType::StepOverlap => "step_overlap",
            ConflictType::StateDivergence => "state_divergence",
            ConflictType::LockViolation => "lock_violation",
        }
    }

    fn strategy_label(s: ResolutionStrategy) -> &'static str {
        match s {
            ResolutionStrategy::Merge => "merge",
            ResolutionStrategy::TimestampBased => "timestamp_based",
            ResolutionStrategy::ClientPriority => "client_priority",
            ResolutionStrategy::Rollback => "rollback",
            ResolutionStrategy::ManualIntervention => "manual_intervention",
        }
    }

    pub fn record(&self, conflict_type: ConflictType, strategy: ResolutionStrategy, time_ms: u64, succeeded: bool) {
        *self
            .conflicts_by_type
            .lock()
            .entry(Self::type_label(conflict_type))
            .or_insert(0) += 1;
        *self
            .resolutions_by_strategy
            .lock()
            .entry(Self::strategy_label(strategy))
            .or_insert(0) += 1;
        *self.total_resolution_time_ms.lock() += time_ms;
        *self.resolution_count.lock() += 1;
        if succeeded {
            *self.success_count.lock() += 1;
        }
    }

    pub fn average_resolution_time_ms(&self) -> f64 {
        let count = *self.resolution_count.lock();
        if count == 0 {
            0.0
        } else {
            *self.total_resolution_time_ms.lock() as f64 / count as f64
        }
    }

    pub fn success_rate(&self) -> f64 {
        let count = *self.resolution_count.lock();
        if count == 0 {
            0.0
        } else {
            *self.success_count.lock() as f64 / count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn missing_timestamp_rejected() {
        let base = map(json!({}));
        let a = PartialUpdate {
            client_id: "a".into(),
            fields: map(json!({"tags": ["x"]})),
            last_modified: None,
        };
        let b = PartialUpdate {
            client_id: "b".into(),
            fields: map(json!({"tags": ["y"]})),
            last_modified: Some(1),
        };
        assert!(matches!(
            detect("s1", &base, &a, &b, 0.3, 10),
            Err(ConflictError::MissingLastModified)
        ));
    }

    #[test]
    fn low_severity_field_conflict_detected() {
        let base = map(json!({"tags": ["x"]}));
        let a = PartialUpdate {
            client_id: "a".into(),
            fields: map(json!({"tags": ["x", "y"]})),
            last_modified: Some(10),
        };
        let b = PartialUpdate {
            client_id: "b".into(),
            fields: map(json!({"tags": ["x", "z"]})),
            last_modified: Some(11),
        };
        let conflict = detect("s1", &base, &a, &b, 0.3, 20).unwrap().unwrap();
        assert_eq!(conflict.severity, ConflictSeverity::Low);
        assert_eq!(select_strategy(&conflict, true), ResolutionStrategy::Merge);
    }

    #[test]
    fn critical_field_forces_manual_intervention() {
        let base = map(json!({"currentStep": 1}));
        let a = PartialUpdate {
            client_id: "a".into(),
            fields: map(json!({"currentStep": 2})),
            last_modified: Some(10),
        };
        let b = PartialUpdate {
            client_id: "b".into(),
            fields: map(json!({"currentStep": 3})),
            last_modified: Some(11),
        };
        let conflict = detect("s1", &base, &a, &b, 0.3, 20).unwrap().unwrap();
        assert_eq!(conflict.severity, ConflictSeverity::Critical);
        assert_eq!(select_strategy(&conflict, true), ResolutionStrategy::ManualIntervention);
    }
}
