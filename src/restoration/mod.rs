//! C11: prioritized, staged restoration of sessions at startup.
//!
//! Grounded on the teacher's `runtimes::runner` startup sequence
//! (constructing every session's runtime state before accepting work) and
//! on C5's priority-ladder idiom, generalized from "one strategy list" to
//! "three concurrency-bounded stages run in priority order".

pub mod scoring;

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::chain_manager::ChainManager;
use crate::error::CoreError;
use crate::event_bus::{Event, EventData, EventType};
use crate::model::SessionMetadata;
use crate::utils::id_generator;
use crate::validation::HealthStatus;

#[derive(Debug, Error, Diagnostic)]
pub enum RestorationError {
    #[error("restoration aborted: {failed}/{attempted} sessions failed (ratio {ratio:.2})")]
    #[diagnostic(
        code(reasoning_sessions::restoration::aborted),
        help("More than half of attempted restorations failed and more than 5 sessions failed outright.")
    )]
    Aborted {
        attempted: usize,
        failed: usize,
        ratio: f64,
    },
}

pub type Result<T> = std::result::Result<T, RestorationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RestorationStage {
    High,
    Medium,
    Low,
}

impl RestorationStage {
    fn for_score(score: f64) -> Self {
        if score >= 80.0 {
            RestorationStage::High
        } else if score >= 50.0 {
            RestorationStage::Medium
        } else {
            RestorationStage::Low
        }
    }
}

/// A session awaiting restoration, with the priority score that placed it
/// in its stage.
#[derive(Debug, Clone)]
pub struct RestorationCandidate {
    pub session_id: String,
    pub score: f64,
    pub stage: RestorationStage,
}

/// Outcome of restoring one candidate.
#[derive(Debug, Clone)]
pub struct SessionRestorationResult {
    pub session_id: String,
    pub ok: bool,
    pub recovered: bool,
    pub final_health_score: Option<u8>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StageReport {
    pub stage: RestorationStage,
    pub session_ids: Vec<String>,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct RestorationReport {
    pub stages: Vec<StageReport>,
    pub results: Vec<SessionRestorationResult>,
    pub successful_restorations: usize,
    pub failed_restorations: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RestorationOptions {
    pub max_concurrent_restorations: usize,
    pub health_score_threshold: u8,
}

fn to_utc(now_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(now_ms).unwrap_or_else(Utc::now)
}

/// Lists every active/paused session via [`ChainManager::list_restorable_metadata`],
/// scores each with [`scoring::restoration_score`], and assigns a stage.
pub async fn discover_candidates(manager: &ChainManager, now_ms: i64) -> std::result::Result<Vec<RestorationCandidate>, CoreError> {
    let metadata = manager.list_restorable_metadata().await?;
    Ok(metadata
        .iter()
        .map(|m| {
            let score = scoring::restoration_score(m, now_ms);
            RestorationCandidate {
                session_id: m.id.clone(),
                score,
                stage: RestorationStage::for_score(score),
            }
        })
        .collect())
}

/// Restores one candidate: `load -> validate -> (repair if 40<=health<80)
/// -> (recover if health<threshold) -> final-validate` (§4.11).
async fn restore_one(manager: &ChainManager, session_id: &str, options: RestorationOptions, now_ms: i64) -> SessionRestorationResult {
    let load_result = manager.load(session_id, now_ms).await;

    let (mut recovered, loaded_ok) = (false, load_result.is_ok());
    if let Err(e) = &load_result {
        warn!(session_id, error = %e, "restoration load failed, falling back to recovery");
        match manager.recover(session_id, now_ms).await {
            Ok(result) if result.ok => {
                recovered = true;
            }
            Ok(_) | Err(_) => {
                return SessionRestorationResult {
                    session_id: session_id.to_string(),
                    ok: false,
                    recovered: false,
                    final_health_score: None,
                    error: Some(e.to_string()),
                };
            }
        }
    }
    let _ = loaded_ok;

    let report = match manager.validate_health(session_id, false, now_ms).await {
        Ok(r) => r,
        Err(e) => {
            return SessionRestorationResult {
                session_id: session_id.to_string(),
                ok: false,
                recovered,
                final_health_score: None,
                error: Some(e.to_string()),
            };
        }
    };

    let mut health_score = report.health_score;
    if (40..80).contains(&health_score) {
        match manager.validate_health(session_id, true, now_ms).await {
            Ok(repaired_report) => health_score = repaired_report.health_score,
            Err(e) => {
                return SessionRestorationResult {
                    session_id: session_id.to_string(),
                    ok: false,
                    recovered,
                    final_health_score: Some(health_score),
                    error: Some(e.to_string()),
                };
            }
        }
    }

    if health_score < options.health_score_threshold {
        match manager.recover(session_id, now_ms).await {
            Ok(result) if result.ok => recovered = true,
            Ok(_) | Err(_) => {
                return SessionRestorationResult {
                    session_id: session_id.to_string(),
                    ok: false,
                    recovered,
                    final_health_score: Some(health_score),
                    error: Some("recovery could not raise health above threshold".to_string()),
                };
            }
        }
    }

    let final_report = match manager.validate_health(session_id, false, now_ms).await {
        Ok(r) => r,
        Err(e) => {
            return SessionRestorationResult {
                session_id: session_id.to_string(),
                ok: false,
                recovered,
                final_health_score: None,
                error: Some(e.to_string()),
            };
        }
    };

    let ok = !matches!(final_report.status, HealthStatus::Corrupted);
    SessionRestorationResult {
        session_id: session_id.to_string(),
        ok,
        recovered,
        final_health_score: Some(final_report.health_score),
        error: if ok { None } else { Some("session remained corrupted after recovery".to_string()) },
    }
}

/// Runs one stage's candidates with at most `max_concurrent_restorations`
/// in flight at a time, preserving FIFO submission order across batches.
async fn restore_stage(
    manager: &ChainManager,
    candidates: &[RestorationCandidate],
    options: RestorationOptions,
    now_ms: i64,
) -> Vec<SessionRestorationResult> {
    let mut results = Vec::with_capacity(candidates.len());
    for batch in candidates.chunks(options.max_concurrent_restorations.max(1)) {
        let futures = batch.iter().map(|c| restore_one(manager, &c.session_id, options, now_ms));
        results.extend(join_all(futures).await);
    }
    results
}

/// Discovers candidates, partitions into stages, and executes them in
/// priority order (high -> medium -> low), never starting a later stage
/// before the prior one fully completes. Aborts (without starting further
/// stages) once `attempted > 5 && failure_ratio > 0.5`.
#[instrument(skip(manager))]
pub async fn restore_active_sessions(manager: &ChainManager, options: RestorationOptions, now_ms: i64) -> std::result::Result<RestorationReport, RestorationError> {
    let candidates = discover_candidates(manager, now_ms)
        .await
        .unwrap_or_default();

    let mut by_stage: [Vec<RestorationCandidate>; 3] = [Vec::new(), Vec::new(), Vec::new()];
    for candidate in candidates {
        let idx = match candidate.stage {
            RestorationStage::High => 0,
            RestorationStage::Medium => 1,
            RestorationStage::Low => 2,
        };
        by_stage[idx].push(candidate);
    }

    let attempted = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let mut stages = Vec::new();
    let mut all_results = Vec::new();

    for (idx, group) in by_stage.into_iter().enumerate() {
        if group.is_empty() {
            continue;
        }
        let stage = match idx {
            0 => RestorationStage::High,
            1 => RestorationStage::Medium,
            _ => RestorationStage::Low,
        };

        manager
            .events()
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::RestorationStarted,
                "",
                EventData::Restoration { total: group.len(), succeeded: 0, failed: 0 },
                to_utc(now_ms),
            ))
            .await;

        let session_ids: Vec<String> = group.iter().map(|c| c.session_id.clone()).collect();
        let results = restore_stage(manager, &group, options, now_ms).await;

        let succeeded = results.iter().filter(|r| r.ok).count();
        let stage_failed = results.len() - succeeded;
        attempted.fetch_add(results.len(), Ordering::SeqCst);
        failed.fetch_add(stage_failed, Ordering::SeqCst);

        manager
            .events()
            .emit(Event::new(
                id_generator::event_id(now_ms),
                EventType::RestorationCompleted,
                "",
                EventData::Restoration { total: results.len(), succeeded, failed: stage_failed },
                to_utc(now_ms),
            ))
            .await;

        stages.push(StageReport { stage, session_ids, succeeded, failed: stage_failed });
        all_results.extend(results);

        let attempted_so_far = attempted.load(Ordering::SeqCst);
        let failed_so_far = failed.load(Ordering::SeqCst);
        let ratio = if attempted_so_far == 0 { 0.0 } else { failed_so_far as f64 / attempted_so_far as f64 };
        if attempted_so_far > 5 && ratio > 0.5 {
            warn!(attempted = attempted_so_far, failed = failed_so_far, "restoration aborted: failure ratio exceeded");
            return Err(RestorationError::Aborted { attempted: attempted_so_far, failed: failed_so_far, ratio });
        }
    }

    let successful_restorations = all_results.iter().filter(|r| r.ok).count();
    let failed_restorations = all_results.len() - successful_restorations;
    info!(successful_restorations, failed_restorations, "restoration complete");

    Ok(RestorationReport {
        stages,
        results: all_results,
        successful_restorations,
        failed_restorations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionManagerConfig;
    use crate::model::{Complexity, Problem, Step, Strategy, StrategyName, StrategyType};

    fn problem() -> Problem {
        Problem {
            description: "desc".to_string(),
            goal_state: "goal".to_string(),
            complexity: Complexity::Simple,
            constraints: vec![],
            context: serde_json::Map::new(),
            domain: "test".to_string(),
        }
    }

    fn strategy() -> Strategy {
        Strategy { name: StrategyName::Incremental, strategy_type: StrategyType::Sequential, parameters: serde_json::Map::new() }
    }

    fn options() -> RestorationOptions {
        RestorationOptions { max_concurrent_restorations: 3, health_score_threshold: 40 }
    }

    #[tokio::test]
    async fn discover_candidates_stages_by_recency() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        let steps = vec![Step::new("s0", 0, "first")];

        let fresh = manager.create_state(problem(), steps.clone(), strategy(), 0).await.unwrap();
        manager.save(&fresh.id, false, 0).await.unwrap();

        let stale = manager.create_state(problem(), steps, strategy(), 0).await.unwrap();
        manager.save(&stale.id, false, 0).await.unwrap();

        let now_ms = 200 * 3_600_000;
        let candidates = discover_candidates(&manager, now_ms).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.stage == RestorationStage::Low));
    }

    #[tokio::test]
    async fn restore_active_sessions_restores_everything_when_healthy() {
        let manager = ChainManager::new_in_memory(SessionManagerConfig::default());
        for _ in 0..2 {
            let state = manager.create_state(problem(), vec![Step::new("s0", 0, "first")], strategy(), 0).await.unwrap();
            manager.save(&state.id, false, 0).await.unwrap();
        }

        let report = restore_active_sessions(&manager, options(), 0).await.unwrap();
        assert_eq!(report.successful_restorations, 2);
        assert_eq!(report.failed_restorations, 0);
    }
}
