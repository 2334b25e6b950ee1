//! Priority scoring for [`super::RestorationCandidate`]s (§4.11).
//!
//! Three of the five weighted terms (`complexity`, `dependencies`,
//! `userPriority`) are left undefined by the spec's abstract description —
//! it names the weights but not how to derive the terms from this crate's
//! concrete `SessionMetadata`. The resolutions below are recorded in
//! `DESIGN.md`.

use crate::model::SessionMetadata;

/// 100 if touched within the last hour, decaying in four steps to 20.
pub fn activity_score(last_activity_ms: i64, now_ms: i64) -> f64 {
    let age_hours = (now_ms - last_activity_ms).max(0) as f64 / 3_600_000.0;
    if age_hours <= 1.0 {
        100.0
    } else if age_hours <= 6.0 {
        80.0
    } else if age_hours <= 24.0 {
        60.0
    } else if age_hours <= 168.0 {
        40.0
    } else {
        20.0
    }
}

/// A cheap pre-check over sidecar metadata alone (no blob fetch): four
/// boolean checks on required fields, base 50, +12.5 each.
pub fn health_precheck_score(metadata: &SessionMetadata) -> f64 {
    let checks = [
        !metadata.problem_summary.is_empty(),
        !metadata.strategy_name.is_empty(),
        metadata.total_steps > 0,
        metadata.current_step <= metadata.total_steps,
    ];
    let passing = checks.iter().filter(|c| **c).count();
    50.0 + 12.5 * passing as f64
}

/// Proxy for problem complexity: sessions with more steps carry more
/// compounded reasoning and are weighted as more complex, capped at 20
/// steps so a single outlier session can't dominate the pool.
fn complexity_score(metadata: &SessionMetadata) -> f64 {
    100.0 * (metadata.total_steps.min(20) as f64 / 20.0)
}

/// Proxy for "dependencies": how much completed work is riding on this
/// session, approximated as its progress fraction — a session that is 90%
/// through its chain has more sunk, unrecoverable-elsewhere work than one
/// just starting.
fn dependencies_score(metadata: &SessionMetadata) -> f64 {
    if metadata.total_steps == 0 {
        0.0
    } else {
        100.0 * (metadata.current_step as f64 / metadata.total_steps as f64)
    }
}

/// No user-priority field exists anywhere in the data model (§9 silence);
/// this term defaults to a neutral midpoint until a caller-supplied
/// priority hint is threaded through `SessionMetadata`.
const DEFAULT_USER_PRIORITY: f64 = 50.0;

/// The weighted sum from §4.11: activity 0.30, health 0.25, complexity
/// 0.15, dependencies 0.15, userPriority 0.15.
pub fn restoration_score(metadata: &SessionMetadata, now_ms: i64) -> f64 {
    let activity = activity_score(metadata.last_activity, now_ms);
    let health = health_precheck_score(metadata);
    let complexity = complexity_score(metadata);
    let dependencies = dependencies_score(metadata);
    0.30 * activity + 0.25 * health + 0.15 * complexity + 0.15 * dependencies + 0.15 * DEFAULT_USER_PRIORITY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TimeoutConfig;

    fn metadata(last_activity: i64, total_steps: usize, current_step: usize) -> SessionMetadata {
        let mut m = SessionMetadata::new("s1", 0, "solve it", "incremental", total_steps, TimeoutConfig::default());
        m.last_activity = last_activity;
        m.current_step = current_step;
        m
    }

    #[test]
    fn activity_buckets_match_thresholds() {
        let hour = 3_600_000;
        assert_eq!(activity_score(0, hour), 100.0);
        assert_eq!(activity_score(0, 6 * hour), 80.0);
        assert_eq!(activity_score(0, 24 * hour), 60.0);
        assert_eq!(activity_score(0, 168 * hour), 40.0);
        assert_eq!(activity_score(0, 169 * hour), 20.0);
    }

    #[test]
    fn health_precheck_rewards_well_formed_metadata() {
        let m = metadata(0, 5, 2);
        assert_eq!(health_precheck_score(&m), 100.0);
    }

    #[test]
    fn health_precheck_penalizes_missing_fields() {
        let mut m = metadata(0, 5, 2);
        m.problem_summary.clear();
        m.total_steps = 0;
        assert_eq!(health_precheck_score(&m), 62.5);
    }

    #[test]
    fn fresh_well_formed_session_scores_high() {
        let m = metadata(0, 20, 18);
        let score = restoration_score(&m, 0);
        assert!(score >= 80.0, "expected high-priority score, got {score}");
    }

    #[test]
    fn stale_session_scores_low() {
        let m = metadata(0, 1, 0);
        let score = restoration_score(&m, 200 * 3_600_000);
        assert!(score < 50.0, "expected low-priority score, got {score}");
    }
}
