//! C3: structural/dependency/consistency checks over a `ReasoningState`,
//! producing a health score and optional auto-repair.
//!
//! The six-pass pipeline shape is grounded on the teacher's
//! `reducers::ReducerRegistry`: an ordered list of independent passes run in
//! sequence, each contributing issues rather than mutating state directly.

pub mod passes;
pub mod repair;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ReasoningState;

#[derive(Debug, Error, Diagnostic)]
pub enum ValidationError {
    #[error("validation rejected input: {0}")]
    #[diagnostic(code(reasoning_sessions::validation::rejected))]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Structure,
    DataIntegrity,
    Dependencies,
    Consistency,
    Performance,
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairAction {
    GenerateMissingId,
    ResetTotalSteps,
    ClampCurrentStep,
    ReindexSteps,
    DropInvalidDependency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub code: String,
    pub location: Option<String>,
    pub can_repair: bool,
    pub repair_action: Option<RepairAction>,
}

impl ValidationIssue {
    fn new(severity: Severity, category: IssueCategory, code: &str) -> Self {
        Self {
            severity,
            category,
            code: code.to_string(),
            location: None,
            can_repair: false,
            repair_action: None,
        }
    }

    fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    fn repairable(mut self, action: RepairAction) -> Self {
        self.can_repair = true;
        self.repair_action = Some(action);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
    Corrupted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
    pub health_score: u8,
    pub status: HealthStatus,
}

impl ValidationReport {
    pub fn repaired_issue_count(&self) -> usize {
        self.issues.iter().filter(|i| i.can_repair).count()
    }
}

/// Computed from issue counts: start at 100, subtract 25/15/5/1 per
/// critical/error/warning/info, floor 0.
fn score_issues(issues: &[ValidationIssue]) -> u8 {
    let mut score: i32 = 100;
    for issue in issues {
        score -= match issue.severity {
            Severity::Critical => 25,
            Severity::Error => 15,
            Severity::Warning => 5,
            Severity::Info => 1,
        };
    }
    score.max(0) as u8
}

fn status_for_score(score: u8) -> HealthStatus {
    if score >= 80 {
        HealthStatus::Healthy
    } else if score >= 60 {
        HealthStatus::Warning
    } else if score >= 40 {
        HealthStatus::Critical
    } else {
        HealthStatus::Corrupted
    }
}

/// Runs the six-pass pipeline and scores the result. Does not mutate `state`.
pub fn validate(state: &ReasoningState) -> ValidationReport {
    let mut issues = Vec::new();
    issues.extend(passes::structure(state));
    issues.extend(passes::data_integrity(state));
    issues.extend(passes::dependencies(state));
    issues.extend(passes::consistency(state));
    issues.extend(passes::performance(state));
    issues.extend(passes::deep(state));

    let health_score = score_issues(&issues);
    ValidationReport {
        status: status_for_score(health_score),
        issues,
        health_score,
    }
}

/// Applies every repairable issue's action to a deep copy of `state`,
/// returning the repaired state and the report that drove the repairs.
/// Repair is idempotent: running `validate` again must not find *more*
/// repairable issues than this pass started with (P6).
pub fn validate_and_repair(state: &ReasoningState) -> (ReasoningState, ValidationReport) {
    let report = validate(state);
    let mut repaired = state.clone();
    for issue in report.issues.iter().filter(|i| i.can_repair) {
        if let Some(action) = issue.repair_action {
            repair::apply(&mut repaired, action, issue.location.as_deref());
        }
    }
    (repaired, report)
}
