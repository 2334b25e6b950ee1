//! The six validation passes (§4.3), each a pure function over a
//! `ReasoningState` returning the issues it finds.

use std::collections::{BTreeSet, HashSet};

use crate::model::{ReasoningState, StepStatus};

use super::{IssueCategory, RepairAction, Severity, ValidationIssue};

/// Pass 1: presence of id/problem/steps/strategy; numeric ranges.
pub fn structure(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if state.id.trim().is_empty() {
        issues.push(
            ValidationIssue::new(Severity::Critical, IssueCategory::Structure, "missing_id")
                .repairable(RepairAction::GenerateMissingId),
        );
    }
    if state.problem.description.trim().is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Error,
            IssueCategory::Structure,
            "missing_problem_description",
        ));
    }
    if state.current_step > state.total_steps() {
        issues.push(
            ValidationIssue::new(
                Severity::Error,
                IssueCategory::Structure,
                "current_step_out_of_range",
            )
            .repairable(RepairAction::ClampCurrentStep),
        );
    }

    issues
}

/// Pass 2: every step has id and non-empty description, confidence in
/// [0,1], `step.index == array index`.
pub fn data_integrity(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for (i, step) in state.steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            issues.push(
                ValidationIssue::new(Severity::Error, IssueCategory::DataIntegrity, "missing_step_id")
                    .at(format!("steps[{i}]"))
                    .repairable(RepairAction::GenerateMissingId),
            );
        }
        if step.description.trim().is_empty() {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::DataIntegrity,
                    "missing_step_description",
                )
                .at(format!("steps[{i}]")),
            );
        }
        if !(0.0..=1.0).contains(&step.confidence) {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    IssueCategory::DataIntegrity,
                    "confidence_out_of_range",
                )
                .at(format!("steps[{i}]")),
            );
        }
        if step.index != i {
            issues.push(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::DataIntegrity,
                    "step_index_mismatch",
                )
                .at(format!("steps[{i}]"))
                .repairable(RepairAction::ReindexSteps),
            );
        }
    }

    issues
}

/// Pass 3: dependencies reference existing earlier steps; no cycles
/// (DFS with visited + recursion-stack).
pub fn dependencies(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let id_to_index: std::collections::HashMap<&str, usize> = state
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    for (i, step) in state.steps.iter().enumerate() {
        for dep in &step.dependencies {
            match id_to_index.get(dep.as_str()) {
                None => {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Error,
                            IssueCategory::Dependencies,
                            "dependency_not_found",
                        )
                        .at(format!("steps[{i}].dependencies[{dep}]"))
                        .repairable(RepairAction::DropInvalidDependency),
                    );
                }
                Some(&dep_index) if dep_index >= i => {
                    issues.push(
                        ValidationIssue::new(
                            Severity::Error,
                            IssueCategory::Dependencies,
                            "dependency_not_earlier",
                        )
                        .at(format!("steps[{i}].dependencies[{dep}]"))
                        .repairable(RepairAction::DropInvalidDependency),
                    );
                }
                Some(_) => {}
            }
        }
    }

    if has_cycle(state) {
        issues.push(ValidationIssue::new(
            Severity::Critical,
            IssueCategory::Dependencies,
            "dependency_cycle",
        ));
    }

    issues
}

fn has_cycle(state: &ReasoningState) -> bool {
    let id_to_index: std::collections::HashMap<&str, usize> = state
        .steps
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut visited = vec![false; state.steps.len()];
    let mut on_stack = vec![false; state.steps.len()];

    fn dfs(
        i: usize,
        state: &ReasoningState,
        id_to_index: &std::collections::HashMap<&str, usize>,
        visited: &mut [bool],
        on_stack: &mut [bool],
    ) -> bool {
        if on_stack[i] {
            return true;
        }
        if visited[i] {
            return false;
        }
        visited[i] = true;
        on_stack[i] = true;
        for dep in &state.steps[i].dependencies {
            if let Some(&dep_index) = id_to_index.get(dep.as_str()) {
                if dfs(dep_index, state, id_to_index, visited, on_stack) {
                    return true;
                }
            }
        }
        on_stack[i] = false;
        false
    }

    for i in 0..state.steps.len() {
        if !visited[i] && dfs(i, state, &id_to_index, &mut visited, &mut on_stack) {
            return true;
        }
    }
    false
}

/// Pass 4: `totalSteps == |steps|` (tautological here, kept as a guard
/// against future divergence); `currentStep <= totalSteps`; completed
/// prefix agreement.
pub fn consistency(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if state.current_step > state.total_steps() {
        issues.push(ValidationIssue::new(
            Severity::Error,
            IssueCategory::Consistency,
            "current_step_exceeds_total",
        ));
    }

    let completed: BTreeSet<String> = state
        .steps
        .iter()
        .filter(|s| s.status == StepStatus::Completed || s.status == StepStatus::Skipped)
        .map(|s| s.id.clone())
        .collect();

    for step in state.steps.iter() {
        if step.status == StepStatus::InProgress || step.status == StepStatus::Completed {
            if !step.is_dependency_satisfied_by(&completed) && step.status == StepStatus::InProgress {
                issues.push(
                    ValidationIssue::new(
                        Severity::Warning,
                        IssueCategory::Consistency,
                        "dependency_not_satisfied_for_in_progress",
                    )
                    .at(format!("steps[{}]", step.index)),
                );
            }
        }
    }

    issues
}

/// Pass 5 (informational): length thresholds, per-step serialized-size
/// warnings.
pub fn performance(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if state.steps.len() > 500 {
        issues.push(ValidationIssue::new(
            Severity::Info,
            IssueCategory::Performance,
            "large_step_count",
        ));
    }

    for (i, step) in state.steps.iter().enumerate() {
        let approx_size = step.description.len() + step.reasoning.len();
        if approx_size > 100_000 {
            issues.push(
                ValidationIssue::new(Severity::Info, IssueCategory::Performance, "oversized_step")
                    .at(format!("steps[{i}]")),
            );
        }
    }

    issues
}

/// Pass 6: structural sanity of the nested `problem`/`strategy` records.
pub fn deep(state: &ReasoningState) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if state.problem.goal_state.trim().is_empty() {
        issues.push(ValidationIssue::new(
            Severity::Warning,
            IssueCategory::Deep,
            "missing_goal_state",
        ));
    }

    let unique_constraints: HashSet<&str> =
        state.problem.constraints.iter().map(String::as_str).collect();
    if unique_constraints.len() != state.problem.constraints.len() {
        issues.push(ValidationIssue::new(
            Severity::Info,
            IssueCategory::Deep,
            "duplicate_constraints",
        ));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReasoningStateBuilder, Step};

    #[test]
    fn empty_id_is_critical_and_repairable() {
        let state = ReasoningStateBuilder::new(0).build();
        let issues = structure(&state);
        assert!(issues.iter().any(|i| i.code == "missing_id" && i.can_repair));
    }

    #[test]
    fn index_mismatch_detected() {
        let mut step = Step::new("s0", 5, "desc");
        step.confidence = 0.5;
        let state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-x")
            .with_steps(vec![step])
            .build();
        let issues = data_integrity(&state);
        assert!(issues.iter().any(|i| i.code == "step_index_mismatch"));
    }

    #[test]
    fn cyclic_dependency_detected() {
        let mut s0 = Step::new("s0", 0, "first").with_dependencies(["s1".to_string()]);
        s0.confidence = 0.5;
        let mut s1 = Step::new("s1", 1, "second").with_dependencies(["s0".to_string()]);
        s1.confidence = 0.5;
        let state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-x")
            .with_steps(vec![s0, s1])
            .build();
        let issues = dependencies(&state);
        assert!(issues.iter().any(|i| i.code == "dependency_cycle"));
    }

    #[test]
    fn forward_reference_rejected() {
        let mut s0 = Step::new("s0", 0, "first").with_dependencies(["s1".to_string()]);
        s0.confidence = 0.5;
        let mut s1 = Step::new("s1", 1, "second");
        s1.confidence = 0.5;
        let state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-x")
            .with_steps(vec![s0, s1])
            .build();
        let issues = dependencies(&state);
        assert!(issues.iter().any(|i| i.code == "dependency_not_earlier"));
    }
}
