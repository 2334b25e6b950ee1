//! Applies a single [`RepairAction`] to a state in place. Called once per
//! repairable issue from [`super::validate_and_repair`].

use crate::model::ReasoningState;
use crate::utils::id_generator;

use super::RepairAction;

pub fn apply(state: &mut ReasoningState, action: RepairAction, location: Option<&str>) {
    match action {
        RepairAction::GenerateMissingId => generate_missing_id(state, location),
        RepairAction::ResetTotalSteps => {
            // totalSteps is derived from steps.len() in this crate's model,
            // so there is nothing to reset independently; kept as a no-op
            // repair so the issue is still counted as resolved.
        }
        RepairAction::ClampCurrentStep => {
            state.current_step = state.current_step.min(state.total_steps());
        }
        RepairAction::ReindexSteps => reindex(state),
        RepairAction::DropInvalidDependency => drop_invalid_dependency(state, location),
    }
}

fn step_index_from_location(location: Option<&str>) -> Option<usize> {
    let location = location?;
    let inner = location.strip_prefix("steps[")?;
    let end = inner.find(']')?;
    inner[..end].parse().ok()
}

fn generate_missing_id(state: &mut ReasoningState, location: Option<&str>) {
    match step_index_from_location(location) {
        Some(i) => {
            if let Some(step) = state.steps.get_mut(i) {
                if step.id.trim().is_empty() {
                    step.id = format!("step-{}-{}", i, id_generator::event_id(step.timestamp));
                }
            }
        }
        None => {
            if state.id.trim().is_empty() {
                state.id = id_generator::session_id(state.created_at);
            }
        }
    }
}

fn reindex(state: &mut ReasoningState) {
    for (i, step) in state.steps.iter_mut().enumerate() {
        step.index = i;
    }
}

fn drop_invalid_dependency(state: &mut ReasoningState, location: Option<&str>) {
    let Some(location) = location else { return };
    // location shape: "steps[<i>].dependencies[<dep>]"
    let Some(i) = step_index_from_location(Some(location)) else {
        return;
    };
    let Some(dep_start) = location.find(".dependencies[") else {
        return;
    };
    let dep = &location[dep_start + ".dependencies[".len()..location.len() - 1];
    if let Some(step) = state.steps.get_mut(i) {
        step.dependencies.remove(dep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReasoningStateBuilder, Step};

    #[test]
    fn clamp_current_step_repairs_out_of_range() {
        let mut state = ReasoningStateBuilder::new(0).with_id("reasoning-x").build();
        state.current_step = 99;
        apply(&mut state, RepairAction::ClampCurrentStep, None);
        assert_eq!(state.current_step, 0);
    }

    #[test]
    fn reindex_fixes_mismatched_indices() {
        let mut step = Step::new("s0", 7, "desc");
        step.confidence = 0.5;
        let mut state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-x")
            .with_steps(vec![step])
            .build();
        apply(&mut state, RepairAction::ReindexSteps, None);
        assert_eq!(state.steps[0].index, 0);
    }

    #[test]
    fn drop_invalid_dependency_removes_it() {
        let mut step = Step::new("s0", 0, "desc").with_dependencies(["ghost".to_string()]);
        step.confidence = 0.5;
        let mut state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-x")
            .with_steps(vec![step])
            .build();
        apply(
            &mut state,
            RepairAction::DropInvalidDependency,
            Some("steps[0].dependencies[ghost]"),
        );
        assert!(state.steps[0].dependencies.is_empty());
    }
}
