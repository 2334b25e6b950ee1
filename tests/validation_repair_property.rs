//! Property: one pass of `validate_and_repair` reaches a fixed point for
//! every repairable issue class (P6) — running it again over its own output
//! never finds anything left to repair, however the steps were scrambled.

#[macro_use]
extern crate proptest;

use proptest::prelude::*;

use reasoning_sessions::model::{ReasoningStateBuilder, Step};
use reasoning_sessions::validation::validate_and_repair;

/// A step with a deliberately wrong `index` and a dependency that is either
/// forward-referencing, dangling, or absent.
fn scrambled_step(pool: Vec<String>) -> impl Strategy<Value = (usize, Option<String>)> {
    let dep = prop_oneof![
        Just(None),
        Just(Some("ghost-dependency".to_string())),
        proptest::sample::select(pool).prop_map(Some),
    ];
    (0usize..20, dep)
}

fn scrambled_state() -> impl Strategy<Value = Vec<(usize, Option<String>)>> {
    (1usize..8).prop_flat_map(|n| {
        let ids: Vec<String> = (0..n).map(|i| format!("s{i}")).collect();
        proptest::collection::vec(scrambled_step(ids), n)
    })
}

proptest! {
    #[test]
    fn repair_converges_in_one_pass(spec in scrambled_state()) {
        let steps: Vec<Step> = spec
            .iter()
            .enumerate()
            .map(|(i, (scrambled_index, dep))| {
                let mut step = Step::new(format!("s{i}"), *scrambled_index, "non-empty description");
                step.confidence = 0.5;
                if let Some(dep) = dep {
                    step = step.with_dependencies([dep.clone()]);
                }
                step
            })
            .collect();

        let state = ReasoningStateBuilder::new(0)
            .with_id("reasoning-property-test")
            .with_steps(steps)
            .build();

        let (repaired_once, first_report) = validate_and_repair(&state);
        let (_, second_report) = validate_and_repair(&repaired_once);

        prop_assert_eq!(
            second_report.repaired_issue_count(),
            0,
            "first pass repaired {} issue(s) but left more behind: {:?}",
            first_report.repaired_issue_count(),
            second_report.issues,
        );
    }
}
