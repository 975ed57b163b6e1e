//! Deterministic step selection.

use crate::core::types::{Plan, StepState};

/// Index of the lowest-index step that has not started yet.
///
/// Returns `None` when every step has been picked up at least once.
pub fn first_not_started(plan: &Plan) -> Option<usize> {
    plan.steps
        .iter()
        .position(|step| step.state == StepState::NotStarted)
}

/// Returns true if `index` is the final step of the plan.
pub fn is_last(plan: &Plan, index: usize) -> bool {
    !plan.steps.is_empty() && index == plan.steps.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::plan_with_states;

    #[test]
    fn selects_lowest_index_not_started() {
        let plan = plan_with_states(&[
            StepState::Completed,
            StepState::Blocked,
            StepState::NotStarted,
            StepState::NotStarted,
        ]);
        assert_eq!(first_not_started(&plan), Some(2));
    }

    #[test]
    fn skips_in_progress_steps() {
        let plan = plan_with_states(&[StepState::InProgress, StepState::NotStarted]);
        assert_eq!(first_not_started(&plan), Some(1));
    }

    #[test]
    fn none_when_all_started() {
        let plan = plan_with_states(&[StepState::Completed, StepState::InProgress]);
        assert_eq!(first_not_started(&plan), None);
        assert_eq!(first_not_started(&plan_with_states(&[])), None);
    }

    #[test]
    fn is_last_handles_empty_plan() {
        assert!(!is_last(&plan_with_states(&[]), 0));
        let plan = plan_with_states(&[StepState::NotStarted, StepState::NotStarted]);
        assert!(!is_last(&plan, 0));
        assert!(is_last(&plan, 1));
    }
}
