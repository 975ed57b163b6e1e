//! Runner-owned step state updates.
//!
//! All step mutations go through [`mark_step`], which rejects out-of-range
//! indices and non-monotonic transitions.

use crate::core::error::SchedulingError;
use crate::core::types::{Plan, StepState};

/// Move step `index` to `to`, optionally replacing its notes.
///
/// `notes = None` leaves existing notes untouched.
pub fn mark_step(
    plan: &mut Plan,
    index: usize,
    to: StepState,
    notes: Option<String>,
) -> Result<(), SchedulingError> {
    let len = plan.steps.len();
    let step = plan
        .steps
        .get_mut(index)
        .ok_or(SchedulingError::IndexOutOfRange { index, len })?;

    if !step.state.can_transition_to(to) {
        return Err(SchedulingError::IllegalTransition {
            index,
            from: step.state,
            to,
        });
    }

    step.state = to;
    if notes.is_some() {
        step.notes = notes;
    }
    Ok(())
}
