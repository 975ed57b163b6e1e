//! Progress report rendering.

use crate::core::types::{Plan, StepState};

/// Render the textual progress report for `plan`.
///
/// Pure: the output depends only on the plan's current state.
pub fn format_plan(plan: &Plan) -> String {
    let header = format!("Plan: {} (ID: {})", plan.title, plan.id);
    let total = plan.steps.len();
    let completed = plan.count(StepState::Completed);

    let mut out = String::new();
    out.push_str(&format!("{header}\n{}\n\n", "=".repeat(header.chars().count())));
    out.push_str(&format!(
        "Progress: {completed} / {total} steps completed {}\n",
        progress_percentage(completed, total)
    ));
    out.push_str(&format!(
        "Status: {completed} completed, {} in progress, {} not started, {} blocked\n\n",
        plan.count(StepState::InProgress),
        plan.count(StepState::NotStarted),
        plan.count(StepState::Blocked),
    ));
    out.push_str("Steps:\n");

    for (index, step) in plan.steps.iter().enumerate() {
        out.push_str(&format!("{index}. {} {}\n", step.state.glyph(), step.content));
        if let Some(notes) = step.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            out.push_str(&format!("   Notes: {}\n", first_line(notes)));
        }
    }
    out
}

/// `(50.0%)` style completion figure; `(0%)` for an empty plan.
pub fn progress_percentage(completed: usize, total: usize) -> String {
    if total == 0 {
        return "(0%)".to_string();
    }
    let percentage = completed as f64 / total as f64 * 100.0;
    format!("({percentage:.1}%)")
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
