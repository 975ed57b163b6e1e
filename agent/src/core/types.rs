//! Shared deterministic types for plan execution.
//!
//! These types define the contracts between the planner, the scheduler and
//! the execution loop. They hold no external state and perform no I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single plan step.
///
/// Transitions are monotonic: `NotStarted -> InProgress -> {Completed | Blocked}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    NotStarted,
    InProgress,
    Completed,
    Blocked,
}

impl StepState {
    pub const ALL: [StepState; 4] = [
        StepState::NotStarted,
        StepState::InProgress,
        StepState::Completed,
        StepState::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StepState::NotStarted => "not_started",
            StepState::InProgress => "in_progress",
            StepState::Completed => "completed",
            StepState::Blocked => "blocked",
        }
    }

    /// Status glyph used by the progress report.
    pub fn glyph(self) -> &'static str {
        match self {
            StepState::NotStarted => "[ ]",
            StepState::InProgress => "[→]",
            StepState::Completed => "[✓]",
            StepState::Blocked => "[!]",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Completed | StepState::Blocked)
    }

    /// Returns true if `self -> next` is a legal forward transition.
    pub fn can_transition_to(self, next: StepState) -> bool {
        matches!(
            (self, next),
            (StepState::NotStarted, StepState::InProgress)
                | (StepState::InProgress, StepState::Completed)
                | (StepState::InProgress, StepState::Blocked)
        )
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic unit of work inside a [`Plan`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub content: String,
    pub state: StepState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Step {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            state: StepState::NotStarted,
            notes: None,
        }
    }
}

/// Ordered set of steps addressing one user task.
///
/// Step order is fixed at creation. Only a step's `state` and `notes` change
/// afterwards, and only through [`crate::core::state_update::mark_step`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn new<I, S>(id: impl Into<String>, title: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            title: title.into(),
            steps: steps.into_iter().map(Step::new).collect(),
        }
    }

    pub fn count(&self, state: StepState) -> usize {
        self.steps.iter().filter(|s| s.state == state).count()
    }

    /// True once every step has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.steps.iter().all(|s| s.state.is_terminal())
    }
}

/// Conversation role of a [`Msg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Structured action request emitted by the model.
///
/// `arguments` is kept as raw encoded text and decoded only by the dispatch
/// branch that handles `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// One conversation turn.
///
/// A `Tool` message's `tool_call_id` references a [`ToolCall`] emitted by an
/// earlier `Assistant` message. The execution loop maintains this pairing;
/// the type itself does not enforce it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

impl Msg {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content)
        }
    }
}

/// Declarative description of a callable tool exposed to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
}

impl ToolSchema {
    /// JSON-Schema object for the tool parameters.
    pub fn parameters_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.parameters).unwrap_or(serde_json::Value::Null)
    }
}

/// JSON-Schema `object` describing tool arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: BTreeMap<String, PropertySchema>,
    pub required: BTreeSet<String>,
}

/// Schema for one argument field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<ItemSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSchema {
    #[serde(rename = "type")]
    pub kind: String,
}

impl PropertySchema {
    pub fn new(kind: &str, description: &str) -> Self {
        Self {
            kind: kind.to_string(),
            description: description.to_string(),
            enum_values: None,
            items: None,
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_items(mut self, kind: &str) -> Self {
        self.items = Some(ItemSchema {
            kind: kind.to_string(),
        });
        self
    }
}
