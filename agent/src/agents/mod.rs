//! Model-driven agents: the planner and the tool-calling execution loop.

pub mod executor;
pub mod planner;
