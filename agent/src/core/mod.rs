//! Deterministic, pure logic shared by the planner, scheduler and execution loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod error;
pub mod report;
pub mod schemas;
pub mod selector;
pub mod state_update;
pub mod tags;
pub mod tool_args;
pub mod tools;
pub mod types;
