//! Plan-and-execute agent.
//!
//! A free-text task is turned into an ordered [`core::types::Plan`] by one
//! planning call to a language model. The scheduler then walks the steps in
//! order, handing each one to a tool-calling execution loop that lets the model
//! run shell commands, execute code, answer directly, or terminate.
//!
//! - **[`core`]**: Pure, deterministic logic (plan state machine, report
//!   rendering, tool schemas, argument decoding). No I/O.
//! - **[`io`]**: Side-effecting adapters (config, model gateway, bash
//!   session, code runners, prompts).
//! - **[`agents`]**: Planner and execution loop built on top of `io`.
//! - **[`scheduler`]**: Runs a plan to completion.

pub mod agents;
pub mod cancel;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
