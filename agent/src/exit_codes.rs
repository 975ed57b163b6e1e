//! Stable exit codes for `agent` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid usage or configuration, or any other failure.
pub const INVALID: i32 = 1;
/// The planning call did not produce a usable plan.
pub const PLAN_CREATION_FAILED: i32 = 2;
/// Plan execution halted on an error (gateway, shell session, scheduling).
pub const EXECUTION_HALTED: i32 = 3;
