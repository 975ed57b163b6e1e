//! Side-effecting adapters: configuration, model gateway, shell, code runners.

pub mod bash;
pub mod code;
pub mod config;
pub mod deepseek;
pub mod gateway;
pub mod process;
pub mod prompt;
