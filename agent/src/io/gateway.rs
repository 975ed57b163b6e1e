//! LLM Gateway abstraction.
//!
//! The [`Gateway`] trait decouples planning and execution from the concrete
//! model provider. Tests use scripted gateways that return predetermined
//! responses without any network access.

use std::time::{Duration, Instant};

use anyhow::Result;

use crate::cancel::CancelToken;
use crate::core::error::GatewayError;
use crate::core::types::{Msg, ToolCall, ToolSchema};

/// How the model may pick tools.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
    /// Force a specific function.
    Function(String),
}

/// One Gateway round trip: full conversation plus the tools on offer.
#[derive(Debug, Clone)]
pub struct GatewayRequest {
    pub messages: Vec<Msg>,
    pub tools: Vec<ToolSchema>,
    pub tool_choice: ToolChoice,
    /// Abort the call once this instant passes.
    pub deadline: Option<Instant>,
}

impl GatewayRequest {
    pub fn new(messages: Vec<Msg>, tools: Vec<ToolSchema>) -> Self {
        Self {
            messages,
            tools,
            tool_choice: ToolChoice::Auto,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Assistant text plus zero or more tool calls, in model order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Abstraction over the model provider's request/response API.
///
/// Implementations block until the response arrives, `cancel` fires, or the
/// request deadline passes. Failures surface as [`GatewayError`] at the root of
/// the returned error.
pub trait Gateway {
    fn invoke(&self, request: &GatewayRequest, cancel: &CancelToken) -> Result<GatewayResponse>;
}

impl<G: Gateway + ?Sized> Gateway for &G {
    fn invoke(&self, request: &GatewayRequest, cancel: &CancelToken) -> Result<GatewayResponse> {
        (**self).invoke(request, cancel)
    }
}

impl<G: Gateway + ?Sized> Gateway for std::sync::Arc<G> {
    fn invoke(&self, request: &GatewayRequest, cancel: &CancelToken) -> Result<GatewayResponse> {
        (**self).invoke(request, cancel)
    }
}

/// Fail fast if the call should not start at all.
pub fn ensure_may_proceed(request: &GatewayRequest, cancel: &CancelToken) -> Result<(), GatewayError> {
    if cancel.is_cancelled() {
        return Err(GatewayError::Cancelled);
    }
    if let Some(deadline) = request.deadline
        && Instant::now() >= deadline
    {
        return Err(GatewayError::DeadlineExceeded(Duration::ZERO));
    }
    Ok(())
}
