//! DeepSeek chat-completions Gateway (OpenAI-compatible wire format).
//!
//! The HTTP call runs on a worker thread so the caller can give up on
//! cancellation or deadline without waiting for the transport.

use std::env;
use std::error::Error as _;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::core::error::GatewayError;
use crate::core::types::{Msg, Role, ToolCall, ToolSchema};
use crate::io::config::LlmConfig;
use crate::io::gateway::{Gateway, GatewayRequest, GatewayResponse, ToolChoice, ensure_may_proceed};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Gateway backed by the DeepSeek HTTP API.
#[derive(Debug, Clone)]
pub struct DeepSeekGateway {
    config: LlmConfig,
}

impl DeepSeekGateway {
    pub fn new(config: LlmConfig) -> Self {
        Self { config }
    }

    fn api_key(&self) -> Result<String, GatewayError> {
        env::var(&self.config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::Transport(format!(
                    "missing API key: set the {} environment variable",
                    self.config.api_key_env
                ))
            })
    }
}

impl Gateway for DeepSeekGateway {
    #[instrument(skip_all, fields(model = %self.config.model, messages = request.messages.len(), tools = request.tools.len()))]
    fn invoke(&self, request: &GatewayRequest, cancel: &CancelToken) -> Result<GatewayResponse> {
        ensure_may_proceed(request, cancel)?;
        let api_key = self.api_key()?;
        let payload = build_chat_payload(&self.config, request);
        let endpoint = self.config.endpoint.clone();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            hand_back(&tx, send_chat_request(&endpoint, &api_key, &payload, timeout));
        });

        let started = Instant::now();
        loop {
            let wait = match request.deadline {
                Some(deadline) => deadline
                    .saturating_duration_since(Instant::now())
                    .min(POLL_INTERVAL),
                None => POLL_INTERVAL,
            };
            match rx.recv_timeout(wait) {
                Ok(result) => {
                    let response = result?;
                    info!(
                        tool_calls = response.tool_calls.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "gateway call finished"
                    );
                    return Ok(response);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if cancel.is_cancelled() {
                        warn!("gateway call cancelled");
                        return Err(GatewayError::Cancelled.into());
                    }
                    if request.deadline.is_some_and(|d| Instant::now() >= d) {
                        warn!("gateway call exceeded its deadline");
                        return Err(GatewayError::DeadlineExceeded(started.elapsed()).into());
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(GatewayError::Transport("request worker exited".to_string()).into());
                }
            }
        }
    }
}

/// Pass the worker's result to the caller. Returns false when the caller has
/// already given up on the call.
fn hand_back(
    tx: &Sender<Result<GatewayResponse, GatewayError>>,
    result: Result<GatewayResponse, GatewayError>,
) -> bool {
    let failed = result.is_err();
    if tx.send(result).is_err() {
        debug!(failed, "gateway call finished after the caller gave up");
        return false;
    }
    true
}

fn send_chat_request(
    endpoint: &str,
    api_key: &str,
    payload: &Value,
    timeout: Duration,
) -> Result<GatewayResponse, GatewayError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| GatewayError::Transport(format!("build http client: {err}")))?;

    debug!(endpoint, "sending chat completion request");
    let response = client
        .post(endpoint)
        .bearer_auth(api_key)
        .json(payload)
        .send()
        .map_err(|err| format_transport_error(&err))?;

    let status = response.status();
    let body = response
        .text()
        .map_err(|err| format_transport_error(&err))?;
    if !status.is_success() {
        return Err(format_api_error(status, &body));
    }
    parse_chat_response(&body)
}

/// Build the request body for `POST /chat/completions`.
pub fn build_chat_payload(config: &LlmConfig, request: &GatewayRequest) -> Value {
    let messages: Vec<Value> = request.messages.iter().map(message_to_json).collect();

    let mut payload = json!({
        "model": config.model,
        "messages": messages,
        "max_tokens": config.max_tokens,
        "stream": false
    });
    if let Some(temp) = config.temperature {
        payload["temperature"] = json!(temp);
    }
    if !request.tools.is_empty() {
        let tools: Vec<Value> = request.tools.iter().map(tool_to_json).collect();
        payload["tools"] = json!(tools);
        payload["tool_choice"] = tool_choice_to_json(&request.tool_choice);
    }
    payload
}

fn message_to_json(msg: &Msg) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content}),
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            let mut value = json!({"role": "assistant", "content": msg.content});
            if !msg.tool_calls.is_empty() {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments
                            }
                        })
                    })
                    .collect();
                value["tool_calls"] = json!(calls);
            }
            value
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id.as_deref().unwrap_or_default(),
            "content": msg.content
        }),
    }
}

fn tool_to_json(tool: &ToolSchema) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters_json()
        }
    })
}

fn tool_choice_to_json(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Function(name) => json!({"type": "function", "function": {"name": name}}),
    }
}

/// Parse `choices[0].message` from a non-streaming response body.
pub fn parse_chat_response(body: &str) -> Result<GatewayResponse, GatewayError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| GatewayError::InvalidResponse(format!("body is not JSON: {err}")))?;
    let Some(choice) = value
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
    else {
        return Err(GatewayError::InvalidResponse(
            "missing choices[0]".to_string(),
        ));
    };
    let message = choice.get("message").cloned().unwrap_or_else(|| json!({}));
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let tool_calls = message
        .get("tool_calls")
        .map(parse_tool_calls_array)
        .unwrap_or_default();
    Ok(GatewayResponse {
        content,
        tool_calls,
    })
}

fn parse_tool_calls_array(value: &Value) -> Vec<ToolCall> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| {
            let function = item.get("function")?;
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .filter(|name| !name.trim().is_empty())?
                .to_string();
            let arguments = match function.get("arguments") {
                Some(Value::String(raw)) => raw.clone(),
                Some(other) => other.to_string(),
                None => "{}".to_string(),
            };
            let id = item
                .get("id")
                .and_then(|v| v.as_str())
                .filter(|id| !id.trim().is_empty())
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("tool_call_{}", idx + 1));
            Some(ToolCall::new(id, name, arguments))
        })
        .collect()
}

fn format_api_error(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(ToString::to_string))
        })
        .unwrap_or_else(|| body.chars().take(200).collect());

    let message = match status {
        StatusCode::UNAUTHORIZED => format!("invalid or missing API key: {detail}"),
        StatusCode::PAYMENT_REQUIRED => format!("insufficient balance: {detail}"),
        StatusCode::TOO_MANY_REQUESTS => format!("rate limited: {detail}"),
        _ => detail,
    };
    GatewayError::Api {
        status: status.as_u16(),
        message,
    }
}

fn format_transport_error(err: &reqwest::Error) -> GatewayError {
    let inner = err.source().map(|e| e.to_string()).unwrap_or_default();
    let message = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        format!("connection failed: {inner}")
    } else {
        err.to_string()
    };
    GatewayError::Transport(message)
}
