//! Agent configuration stored in `agent.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "agent.toml";

/// Agent configuration (TOML).
///
/// Intended to be edited by humans. Missing fields default to values that
/// work against the public DeepSeek API with a local bash and Go toolchain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    pub llm: LlmConfig,
    pub bash: BashConfig,
    pub code: CodeConfig,
    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat-completions endpoint (OpenAI-compatible).
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    /// Transport timeout for a single Gateway call.
    pub timeout_secs: u64,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BashConfig {
    pub shell: String,
    /// Per-command wall-clock limit.
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodeConfig {
    /// `go` runs code with the Go toolchain; `echo` returns the code verbatim.
    pub runner: String,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Keep at most this many conversation turns (0 = unbounded).
    pub history_limit: usize,
    /// Deadline for the Gateway call of a single step.
    pub step_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            llm: LlmConfig::default(),
            bash: BashConfig::default(),
            code: CodeConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/chat/completions".to_string(),
            model: "deepseek-chat".to_string(),
            api_key_env: "DEEPSEEK_API_KEY".to_string(),
            timeout_secs: 120,
            max_tokens: 4096,
            temperature: None,
        }
    }
}

impl Default for BashConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/bash".to_string(),
            timeout_secs: 20,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            runner: "go".to_string(),
            timeout_secs: 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            history_limit: 0,
            step_timeout_secs: 600,
        }
    }
}

impl BashConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if self.llm.endpoint.trim().is_empty() {
            return Err(anyhow!("llm.endpoint must be non-empty"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(anyhow!("llm.model must be non-empty"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(anyhow!("llm.timeout_secs must be > 0"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if self.bash.shell.trim().is_empty() {
            return Err(anyhow!("bash.shell must be non-empty"));
        }
        if self.bash.timeout_secs == 0 {
            return Err(anyhow!("bash.timeout_secs must be > 0"));
        }
        if self.bash.output_limit_bytes == 0 {
            return Err(anyhow!("bash.output_limit_bytes must be > 0"));
        }
        if !matches!(self.code.runner.as_str(), "go" | "echo") {
            return Err(anyhow!(
                "code.runner must be \"go\" or \"echo\", got {:?}",
                self.code.runner
            ));
        }
        if self.code.timeout_secs == 0 {
            return Err(anyhow!("code.timeout_secs must be > 0"));
        }
        if self.code.output_limit_bytes == 0 {
            return Err(anyhow!("code.output_limit_bytes must be > 0"));
        }
        if self.executor.step_timeout_secs == 0 {
            return Err(anyhow!("executor.step_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AgentConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("nested").join("agent.toml");
        let cfg = AgentConfig {
            log_level: "debug".to_string(),
            ..AgentConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(&path, "[bash]\ntimeout_secs = 5\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.bash.timeout_secs, 5);
        assert_eq!(cfg.bash.shell, "/bin/bash");
        assert_eq!(cfg.llm, LlmConfig::default());
    }

    #[test]
    fn rejects_unknown_code_runner() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("agent.toml");
        fs::write(&path, "[code]\nrunner = \"python\"\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("code.runner"));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let cfg = AgentConfig {
            bash: BashConfig {
                timeout_secs: 0,
                ..BashConfig::default()
            },
            ..AgentConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
