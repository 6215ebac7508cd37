//! Settings loading and validation.
//!
//! Reads a YAML settings file and resolves environment variables. Settings
//! are the single source of truth for endpoints, credentials, timeouts, and
//! pool/loop sizing — constructed once at startup and passed by reference
//! into the components that need them.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

// ─── Errors ─────────────────────────────────────────────────────────────────

/// Settings loading or validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse settings: {reason}")]
    Parse { reason: String },
}

// ─── Sections ───────────────────────────────────────────────────────────────

/// Remote tool-server (MCP proxy) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct McpSettings {
    /// Full endpoint URL the JSON-RPC envelopes are POSTed to.
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    /// Timeout for handshake calls (`initialize`, `tools/list`).
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Timeout for `tools/call` — longer, tool latency dominates.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Sessions pre-initialized at startup.
    #[serde(default = "default_pool_warm_size")]
    pub pool_warm_size: usize,
    /// Hard cap on sessions the pool may ever create.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: usize,
}

impl Default for McpSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8008/mcp".to_string(),
            api_key: None,
            protocol_version: default_protocol_version(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            pool_warm_size: default_pool_warm_size(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

fn default_protocol_version() -> String {
    "2025-06-18".to_string()
}
fn default_handshake_timeout_secs() -> u64 {
    30
}
fn default_call_timeout_secs() -> u64 {
    60
}
fn default_pool_warm_size() -> usize {
    5
}
fn default_pool_max_size() -> usize {
    10
}

/// Model endpoint settings for the LLM gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Retries for HTTP 429 before surfacing a rate-limit error.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: String::new(),
            api_version: default_api_version(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_api_version() -> String {
    "2023-06-01".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_retries() -> u32 {
    3
}
fn default_request_timeout_secs() -> u64 {
    120
}

/// Agent loop and cache settings.
#[derive(Debug, Clone, Deserialize)]
pub struct PlannerSettings {
    /// Hard cap on model turns per run.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// System prompt text, supplied by the caller's prompt layer. The crate
    /// treats it as opaque configuration.
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system_prompt: String::new(),
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_max_turns() -> u32 {
    10
}
fn default_cache_ttl_secs() -> u64 {
    3600
}
fn default_cache_capacity() -> usize {
    256
}

/// Top-level settings (mirrors `settings.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub mcp: McpSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub planner: PlannerSettings,
}

// ─── Loading ────────────────────────────────────────────────────────────────

/// Load and parse the settings file.
///
/// Performs environment-variable interpolation on string values matching
/// `${VAR_NAME}` or `${VAR_NAME:-default}`.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let interpolated = interpolate_env_vars(&raw);

    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

// ─── Env-var interpolation ──────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name).unwrap_or_else(|_| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.mcp.protocol_version, "2025-06-18");
        assert_eq!(settings.mcp.pool_warm_size, 5);
        assert_eq!(settings.mcp.pool_max_size, 10);
        assert_eq!(settings.mcp.handshake_timeout_secs, 30);
        assert_eq!(settings.mcp.call_timeout_secs, 60);
        assert_eq!(settings.llm.max_retries, 3);
        assert_eq!(settings.llm.max_tokens, 4096);
        assert_eq!(settings.planner.max_turns, 10);
        assert_eq!(settings.planner.cache_ttl_secs, 3600);
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        std::env::remove_var("__TRIPSMITH_TEST_MISSING__");
        let input = "${__TRIPSMITH_TEST_MISSING__:-fallback-value}";
        assert_eq!(interpolate_env_vars(input), "fallback-value");
    }

    #[test]
    fn test_interpolate_env_vars_with_value() {
        std::env::set_var("__TRIPSMITH_TEST_SET__", "from-env");
        let input = "key: ${__TRIPSMITH_TEST_SET__:-fallback}";
        assert_eq!(interpolate_env_vars(input), "key: from-env");
        std::env::remove_var("__TRIPSMITH_TEST_SET__");
    }

    #[test]
    fn test_interpolate_no_vars() {
        let input = "plain text with no variables";
        assert_eq!(interpolate_env_vars(input), input);
    }

    #[test]
    fn test_load_settings_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "mcp:\n  endpoint: \"http://proxy:9000/mcp\"\n  pool_max_size: 4\nllm:\n  model: \"test-model\"\n  api_key: \"${{__TRIPSMITH_TEST_KEY__:-dummy}}\"\nplanner:\n  max_turns: 6\n"
        )
        .unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.mcp.endpoint, "http://proxy:9000/mcp");
        assert_eq!(settings.mcp.pool_max_size, 4);
        assert_eq!(settings.mcp.pool_warm_size, 5); // default
        assert_eq!(settings.llm.model, "test-model");
        assert_eq!(settings.llm.api_key, "dummy");
        assert_eq!(settings.planner.max_turns, 6);
    }

    #[test]
    fn test_load_settings_missing_file() {
        let result = load_settings(Path::new("/nonexistent/settings.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
