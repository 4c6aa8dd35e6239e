//! Configuration management for analyst
//!
//! Settings come from environment variables with typed fallbacks. A `.env` file
//! in the working directory is read first (see [`load_env_file`]); variables that
//! are already present in the process environment always win.
//!
//! # Environment Variables
//!
//! ## Service
//! - `ANALYST_HOST`: bind address - default: "0.0.0.0"
//! - `PORT`: listening port - default: "8000"
//! - `AGENT_TIMEOUT_SEC`: end-to-end budget for one `/api/` request - default: "170"
//! - `ANALYST_LOG_LEVEL`: logging level - default: "info"
//!
//! ## LLM
//! - `ANALYST_PROVIDER`: provider (groq|openai|claude|gemini|grok|ollama) - default: "groq"
//! - `GROQ_MODEL_DEFAULT`: model name - **required** by `serve`
//! - `GROQ_API_KEY`: credentials, read by genai for the Groq provider
//! - `ANALYST_API_BASE_URL`: endpoint override - default: Groq's OpenAI-compatible URL
//! - `ANALYST_REQUEST_TIMEOUT`: per LLM call timeout in seconds - default: "60"
//!
//! ## Sandbox
//! - `ANALYST_SANDBOX_IMAGE`: image that runs generated scripts - default: "python:3.11"
//! - `ANALYST_SCRIPT_TIMEOUT`: per script timeout in seconds - default: "90"

use anyhow::{Context, Result};
use genai::adapter::AdapterKind;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 170;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 90;
const DEFAULT_SANDBOX_IMAGE: &str = "python:3.11";
const DEFAULT_LOG_LEVEL: &str = "info";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid provider: {0}. Valid options: groq, openai, claude, gemini, grok, ollama")]
    InvalidProvider(String),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub host: String,
    pub port: u16,
    pub provider: AdapterKind,
    pub model: String,
    pub api_base_url: Option<String>,
    pub agent_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub script_timeout_secs: u64,
    pub sandbox_image: String,
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let provider = env::var("ANALYST_PROVIDER")
            .ok()
            .and_then(|s| parse_provider(&s).ok())
            .unwrap_or(AdapterKind::Groq);

        let model = env::var("GROQ_MODEL_DEFAULT").unwrap_or_default();

        let api_base_url = env::var("ANALYST_API_BASE_URL").ok().or_else(|| {
            if provider == AdapterKind::Groq {
                Some(GROQ_BASE_URL.to_string())
            } else {
                None
            }
        });

        Self {
            host: env::var("ANALYST_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env_parse("PORT").unwrap_or(DEFAULT_PORT),
            provider,
            model,
            api_base_url,
            agent_timeout_secs: env_parse("AGENT_TIMEOUT_SEC").unwrap_or(DEFAULT_AGENT_TIMEOUT_SECS),
            request_timeout_secs: env_parse("ANALYST_REQUEST_TIMEOUT")
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            script_timeout_secs: env_parse("ANALYST_SCRIPT_TIMEOUT")
                .unwrap_or(DEFAULT_SCRIPT_TIMEOUT_SECS),
            sandbox_image: env::var("ANALYST_SANDBOX_IMAGE")
                .unwrap_or_else(|_| DEFAULT_SANDBOX_IMAGE.to_string()),
            log_level: env::var("ANALYST_LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
                .to_lowercase(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

pub fn parse_provider(s: &str) -> Result<AdapterKind, ConfigError> {
    match s.to_lowercase().as_str() {
        "groq" => Ok(AdapterKind::Groq),
        "openai" => Ok(AdapterKind::OpenAI),
        "claude" | "anthropic" => Ok(AdapterKind::Anthropic),
        "gemini" => Ok(AdapterKind::Gemini),
        "grok" | "xai" => Ok(AdapterKind::Xai),
        "ollama" => Ok(AdapterKind::Ollama),
        _ => Err(ConfigError::InvalidProvider(s.to_string())),
    }
}

impl AgentConfig {
    /// Validates numeric ranges and the log level
    ///
    /// The model is not checked here so image commands work without LLM
    /// settings; `serve` refuses to start without one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationFailed(
                "Port must be between 1 and 65535".to_string(),
            ));
        }
        if self.agent_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Agent timeout must be at least 1 second".to_string(),
            ));
        }
        if self.script_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Script and request timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.sandbox_image.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Sandbox image cannot be empty".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                self.log_level
            ))),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_secs(self.agent_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    /// True when the provider's API key variable is set (or none is needed)
    pub fn has_credentials(&self) -> bool {
        match self.provider.default_key_env_name() {
            Some(var) => env::var(var).map(|v| !v.is_empty()).unwrap_or(false),
            None => true,
        }
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("bind_address".to_string(), self.bind_address());
        map.insert("provider".to_string(), self.provider.as_str().to_string());
        map.insert("model".to_string(), self.model.clone());
        if let Some(ref url) = self.api_base_url {
            map.insert("api_base_url".to_string(), url.clone());
        }
        map.insert(
            "agent_timeout_secs".to_string(),
            self.agent_timeout_secs.to_string(),
        );
        map.insert(
            "script_timeout_secs".to_string(),
            self.script_timeout_secs.to_string(),
        );
        map.insert("sandbox_image".to_string(), self.sandbox_image.clone());
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for AgentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analyst Configuration:")?;
        writeln!(f, "  Bind Address: {}", self.bind_address())?;
        writeln!(f, "  Provider: {}", self.provider.as_str())?;
        writeln!(f, "  Model: {}", if self.model.is_empty() { "(unset)" } else { self.model.as_str() })?;
        writeln!(f, "  Agent Timeout: {}s", self.agent_timeout_secs)?;
        writeln!(f, "  Script Timeout: {}s", self.script_timeout_secs)?;
        writeln!(f, "  Sandbox Image: {}", self.sandbox_image)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

/// Parses `KEY=VALUE` lines from env-file content
///
/// Lines dotenvy cannot parse are skipped with a warning.
pub fn parse_env_file(content: &str) -> Vec<(String, String)> {
    collect_pairs(dotenvy::from_read_iter(content.as_bytes()))
}

fn collect_pairs<R: std::io::Read>(iter: dotenvy::Iter<R>) -> Vec<(String, String)> {
    iter.filter_map(|item| match item {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!("Skipping env file line: {}", e);
            None
        }
    })
    .collect()
}

/// Loads an env file into the process environment without overriding
///
/// Returns the number of variables that were set. A missing file is not an error.
pub fn load_env_file(path: &Path) -> Result<usize> {
    if !path.is_file() {
        debug!("No env file at {}", path.display());
        return Ok(0);
    }

    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("Failed to read env file {}", path.display()))?;

    let mut applied = 0;
    for (key, value) in collect_pairs(iter) {
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
            applied += 1;
        }
    }

    debug!("Loaded {} variables from {}", applied, path.display());
    Ok(applied)
}
