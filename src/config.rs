//! Configuration for the generation service.
//!
//! Loaded once per process from a JSON file; the engine treats every value
//! as immutable for the duration of a request. The API key is read from the
//! `OPENAI_API_KEY` environment variable, falling back to the config file.

use crate::error::EngineError;
use crate::policy::Policy;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub api: ApiConfig,
    pub generation: GenerationConfig,
    pub policy: Policy,
    pub database_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Model identifier sent with every chat request.
    pub model: String,
    /// Fallback API key; prefer the environment variable.
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Correction cycles allowed per request.
    pub max_attempts: u32,
    /// Character cap for caller-authored user messages.
    pub max_content_length: usize,
    /// User turns a session may accumulate over its whole lifetime.
    pub max_user_turns: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
}

fn default_temperature() -> f64 {
    1.0
}

fn default_probe_timeout_secs() -> u64 {
    5
}

impl AppConfig {
    /// Load and parse the config file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|err| {
            EngineError::Configuration(format!("failed to read {}: {err}", path.display()))
        })?;
        serde_json::from_str(&content).map_err(|err| {
            EngineError::Configuration(format!("invalid config {}: {err}", path.display()))
        })
    }

    /// Resolve the API key from the environment or the config file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.is_empty())
            .or_else(|| self.api.api_key.clone())
    }
}
