// src/config/llm.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_enabled() -> bool {
    true
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    800
}
fn default_timeout_secs() -> u64 {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Normalize provider and clamp sampling parameters into sane ranges.
    pub fn sanitize(&mut self) {
        self.provider = self.provider.trim().to_lowercase();
        if !(0.0..=2.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
    }

    /// Apply `OPENAI_MODEL` when present.
    pub fn apply_env(&mut self) {
        if let Ok(model) = env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }
    }

    /// Resolve the key, reading the provider's env var when configured as "ENV".
    pub fn resolve_api_key(&self) -> anyhow::Result<String> {
        let key = if self.api_key.trim().eq_ignore_ascii_case("env") {
            match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            }
        } else {
            self.api_key.clone()
        };
        if key.trim().is_empty() {
            anyhow::bail!("empty API key for provider {}", self.provider);
        }
        Ok(key)
    }
}
