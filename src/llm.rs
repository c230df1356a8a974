// src/llm.rs
//! LLM completion client: provider abstraction + OpenAI provider + disabled/mock clients.
//!
//! The contract is a single stateless call, `complete(system_prompt, user_prompt)`.
//! Failures are plain `anyhow` errors; callers decide whether to swallow them.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Trait object used by experts and the selector.
pub trait LlmClient: Send + Sync {
    /// Ask the completion service. An empty string is a valid (useless) reply.
    fn complete<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> LlmFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

/// Convenient alias used by callers.
pub type DynLlmClient = Arc<dyn LlmClient>;

/// Factory: build a client according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock client.
/// * Else if `config.enabled == false`, returns a disabled client.
/// * Else builds the configured provider; a missing API key is an init error.
pub fn build_llm_client(config: &LlmConfig) -> Result<DynLlmClient> {
    if test_mode_is_mock() {
        return Ok(Arc::new(MockLlm::fixed(
            "Bu yanıt test modunda üretilmiştir (mock).",
        )));
    }

    if !config.enabled {
        return Ok(Arc::new(DisabledLlm));
    }

    match config.provider.as_str() {
        "openai" => {
            let api_key = config.resolve_api_key()?;
            Ok(Arc::new(OpenAiClient::new(config, api_key)?))
        }
        other => bail!("unsupported LLM provider in config: {other}"),
    }
}

pub(crate) fn test_mode_is_mock() -> bool {
    std::env::var("AI_TEST_MODE")
        .map(|v| v.eq_ignore_ascii_case("mock"))
        .unwrap_or(false)
}

// ------------------------------------------------------------
// OpenAI provider
// ------------------------------------------------------------

/// OpenAI Chat Completions client.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ask-experts/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("building OpenAI HTTP client")?;
        Ok(Self {
            http,
            api_key,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn complete_impl(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system_prompt,
                },
                Msg {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = resp.status();
        if !status.is_success() {
            bail!("OpenAI returned HTTP {status}");
        }
        let body: Resp = resp.json().await.context("OpenAI response unreadable")?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

impl LlmClient for OpenAiClient {
    fn complete<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(self.complete_impl(system_prompt, user_prompt))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Disabled + mock clients
// ------------------------------------------------------------

/// Always fails; used when the LLM is switched off in config.
pub struct DisabledLlm;

impl LlmClient for DisabledLlm {
    fn complete<'a>(&'a self, _system_prompt: &'a str, _user_prompt: &'a str) -> LlmFuture<'a> {
        Box::pin(async { Err(anyhow!("LLM completion disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// One recorded call to a [`MockLlm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmCall {
    pub system_prompt: String,
    pub user_prompt: String,
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(String),
}

/// Scripted client for tests and local runs.
///
/// Replies are consumed in order; once the script is exhausted the `fixed` reply
/// (if any) is returned, otherwise the call fails.
#[derive(Debug, Default)]
pub struct MockLlm {
    script: Mutex<VecDeque<MockReply>>,
    fixed: Option<String>,
    calls: Mutex<Vec<LlmCall>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call with the same text.
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self {
            fixed: Some(reply.into()),
            ..Self::default()
        }
    }

    /// Queue a successful reply.
    pub fn reply(self, text: impl Into<String>) -> Self {
        lock(&self.script).push_back(MockReply::Text(text.into()));
        self
    }

    /// Queue a failing call.
    pub fn fail(self, message: impl Into<String>) -> Self {
        lock(&self.script).push_back(MockReply::Fail(message.into()));
        self
    }

    pub fn calls(&self) -> Vec<LlmCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

impl LlmClient for MockLlm {
    fn complete<'a>(&'a self, system_prompt: &'a str, user_prompt: &'a str) -> LlmFuture<'a> {
        lock(&self.calls).push(LlmCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });
        let next = lock(&self.script).pop_front();
        let out = match next {
            Some(MockReply::Text(t)) => Ok(t),
            Some(MockReply::Fail(m)) => Err(anyhow!(m)),
            None => self
                .fixed
                .clone()
                .ok_or_else(|| anyhow!("mock LLM script exhausted")),
        };
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Poison-tolerant lock for the mock's bookkeeping.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(poison) => poison.into_inner(),
    }
}
