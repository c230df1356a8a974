// src/search.rs
//! Web search client: returns ordered text snippets for a query.
//!
//! The default provider is the DuckDuckGo Instant Answer API (no key needed).
//! Snippet order is the provider's relevance order and is kept as-is.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::config::SearchConfig;
use crate::llm::test_mode_is_mock;

#[async_trait::async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

pub type DynWebSearch = Arc<dyn WebSearch>;

/// Factory mirroring `llm::build_llm_client`: mock mode disables live search.
pub fn build_web_search(config: &SearchConfig) -> Result<DynWebSearch> {
    if test_mode_is_mock() {
        return Ok(Arc::new(DisabledSearch));
    }
    match config.provider.as_str() {
        "duckduckgo" => Ok(Arc::new(DuckDuckGoSearch::new(config)?)),
        "disabled" | "off" => Ok(Arc::new(DisabledSearch)),
        other => bail!("unsupported search provider in config: {other}"),
    }
}

const DDG_API_URL: &str = "https://api.duckduckgo.com/";

pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ask-experts/0.1 (web search)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("building search HTTP client")?;
        Ok(Self {
            http,
            max_results: config.max_results.max(1),
        })
    }
}

#[async_trait::async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(DDG_API_URL)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .context("search request failed")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("search API returned HTTP {status}");
        }
        let body: serde_json::Value = resp.json().await.context("search response unreadable")?;
        let mut out = ddg_snippets(&body);
        out.truncate(self.max_results);
        Ok(out)
    }
    fn name(&self) -> &'static str {
        "duckduckgo"
    }
}

/// Flatten an Instant Answer payload into snippets, most direct first:
/// Answer, AbstractText, Definition, then RelatedTopics (nested groups included).
pub fn ddg_snippets(data: &serde_json::Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |s: Option<&str>| {
        if let Some(t) = s.map(str::trim).filter(|t| !t.is_empty()) {
            out.push(t.to_string());
        }
    };

    push(data["Answer"].as_str());
    match (data["AbstractText"].as_str(), data["AbstractURL"].as_str()) {
        (Some(text), Some(url)) if !text.trim().is_empty() && !url.is_empty() => {
            push(Some(&format!("{} ({url})", text.trim())))
        }
        (text, _) => push(text),
    }
    push(data["Definition"].as_str());

    if let Some(topics) = data["RelatedTopics"].as_array() {
        for t in topics {
            match t["Topics"].as_array() {
                Some(group) => group.iter().for_each(|g| push(g["Text"].as_str())),
                None => push(t["Text"].as_str()),
            }
        }
    }
    out
}

/// Returns no results; used when live search is off.
pub struct DisabledSearch;

#[async_trait::async_trait]
impl WebSearch for DisabledSearch {
    async fn search(&self, _query: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Scripted search for tests: each call pops the next result set (empty when exhausted).
#[derive(Debug, Default)]
pub struct MockSearch {
    script: Mutex<VecDeque<Result<Vec<String>, String>>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results<I, S>(self, snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Ok(snippets.into_iter().map(Into::into).collect()))
    }

    pub fn fail(self, message: impl Into<String>) -> Self {
        self.push(Err(message.into()))
    }

    fn push(self, item: Result<Vec<String>, String>) -> Self {
        match self.script.lock() {
            Ok(mut g) => g.push_back(item),
            Err(p) => p.into_inner().push_back(item),
        }
        self
    }

    pub fn queries(&self) -> Vec<String> {
        match self.queries.lock() {
            Ok(g) => g.clone(),
            Err(p) => p.into_inner().clone(),
        }
    }

    pub fn call_count(&self) -> usize {
        self.queries().len()
    }
}

#[async_trait::async_trait]
impl WebSearch for MockSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>> {
        match self.queries.lock() {
            Ok(mut g) => g.push(query.to_string()),
            Err(p) => p.into_inner().push(query.to_string()),
        }
        let next = match self.script.lock() {
            Ok(mut g) => g.pop_front(),
            Err(p) => p.into_inner().pop_front(),
        };
        match next {
            Some(Ok(v)) => Ok(v),
            Some(Err(m)) => Err(anyhow::anyhow!(m)),
            None => Ok(Vec::new()),
        }
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}
