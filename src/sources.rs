// src/sources.rs
//! Curated URL sources: a fixed list of domain-trusted references.
//!
//! Each source carries keywords and either static content or a page that is
//! fetched on demand. Search:
//! 1) keep sources with at least one keyword present in the query, ranked by hit count
//! 2) split content into paragraphs and pick the one covering most query tokens
//! 3) accept when coverage >= `min_coverage`; the answer cites the source URL

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::text::{fold_for_match, normalize_page_text, token_coverage, tokens};

pub const DEFAULT_MIN_COVERAGE: f32 = 0.5;
const MAX_PAGE_CHARS: usize = 20_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceBody {
    Static(String),
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSource {
    pub url: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub body: SourceBody,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawSource> for UrlSource {
    fn from(raw: RawSource) -> Self {
        let body = match raw.content {
            Some(c) if !c.trim().is_empty() => SourceBody::Static(c),
            _ => SourceBody::Fetch,
        };
        let title = if raw.title.trim().is_empty() {
            raw.url.clone()
        } else {
            raw.title
        };
        Self {
            url: raw.url,
            title,
            keywords: raw.keywords,
            body,
        }
    }
}

/// Downloads the raw HTML/text of a curated page.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

pub struct HttpPageFetcher {
    http: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("ask-experts/0.1 (curated-source fetcher)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building page fetcher HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("fetching {url}"))?
            .error_for_status()
            .with_context(|| format!("fetching {url}"))?;
        resp.text().await.context("reading page body")
    }
}

/// Fetcher used when outbound page fetches are not wanted.
pub struct NoFetch;

#[async_trait::async_trait]
impl PageFetcher for NoFetch {
    async fn fetch(&self, url: &str) -> Result<String> {
        Err(anyhow!("page fetching disabled ({url})"))
    }
}

#[derive(Clone)]
pub struct UrlSourceSet {
    sources: Vec<UrlSource>,
    fetcher: Arc<dyn PageFetcher>,
    min_coverage: f32,
}

impl std::fmt::Debug for UrlSourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSourceSet")
            .field("sources", &self.sources.len())
            .field("min_coverage", &self.min_coverage)
            .finish()
    }
}

impl Default for UrlSourceSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl UrlSourceSet {
    pub fn new(sources: Vec<UrlSource>) -> Self {
        Self {
            sources,
            fetcher: Arc::new(NoFetch),
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_min_coverage(mut self, min_coverage: f32) -> Self {
        self.min_coverage = min_coverage.clamp(0.0, 1.0);
        self
    }

    /// Parse `{"sources": [...]}` or a bare array.
    pub fn from_json(raw: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct File {
            sources: Vec<RawSource>,
        }
        let raw_sources = match serde_json::from_str::<File>(raw) {
            Ok(f) => f.sources,
            Err(_) => serde_json::from_str::<Vec<RawSource>>(raw)
                .context("source list must be {\"sources\": [...]} or an array")?,
        };
        Ok(Self::new(raw_sources.into_iter().map(UrlSource::from).collect()))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading URL sources from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn sources(&self) -> &[UrlSource] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Sources whose keywords occur in the query, most keyword hits first.
    fn candidates(&self, query: &str) -> Vec<&UrlSource> {
        let padded = format!(" {} ", fold_for_match(query));
        let mut ranked: Vec<(usize, &UrlSource)> = self
            .sources
            .iter()
            .filter_map(|s| {
                let hits = s
                    .keywords
                    .iter()
                    .map(|k| fold_for_match(k))
                    .filter(|k| !k.is_empty() && padded.contains(&format!(" {k} ")))
                    .count();
                (hits > 0).then_some((hits, s))
            })
            .collect();
        // Stable sort keeps curated order among equal hit counts.
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, s)| s).collect()
    }

    /// Search curated sources for a relevant passage.
    ///
    /// Returns `Ok(None)` when nothing matches. Fetch errors are skipped while other
    /// candidates remain; if every attempted fetch failed and nothing matched, the
    /// last error is returned.
    pub async fn search(&self, query: &str) -> Result<Option<String>> {
        let query_tokens = tokens(query);
        if query_tokens.is_empty() {
            return Ok(None);
        }

        let mut last_err = None;
        for source in self.candidates(query) {
            let content = match &source.body {
                SourceBody::Static(c) => c.clone(),
                SourceBody::Fetch => match self.fetcher.fetch(&source.url).await {
                    Ok(html) => normalize_page_text(&html, MAX_PAGE_CHARS),
                    Err(e) => {
                        debug!(target: "expert", url = %source.url, error = %e, "curated page fetch failed");
                        last_err = Some(e);
                        continue;
                    }
                },
            };
            if let Some(passage) = best_passage(&content, &query_tokens, self.min_coverage) {
                return Ok(Some(format!(
                    "{passage}\n\nKaynak: {} ({})",
                    source.title, source.url
                )));
            }
        }

        match last_err {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}

/// Paragraph with the highest query-token coverage, if it reaches `min_coverage`.
fn best_passage(content: &str, query_tokens: &[String], min_coverage: f32) -> Option<String> {
    let mut best: Option<(f32, &str)> = None;
    for para in content.split('\n').map(str::trim).filter(|p| !p.is_empty()) {
        let cov = token_coverage(query_tokens, &tokens(para));
        if cov >= min_coverage && best.map_or(true, |(b, _)| cov > b) {
            best = Some((cov, para));
        }
    }
    best.map(|(_, p)| p.to_string())
}
