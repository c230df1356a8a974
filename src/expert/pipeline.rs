// src/expert/pipeline.rs
//! Tiered resolution pipeline shared by every domain expert.
//!
//! Order (fixed):
//! 0) cache hit → return immediately, nothing else runs
//! 1) local knowledge table
//! 2) curated URL sources
//! 3) AI generation (accepted as-is when non-empty)
//! 4) web search → synthesis from top-3 snippets → independent validation
//! 5) fallback apology (never cached)
//!
//! Stages 1–4 share one signature and run through a single driver loop, which owns
//! error swallowing, logging, and metrics. The first non-empty answer is cached and
//! returned. Only a cache failure escapes as `ExpertError`.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use tracing::{debug, info, warn};

use super::profile::{
    profile_for, synthesis_user_prompt, validation_user_prompt, DomainProfile, VALIDATION_PROMPT,
};
use super::{AnswerStage, Expert, ExpertError, ExpertType, Resolution, Verdict};
use crate::cache::Cache;
use crate::config::ExpertSettings;
use crate::knowledge::KnowledgeBase;
use crate::llm::{test_mode_is_mock, DynLlmClient};
use crate::search::DynWebSearch;
use crate::sources::{HttpPageFetcher, UrlSourceSet};
use crate::text::anon_hash;

/// Number of web snippets handed to the synthesis step.
pub const WEB_CONTEXT_SNIPPETS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LocalKnowledge,
    UrlSources,
    AiGenerate,
    WebSearch,
}

impl Stage {
    pub const ORDER: [Stage; 4] = [
        Stage::LocalKnowledge,
        Stage::UrlSources,
        Stage::AiGenerate,
        Stage::WebSearch,
    ];

    pub fn as_str(self) -> &'static str {
        self.answer_stage().as_str()
    }

    pub fn answer_stage(self) -> AnswerStage {
        match self {
            Stage::LocalKnowledge => AnswerStage::LocalKb,
            Stage::UrlSources => AnswerStage::UrlSources,
            Stage::AiGenerate => AnswerStage::AiGenerate,
            Stage::WebSearch => AnswerStage::WebSearch,
        }
    }
}

pub struct TieredExpert {
    profile: &'static DomainProfile,
    cache: Cache,
    knowledge: KnowledgeBase,
    sources: UrlSourceSet,
    llm: DynLlmClient,
    search: DynWebSearch,
    call_timeout: Duration,
}

impl TieredExpert {
    /// Expert with embedded tables, default settings and no page fetching.
    pub fn new(kind: ExpertType, llm: DynLlmClient, search: DynWebSearch) -> Result<Self> {
        let profile = profile_for(kind);
        let settings = ExpertSettings::default();
        Ok(Self {
            profile,
            cache: Cache::new(settings.cache_enabled, Duration::from_secs(settings.cache_ttl)),
            knowledge: KnowledgeBase::from_json(profile.knowledge_json)
                .with_context(|| format!("embedded knowledge table for {kind}"))?,
            sources: UrlSourceSet::from_json(profile.sources_json)
                .with_context(|| format!("embedded source list for {kind}"))?,
            llm,
            search,
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
        })
    }

    /// Expert configured from its settings section; tables may come from external files.
    pub fn from_settings(
        kind: ExpertType,
        settings: &ExpertSettings,
        llm: DynLlmClient,
        search: DynWebSearch,
    ) -> Result<Self> {
        let profile = profile_for(kind);
        let knowledge = match &settings.knowledge_path {
            Some(p) => KnowledgeBase::load_from_file(p)?,
            None => KnowledgeBase::from_json(profile.knowledge_json)
                .with_context(|| format!("embedded knowledge table for {kind}"))?,
        }
        .with_min_score(settings.knowledge_min_score);
        let mut sources = match &settings.sources_path {
            Some(p) => UrlSourceSet::load_from_file(p)?,
            None => UrlSourceSet::from_json(profile.sources_json)
                .with_context(|| format!("embedded source list for {kind}"))?,
        }
        .with_min_coverage(settings.source_min_coverage);
        let call_timeout = Duration::from_secs(settings.call_timeout_secs.max(1));
        // Mock mode stays offline.
        if settings.fetch_pages && !test_mode_is_mock() {
            sources = sources.with_fetcher(std::sync::Arc::new(HttpPageFetcher::new(call_timeout)?));
        }

        info!(
            target: "expert",
            expert = kind.as_str(),
            cache_enabled = settings.cache_enabled,
            cache_ttl = settings.cache_ttl,
            knowledge = knowledge.len(),
            knowledge_min_score = settings.knowledge_min_score,
            sources = sources.len(),
            "expert ready"
        );

        Ok(Self {
            profile,
            cache: Cache::new(settings.cache_enabled, Duration::from_secs(settings.cache_ttl)),
            knowledge,
            sources,
            llm,
            search,
            call_timeout,
        })
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeBase) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_sources(mut self, sources: UrlSourceSet) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn profile(&self) -> &'static DomainProfile {
        self.profile
    }

    async fn run_stage(&self, stage: Stage, query: &str) -> Result<Option<String>> {
        match stage {
            Stage::LocalKnowledge => Ok(self.check_local_knowledge(query)),
            Stage::UrlSources => self.check_url_sources(query).await,
            Stage::AiGenerate => self.generate_ai_response(query).await,
            Stage::WebSearch => self.perform_web_search(query).await,
        }
    }

    fn check_local_knowledge(&self, query: &str) -> Option<String> {
        self.knowledge.find_answer(query).map(str::to_string)
    }

    async fn check_url_sources(&self, query: &str) -> Result<Option<String>> {
        self.bounded(self.sources.search(query)).await
    }

    async fn generate_ai_response(&self, query: &str) -> Result<Option<String>> {
        let reply = self.complete(self.profile.ai_system_prompt, query).await?;
        Ok(non_empty(reply))
    }

    async fn perform_web_search(&self, query: &str) -> Result<Option<String>> {
        let kind = self.profile.kind.as_str();
        let search_query = format!("{query} {}", self.profile.search_suffix);
        let results = self.bounded(self.search.search(&search_query)).await?;
        if results.is_empty() {
            debug!(target: "expert", expert = kind, "web search returned no results");
            return Ok(None);
        }

        let context = results
            .iter()
            .take(WEB_CONTEXT_SNIPPETS)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");

        let synthesized = self
            .complete(
                self.profile.web_system_prompt,
                &synthesis_user_prompt(query, &context),
            )
            .await?;
        let Some(answer) = non_empty(synthesized) else {
            return Ok(None);
        };

        let raw_verdict = self
            .complete(VALIDATION_PROMPT, &validation_user_prompt(&answer, &context))
            .await?;
        let verdict = Verdict::parse(&raw_verdict);
        if verdict.is_valid {
            Ok(Some(answer))
        } else {
            counter!("expert_validation_rejects_total", "expert" => kind).increment(1);
            info!(
                target: "expert",
                expert = kind,
                reason = %verdict.reason,
                "web answer rejected by validation"
            );
            Ok(None)
        }
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.bounded(self.llm.complete(system_prompt, user_prompt))
            .await
    }

    /// Bound one external call by the per-call timeout. A timeout is an ordinary error.
    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| anyhow!("external call timed out after {:?}", self.call_timeout))?
    }
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

#[async_trait::async_trait]
impl Expert for TieredExpert {
    fn kind(&self) -> ExpertType {
        self.profile.kind
    }

    async fn resolve(&self, query: &str) -> Result<Resolution, ExpertError> {
        let kind = self.profile.kind.as_str();
        let id = anon_hash(query);

        if let Some(hit) = self.cache.get(query)? {
            debug!(target: "expert", expert = kind, %id, "cache hit");
            return Ok(Resolution {
                answer: hit,
                stage: AnswerStage::Cache,
            });
        }

        for stage in Stage::ORDER {
            match self.run_stage(stage, query).await {
                Ok(Some(answer)) if !answer.trim().is_empty() => {
                    counter!("expert_stage_answers_total", "expert" => kind, "stage" => stage.as_str())
                        .increment(1);
                    debug!(target: "expert", expert = kind, %id, stage = stage.as_str(), "answered");
                    self.cache.set(query, &answer)?;
                    return Ok(Resolution {
                        answer,
                        stage: stage.answer_stage(),
                    });
                }
                Ok(_) => {
                    debug!(target: "expert", expert = kind, %id, stage = stage.as_str(), "no answer");
                }
                Err(e) => {
                    counter!("expert_stage_errors_total", "expert" => kind, "stage" => stage.as_str())
                        .increment(1);
                    warn!(target: "expert", expert = kind, %id, stage = stage.as_str(), error = %e, "stage failed");
                }
            }
        }

        counter!("expert_stage_answers_total", "expert" => kind, "stage" => "fallback").increment(1);
        Ok(Resolution {
            answer: self.profile.fallback_message.to_string(),
            stage: AnswerStage::Fallback,
        })
    }

    fn error_message(&self) -> &str {
        self.profile.error_message
    }
}
