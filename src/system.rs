// src/system.rs
//! The expert system: selector + enum-keyed expert registry, and the `ask`
//! operation the HTTP boundary calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use metrics::counter;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::expert::{AnswerStage, Expert, ExpertType, TieredExpert};
use crate::llm::build_llm_client;
use crate::search::build_web_search;
use crate::selector::{ExpertSelector, Selection};
use crate::text::anon_hash;

/// Boundary failures, each with a stable machine-readable code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AskError {
    #[error("Question is required")]
    MissingQuestion,
    #[error("Expert system is not initialized")]
    NotInitialized,
    #[error("Could not generate response")]
    NoResponse,
    #[error("{0}")]
    Internal(String),
}

impl AskError {
    pub fn code(&self) -> &'static str {
        match self {
            AskError::MissingQuestion => "MISSING_QUESTION",
            AskError::NotInitialized => "EXPERT_SYSTEM_ERROR",
            AskError::NoResponse => "NO_RESPONSE",
            AskError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AskError::MissingQuestion => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A successful `ask`. `expert_type` is `None` for direct (selector) answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub expert_type: Option<ExpertType>,
    pub stage: AnswerStage,
}

#[derive(Default, Clone)]
pub struct ExpertRegistry {
    experts: HashMap<ExpertType, Arc<dyn Expert>>,
}

impl ExpertRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, expert: Arc<dyn Expert>) -> Self {
        self.experts.insert(expert.kind(), expert);
        self
    }

    pub fn get(&self, kind: ExpertType) -> Option<Arc<dyn Expert>> {
        self.experts.get(&kind).cloned()
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }
}

pub struct ExpertSystem {
    selector: ExpertSelector,
    registry: ExpertRegistry,
}

impl ExpertSystem {
    pub fn new(selector: ExpertSelector, registry: ExpertRegistry) -> Self {
        Self { selector, registry }
    }

    /// Build the LLM and search clients once and share them across all experts.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let llm = build_llm_client(&config.llm)?;
        let search = build_web_search(&config.search)?;

        let mut registry = ExpertRegistry::new();
        for kind in ExpertType::ALL {
            let expert =
                TieredExpert::from_settings(kind, &config.expert(kind), llm.clone(), search.clone())?;
            registry = registry.register(Arc::new(expert));
        }

        let mut selector = ExpertSelector::new();
        if config.selector.use_llm && config.llm.enabled {
            selector = selector
                .with_classifier(llm.clone())
                .with_classify_timeout(Duration::from_secs(config.llm.timeout_secs.max(1)));
        }

        info!(
            target: "api",
            llm = llm.provider_name(),
            search = search.name(),
            experts = registry.len(),
            "expert system initialized"
        );
        Ok(Self::new(selector, registry))
    }

    pub fn registry(&self) -> &ExpertRegistry {
        &self.registry
    }

    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let result = self.ask_inner(question).await;
        let code = match &result {
            Ok(_) => "OK",
            Err(e) => e.code(),
        };
        counter!("ask_requests_total", "code" => code).increment(1);
        result
    }

    async fn ask_inner(&self, question: &str) -> Result<Answer, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::MissingQuestion);
        }
        let id = anon_hash(question);

        let kind = match self.selector.select(question).await {
            Selection::Expert(kind) => kind,
            Selection::Direct(answer) => {
                return Ok(Answer {
                    answer,
                    expert_type: None,
                    stage: AnswerStage::Direct,
                })
            }
            Selection::Unresolved => {
                info!(target: "api", %id, "no expert selected");
                return Err(AskError::NoResponse);
            }
        };

        let Some(expert) = self.registry.get(kind) else {
            warn!(target: "api", %id, expert = kind.as_str(), "no expert registered");
            return Err(AskError::NoResponse);
        };

        // Isolated task: a panic inside an expert becomes INTERNAL_ERROR, not a dead connection.
        let q = question.to_string();
        let worker = Arc::clone(&expert);
        let joined = tokio::spawn(async move { worker.resolve(&q).await })
            .await
            .map_err(|e| AskError::Internal(e.to_string()))?;

        match joined {
            Ok(resolution) if !resolution.answer.trim().is_empty() => Ok(Answer {
                answer: resolution.answer,
                expert_type: Some(kind),
                stage: resolution.stage,
            }),
            Ok(_) => Err(AskError::NoResponse),
            Err(e) => {
                warn!(target: "api", %id, expert = kind.as_str(), error = %e, "expert failed");
                Ok(Answer {
                    answer: expert.error_message().to_string(),
                    expert_type: Some(kind),
                    stage: AnswerStage::Error,
                })
            }
        }
    }
}
