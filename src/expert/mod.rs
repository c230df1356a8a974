// src/expert/mod.rs
//! Domain experts: the dispatch key (`ExpertType`), the `Expert` capability and
//! the tiered resolution pipeline shared by every domain.

pub mod pipeline;
pub mod profile;
pub mod verdict;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheUnavailable;

pub use pipeline::{Stage, TieredExpert};
pub use profile::DomainProfile;
pub use verdict::Verdict;

/// Domain identifier used between the selector and the expert registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpertType {
    Sports,
    Food,
    Ai,
    /// Product-specific expert for the SudoStar platform.
    SudoStar,
}

impl ExpertType {
    pub const ALL: [ExpertType; 4] = [
        ExpertType::Sports,
        ExpertType::Food,
        ExpertType::Ai,
        ExpertType::SudoStar,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExpertType::Sports => "sports",
            ExpertType::Food => "food",
            ExpertType::Ai => "ai",
            ExpertType::SudoStar => "sudostar",
        }
    }
}

impl fmt::Display for ExpertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown expert type: {0}")]
pub struct UnknownExpertType(pub String);

impl FromStr for ExpertType {
    type Err = UnknownExpertType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sports" | "sport" => Ok(ExpertType::Sports),
            "food" => Ok(ExpertType::Food),
            "ai" => Ok(ExpertType::Ai),
            "sudostar" | "product" => Ok(ExpertType::SudoStar),
            other => Err(UnknownExpertType(other.to_string())),
        }
    }
}

/// Where an answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStage {
    Cache,
    LocalKb,
    UrlSources,
    AiGenerate,
    WebSearch,
    Fallback,
    /// Degraded message after an expert-level failure.
    Error,
    /// Answered by the selector without an expert.
    Direct,
}

impl AnswerStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerStage::Cache => "cache",
            AnswerStage::LocalKb => "local_kb",
            AnswerStage::UrlSources => "url_sources",
            AnswerStage::AiGenerate => "ai_generate",
            AnswerStage::WebSearch => "web_search",
            AnswerStage::Fallback => "fallback",
            AnswerStage::Error => "error",
            AnswerStage::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub answer: String,
    pub stage: AnswerStage,
}

/// Expert-level failures. Stage failures never show up here.
#[derive(Debug, thiserror::Error)]
pub enum ExpertError {
    #[error(transparent)]
    CacheUnavailable(#[from] CacheUnavailable),
}

/// A domain-specific answer resolver.
#[async_trait::async_trait]
pub trait Expert: Send + Sync {
    fn kind(&self) -> ExpertType;

    /// Run the resolution pipeline. The answer is never empty.
    async fn resolve(&self, query: &str) -> Result<Resolution, ExpertError>;

    async fn get_response(&self, query: &str) -> Result<String, ExpertError> {
        Ok(self.resolve(query).await?.answer)
    }

    /// User-facing message the caller substitutes when `resolve` fails.
    fn error_message(&self) -> &str;
}
