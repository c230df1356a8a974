// src/config/mod.rs
//! Service configuration: `config/experts.toml` (or `$EXPERTS_CONFIG_PATH`) plus env overrides.
//!
//! A missing file yields defaults; a present but unreadable/invalid file is an error.
//!
//! ```toml
//! [llm]
//! model = "gpt-4o-mini"
//! api_key = "ENV"
//!
//! [search]
//! provider = "duckduckgo"
//!
//! [experts.sports]
//! cache_enabled = true
//! cache_ttl = 3600
//! knowledge_min_score = 0.8
//! source_min_coverage = 0.5
//! ```

pub mod llm;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::expert::ExpertType;

pub use llm::LlmConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/experts.toml";
pub const ENV_CONFIG_PATH: &str = "EXPERTS_CONFIG_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub experts: BTreeMap<ExpertType, ExpertSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "duckduckgo" | "disabled"
    #[serde(default = "default_search_provider")]
    pub provider: String,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_search_provider() -> String {
    "duckduckgo".to_string()
}
fn default_search_timeout() -> u64 {
    10
}
fn default_max_results() -> usize {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            timeout_secs: default_search_timeout(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Ask the LLM to classify when keywords do not decide.
    #[serde(default = "default_true")]
    pub use_llm: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { use_llm: true }
    }
}

fn default_true() -> bool {
    true
}
fn default_cache_ttl() -> u64 {
    3600
}
fn default_call_timeout() -> u64 {
    30
}
fn default_knowledge_min_score() -> f32 {
    crate::knowledge::DEFAULT_MIN_SCORE
}
fn default_source_min_coverage() -> f32 {
    crate::sources::DEFAULT_MIN_COVERAGE
}

/// Per-expert knobs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertSettings {
    #[serde(default = "default_true")]
    pub cache_enabled: bool,
    /// Seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Upper bound for each external call made by the pipeline (seconds).
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    /// External knowledge table replacing the embedded one.
    #[serde(default)]
    pub knowledge_path: Option<PathBuf>,
    /// External curated source list replacing the embedded one.
    #[serde(default)]
    pub sources_path: Option<PathBuf>,
    /// Download `Fetch` sources at request time.
    #[serde(default = "default_true")]
    pub fetch_pages: bool,
    /// Minimum fuzzy score (0..=1) for a local knowledge hit.
    #[serde(default = "default_knowledge_min_score")]
    pub knowledge_min_score: f32,
    /// Minimum share of query tokens a curated source must cover.
    #[serde(default = "default_source_min_coverage")]
    pub source_min_coverage: f32,
}

impl Default for ExpertSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: default_cache_ttl(),
            call_timeout_secs: default_call_timeout(),
            knowledge_path: None,
            sources_path: None,
            fetch_pages: true,
            knowledge_min_score: default_knowledge_min_score(),
            source_min_coverage: default_source_min_coverage(),
        }
    }
}

impl AppConfig {
    /// Load using env var + fallback:
    /// 1) $EXPERTS_CONFIG_PATH (must exist)
    /// 2) config/experts.toml (optional)
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::load_from_file(Path::new(&p))?,
            Err(_) => {
                let p = PathBuf::from(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(&p)?
                } else {
                    Self::default()
                }
            }
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(raw)?;
        cfg.llm.sanitize();
        cfg.search.provider = cfg.search.provider.trim().to_lowercase();
        Ok(cfg)
    }

    /// Env overrides: OPENAI_MODEL, SEARCH_PROVIDER.
    pub fn apply_env(&mut self) {
        self.llm.apply_env();
        if let Ok(p) = std::env::var("SEARCH_PROVIDER") {
            if !p.trim().is_empty() {
                self.search.provider = p.trim().to_lowercase();
            }
        }
    }

    /// Settings for one expert; defaults when the section is absent.
    pub fn expert(&self, kind: ExpertType) -> ExpertSettings {
        self.experts.get(&kind).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn parses_sections_and_fills_defaults() {
        let cfg = AppConfig::from_toml(
            r#"
            [llm]
            provider = "OpenAI"
            model = "gpt-4o"

            [search]
            provider = "Disabled"

            [experts.sports]
            cache_enabled = false
            cache_ttl = 60

            [experts.sudostar]
            knowledge_path = "data/custom.json"
            knowledge_min_score = 0.95
            source_min_coverage = 0.75
            "#,
        )
        .unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, "gpt-4o");
        assert_eq!(cfg.search.provider, "disabled");
        assert!(cfg.selector.use_llm);

        let sports = cfg.expert(ExpertType::Sports);
        assert!(!sports.cache_enabled);
        assert_eq!(sports.cache_ttl, 60);
        assert_eq!(sports.call_timeout_secs, 30);

        let food = cfg.expert(ExpertType::Food);
        assert_eq!(food, ExpertSettings::default());

        let sudo = cfg.expert(ExpertType::SudoStar);
        assert_eq!(sudo.knowledge_path, Some(PathBuf::from("data/custom.json")));
        assert_eq!(sudo.knowledge_min_score, 0.95);
        assert_eq!(sudo.source_min_coverage, 0.75);
        assert_eq!(sports.knowledge_min_score, crate::knowledge::DEFAULT_MIN_SCORE);
    }

    #[test]
    fn unknown_expert_section_is_rejected() {
        assert!(AppConfig::from_toml("[experts.weather]\ncache_ttl = 1").is_err());
    }

    #[serial_test::serial]
    #[test]
    fn load_prefers_env_path_then_defaults() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);
        env::remove_var("SEARCH_PROVIDER");

        // No file in CWD -> defaults
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.search.provider, "duckduckgo");

        // Env path wins
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[experts.food]\ncache_ttl = 5\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.expert(ExpertType::Food).cache_ttl, 5);

        // Env path pointing nowhere is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(AppConfig::load().is_err());

        env::remove_var(ENV_CONFIG_PATH);
        env::set_current_dir(&old).unwrap();
    }
}
