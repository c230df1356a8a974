// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod expert;
pub mod knowledge;
pub mod llm;
pub mod metrics;
pub mod search;
pub mod selector;
pub mod sources;
pub mod system;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState, SystemHandle};
pub use crate::config::AppConfig;
pub use crate::expert::{AnswerStage, Expert, ExpertType, Resolution, TieredExpert};
pub use crate::selector::{ExpertSelector, Selection};
pub use crate::system::{Answer, AskError, ExpertSystem};

use axum::Router;

/// Build the full in-process app: config, expert system, and HTTP routes.
///
/// Initialization failure, including an unreadable or invalid config file, does
/// not fail the router; `/health` reports it and `/ask` answers `EXPERT_SYSTEM_ERROR`.
pub async fn app() -> anyhow::Result<Router> {
    Ok(router(AppState::new(init_system())))
}

/// Load config and build the expert system, folding any failure into the handle.
pub fn init_system() -> SystemHandle {
    SystemHandle::from_init(AppConfig::load().and_then(|config| ExpertSystem::from_config(&config)))
}
