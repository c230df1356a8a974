//! Ask-experts service: binary entrypoint
//! Boots the Axum HTTP server: config, expert system, routes, metrics.

use ask_experts::{
    api::{self, AppState, SystemHandle},
    init_system,
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - EXPERTS_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("EXPERTS_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ask_experts=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    // A failed init (bad config included) still serves `/` and `/health`;
    // `/ask` reports EXPERT_SYSTEM_ERROR.
    let handle = init_system();
    let expert_count = match &handle {
        SystemHandle::Ready(system) => system.registry().len(),
        SystemHandle::Failed(_) => 0,
    };

    let mut router = api::create_router(AppState::new(handle));
    match Metrics::init(expert_count) {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = %e, "metrics disabled"),
    }

    Ok(router.into())
}
