use axum::{routing::get, Router};
use metrics::{describe_counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and describe the expert counters.
    /// Fails if another global recorder is already installed.
    pub fn init(expert_count: usize) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        describe_counter!("expert_cache_hits_total", "Answers served from an expert cache");
        describe_counter!("expert_cache_misses_total", "Cache lookups that fell through to the stages");
        describe_counter!(
            "expert_stage_answers_total",
            "Answers produced, by expert and stage"
        );
        describe_counter!(
            "expert_stage_errors_total",
            "Swallowed stage failures, by expert and stage"
        );
        describe_counter!(
            "expert_validation_rejects_total",
            "Web-search answers rejected by validation"
        );
        describe_counter!("ask_requests_total", "Ask requests, by result code");

        gauge!("experts_registered").set(expert_count as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
