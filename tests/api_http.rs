// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /  and  GET /health (ready + failed init)
// - POST /ask: success, direct answer, missing question, malformed body,
//   no response, system not initialized
// - app() in AI_TEST_MODE=mock (embedded knowledge, offline)
// - app() with an invalid config file (degraded, not aborted)

use std::sync::Arc;

use serde_json::json;
use serde_json::Value as Json;
use serial_test::serial;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use ask_experts::api::{self, AppState, SystemHandle, STAGE_HEADER};
use ask_experts::llm::MockLlm;
use ask_experts::search::MockSearch;
use ask_experts::system::ExpertRegistry;
use ask_experts::{ExpertSelector, ExpertSystem, ExpertType, TieredExpert};

const BODY_LIMIT: usize = 1024 * 1024; // 1MB, safe for tests

/// Router over a sports-only system whose LLM always answers `reply`.
fn sports_router(reply: &str) -> Router {
    let llm = Arc::new(MockLlm::fixed(reply));
    let search = Arc::new(MockSearch::new());
    let expert = TieredExpert::new(ExpertType::Sports, llm, search).expect("sports expert");
    let system = ExpertSystem::new(
        ExpertSelector::new(),
        ExpertRegistry::new().register(Arc::new(expert)),
    );
    api::router(AppState::new(SystemHandle::Ready(Arc::new(system))))
}

fn failed_router() -> Router {
    let handle = SystemHandle::from_init(Err(anyhow::anyhow!("OPENAI_API_KEY missing")));
    api::router(AppState::new(handle))
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build GET");
    let resp = app.oneshot(req).await.expect("oneshot GET");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

/// POST /ask with a raw body. Returns (status, stage header, json).
async fn post_ask(app: Router, raw: &str) -> (StatusCode, Option<String>, Json) {
    let req = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(Body::from(raw.to_string()))
        .expect("build POST /ask");
    let resp = app.oneshot(req).await.expect("oneshot /ask");
    let status = resp.status();
    let stage = resp
        .headers()
        .get(STAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    (status, stage, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn home_lists_endpoints() {
    let (status, v) = get_json(sports_router("x"), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "online");
    assert_eq!(v["version"], "1.0.0");
    assert!(v["endpoints"]["ask"].as_str().unwrap().starts_with("/ask"));
}

#[tokio::test]
async fn health_reports_expert_system_state() {
    let (status, v) = get_json(sports_router("x"), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "healthy");
    assert_eq!(v["services"]["expert_system"], "running");
    assert_eq!(v["services"]["telegram_bot"], "disabled");

    let (status, v) = get_json(failed_router(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["services"]["expert_system"], "error");
}

#[tokio::test]
async fn ask_success_returns_answer_and_expert_type() {
    let app = sports_router("Argentina won the 2022 World Cup.");
    let payload = json!({ "question": "Kim 2022 Dünya Kupası'nı kazandı?" });
    let (status, stage, v) = post_ask(app, &payload.to_string()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "success");
    assert_eq!(v["data"]["answer"], "Argentina won the 2022 World Cup.");
    assert_eq!(v["data"]["expert_type"], "sports");
    assert_eq!(stage.as_deref(), Some("ai_generate"));
}

#[tokio::test]
async fn ask_greeting_is_general() {
    let (status, stage, v) = post_ask(sports_router("x"), r#"{"question":"Merhaba"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["expert_type"], "general");
    assert!(!v["data"]["answer"].as_str().unwrap().is_empty());
    assert_eq!(stage.as_deref(), Some("direct"));
}

#[tokio::test]
async fn ask_without_question_is_400() {
    for raw in [r#"{}"#, r#"{"question":""}"#, r#"{"question":"   "}"#] {
        let (status, _, v) = post_ask(sports_router("x"), raw).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {raw}");
        assert_eq!(v["status"], "error");
        assert_eq!(v["code"], "MISSING_QUESTION");
        assert_eq!(v["error"], "Question is required");
    }
}

#[tokio::test]
async fn ask_with_malformed_body_is_internal_error() {
    let (status, _, v) = post_ask(sports_router("x"), "{not json").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn ask_without_matching_expert_is_no_response() {
    // Food is selected but only the sports expert is registered.
    let (status, _, v) =
        post_ask(sports_router("x"), r#"{"question":"Pilav tarifi nedir?"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["code"], "NO_RESPONSE");
    assert_eq!(v["error"], "Could not generate response");
}

#[tokio::test]
async fn ask_before_init_is_expert_system_error() {
    let (status, _, v) = post_ask(failed_router(), r#"{"question":"Ofsayt nedir?"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["code"], "EXPERT_SYSTEM_ERROR");
    assert_eq!(v["error"], "Expert system is not initialized");
}

#[tokio::test]
#[serial]
async fn app_in_mock_mode_answers_from_embedded_knowledge() {
    std::env::set_var("AI_TEST_MODE", "mock");
    let app = ask_experts::app().await.expect("app() should build Router in tests");

    let (status, v) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["services"]["expert_system"], "running");

    let (status, stage, v) =
        post_ask(app, r#"{"question":"Mercimek çorbası nasıl yapılır?"}"#).await;
    std::env::remove_var("AI_TEST_MODE");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["data"]["expert_type"], "food");
    assert_eq!(stage.as_deref(), Some("local_kb"));
}

#[tokio::test]
#[serial]
async fn app_with_invalid_config_file_still_serves_health() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experts.toml");
    std::fs::write(&path, "[experts.weather]\ncache_ttl = 1\n").unwrap();
    std::env::set_var("EXPERTS_CONFIG_PATH", &path);
    let app = ask_experts::app().await;
    std::env::remove_var("EXPERTS_CONFIG_PATH");
    let app = app.expect("config errors must not fail the router");

    let (status, v) = get_json(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["status"], "online");

    let (status, v) = get_json(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["services"]["expert_system"], "error");

    let (status, _, v) = post_ask(app, r#"{"question":"Ofsayt nedir?"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(v["code"], "EXPERT_SYSTEM_ERROR");
}

#[tokio::test]
#[serial]
async fn missing_config_file_named_by_env_is_a_failed_init() {
    let dir = tempfile::tempdir().unwrap();
    std::env::set_var("EXPERTS_CONFIG_PATH", dir.path().join("missing.toml"));
    let handle = ask_experts::init_system();
    std::env::remove_var("EXPERTS_CONFIG_PATH");

    match handle {
        SystemHandle::Failed(reason) => assert!(reason.contains("missing.toml")),
        SystemHandle::Ready(_) => panic!("missing config file must not initialize"),
    }
}
