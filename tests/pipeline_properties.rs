// tests/pipeline_properties.rs
//
// Pipeline-level properties of a single expert, driven through scripted
// collaborators (MockLlm / MockSearch) so every external call is counted.
//
// Covered:
// - cache short-circuit and TTL expiry
// - fixed stage order (local KB → URL sources → AI → web search)
// - fail-closed validation of web answers
// - non-empty answer on total exhaustion, fallback never cached
// - idempotence
// - the three World Cup scenarios

use std::sync::Arc;
use std::time::Duration;

use ask_experts::cache::Cache;
use ask_experts::expert::profile::{profile_for, VALIDATION_PROMPT};
use ask_experts::knowledge::{KnowledgeBase, KnowledgeEntry};
use ask_experts::llm::MockLlm;
use ask_experts::search::MockSearch;
use ask_experts::sources::{SourceBody, UrlSource, UrlSourceSet};
use ask_experts::{AnswerStage, Expert, ExpertType, TieredExpert};

const WORLD_CUP: &str = "Kim 2022 Dünya Kupası'nı kazandı?";
const ARGENTINA: &str = "Argentina won the 2022 World Cup.";

/// Sports expert with no local knowledge and no curated sources.
fn sports_expert(llm: &Arc<MockLlm>, search: &Arc<MockSearch>) -> TieredExpert {
    TieredExpert::new(ExpertType::Sports, llm.clone(), search.clone())
        .expect("embedded tables parse")
        .with_knowledge(KnowledgeBase::default())
        .with_sources(UrlSourceSet::default())
}

fn fallback() -> &'static str {
    profile_for(ExpertType::Sports).fallback_message
}

#[tokio::test]
async fn scenario_ai_generate_answers_and_skips_web_search() {
    let llm = Arc::new(MockLlm::new().reply(ARGENTINA));
    let search = Arc::new(MockSearch::new().results(["should not be used"]));
    let expert = sports_expert(&llm, &search);

    let res = expert.resolve(WORLD_CUP).await.expect("resolve");
    assert_eq!(res.answer, ARGENTINA);
    assert_eq!(res.stage, AnswerStage::AiGenerate);
    assert_eq!(search.call_count(), 0, "WEB_SEARCH must not run");
    assert_eq!(llm.call_count(), 1, "AI answer is accepted without validation");
    assert_eq!(
        expert.cache().get(WORLD_CUP).unwrap().as_deref(),
        Some(ARGENTINA)
    );
}

#[tokio::test]
async fn scenario_web_search_synthesizes_and_validates() {
    let llm = Arc::new(
        MockLlm::new()
            .reply("")
            .reply("Arjantin, 2022 Dünya Kupası'nı kazandı.")
            .reply(r#"{"is_valid": true, "reason": "Üç kaynak da aynı sonucu veriyor."}"#),
    );
    let search = Arc::new(MockSearch::new().results([
        "Arjantin finalde Fransa'yı penaltılarla yendi.",
        "Messi turnuvanın en iyi oyuncusu seçildi.",
        "2022 Dünya Kupası Katar'da yapıldı.",
    ]));
    let expert = sports_expert(&llm, &search);

    let res = expert.resolve(WORLD_CUP).await.expect("resolve");
    assert_eq!(res.stage, AnswerStage::WebSearch);
    assert_eq!(res.answer, "Arjantin, 2022 Dünya Kupası'nı kazandı.");

    let calls = llm.calls();
    assert_eq!(calls.len(), 3, "generate, synthesize, validate");
    assert_eq!(calls[2].system_prompt, VALIDATION_PROMPT);
    assert_eq!(search.call_count(), 1);
}

#[tokio::test]
async fn scenario_total_exhaustion_returns_fallback_uncached() {
    let llm = Arc::new(MockLlm::new().fail("service down").fail("service down"));
    let search = Arc::new(MockSearch::new().fail("network"));
    let expert = sports_expert(&llm, &search);

    let res = expert.resolve(WORLD_CUP).await.expect("resolve");
    assert_eq!(res.stage, AnswerStage::Fallback);
    assert_eq!(res.answer, fallback());
    assert!(expert.cache().is_empty(), "fallback must not be cached");
}

#[tokio::test]
async fn cache_hit_skips_every_stage() {
    let llm = Arc::new(MockLlm::new().reply(ARGENTINA));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search);

    let first = expert.get_response(WORLD_CUP).await.unwrap();
    let second = expert.resolve(WORLD_CUP).await.unwrap();

    assert_eq!(second.answer, first);
    assert_eq!(second.stage, AnswerStage::Cache);
    assert_eq!(llm.call_count(), 1, "second call served from cache");
    assert_eq!(search.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_reruns_the_pipeline() {
    let llm = Arc::new(MockLlm::new().reply("first").reply("second"));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search).with_cache(Cache::new(true, Duration::from_secs(3600)));

    assert_eq!(expert.get_response("q").await.unwrap(), "first");
    tokio::time::advance(Duration::from_secs(1800)).await;
    assert_eq!(expert.resolve("q").await.unwrap().stage, AnswerStage::Cache);
    tokio::time::advance(Duration::from_secs(1800)).await;

    let res = expert.resolve("q").await.unwrap();
    assert_eq!(res.answer, "second");
    assert_eq!(res.stage, AnswerStage::AiGenerate);
    assert_eq!(llm.call_count(), 2);
}

#[tokio::test]
async fn disabled_cache_always_runs_the_pipeline() {
    let llm = Arc::new(MockLlm::fixed(ARGENTINA));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search).with_cache(Cache::disabled());

    for _ in 0..3 {
        let res = expert.resolve(WORLD_CUP).await.unwrap();
        assert_eq!(res.stage, AnswerStage::AiGenerate);
    }
    assert_eq!(llm.call_count(), 3);
    assert!(expert.cache().is_empty());
}

#[tokio::test]
async fn ai_generate_runs_before_web_search_when_lookups_miss() {
    let llm = Arc::new(MockLlm::new().fail("down").reply("").reply(""));
    let search = Arc::new(MockSearch::new().results(["snippet"]));
    let expert = sports_expert(&llm, &search).with_knowledge(KnowledgeBase::from_entries(vec![
        KnowledgeEntry {
            question_pattern: "Ofsayt nedir?".into(),
            answer: "Ofsayt ...".into(),
        },
    ]));

    let res = expert.resolve("Basketbolda kaç periyot var?").await.unwrap();
    assert_eq!(res.stage, AnswerStage::Fallback);

    let calls = llm.calls();
    // 1: AI_GENERATE with the raw query, 2: synthesis after the search.
    assert_eq!(calls[0].user_prompt, "Basketbolda kaç periyot var?");
    assert_eq!(
        calls[0].system_prompt,
        profile_for(ExpertType::Sports).ai_system_prompt
    );
    assert!(calls[1].user_prompt.starts_with("Soru: Basketbolda kaç periyot var?"));
    assert_eq!(search.call_count(), 1);
}

#[tokio::test]
async fn local_kb_and_url_sources_win_in_order() {
    let llm = Arc::new(MockLlm::fixed("llm"));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search)
        .with_knowledge(KnowledgeBase::from_entries(vec![KnowledgeEntry {
            question_pattern: "Ofsayt nedir?".into(),
            answer: "Yerel yanıt".into(),
        }]))
        .with_sources(UrlSourceSet::new(vec![UrlSource {
            url: "https://example.org/ofsayt".into(),
            title: "Ofsayt rehberi".into(),
            keywords: vec!["ofsayt".into()],
            body: SourceBody::Static("Ofsayt kuralı hücum oyuncusunun konumuyla ilgilidir.".into()),
        }]));

    let kb = expert.resolve("Ofsayt nedir?").await.unwrap();
    assert_eq!(kb.stage, AnswerStage::LocalKb);

    let url = expert.resolve("Ofsayt kuralı hücum oyuncusu").await.unwrap();
    assert_eq!(url.stage, AnswerStage::UrlSources);
    assert!(url.answer.contains("https://example.org/ofsayt"));

    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn malformed_verdicts_never_approve() {
    for verdict in [
        "evet, doğru",
        r#"{"is_valid": "yes", "reason": "x"}"#,
        r#"{"reason": "missing flag"}"#,
        "",
    ] {
        let llm = Arc::new(MockLlm::new().reply("").reply("Sentez").reply(verdict));
        let search = Arc::new(MockSearch::new().results(["a", "b", "c"]));
        let expert = sports_expert(&llm, &search);

        let res = expert.resolve(WORLD_CUP).await.unwrap();
        assert_eq!(res.stage, AnswerStage::Fallback, "verdict {verdict:?}");
        assert_ne!(res.answer, "Sentez");
        assert!(expert.cache().is_empty());
    }
}

#[tokio::test]
async fn explicit_rejection_falls_back() {
    let llm = Arc::new(
        MockLlm::new()
            .reply("")
            .reply("Sentez")
            .reply(r#"{"is_valid": false, "reason": "kaynaklar çelişiyor"}"#),
    );
    let search = Arc::new(MockSearch::new().results(["a"]));
    let expert = sports_expert(&llm, &search);

    let res = expert.resolve(WORLD_CUP).await.unwrap();
    assert_eq!(res.answer, fallback());
}

#[tokio::test]
async fn answers_are_never_empty() {
    let llm = Arc::new(MockLlm::fixed("   "));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search);

    for q in ["", "?", WORLD_CUP] {
        let answer = expert.get_response(q).await.unwrap();
        assert!(!answer.trim().is_empty(), "query {q:?}");
    }
}

#[tokio::test]
async fn same_query_twice_gives_same_answer() {
    let llm = Arc::new(MockLlm::fixed(ARGENTINA));
    let search = Arc::new(MockSearch::new());
    let expert = sports_expert(&llm, &search);

    let a = expert.get_response(WORLD_CUP).await.unwrap();
    let b = expert.get_response(WORLD_CUP).await.unwrap();
    assert_eq!(a, b);
}
