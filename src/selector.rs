// src/selector.rs
//! Expert selection: decide which domain handles a query, or answer it directly.
//!
//! Order:
//! 1) keyword hits per domain on the folded query (product keywords win outright)
//! 2) short greetings / thanks / help requests with no domain hit → direct answer
//! 3) no decisive keyword result → optional LLM classification (one label)
//! 4) still undecided → `Unresolved`
//!
//! `select` never fails; internal errors degrade to `Unresolved`.

use std::time::Duration;

use tracing::{debug, warn};

use crate::expert::ExpertType;
use crate::llm::DynLlmClient;
use crate::text::{anon_hash, fold_for_match};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Expert(ExpertType),
    Direct(String),
    /// No expert and no direct answer available.
    Unresolved,
}

impl Selection {
    /// `(domain, direct_answer)` view; at most one side is `Some`.
    pub fn into_parts(self) -> (Option<ExpertType>, Option<String>) {
        match self {
            Selection::Expert(t) => (Some(t), None),
            Selection::Direct(s) => (None, Some(s)),
            Selection::Unresolved => (None, None),
        }
    }
}

/// Keyword table per domain. Entries are already folded (see `fold_for_match`).
/// Words of 4+ chars also match as token prefixes ("futbolcu" → "futbol"), in
/// phrases too ("yapay zekanin" → "yapay zeka").
const KEYWORDS: &[(ExpertType, &[&str])] = &[
    (ExpertType::SudoStar, &["sudostar", "sudo star"]),
    (
        ExpertType::Sports,
        &[
            "futbol", "basketbol", "voleybol", "tenis", "mac", "gol", "lig", "sampiyon",
            "dunya kupasi", "olimpiyat", "transfer", "takim", "antrenor", "teknik direktor",
            "spor", "fifa", "uefa", "nba", "formula", "ofsayt", "penalti", "hakem",
            "galatasaray", "fenerbahce", "besiktas", "trabzonspor", "football", "soccer",
            "basketball", "league", "world cup", "champion", "olympic", "athlete", "sport",
        ],
    ),
    (
        ExpertType::Food,
        &[
            "yemek", "tarif", "mutfak", "pisir", "corba", "tatli", "kahvalti", "restoran",
            "malzeme", "kalori", "sebze", "tavuk", "pilav", "makarna", "kebap", "baklava",
            "borek", "recipe", "cook", "food", "dish", "ingredient", "bake", "meal", "cuisine",
        ],
    ),
    (
        ExpertType::Ai,
        &[
            "yapay zeka", "makine ogrenmesi", "derin ogrenme", "sinir agi", "sinir aglari",
            "dil modeli", "llm",
            "gpt", "chatgpt", "algoritma", "veri bilimi", "ai", "artificial intelligence",
            "machine learning", "deep learning", "neural network", "transformer", "prompt",
        ],
    ),
];

const GREETINGS: &[&str] = &[
    "merhaba", "selam", "selamlar", "hello", "hi", "hey", "gunaydin", "iyi aksamlar",
    "iyi gunler", "nasilsin", "naber",
];
const THANKS: &[&str] = &[
    "tesekkurler", "tesekkur ederim", "sagol", "sagolun", "thanks", "thank you",
];
const HELP: &[&str] = &[
    "yardim", "help", "sen kimsin", "neler yapabilirsin", "ne yapabilirsin",
];

/// Longest query (in tokens) still treated as small talk.
const SMALL_TALK_MAX_TOKENS: usize = 4;

const GREETING_REPLY: &str = "Merhaba! Spor, yemek, yapay zeka ve SudoStar hakkındaki \
sorularınızı yanıtlayabilirim. Size nasıl yardımcı olabilirim?";
const THANKS_REPLY: &str =
    "Rica ederim! Başka bir sorunuz olursa yardımcı olmaktan memnuniyet duyarım.";
const HELP_REPLY: &str = "Ben uzman bir soru-cevap asistanıyım. Spor, yemek ve mutfak, \
yapay zeka ve SudoStar platformu hakkında sorular sorabilirsiniz; sorunuzu ilgili uzmana \
yönlendirip yanıtlıyorum.";

const CLASSIFY_PROMPT: &str = "Classify the user's question into exactly one category: \
sports, food, ai, sudostar. If none of them fits, answer none. \
Reply with the single category word only.";

pub struct ExpertSelector {
    classifier: Option<DynLlmClient>,
    classify_timeout: Duration,
}

impl Default for ExpertSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpertSelector {
    /// Keyword-only selector.
    pub fn new() -> Self {
        Self {
            classifier: None,
            classify_timeout: Duration::from_secs(10),
        }
    }

    /// Selector that asks the LLM when keywords are not decisive.
    pub fn with_classifier(mut self, llm: DynLlmClient) -> Self {
        self.classifier = Some(llm);
        self
    }

    pub fn with_classify_timeout(mut self, timeout: Duration) -> Self {
        self.classify_timeout = timeout;
        self
    }

    pub async fn select(&self, query: &str) -> Selection {
        let folded = fold_for_match(query);
        if folded.is_empty() {
            return Selection::Unresolved;
        }
        let id = anon_hash(query);

        if let Some(kind) = keyword_choice(&folded) {
            debug!(target: "selector", %id, expert = kind.as_str(), "keyword match");
            return Selection::Expert(kind);
        }

        if let Some(reply) = small_talk(&folded) {
            debug!(target: "selector", %id, "direct answer");
            return Selection::Direct(reply.to_string());
        }

        match self.classify(query).await {
            Some(kind) => {
                debug!(target: "selector", %id, expert = kind.as_str(), "llm classification");
                Selection::Expert(kind)
            }
            None => Selection::Unresolved,
        }
    }

    async fn classify(&self, query: &str) -> Option<ExpertType> {
        let llm = self.classifier.as_ref()?;
        let reply = match tokio::time::timeout(
            self.classify_timeout,
            llm.complete(CLASSIFY_PROMPT, query),
        )
        .await
        {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                warn!(target: "selector", error = %e, "classification failed");
                return None;
            }
            Err(_) => {
                warn!(target: "selector", "classification timed out");
                return None;
            }
        };
        parse_label(&reply)
    }
}

/// First token of the reply, as an expert label. "none" and anything unknown → `None`.
fn parse_label(reply: &str) -> Option<ExpertType> {
    let folded = fold_for_match(reply);
    let label = folded.split(' ').next()?;
    label.parse().ok()
}

/// Words of 4+ chars match as token prefixes (Turkish suffixes), shorter ones whole.
fn word_hits(token: &str, word: &str) -> bool {
    if word.chars().count() >= 4 {
        token.starts_with(word)
    } else {
        token == word
    }
}

/// Every word of `phrase` hits consecutive query tokens.
fn phrase_hits(tokens: &[&str], phrase: &str) -> bool {
    let words: Vec<&str> = phrase.split(' ').collect();
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| word_hits(t, w)))
}

fn keyword_choice(folded: &str) -> Option<ExpertType> {
    let tokens: Vec<&str> = folded.split(' ').collect();

    let mut best: Option<(ExpertType, usize)> = None;
    for (kind, words) in KEYWORDS {
        let hits = words
            .iter()
            .filter(|w| phrase_hits(&tokens, w))
            .count();
        if hits == 0 {
            continue;
        }
        if *kind == ExpertType::SudoStar {
            return Some(*kind);
        }
        // Ties keep the earlier domain in table order.
        if best.map_or(true, |(_, b)| hits > b) {
            best = Some((*kind, hits));
        }
    }
    best.map(|(k, _)| k)
}

fn small_talk(folded: &str) -> Option<&'static str> {
    let tokens: Vec<&str> = folded.split(' ').collect();
    if tokens.len() > SMALL_TALK_MAX_TOKENS {
        return None;
    }
    let any = |list: &[&str]| list.iter().any(|p| phrase_hits(&tokens, p));
    if any(HELP) {
        Some(HELP_REPLY)
    } else if any(THANKS) {
        Some(THANKS_REPLY)
    } else if any(GREETINGS) {
        Some(GREETING_REPLY)
    } else {
        None
    }
}
