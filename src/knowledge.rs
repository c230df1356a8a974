// src/knowledge.rs
//! Local knowledge source: an immutable question → answer table per domain.
//!
//! Tables are loaded once at expert construction (embedded JSON by default, or an
//! external file named in config) and only read afterwards.
//!
//! Matching order:
//! 1) exact match on the folded question (see `text::fold_for_match`)
//! 2) best fuzzy candidate by token Jaccard over content tokens (filler words
//!    dropped, typo-level token pairs counted as equal), at or above `min_score`.
//!    Ties go to the closer whole question by `strsim::normalized_levenshtein`.
//!
//! Jaccard is two-way: a question that only shares a pattern's frame but swaps
//! its subject ("basketbol" for "futbol") stays below the threshold.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strsim::normalized_levenshtein;

use crate::text::{fold_for_match, tokens};

pub const DEFAULT_MIN_SCORE: f32 = 0.8;

/// Two tokens this close count as the same word ("dakka" / "dakika").
const TOKEN_SIMILARITY: f64 = 0.65;

/// Conversational filler that carries no topic.
const FILLER: &[&str] = &[
    "acaba", "merhaba", "selam", "lutfen", "peki", "bir", "mi", "mu", "misin", "musun",
    "misiniz", "musunuz", "bana", "bize", "ya", "da", "de", "ki", "ve", "bu", "su", "the",
    "an", "is", "please", "hey",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeEntry {
    #[serde(alias = "question")]
    pub question_pattern: String,
    pub answer: String,
}

/// Pre-folded entry so request-time lookups do no allocation on the table side.
#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: KnowledgeEntry,
    folded: String,
    tokens: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: Vec<IndexedEntry>,
    min_score: f32,
}

#[derive(Debug, Deserialize)]
struct KnowledgeFile {
    entries: Vec<KnowledgeEntry>,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::from_entries(Vec::new())
    }
}

impl KnowledgeBase {
    pub fn from_entries(entries: Vec<KnowledgeEntry>) -> Self {
        let entries = entries
            .into_iter()
            .filter(|e| !e.question_pattern.trim().is_empty() && !e.answer.trim().is_empty())
            .map(|entry| IndexedEntry {
                folded: fold_for_match(&entry.question_pattern),
                tokens: content_tokens(&entry.question_pattern),
                entry,
            })
            .collect();
        Self {
            entries,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    /// Parse a JSON table: either `{"entries": [...]}` or a bare array.
    pub fn from_json(raw: &str) -> Result<Self> {
        let entries = match serde_json::from_str::<KnowledgeFile>(raw) {
            Ok(file) => file.entries,
            Err(_) => serde_json::from_str::<Vec<KnowledgeEntry>>(raw)
                .context("knowledge table must be {\"entries\": [...]} or an array")?,
        };
        Ok(Self::from_entries(entries))
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading knowledge table from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Question patterns in table order.
    pub fn common_questions(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.entry.question_pattern.as_str())
            .collect()
    }

    /// Find the answer for `query`, if any entry matches well enough.
    pub fn find_answer(&self, query: &str) -> Option<&str> {
        self.best_match(query).map(|(e, _)| e.answer.as_str())
    }

    /// Best matching entry together with its score (1.0 for exact matches).
    pub fn best_match(&self, query: &str) -> Option<(&KnowledgeEntry, f32)> {
        let folded = fold_for_match(query);
        if folded.is_empty() {
            return None;
        }
        if let Some(hit) = self.entries.iter().find(|e| e.folded == folded) {
            return Some((&hit.entry, 1.0));
        }

        let query_tokens = content_tokens(query);
        let mut best: Option<(&IndexedEntry, f32, f64)> = None;
        for e in &self.entries {
            let score = fuzzy_jaccard(&e.tokens, &query_tokens);
            if score < self.min_score {
                continue;
            }
            let lev = normalized_levenshtein(&e.folded, &folded);
            let better = best.map_or(true, |(_, s, l)| score > s || (score == s && lev > l));
            if better {
                best = Some((e, score, lev));
            }
        }
        best.map(|(e, s, _)| (&e.entry, s))
    }
}

/// Folded tokens without filler; falls back to all tokens when only filler remains.
fn content_tokens(s: &str) -> Vec<String> {
    let all = tokens(s);
    let content: Vec<String> = all
        .iter()
        .filter(|t| !FILLER.contains(&t.as_str()))
        .cloned()
        .collect();
    if content.is_empty() {
        all
    } else {
        content
    }
}

fn same_word(a: &str, b: &str) -> bool {
    a == b
        || (a.chars().count() >= 4
            && b.chars().count() >= 4
            && normalized_levenshtein(a, b) >= TOKEN_SIMILARITY)
}

/// |A ∩ B| / |A ∪ B| with each query token matched at most once.
fn fuzzy_jaccard(pattern: &[String], query: &[String]) -> f32 {
    if pattern.is_empty() || query.is_empty() {
        return 0.0;
    }
    let mut used = vec![false; query.len()];
    let mut shared = 0usize;
    for p in pattern {
        if let Some(i) = (0..query.len()).find(|&i| !used[i] && same_word(p, &query[i])) {
            used[i] = true;
            shared += 1;
        }
    }
    let union = pattern.len() + query.len() - shared;
    shared as f32 / union as f32
}
