// src/expert/verdict.rs
//! Validation verdict for web-search answers.
//!
//! Decoding is strict: the reply must be a JSON object with a boolean `is_valid`
//! and a string `reason` (a single surrounding markdown code fence is tolerated).
//! Anything else decodes to a rejection. An unparsable verdict is never approval.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Verdict {
    pub is_valid: bool,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("empty validation reply")]
    Empty,
    #[error("malformed validation reply: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl Verdict {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: reason.into(),
        }
    }

    /// Strict decode.
    pub fn decode(raw: &str) -> Result<Self, VerdictError> {
        let body = strip_code_fence(raw.trim());
        if body.is_empty() {
            return Err(VerdictError::Empty);
        }
        Ok(serde_json::from_str::<Verdict>(body)?)
    }

    /// Fail-closed decode: any decoding problem becomes a rejection.
    pub fn parse(raw: &str) -> Self {
        Self::decode(raw).unwrap_or_else(|e| Self::rejected(e.to_string()))
    }
}

/// Unwrap "```json\n{...}\n```" (or a bare ``` fence). Other text is returned unchanged.
fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return s;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}
