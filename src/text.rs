// src/text.rs
//! Text helpers shared by the lookup stages: match folding, tokenization,
//! HTML page normalization, and anonymized query ids for logs.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::collections::HashSet;

/// Fold text for matching: lowercase, Turkish letters to ASCII, punctuation to
/// spaces, whitespace collapsed.
pub fn fold_for_match(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = true;
    for ch in s.chars() {
        let mapped = match ch {
            'ı' | 'İ' | 'I' => Some('i'),
            'ş' | 'Ş' => Some('s'),
            'ğ' | 'Ğ' => Some('g'),
            'ü' | 'Ü' => Some('u'),
            'ö' | 'Ö' => Some('o'),
            'ç' | 'Ç' => Some('c'),
            // Apostrophes glue Turkish suffixes ("Kupası'nı"); drop them.
            '\'' | '\u{2019}' | '`' => None,
            c if c.is_alphanumeric() => Some(c),
            _ => Some(' '),
        };
        let Some(c) = mapped else { continue };
        if c == ' ' {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.extend(c.to_lowercase());
            prev_space = false;
        }
    }
    out.trim_end().to_string()
}

/// Folded tokens, dropping one-letter noise.
pub fn tokens(s: &str) -> Vec<String> {
    fold_for_match(s)
        .split(' ')
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Share of `needle` tokens present in `haystack` tokens (0.0 when `needle` is empty).
pub fn token_coverage(needle: &[String], haystack: &[String]) -> f32 {
    if needle.is_empty() {
        return 0.0;
    }
    let hay: HashSet<&str> = haystack.iter().map(String::as_str).collect();
    let hits = needle.iter().filter(|t| hay.contains(t.as_str())).count();
    hits as f32 / needle.len() as f32
}

/// Normalize fetched page text: decode entities, strip tags and scripts,
/// unify quotes, collapse whitespace, cap length.
pub fn normalize_page_text(s: &str, max_chars: usize) -> String {
    static RE_BLOCKS: OnceCell<Regex> = OnceCell::new();
    static RE_PARA: OnceCell<Regex> = OnceCell::new();
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    static RE_WS: OnceCell<Regex> = OnceCell::new();

    // 1) Drop script/style blocks entirely
    let re_blocks = RE_BLOCKS
        .get_or_init(|| Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)>").unwrap());
    let mut out = re_blocks.replace_all(s, " ").to_string();

    // 2) Paragraph-ish tags become line breaks so paragraphs survive
    let re_para =
        RE_PARA.get_or_init(|| Regex::new(r"(?i)</?(p|br|li|h[1-6]|div|tr)[^>]*>").unwrap());
    out = re_para.replace_all(&out, "\n").to_string();

    // 3) Strip remaining tags, then decode entities
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();
    out = html_escape::decode_html_entities(&out).to_string();

    // 4) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 5) Collapse horizontal whitespace per line, drop empty lines
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[ \t\r\u{a0}]+").unwrap());
    out = out
        .lines()
        .map(|l| re_ws.replace_all(l, " ").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    // 6) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }
    out
}

/// Short anonymized id for a query. Raw query text never goes to the logs.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
