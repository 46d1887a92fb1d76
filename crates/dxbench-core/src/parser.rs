//! Extraction of ranked diagnosis guesses from raw completions.
//!
//! Models are instructed to answer with a JSON array of diagnosis strings
//! under a `### Output ###` heading, but real completions drift: prose
//! around the array, single quotes instead of double, markdown bold, or a
//! plain numbered list. The strategies below run in order and the first one
//! that yields any guesses wins.

use crate::model::{InferenceJob, ParsedPrediction};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Bracketed array following the output heading.
    static ref OUTPUT_BLOCK: Regex = Regex::new(r"###\s*Output\s*###\s*(\[[\s\S]*?\])").unwrap();
    static ref DOUBLE_QUOTED: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref SINGLE_QUOTED: Regex = Regex::new(r"'([^']+)'").unwrap();
    /// Lines like `3. Acute pancreatitis`.
    static ref NUMBERED_LINE: Regex = Regex::new(r"(?m)^\s*\d+\.\s*(.+)$").unwrap();
}

/// Parse one completion into a prediction. `valid` is true only when at
/// least one guess survives extraction and cleanup.
pub fn parse_response(job: &InferenceJob, text: &str) -> ParsedPrediction {
    let guesses = extract_guesses(text);
    ParsedPrediction {
        job: job.clone(),
        valid: !guesses.is_empty(),
        guesses,
    }
}

/// Ordered guess extraction. Duplicates collapse onto their best rank.
pub fn extract_guesses(text: &str) -> Vec<String> {
    let trimmed = text.trim().trim_matches('.').trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Some(list) = parse_json_array(trimmed) {
        return clean(list);
    }

    // Prefer the marked block when present; completions often put reasoning
    // before the heading and the answer after it.
    let section = OUTPUT_BLOCK
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    if let Some(list) = parse_json_array(section) {
        return clean(list);
    }

    let quoted = scan_quoted(section);
    if !quoted.is_empty() {
        return clean(quoted);
    }

    clean(scan_numbered(trimmed))
}

/// Strict JSON array of strings; anything else falls through to the
/// lenient scanners.
fn parse_json_array(text: &str) -> Option<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    let items = value.as_array()?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        out.push(item.as_str()?.to_string());
    }
    Some(out)
}

fn scan_quoted(text: &str) -> Vec<String> {
    let doubles: Vec<String> = DOUBLE_QUOTED
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect();
    if !doubles.is_empty() {
        return doubles;
    }
    SINGLE_QUOTED
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

fn scan_numbered(text: &str) -> Vec<String> {
    NUMBERED_LINE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Trim whitespace and markdown bold markers, drop empties, dedup keeping
/// first occurrence so ranks stay stable.
fn clean(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for guess in raw {
        let cleaned = guess.trim().trim_matches('*').trim();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.to_string()) {
            out.push(cleaned.to_string());
        }
    }
    out
}
