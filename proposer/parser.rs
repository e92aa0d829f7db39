use crate::types::{CandidateSeverity, ConfounderCandidate};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProposerError {
    #[error("The generator returned malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("The generator response does not contain a 'candidates' array.")]
    MissingCandidates,

    #[error("Candidate source failed: {0}")]
    Source(String),

    #[error("Failed to read generator response: {0}")]
    IoError(#[from] std::io::Error),

    #[error("All {attempts} attempts to reach the candidate source failed. Last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Removes a surrounding markdown code fence (with or without a language tag).
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // The opening fence runs to the end of its line, which may carry a tag.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches('`').trim()
}

fn field(item: &Value, key: &str) -> Option<String> {
    match item.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Parses a generator response into plausible candidates.
///
/// Accepts `{"candidates": [...]}` or a bare array. Names are normalized,
/// missing severities default to medium, and items without a name or either
/// mechanism are skipped.
pub fn parse_candidates(response: &str) -> Result<Vec<ConfounderCandidate>, ProposerError> {
    let cleaned = strip_code_fence(response);
    let data: Value = serde_json::from_str(cleaned).map_err(|e| {
        log::error!(
            "Failed to parse generator response as JSON: {e}. Response starts with: {}",
            cleaned.chars().take(200).collect::<String>()
        );
        ProposerError::MalformedJson(e)
    })?;

    let items = match &data {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("candidates") {
            Some(Value::Array(items)) => items,
            _ => return Err(ProposerError::MissingCandidates),
        },
        _ => return Err(ProposerError::MissingCandidates),
    };

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            log::warn!("Skipping candidate that is not a JSON object: {item}");
            continue;
        }
        let text = |key: &str| field(item, key).unwrap_or_default();
        let severity = field(item, "severity")
            .map(|s| CandidateSeverity::from_label(&s))
            .unwrap_or(CandidateSeverity::Medium);
        let candidate = ConfounderCandidate::new(
            &text("name"),
            &text("description"),
            &text("causes_treatment_because"),
            &text("causes_outcome_because"),
            severity,
        );
        if candidate.is_plausible() {
            candidates.push(candidate);
        } else {
            log::warn!(
                "Skipping implausible candidate (missing fields): {:?}",
                field(item, "name")
            );
        }
    }

    log::info!(
        "Parsed {} valid confounder candidates from generator response",
        candidates.len()
    );
    Ok(candidates)
}
