//! Best-effort extraction of a numeric result from free-form model output.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

/// First `{...}` object embedded anywhere in the text (non-greedy).
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\s\S]*?\}").expect("valid regex"));

/// First bare numeric literal, with optional sign, fraction, and exponent.
static NUMERIC_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?").expect("valid regex"));

#[derive(Deserialize)]
struct ComputeResponse {
    result: f64,
}

/// Errors from response parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("no numeric result found in response")]
    NoResult,
}

/// Pull a numeric result out of free-form response text.
///
/// Preferred shape is a `{"result": <number>}` object anywhere in the text
/// (surrounding prose is tolerated). When no such object parses, the first
/// bare numeric literal is used instead.
pub fn parse_numeric_result(text: &str) -> Result<f64, ParseError> {
    if let Some(candidate) = JSON_OBJECT.find(text) {
        if let Ok(parsed) = serde_json::from_str::<ComputeResponse>(candidate.as_str()) {
            return Ok(parsed.result);
        }
    }

    NUMERIC_LITERAL
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .ok_or(ParseError::NoResult)
}
