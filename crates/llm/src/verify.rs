//! Reconciliation of the model's answer with the deterministic result.
//!
//! The persisted value is always the deterministic one. The model can
//! corroborate it; it can never override it.

use quadcalc_core::ops::Operation;

use crate::client::LlmClient;
use crate::parse::parse_numeric_result;

/// Agreement tolerance between the model's answer and the deterministic
/// value.
const TOLERANCE: f64 = 1e-4;

/// Outcome of a verification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// The value to persist. Always the deterministic result.
    pub result: f64,
    /// Raw response text, or the transport error description, for the
    /// job record.
    pub llm_response: Option<String>,
    /// True when the model was unavailable, unparseable, or disagreed.
    pub used_fallback: bool,
}

/// Whether the response text forces a fallback to the deterministic value.
fn response_disagrees(expected: f64, response_text: &str) -> bool {
    match parse_numeric_result(response_text) {
        Ok(value) => (value - expected).abs() > TOLERANCE,
        Err(_) => true,
    }
}

/// Cross-check a deterministic result against the model.
///
/// Never fails: every failure mode collapses into
/// `used_fallback = true` with the deterministic result.
pub async fn verify_result(
    client: &LlmClient,
    operation: Operation,
    number_a: f64,
    number_b: f64,
    expected: f64,
) -> Verification {
    let prompt = format!(
        "Calculate {number_a} {} {number_b}. Respond ONLY with JSON: {{\"result\": <number>}}",
        operation.symbol()
    );

    match client.chat(&prompt).await {
        Ok(text) => {
            let used_fallback = response_disagrees(expected, &text);
            if used_fallback {
                tracing::warn!(
                    operation = %operation,
                    expected,
                    response = %text,
                    "Verification response disagreed or was unparseable; using deterministic result",
                );
            }
            Verification {
                result: expected,
                llm_response: Some(text),
                used_fallback,
            }
        }
        Err(e) => {
            tracing::warn!(
                operation = %operation,
                error = %e,
                "Verification call failed; using deterministic result",
            );
            Verification {
                result: expected,
                llm_response: Some(e.to_string()),
                used_fallback: true,
            }
        }
    }
}
