//! Fallback semantic parser
//!
//! Invoked only when the fast path exhausts its templates. Delegates the
//! full message text to the LLM parsing service with a schema-constrained
//! prompt and normalizes the structured reply into the shared draft shape.
//!
//! Any call failure, timeout, or malformed/non-JSON response becomes a
//! typed [`ParseFailure`] surfaced to the caller — no silent retry loop.

use crate::llm::{extract_json_object, ParserClient};
use crate::types::{Action, Category, Language, ParseFailure, ParseOutcome, TransactionDraft};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

/// Raw shape of the service reply. `#[serde(default)]` keeps partially
/// filled replies usable; the clarification dialogue collects the rest.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawExtraction {
    action: Option<String>,
    amount: Option<serde_json::Value>,
    item: Option<String>,
    counterparty: Option<String>,
    payment_terms: Option<String>,
    category: Option<String>,
}

fn extraction_prompt(text: &str) -> String {
    let categories: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
    format!(
        "You extract bookkeeping records from Indonesian or English chat messages. \
         Return strict JSON with keys: action (one of \"sale\", \"purchase\", \
         \"payment_received\", \"payment_made\"), amount (number, no separators), \
         item (string), counterparty (string or null), payment_terms (string or null), \
         category (for purchases only, one of {}; otherwise null). \
         Use null for anything the message does not state.\n\nMessage: {}\n\nReturn only JSON.",
        categories.join(", "),
        text
    )
}

fn amount_from_value(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                n.as_f64().and_then(|f| Decimal::try_from(f).ok())
            }
        }
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "null")
}

/// Normalize a raw service reply into the shared draft shape.
fn normalize(raw: RawExtraction, language: Language) -> Result<TransactionDraft, ParseFailure> {
    let action = match raw.action.as_deref() {
        Some(a) => Some(Action::from_str(a).map_err(ParseFailure::MalformedResponse)?),
        None => None,
    };
    let Some(action) = action else {
        return Err(ParseFailure::MalformedResponse(
            "service reply carries no action".to_string(),
        ));
    };

    let amount = raw
        .amount
        .as_ref()
        .filter(|v| !v.is_null())
        .and_then(amount_from_value);
    // Amounts must not go negative; drop them and let clarification ask
    let amount = amount.filter(|a| !a.is_sign_negative());

    // Categories only make sense on purchase-like records; unknown labels
    // are dropped rather than failing the whole parse
    let category = if action.is_purchase_like() {
        raw.category
            .as_deref()
            .and_then(|c| Category::from_str(c).ok())
    } else {
        None
    };

    Ok(TransactionDraft {
        action: Some(action),
        amount,
        description: non_empty(raw.item),
        counterparty: non_empty(raw.counterparty),
        payment_terms: non_empty(raw.payment_terms),
        category,
        language,
    })
}

/// Prompt for the direct receipt-to-structured-data extraction at the
/// media boundary; same schema as the text prompt.
pub fn receipt_prompt() -> String {
    let categories: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
    format!(
        "This is a photo of a receipt or invoice. Extract one bookkeeping record as \
         strict JSON with keys: action (one of \"sale\", \"purchase\", \
         \"payment_received\", \"payment_made\"), amount (number, the grand total), \
         item (string summary), counterparty (string or null), payment_terms (string \
         or null), category (for purchases only, one of {}; otherwise null). \
         Use null for anything not visible.\n\nReturn only JSON.",
        categories.join(", ")
    )
}

/// Normalize a raw service reply (text or vision) into the shared draft
/// shape.
pub fn normalize_reply(reply: &str, language: Language) -> Result<TransactionDraft, ParseFailure> {
    let object =
        extract_json_object(reply).map_err(|e| ParseFailure::MalformedResponse(e.to_string()))?;
    let raw: RawExtraction = serde_json::from_str(&object)
        .map_err(|e| ParseFailure::MalformedResponse(e.to_string()))?;
    normalize(raw, language)
}

/// Parse a message through the external LLM service.
pub async fn parse_semantic(
    client: &dyn ParserClient,
    text: &str,
    language: Language,
) -> ParseOutcome {
    let reply = match client.complete(&extraction_prompt(text)).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "fallback parse service call failed");
            return ParseOutcome::Failed(ParseFailure::Service(e.to_string()));
        }
    };

    match normalize_reply(&reply, language) {
        Ok(draft) => ParseOutcome::Parsed(draft),
        Err(failure) => ParseOutcome::Failed(failure),
    }
}
