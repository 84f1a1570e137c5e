//! Two-tier transaction parsing
//!
//! The fast path ([`patterns`]) is a deterministic regex pass with
//! sub-millisecond latency and no network access; the fallback
//! ([`semantic`]) delegates to the external LLM parsing service. The
//! fallback runs only when the fast path exhausts its templates, so a
//! message matching any template never costs a service call.
//!
//! Both tiers normalize into [`TransactionDraft`], and both leave
//! payment-term detection to the shared pass here so the draft shape is
//! identical regardless of which tier produced it.

pub mod patterns;
pub mod semantic;

use crate::llm::ParserClient;
use crate::types::{Language, ParseFailure, ParseOutcome};

pub use patterns::{detect_payment_terms, extract_first_amount, parse_fast, strip_prepositions};
pub use semantic::{normalize_reply, parse_semantic, receipt_prompt};

/// Parse a transaction-class message: fast path first, LLM fallback on
/// template exhaustion. Without a configured client the fallback failure
/// is reported as a service failure.
pub async fn parse_message(
    text: &str,
    language: Language,
    client: Option<&dyn ParserClient>,
) -> ParseOutcome {
    match parse_fast(text, language) {
        ParseOutcome::Parsed(draft) => ParseOutcome::Parsed(draft),
        ParseOutcome::Failed(_) => {
            // Fast-path failures propagate silently into the fallback
            let Some(client) = client else {
                return ParseOutcome::Failed(ParseFailure::Service(
                    "no parsing service configured".to_string(),
                ));
            };
            let outcome = parse_semantic(client, text, language).await;
            match outcome {
                ParseOutcome::Parsed(mut draft) => {
                    if draft.payment_terms.is_none() {
                        draft.payment_terms = detect_payment_terms(text);
                    }
                    ParseOutcome::Parsed(draft)
                }
                failed => failed,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Client that counts calls; used to prove fast-path precedence.
    struct CountingClient {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParserClient for CountingClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(r#"{"action":"sale","amount":1,"item":"x"}"#.to_string())
        }
    }

    #[tokio::test]
    async fn fast_path_match_never_calls_fallback() {
        let client = CountingClient {
            calls: AtomicUsize::new(0),
        };
        let outcome =
            parse_message("jual nasi goreng 25rb", Language::Indonesian, Some(&client)).await;
        assert!(outcome.is_parsed());
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fallback_runs_on_template_exhaustion() {
        let client = CountingClient {
            calls: AtomicUsize::new(0),
        };
        let outcome = parse_message(
            "kemarin ada pelanggan ambil dua porsi besar",
            Language::Indonesian,
            Some(&client),
        )
        .await;
        assert!(outcome.is_parsed());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_client_surfaces_service_failure() {
        let outcome = parse_message(
            "kemarin ada pelanggan ambil dua porsi besar",
            Language::Indonesian,
            None,
        )
        .await;
        assert!(matches!(
            outcome,
            ParseOutcome::Failed(ParseFailure::Service(_))
        ));
    }
}
