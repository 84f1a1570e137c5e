//! Conversational capture pipeline
//!
//! The per-message orchestrator the messaging channel adapter calls into:
//! classify, parse (fast path then fallback), validate completeness, run
//! the clarification dialogue, persist, and answer in the detected
//! language. CCC analytics are served from here for query and report
//! messages.
//!
//! ## Concurrency
//!
//! Handling is synchronous per message. The only cross-message state is
//! owner-keyed (pending captures and streaks), so messages from different
//! owners never contend; messages from the same owner serialize on a
//! per-owner async mutex — a clarification reply is never processed
//! concurrently with a fresh message from the same owner.
//!
//! Image capture races two strategies — direct structured extraction
//! against OCR-then-semantic-parse — and keeps whichever returns a
//! non-error result first; the loser is dropped, not retried.

use crate::analytics::CccEngine;
use crate::classify;
use crate::config::{AnalyticsConfig, CaptureConfig, Config};
use crate::db::Database;
use crate::dialogue;
use crate::error::{Error, Result};
use crate::llm::{HttpLlmClient, ParserClient, VisionClient};
use crate::parse;
use crate::persist;
use crate::responses;
use crate::types::{
    Action, CccReport, Language, MessageClass, ParseOutcome, PendingCapture, TransactionDraft,
};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Library entry point for inbound messages, one instance per process.
pub struct CapturePipeline {
    db: Arc<Database>,
    llm: Option<Arc<dyn ParserClient>>,
    vision: Option<Arc<dyn VisionClient>>,
    capture: CaptureConfig,
    analytics: AnalyticsConfig,
    owner_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CapturePipeline {
    /// Build a pipeline from configuration, constructing the HTTP LLM
    /// client when one is configured.
    pub fn new(db: Arc<Database>, config: &Config) -> Result<Self> {
        let (llm, vision) = match &config.llm {
            Some(llm_config) => {
                let client = Arc::new(HttpLlmClient::new(llm_config)?);
                (
                    Some(client.clone() as Arc<dyn ParserClient>),
                    Some(client as Arc<dyn VisionClient>),
                )
            }
            None => (None, None),
        };
        Ok(Self::with_clients(
            db,
            config.capture.clone(),
            config.analytics.clone(),
            llm,
            vision,
        ))
    }

    /// Build a pipeline with explicit service clients (used by tests).
    pub fn with_clients(
        db: Arc<Database>,
        capture: CaptureConfig,
        analytics: AnalyticsConfig,
        llm: Option<Arc<dyn ParserClient>>,
        vision: Option<Arc<dyn VisionClient>>,
    ) -> Self {
        Self {
            db,
            llm,
            vision,
            capture,
            analytics,
            owner_locks: DashMap::new(),
        }
    }

    fn owner_lock(&self, owner_id: &str) -> Arc<Mutex<()>> {
        self.owner_locks
            .entry(owner_id.to_string())
            .or_default()
            .clone()
    }

    fn llm_ref(&self) -> Option<&dyn ParserClient> {
        self.llm.as_deref()
    }

    fn log_activity(&self, owner_id: &str, class: &str, action: Option<Action>, outcome: &str) {
        if let Err(e) = self.db.append_activity(owner_id, class, action, outcome) {
            tracing::warn!(error = %e, owner_id, "activity log write failed");
        }
    }

    // ============================================
    // Text entry point
    // ============================================

    /// Handle one inbound text message for an owner and produce the reply.
    pub async fn handle_text(&self, owner_id: &str, text: &str) -> Result<String> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let classification = classify::classify(text);
        let language = classification.language;
        tracing::debug!(
            owner_id,
            class = classification.class.as_str(),
            language = language.as_str(),
            "message classified"
        );

        // An owner in clarification gets their reply routed to the
        // pending capture unless the message reads as a fresh transaction
        if let Some(pending) = self.db.get_pending_capture(owner_id)? {
            if dialogue::supersedes_pending(text, self.capture.short_reply_max_tokens) {
                tracing::debug!(owner_id, "pending capture superseded by new transaction");
                self.db.delete_pending_capture(owner_id)?;
            } else {
                let reply = self.continue_clarification(owner_id, pending, text).await?;
                self.log_activity(owner_id, "clarification", None, "handled");
                return Ok(reply);
            }
        }

        let reply = match classification.class {
            MessageClass::Greeting => responses::greeting(language),
            MessageClass::Help => responses::help(language),
            MessageClass::Command => self.handle_command(owner_id, text, language)?,
            MessageClass::Ambiguous => responses::ambiguous(language),
            MessageClass::MultiTransaction => responses::multi_transaction(language),
            MessageClass::Query => {
                responses::ccc_summary(language, &self.ccc_report(owner_id)?)
            }
            MessageClass::Transaction => {
                self.capture_transaction(owner_id, text, language).await?
            }
        };

        self.log_activity(owner_id, classification.class.as_str(), None, "handled");
        Ok(reply)
    }

    // ============================================
    // Media entry point
    // ============================================

    /// Handle an inbound image (receipt photo) for an owner.
    pub async fn handle_media(&self, owner_id: &str, image: &[u8]) -> Result<String> {
        let lock = self.owner_lock(owner_id);
        let _guard = lock.lock().await;

        let Some(vision) = self.vision.clone() else {
            return Ok(responses::media_error(Language::Indonesian));
        };

        match self.race_media_extraction(vision.as_ref(), image).await {
            Ok(draft) => {
                self.log_activity(owner_id, "media", draft.action, "extracted");
                self.validate_and_persist(owner_id, draft).await
            }
            Err(e) => {
                tracing::warn!(error = %e, owner_id, "media extraction failed on both strategies");
                self.log_activity(owner_id, "media", None, "failed");
                Ok(responses::media_error(Language::Indonesian))
            }
        }
    }

    /// Race the two image parsing strategies: whichever returns a
    /// non-error draft first wins, the loser is canceled by drop.
    async fn race_media_extraction(
        &self,
        vision: &dyn VisionClient,
        image: &[u8],
    ) -> Result<TransactionDraft> {
        let structured = async {
            let reply = vision
                .extract_structured(image, &parse::receipt_prompt())
                .await?;
            parse::normalize_reply(&reply, Language::Indonesian)
                .map_err(|f| Error::Vision(f.to_string()))
        };

        let ocr = async {
            let text = vision.extract_text(image).await?;
            let language = classify::detect_language(&text);
            match parse::parse_message(&text, language, self.llm_ref()).await {
                ParseOutcome::Parsed(draft) => Ok(draft),
                ParseOutcome::Failed(failure) => Err(Error::Parse(failure.to_string())),
            }
        };

        tokio::pin!(structured);
        tokio::pin!(ocr);

        tokio::select! {
            first = &mut structured => match first {
                Ok(draft) => Ok(draft),
                Err(e) => {
                    tracing::debug!(error = %e, "structured extraction lost the race");
                    ocr.await
                }
            },
            first = &mut ocr => match first {
                Ok(draft) => Ok(draft),
                Err(e) => {
                    tracing::debug!(error = %e, "ocr extraction lost the race");
                    structured.await
                }
            },
        }
    }

    // ============================================
    // Capture flow
    // ============================================

    async fn capture_transaction(
        &self,
        owner_id: &str,
        text: &str,
        language: Language,
    ) -> Result<String> {
        match parse::parse_message(text, language, self.llm_ref()).await {
            ParseOutcome::Parsed(draft) => {
                self.validate_and_persist(owner_id, draft).await
            }
            ParseOutcome::Failed(failure) => {
                // Both tiers exhausted: user-visible error, message discarded
                tracing::debug!(owner_id, %failure, "parse failed on both tiers");
                Ok(responses::parse_error(language))
            }
        }
    }

    async fn validate_and_persist(
        &self,
        owner_id: &str,
        draft: TransactionDraft,
    ) -> Result<String> {
        let Some(action) = draft.action else {
            return Ok(responses::parse_error(draft.language));
        };
        let mode = self.db.account_mode_or_default(owner_id)?;
        let missing = dialogue::missing_fields(mode, action, &draft);

        if missing.is_empty() {
            return self.persist_and_confirm(owner_id, &draft).await;
        }

        let pending = PendingCapture {
            owner_id: owner_id.to_string(),
            draft,
            missing,
            created_at: Utc::now(),
        };
        self.db.upsert_pending_capture(&pending)?;
        Ok(responses::clarification_prompt(&pending))
    }

    async fn continue_clarification(
        &self,
        owner_id: &str,
        mut pending: PendingCapture,
        reply: &str,
    ) -> Result<String> {
        let mode = self.db.account_mode_or_default(owner_id)?;
        dialogue::fill_from_reply(&mut pending, mode, reply);

        if pending.missing.is_empty() {
            return self.persist_and_confirm(owner_id, &pending.draft).await;
        }

        self.db.upsert_pending_capture(&pending)?;
        Ok(responses::clarification_prompt(&pending))
    }

    /// Persist a complete draft. On store failure the draft is kept as the
    /// owner's pending capture so any later message retries it
    /// transparently.
    async fn persist_and_confirm(&self, owner_id: &str, draft: &TransactionDraft) -> Result<String> {
        match persist::persist_transaction(
            self.db.as_ref(),
            self.llm_ref(),
            &self.capture,
            owner_id,
            draft,
            Utc::now(),
        )
        .await
        {
            Ok(outcome) => {
                self.db.delete_pending_capture(owner_id)?;
                self.log_activity(owner_id, "transaction", Some(outcome.record.action), "saved");
                Ok(responses::saved(&outcome.record, outcome.streak))
            }
            Err(Error::Store(e)) => {
                tracing::error!(error = %e, owner_id, "store write failed; keeping draft");
                let retry = PendingCapture {
                    owner_id: owner_id.to_string(),
                    draft: draft.clone(),
                    missing: Vec::new(),
                    created_at: Utc::now(),
                };
                if let Err(e2) = self.db.upsert_pending_capture(&retry) {
                    tracing::warn!(error = %e2, owner_id, "could not preserve draft for retry");
                }
                Ok(responses::store_error(draft.language))
            }
            Err(e) => Err(e),
        }
    }

    // ============================================
    // Commands and analytics
    // ============================================

    fn handle_command(&self, owner_id: &str, text: &str, language: Language) -> Result<String> {
        let command = text.trim().trim_start_matches('/').to_lowercase();
        match command.as_str() {
            "laporan" | "report" | "saldo" | "balance" => {
                Ok(responses::ccc_summary(language, &self.ccc_report(owner_id)?))
            }
            _ => Ok(responses::unknown_command(language)),
        }
    }

    /// On-demand CCC computation over the owner's records.
    pub fn ccc_report(&self, owner_id: &str) -> Result<CccReport> {
        CccEngine::new(self.db.as_ref(), &self.analytics).compute(owner_id, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pipeline() -> CapturePipeline {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.migrate().unwrap();
        CapturePipeline::with_clients(
            db,
            CaptureConfig::default(),
            AnalyticsConfig::default(),
            None,
            None,
        )
    }

    #[tokio::test]
    async fn greeting_gets_localized_reply() {
        let pipeline = test_pipeline();
        let reply = pipeline.handle_text("owner-1", "halo").await.unwrap();
        assert!(reply.contains("Catat"));

        let reply = pipeline.handle_text("owner-1", "hello").await.unwrap();
        assert!(reply.contains("Log your transactions"));
    }

    #[tokio::test]
    async fn media_without_vision_service_reports_error() {
        let pipeline = test_pipeline();
        let reply = pipeline.handle_media("owner-1", &[1, 2, 3]).await.unwrap();
        assert_eq!(reply, responses::media_error(Language::Indonesian));
    }

    #[tokio::test]
    async fn owner_locks_are_per_owner() {
        let pipeline = test_pipeline();
        let a = pipeline.owner_lock("owner-1");
        let b = pipeline.owner_lock("owner-1");
        let c = pipeline.owner_lock("owner-2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
