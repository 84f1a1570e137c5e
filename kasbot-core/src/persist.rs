//! Transaction persistence and derived fields
//!
//! The store-write is the only operation that gates the caller-visible
//! outcome; everything after it — best-effort categorization, the streak
//! update — is logged on failure and never surfaces as an error. Both
//! side effects still complete before this function returns, so a
//! follow-up clarification or metrics read sees their results.
//!
//! Derivations at persistence time:
//! - sales get a COGS estimate of `capture.cogs_ratio` × amount;
//! - purchase-like records without a parser-supplied category get one from
//!   the LLM service, falling back to the configured default category.

use crate::config::CaptureConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::llm::ParserClient;
use crate::streak;
use crate::types::{
    Action, Category, StreakOutcome, TransactionDraft, TransactionRecord,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

/// What the persister did, for response formatting.
#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub record: TransactionRecord,
    /// Streak count and what happened to it, when the update succeeded
    pub streak: Option<(i64, StreakOutcome)>,
}

fn categorization_prompt(record: &TransactionRecord) -> String {
    let categories: Vec<&str> = Category::all().iter().map(|c| c.as_str()).collect();
    format!(
        "Classify this business expense into exactly one category from: {}. \
         Reply with only the category name.\n\nExpense: {} ({})",
        categories.join(", "),
        record.description,
        record.amount
    )
}

fn category_from_reply(reply: &str) -> Option<Category> {
    if let Ok(category) = Category::from_str(reply) {
        return Some(category);
    }
    // Tolerate verbose replies by scanning for a known label
    let lower = reply.to_lowercase();
    Category::all()
        .iter()
        .copied()
        .find(|c| lower.contains(c.as_str()))
}

async fn derive_category(
    llm: Option<&dyn ParserClient>,
    config: &CaptureConfig,
    record: &TransactionRecord,
) -> Category {
    let Some(client) = llm else {
        return config.fallback_category();
    };
    match client.complete(&categorization_prompt(record)).await {
        Ok(reply) => category_from_reply(&reply).unwrap_or_else(|| {
            tracing::warn!(reply = %reply, "categorization reply had no known label");
            config.fallback_category()
        }),
        Err(e) => {
            tracing::warn!(error = %e, "categorization call failed");
            config.fallback_category()
        }
    }
}

fn update_streak(db: &Database, owner_id: &str, now: DateTime<Utc>) -> Option<(i64, StreakOutcome)> {
    let today = now.date_naive();
    let previous = match db.get_streak(owner_id) {
        Ok(previous) => previous,
        Err(e) => {
            tracing::warn!(error = %e, owner_id, "streak read failed");
            return None;
        }
    };
    let (state, outcome) = streak::advance(previous.as_ref(), owner_id, today);
    if outcome.is_change() {
        if let Err(e) = db.upsert_streak(&state) {
            tracing::warn!(error = %e, owner_id, "streak write failed");
            return None;
        }
    }
    Some((state.count, outcome))
}

/// Persist a completed draft for an owner.
///
/// Fails only when the store-write fails; the caller keeps the draft
/// around in that case so a later message can retry transparently.
pub async fn persist_transaction(
    db: &Database,
    llm: Option<&dyn ParserClient>,
    config: &CaptureConfig,
    owner_id: &str,
    draft: &TransactionDraft,
    now: DateTime<Utc>,
) -> Result<PersistOutcome> {
    let action = draft
        .action
        .ok_or_else(|| Error::Parse("draft has no action".to_string()))?;
    let amount = draft
        .amount
        .ok_or_else(|| Error::Parse("draft has no amount".to_string()))?;
    if amount.is_sign_negative() {
        return Err(Error::Amount(amount.to_string()));
    }

    let cogs_estimate = if action == Action::Sale {
        let ratio = Decimal::try_from(config.cogs_ratio)
            .map_err(|e| Error::Config(format!("bad capture.cogs_ratio: {e}")))?;
        Some((amount * ratio).round_dp(2))
    } else {
        None
    };

    let mut record = TransactionRecord {
        id: Uuid::new_v4().to_string(),
        owner_id: owner_id.to_string(),
        action,
        amount,
        description: draft.description.clone().unwrap_or_default(),
        counterparty: draft.counterparty.clone(),
        payment_terms: draft.payment_terms.clone(),
        category: if action.is_purchase_like() {
            draft.category
        } else {
            None
        },
        cogs_estimate,
        language: draft.language,
        created_at: now,
    };

    // Step 1: the only blocking, outcome-gating operation
    db.insert_transaction(&record)?;
    tracing::info!(
        owner_id,
        action = action.as_str(),
        amount = %amount,
        "transaction recorded"
    );

    let needs_category = action.is_purchase_like() && record.category.is_none();

    // Best-effort side effects; failures are logged and defaulted
    let (category, streak_update) = tokio::join!(
        async {
            if needs_category {
                Some(derive_category(llm, config, &record).await)
            } else {
                None
            }
        },
        async { update_streak(db, owner_id, now) },
    );

    if let Some(category) = category {
        record.category = Some(category);
        if let Err(e) = db.set_transaction_category(&record.id, category) {
            tracing::warn!(error = %e, id = %record.id, "category write failed");
        }
    }

    Ok(PersistOutcome {
        record,
        streak: streak_update,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct MockClient {
        reply: String,
    }

    #[async_trait]
    impl ParserClient for MockClient {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn sale_draft(amount: Decimal) -> TransactionDraft {
        TransactionDraft {
            action: Some(Action::Sale),
            amount: Some(amount),
            description: Some("nasi goreng".to_string()),
            language: Language::Indonesian,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sale_gets_cogs_estimate() {
        let db = test_db();
        let outcome = persist_transaction(
            &db,
            None,
            &CaptureConfig::default(),
            "owner-1",
            &sale_draft(dec!(25000)),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.record.cogs_estimate, Some(dec!(15000)));
        assert_eq!(outcome.record.category, None);

        let stored = db.get_transaction(&outcome.record.id).unwrap().unwrap();
        assert_eq!(stored.cogs_estimate, Some(dec!(15000)));
    }

    #[tokio::test]
    async fn purchase_without_service_gets_fallback_category() {
        let db = test_db();
        let draft = TransactionDraft {
            action: Some(Action::Purchase),
            amount: Some(dec!(50000)),
            description: Some("beras".to_string()),
            language: Language::Indonesian,
            ..Default::default()
        };
        let outcome = persist_transaction(
            &db,
            None,
            &CaptureConfig::default(),
            "owner-1",
            &draft,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.record.category, Some(Category::Other));
        let stored = db.get_transaction(&outcome.record.id).unwrap().unwrap();
        assert_eq!(stored.category, Some(Category::Other));
    }

    #[tokio::test]
    async fn purchase_is_categorized_via_service() {
        let db = test_db();
        let client = MockClient {
            reply: "inventory".to_string(),
        };
        let draft = TransactionDraft {
            action: Some(Action::Purchase),
            amount: Some(dec!(800000)),
            description: Some("stok beras sebulan".to_string()),
            language: Language::Indonesian,
            ..Default::default()
        };
        let outcome = persist_transaction(
            &db,
            Some(&client),
            &CaptureConfig::default(),
            "owner-1",
            &draft,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.record.category, Some(Category::Inventory));
    }

    #[tokio::test]
    async fn first_record_starts_streak() {
        let db = test_db();
        let outcome = persist_transaction(
            &db,
            None,
            &CaptureConfig::default(),
            "owner-1",
            &sale_draft(dec!(10000)),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.streak, Some((1, StreakOutcome::Started)));
        assert_eq!(db.get_streak("owner-1").unwrap().unwrap().count, 1);
    }

    #[tokio::test]
    async fn incomplete_draft_is_rejected() {
        let db = test_db();
        let draft = TransactionDraft {
            action: Some(Action::Sale),
            ..Default::default()
        };
        let result = persist_transaction(
            &db,
            None,
            &CaptureConfig::default(),
            "owner-1",
            &draft,
            Utc::now(),
        )
        .await;
        assert!(result.is_err());
    }
}
