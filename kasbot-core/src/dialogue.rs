//! Completeness validation and the clarification dialogue
//!
//! After a successful parse the draft is checked against mode-specific
//! required-field rules. Missing fields drive a per-owner slot-filling
//! exchange: the owner's [`PendingCapture`] holds the draft and the
//! outstanding fields, each reply attempts to fill what is still missing,
//! and the dialogue re-prompts only for the remainder.
//!
//! The state machine itself is just the presence or absence of a pending
//! capture in the store: `Idle` when none exists, `AwaitingClarification`
//! while one does. A reply that looks like a fresh transaction (contains a
//! transaction verb and is not short) supersedes the pending draft rather
//! than trapping the user in a loop.

use crate::classify;
use crate::parse::{extract_first_amount, strip_prepositions};
use crate::types::{AccountMode, Action, MissingField, PendingCapture, TransactionDraft};

/// Required fields for a complete record, in prompt order (item, amount,
/// counterparty).
///
/// Business mode requires the item (except for payments), the amount, and
/// a counterparty (except for sales). Personal mode tracks by category and
/// requires only the amount.
pub fn required_fields(mode: AccountMode, action: Action) -> Vec<MissingField> {
    match mode {
        AccountMode::Business => {
            let mut fields = Vec::new();
            if !action.is_payment() {
                fields.push(MissingField::Item);
            }
            fields.push(MissingField::Amount);
            if action != Action::Sale {
                fields.push(MissingField::Counterparty);
            }
            fields
        }
        AccountMode::Personal => vec![MissingField::Amount],
    }
}

/// Which required fields the draft is still missing.
pub fn missing_fields(mode: AccountMode, action: Action, draft: &TransactionDraft) -> Vec<MissingField> {
    required_fields(mode, action)
        .into_iter()
        .filter(|field| match field {
            MissingField::Item => draft
                .description
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .is_none(),
            MissingField::Amount => draft.amount.is_none(),
            MissingField::Counterparty => draft
                .counterparty
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .is_none(),
        })
        .collect()
}

/// Whether a message from an owner in clarification should supersede the
/// pending draft: it reads as a fresh transaction when it contains a
/// transaction verb and is longer than a short reply.
pub fn supersedes_pending(text: &str, short_reply_max_tokens: usize) -> bool {
    let token_count = text.split_whitespace().count();
    classify::contains_transaction_verb(text) && token_count > short_reply_max_tokens
}

/// Attempt to fill each outstanding missing field from a clarification
/// reply, then recompute the missing list.
///
/// Fill rules per field: counterparty strips known prepositions from the
/// reply, amount takes the first numeral, item takes the full trimmed
/// reply text.
pub fn fill_from_reply(pending: &mut PendingCapture, mode: AccountMode, reply: &str) {
    let trimmed = reply.trim();

    for field in pending.missing.clone() {
        match field {
            MissingField::Item => {
                if !trimmed.is_empty() {
                    pending.draft.description = Some(trimmed.to_string());
                }
            }
            MissingField::Amount => {
                if let Some(amount) = extract_first_amount(trimmed) {
                    pending.draft.amount = Some(amount);
                }
            }
            MissingField::Counterparty => {
                let name = strip_prepositions(trimmed);
                if !name.is_empty() {
                    pending.draft.counterparty = Some(name);
                }
            }
        }
    }

    if let Some(action) = pending.draft.action {
        pending.missing = missing_fields(mode, action, &pending.draft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn draft(action: Action) -> TransactionDraft {
        TransactionDraft {
            action: Some(action),
            ..Default::default()
        }
    }

    #[test]
    fn business_sale_needs_no_counterparty() {
        let mut d = draft(Action::Sale);
        d.description = Some("nasi goreng".to_string());
        d.amount = Some(dec!(25000));
        assert!(missing_fields(AccountMode::Business, Action::Sale, &d).is_empty());
    }

    #[test]
    fn business_purchase_needs_item_and_counterparty() {
        let mut d = draft(Action::Purchase);
        d.amount = Some(dec!(50000));
        assert_eq!(
            missing_fields(AccountMode::Business, Action::Purchase, &d),
            vec![MissingField::Item, MissingField::Counterparty]
        );
    }

    #[test]
    fn business_payment_skips_item() {
        let d = draft(Action::PaymentMade);
        assert_eq!(
            missing_fields(AccountMode::Business, Action::PaymentMade, &d),
            vec![MissingField::Amount, MissingField::Counterparty]
        );
    }

    #[test]
    fn personal_mode_needs_only_amount() {
        let d = draft(Action::Purchase);
        assert_eq!(
            missing_fields(AccountMode::Personal, Action::Purchase, &d),
            vec![MissingField::Amount]
        );
        let mut d = d;
        d.amount = Some(dec!(10000));
        assert!(missing_fields(AccountMode::Personal, Action::Purchase, &d).is_empty());
    }

    #[test]
    fn short_verb_reply_does_not_supersede() {
        assert!(!supersedes_pending("dari toko jaya", 4));
        assert!(!supersedes_pending("beli beras", 4));
        assert!(supersedes_pending("beli beras 50rb dari toko jaya buat stok", 4));
        assert!(!supersedes_pending("lima puluh ribu rupiah tunai kemarin sore", 4));
    }

    #[test]
    fn reply_fills_outstanding_fields() {
        let mut pending = PendingCapture {
            owner_id: "owner-1".to_string(),
            draft: TransactionDraft {
                action: Some(Action::Purchase),
                amount: Some(dec!(50000)),
                language: Language::Indonesian,
                ..Default::default()
            },
            missing: vec![MissingField::Item, MissingField::Counterparty],
            created_at: Utc::now(),
        };

        fill_from_reply(&mut pending, AccountMode::Business, "dari Toko Jaya");
        // Item takes the full reply, counterparty the preposition-stripped form
        assert_eq!(pending.draft.description.as_deref(), Some("dari Toko Jaya"));
        assert_eq!(pending.draft.counterparty.as_deref(), Some("Toko Jaya"));
        assert!(pending.missing.is_empty());
    }

    #[test]
    fn unfilled_amount_stays_missing() {
        let mut pending = PendingCapture {
            owner_id: "owner-1".to_string(),
            draft: TransactionDraft {
                action: Some(Action::Sale),
                description: Some("es teh".to_string()),
                language: Language::Indonesian,
                ..Default::default()
            },
            missing: vec![MissingField::Amount],
            created_at: Utc::now(),
        };

        fill_from_reply(&mut pending, AccountMode::Business, "nanti saya cek dulu");
        assert_eq!(pending.missing, vec![MissingField::Amount]);

        fill_from_reply(&mut pending, AccountMode::Business, "25rb");
        assert_eq!(pending.draft.amount, Some(dec!(25000)));
        assert!(pending.missing.is_empty());
    }
}
