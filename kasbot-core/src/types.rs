//! Core domain types for kasbot
//!
//! These types form the canonical data model shared by the capture pipeline
//! and the analytics engine.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Owner** | The opaque identity a messaging channel attaches to a chat user |
//! | **Record** | A persisted financial event ([`TransactionRecord`]), immutable once written |
//! | **Draft** | A partially-filled record produced by a parser ([`TransactionDraft`]) |
//! | **Pending capture** | The one in-flight draft per owner awaiting clarification |
//! | **Mode** | Owner-level setting (business vs. personal) controlling required fields |
//! | **Streak** | Consecutive calendar days on which an owner logged something |
//!
//! Both parser tiers — the regex fast path and the LLM fallback — normalize
//! into [`TransactionDraft`], so everything downstream of parsing is
//! parser-agnostic.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================
// Language
// ============================================

/// Supported message languages.
///
/// Detection ties resolve to Indonesian, the primary audience of the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Indonesian,
    English,
}

impl Language {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Indonesian => "id",
            Language::English => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" | "indonesian" => Ok(Language::Indonesian),
            "en" | "english" => Ok(Language::English),
            _ => Err(format!("unknown language: {}", s)),
        }
    }
}

// ============================================
// Message classes
// ============================================

/// What kind of message the classifier decided an inbound text is.
///
/// Classes are checked in declaration order; a message that matches
/// `Greeting` is never reclassified even if it also contains
/// transaction-like tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageClass {
    /// Salutation, thanks, acknowledgment
    Greeting,
    /// Request for usage guidance
    Help,
    /// Explicit slash-style command
    Command,
    /// Gibberish, emoji floods, symbol noise
    Ambiguous,
    /// More than one transaction in a single message
    MultiTransaction,
    /// A single capturable transaction (the default)
    Transaction,
    /// Question about existing data
    Query,
}

impl MessageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageClass::Greeting => "greeting",
            MessageClass::Help => "help",
            MessageClass::Command => "command",
            MessageClass::Ambiguous => "ambiguous",
            MessageClass::MultiTransaction => "multi_transaction",
            MessageClass::Transaction => "transaction",
            MessageClass::Query => "query",
        }
    }
}

impl std::str::FromStr for MessageClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greeting" => Ok(MessageClass::Greeting),
            "help" => Ok(MessageClass::Help),
            "command" => Ok(MessageClass::Command),
            "ambiguous" => Ok(MessageClass::Ambiguous),
            "multi_transaction" => Ok(MessageClass::MultiTransaction),
            "transaction" => Ok(MessageClass::Transaction),
            "query" => Ok(MessageClass::Query),
            _ => Err(format!("unknown message class: {}", s)),
        }
    }
}

/// Classifier output: detected language plus message class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub language: Language,
    pub class: MessageClass,
}

// ============================================
// Actions
// ============================================

/// The four financial event kinds kasbot records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Sale,
    Purchase,
    PaymentReceived,
    PaymentMade,
}

impl Action {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Sale => "sale",
            Action::Purchase => "purchase",
            Action::PaymentReceived => "payment_received",
            Action::PaymentMade => "payment_made",
        }
    }

    /// Purchase-like actions are the only ones that carry a category.
    pub fn is_purchase_like(&self) -> bool {
        matches!(self, Action::Purchase | Action::PaymentMade)
    }

    /// Payment actions never require an item description.
    pub fn is_payment(&self) -> bool {
        matches!(self, Action::PaymentReceived | Action::PaymentMade)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" | "sell" => Ok(Action::Sale),
            "purchase" | "buy" => Ok(Action::Purchase),
            "payment_received" => Ok(Action::PaymentReceived),
            "payment_made" => Ok(Action::PaymentMade),
            _ => Err(format!("unknown action: {}", s)),
        }
    }
}

// ============================================
// Categories
// ============================================

/// Fixed purchase category enumeration.
///
/// Mutually exclusive; populated only for purchase-like actions. When the
/// parser did not supply one, the persister derives it best-effort and
/// falls back to the configured default (normally [`Category::Other`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    OperatingExpense,
    CapitalExpense,
    CostOfGoods,
    Inventory,
    Marketing,
    Utilities,
    Other,
}

impl Category {
    /// Returns the identifier used in database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::OperatingExpense => "operating_expense",
            Category::CapitalExpense => "capital_expense",
            Category::CostOfGoods => "cost_of_goods",
            Category::Inventory => "inventory",
            Category::Marketing => "marketing",
            Category::Utilities => "utilities",
            Category::Other => "other",
        }
    }

    /// All categories, in the order shown to the LLM categorizer.
    pub fn all() -> &'static [Category] {
        &[
            Category::OperatingExpense,
            Category::CapitalExpense,
            Category::CostOfGoods,
            Category::Inventory,
            Category::Marketing,
            Category::Utilities,
            Category::Other,
        ]
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accepts both the storage form and the loose spellings LLM
        // responses tend to produce.
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "operating_expense" | "opex" => Ok(Category::OperatingExpense),
            "capital_expense" | "capex" => Ok(Category::CapitalExpense),
            "cost_of_goods" | "cogs" => Ok(Category::CostOfGoods),
            "inventory" | "stock" => Ok(Category::Inventory),
            "marketing" => Ok(Category::Marketing),
            "utilities" | "utility" => Ok(Category::Utilities),
            "other" => Ok(Category::Other),
            _ => Err(format!("unknown category: {}", s)),
        }
    }
}

// ============================================
// Account mode
// ============================================

/// Owner-level setting that alters which draft fields are mandatory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    /// Item + amount + counterparty bookkeeping
    #[default]
    Business,
    /// Category-based tracking; only the amount is mandatory
    Personal,
}

impl AccountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountMode::Business => "business",
            AccountMode::Personal => "personal",
        }
    }
}

impl std::str::FromStr for AccountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(AccountMode::Business),
            "personal" => Ok(AccountMode::Personal),
            _ => Err(format!("unknown account mode: {}", s)),
        }
    }
}

/// A chat user's stored account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    /// Opaque owner identity from the messaging channel
    pub owner_id: String,
    /// Business or personal bookkeeping
    pub mode: AccountMode,
    /// When this account was first seen
    pub created_at: DateTime<Utc>,
}

// ============================================
// Transaction records and drafts
// ============================================

/// A persisted financial event. Immutable once created; the only later
/// write is the best-effort category derivation for purchase-like records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// Owner identity
    pub owner_id: String,
    /// What kind of event this is
    pub action: Action,
    /// Non-negative amount
    pub amount: Decimal,
    /// Item / free-text description
    pub description: String,
    /// Customer or vendor name, if known
    pub counterparty: Option<String>,
    /// Free-text payment terms, matched against the credit vocabulary
    pub payment_terms: Option<String>,
    /// Purchase category (purchase-like actions only)
    pub category: Option<Category>,
    /// Derived COGS estimate (sales only)
    pub cogs_estimate: Option<Decimal>,
    /// Language the source message was written in
    pub language: Language,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// The draft shape both parser tiers normalize into.
///
/// Same fields as [`TransactionRecord`] minus required-ness; the
/// completeness validator decides what is still missing for the owner's
/// account mode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub action: Option<Action>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub counterparty: Option<String>,
    pub payment_terms: Option<String>,
    pub category: Option<Category>,
    pub language: Language,
}

// ============================================
// Parse outcome
// ============================================

/// Why a parser tier (or the whole chain) could not produce a draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// No fast-path template matched with a valid numeral
    NoTemplateMatch,
    /// The fallback service call failed or timed out
    Service(String),
    /// The fallback service answered, but not with usable structured data
    MalformedResponse(String),
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseFailure::NoTemplateMatch => write!(f, "no template matched"),
            ParseFailure::Service(msg) => write!(f, "parse service failed: {}", msg),
            ParseFailure::MalformedResponse(msg) => write!(f, "malformed parse response: {}", msg),
        }
    }
}

/// Tagged result of a parse attempt.
///
/// Replaces the dynamically-typed "dict with an error key" shape of
/// ad-hoc parsers: every downstream branch matches exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(TransactionDraft),
    Failed(ParseFailure),
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }
}

// ============================================
// Pending capture (clarification state)
// ============================================

/// Required draft fields the clarification dialogue can ask about,
/// in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingField {
    Item,
    Amount,
    Counterparty,
}

impl MissingField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissingField::Item => "item",
            MissingField::Amount => "amount",
            MissingField::Counterparty => "counterparty",
        }
    }
}

impl std::str::FromStr for MissingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(MissingField::Item),
            "amount" => Ok(MissingField::Amount),
            "counterparty" => Ok(MissingField::Counterparty),
            _ => Err(format!("unknown missing field: {}", s)),
        }
    }
}

/// The one in-flight draft an owner may have while the dialogue collects
/// missing fields.
///
/// Invariant: at most one per owner; a new unrelated transaction message
/// supersedes (never merges with) a stale one. The store enforces this by
/// keying the table on `owner_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingCapture {
    pub owner_id: String,
    pub draft: TransactionDraft,
    pub missing: Vec<MissingField>,
    pub created_at: DateTime<Utc>,
}

// ============================================
// Streaks
// ============================================

/// Per-owner logging streak.
///
/// Invariant: the count only ever resets to 1 or increments by exactly 1
/// per calendar day; it is never incremented twice on the same day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreakState {
    pub owner_id: String,
    /// Consecutive days with at least one record
    pub count: i64,
    /// Local calendar date of the most recent record
    pub last_logged: NaiveDate,
}

/// What a streak update did, consumed by response formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOutcome {
    /// First record ever for this owner
    Started,
    /// Exactly one day after the previous record
    Continued,
    /// Another record on an already-counted day
    Unchanged,
    /// Gap of more than one day; streak restarted at 1
    Reset,
}

impl StreakOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreakOutcome::Started => "started",
            StreakOutcome::Continued => "continued",
            StreakOutcome::Unchanged => "unchanged",
            StreakOutcome::Reset => "reset",
        }
    }

    /// Whether the stored streak count changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, StreakOutcome::Unchanged)
    }
}

// ============================================
// CCC analytics results
// ============================================

/// Count and amount total for one action within the analytics window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionBreakdown {
    pub count: i64,
    pub total: Decimal,
}

/// Per-action breakdown accompanying a computed CCC snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CccBreakdown {
    pub sales: ActionBreakdown,
    pub purchases: ActionBreakdown,
    pub payments_received: ActionBreakdown,
    pub payments_made: ActionBreakdown,
}

/// Computed working-capital metrics, all rounded to one decimal place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CccMetrics {
    /// Days Sales Outstanding
    pub dso: Decimal,
    /// Days Inventory Outstanding
    pub dio: Decimal,
    /// Days Payable Outstanding
    pub dpo: Decimal,
    /// DSO + DIO - DPO; negative means favorable cash timing
    pub ccc: Decimal,
    pub breakdown: CccBreakdown,
    /// Window the metrics were computed over, in days
    pub window_days: i64,
}

/// Ephemeral analytics result; not persisted.
///
/// `NoData` is a real sentinel, never zeros-with-meaning: an owner with no
/// records in the window gets `NoData`, not a CCC of 0.0.
#[derive(Debug, Clone, PartialEq)]
pub enum CccReport {
    NoData,
    Computed(CccMetrics),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn action_roundtrip_and_predicates() {
        for action in [
            Action::Sale,
            Action::Purchase,
            Action::PaymentReceived,
            Action::PaymentMade,
        ] {
            assert_eq!(Action::from_str(action.as_str()).unwrap(), action);
        }
        assert!(Action::Purchase.is_purchase_like());
        assert!(Action::PaymentMade.is_purchase_like());
        assert!(!Action::Sale.is_purchase_like());
        assert!(Action::PaymentMade.is_payment());
        assert!(!Action::Purchase.is_payment());
    }

    #[test]
    fn category_parses_loose_spellings() {
        assert_eq!(
            Category::from_str("Operating Expense").unwrap(),
            Category::OperatingExpense
        );
        assert_eq!(Category::from_str("COGS").unwrap(), Category::CostOfGoods);
        assert_eq!(Category::from_str("other").unwrap(), Category::Other);
        assert!(Category::from_str("snacks").is_err());
    }

    #[test]
    fn language_defaults_to_indonesian() {
        assert_eq!(Language::default(), Language::Indonesian);
        assert_eq!(Language::from_str("en").unwrap(), Language::English);
    }

    #[test]
    fn streak_outcome_change_flag() {
        assert!(StreakOutcome::Started.is_change());
        assert!(StreakOutcome::Reset.is_change());
        assert!(!StreakOutcome::Unchanged.is_change());
    }
}
