//! Fast-path pattern parser
//!
//! Deterministic regex extraction for the common transaction phrasings.
//! Templates are tried in a fixed priority order: per action family
//! (buy, sell, pay, receive), Indonesian before English, item-before-amount
//! before amount-before-item. Every template requires an explicit currency
//! marker adjacent to the numeral — either a prefix (`Rp`, `IDR`, `$`) or
//! an Indonesian shorthand multiplier suffix (`rb`, `ribu`, `jt`, `juta`).
//!
//! On the first match the parser extracts the item text and the numeral,
//! strips leading prepositions from the item, and emits a draft. A numeral
//! that fails to parse as a decimal falls through to the next template.
//! No network calls; this tier is pure CPU.

use crate::types::{Action, Language, ParseFailure, ParseOutcome, TransactionDraft};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Currency-marked amount: prefix-marked numeral with optional multiplier,
/// or bare numeral with a mandatory multiplier suffix.
const AMOUNT: &str = r"(?:(?:rp\.?|idr|\$)\s*(?P<num>\d[\d.,]*)(?:\s*(?P<mult>rb|ribu|jt|juta|k)\b)?|(?P<num2>\d[\d.,]*)\s*(?P<mult2>rb|ribu|jt|juta)\b)";

const ID_BUY: &str = r"beli|membeli|belanja|kulak";
const ID_SELL: &str = r"jual|menjual|terjual|laku";
const ID_PAY: &str = r"bayar|membayar|melunasi";
const ID_RECEIVE: &str = r"terima|menerima|diterima|dapat";

const EN_BUY: &str = r"bought|buy|purchased|purchase";
const EN_SELL: &str = r"sold|sell";
const EN_PAY: &str = r"paid|pay";
const EN_RECEIVE: &str = r"received|receive|collected";

/// Leading prepositions stripped from extracted item text.
const PREPOSITIONS: &[&str] = &[
    "dari", "ke", "untuk", "buat", "sama", "pada", "di", "from", "to", "for", "of", "at",
];

/// Payment-term vocabulary recognized in free text.
const TERM_WORDS: &[&str] = &[
    "kredit", "credit", "tempo", "hutang", "utang", "cicilan", "tunai", "cash",
];

struct Template {
    action: Action,
    regex: Regex,
}

fn template(action: Action, pattern: String) -> Template {
    Template {
        action,
        regex: Regex::new(&pattern).expect("static template must compile"),
    }
}

fn item_first(verbs: &str) -> String {
    format!(
        r"(?i)\b(?:{verbs})\b\s+(?P<item>.+?)(?:\s+(?:seharga|senilai|sebesar|harga|total|for|at|worth))?\s+{AMOUNT}"
    )
}

fn amount_first(verbs: &str) -> String {
    format!(
        r"(?i)\b(?:{verbs})\b\s+{AMOUNT}\s+(?:untuk\s+|buat\s+|dari\s+|ke\s+|of\s+|for\s+|from\s+|to\s+)?(?P<item>.+)"
    )
}

lazy_static! {
    /// All fast-path templates, in priority order.
    static ref TEMPLATES: Vec<Template> = {
        let families = [
            (Action::Purchase, ID_BUY, EN_BUY),
            (Action::Sale, ID_SELL, EN_SELL),
            (Action::PaymentMade, ID_PAY, EN_PAY),
            (Action::PaymentReceived, ID_RECEIVE, EN_RECEIVE),
        ];
        let mut templates = Vec::new();
        for (action, id_verbs, en_verbs) in families {
            templates.push(template(action, item_first(id_verbs)));
            templates.push(template(action, amount_first(id_verbs)));
            templates.push(template(action, item_first(en_verbs)));
            templates.push(template(action, amount_first(en_verbs)));
        }
        templates
    };

    static ref FIRST_AMOUNT: Regex = Regex::new(&format!("(?i){AMOUNT}")).unwrap();
    static ref BARE_NUMERAL: Regex =
        Regex::new(r"(?i)(?P<num>\d[\d.,]*)\s*(?P<mult>rb|ribu|jt|juta|k)?").unwrap();
}

// ============================================
// Numeral handling
// ============================================

/// Parse a numeral that may use either Indonesian (`50.000,25`) or English
/// (`50,000.25`) separator conventions: a trailing group of exactly three
/// digits is a thousands group, a trailing group of one or two digits is a
/// decimal fraction.
fn parse_numeral(raw: &str) -> Option<Decimal> {
    let sep_positions: Vec<usize> = raw
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == ',')
        .map(|(i, _)| i)
        .collect();

    let cleaned = if let Some(&last) = sep_positions.last() {
        let tail_len = raw.len() - last - 1;
        let digits_only: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if (1..=2).contains(&tail_len) {
            let head: String = raw[..last].chars().filter(|c| c.is_ascii_digit()).collect();
            format!("{}.{}", head, &raw[last + 1..])
        } else {
            digits_only
        }
    } else {
        raw.to_string()
    };

    Decimal::from_str(&cleaned).ok()
}

fn multiplier(mult: Option<&str>) -> Decimal {
    match mult.map(|m| m.to_lowercase()) {
        Some(m) if m == "rb" || m == "ribu" || m == "k" => Decimal::from(1_000),
        Some(m) if m == "jt" || m == "juta" => Decimal::from(1_000_000),
        _ => Decimal::ONE,
    }
}

fn amount_from_captures(caps: &Captures) -> Option<Decimal> {
    let (num, mult) = match caps.name("num") {
        Some(num) => (num.as_str(), caps.name("mult").map(|m| m.as_str())),
        None => (
            caps.name("num2")?.as_str(),
            caps.name("mult2").map(|m| m.as_str()),
        ),
    };
    parse_numeral(num).map(|n| n * multiplier(mult))
}

// ============================================
// Item cleanup
// ============================================

/// Strip leading prepositions and surrounding punctuation from item text.
pub fn strip_prepositions(text: &str) -> String {
    let mut rest = text.trim().trim_matches(|c: char| c == ',' || c == '.');
    loop {
        let mut stripped = false;
        for prep in PREPOSITIONS {
            if let Some(tail) = rest.strip_prefix(prep) {
                if tail.starts_with(char::is_whitespace) {
                    rest = tail.trim_start();
                    stripped = true;
                    break;
                }
            }
            // Case-insensitive: compare against the lowercased head token
            let head = rest.split_whitespace().next().unwrap_or("");
            if head.to_lowercase() == *prep && head.len() < rest.len() {
                rest = rest[head.len()..].trim_start();
                stripped = true;
                break;
            }
        }
        if !stripped {
            break;
        }
    }
    rest.trim().to_string()
}

/// First payment-term word found in the text, if any.
pub fn detect_payment_terms(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .find(|t| TERM_WORDS.contains(&t.as_str()))
}

/// Extract the first amount in the text: currency-marked if present,
/// otherwise the first bare numeral. Used by the clarification dialogue.
pub fn extract_first_amount(text: &str) -> Option<Decimal> {
    if let Some(caps) = FIRST_AMOUNT.captures(text) {
        if let Some(amount) = amount_from_captures(&caps) {
            return Some(amount);
        }
    }
    let caps = BARE_NUMERAL.captures(text)?;
    let num = caps.name("num")?.as_str();
    let mult = caps.name("mult").map(|m| m.as_str());
    parse_numeral(num).map(|n| n * multiplier(mult))
}

// ============================================
// Entry point
// ============================================

/// Attempt all fast-path templates against a transaction-class message.
pub fn parse_fast(text: &str, language: Language) -> ParseOutcome {
    for template in TEMPLATES.iter() {
        let Some(caps) = template.regex.captures(text) else {
            continue;
        };
        // An unparseable numeral falls through to the next template
        let Some(amount) = amount_from_captures(&caps) else {
            continue;
        };
        let item = caps
            .name("item")
            .map(|m| strip_prepositions(m.as_str()))
            .unwrap_or_default();
        if item.is_empty() {
            continue;
        }

        tracing::debug!(
            action = template.action.as_str(),
            %amount,
            item = %item,
            "fast-path template matched"
        );

        return ParseOutcome::Parsed(TransactionDraft {
            action: Some(template.action),
            amount: Some(amount),
            description: Some(item),
            counterparty: None,
            payment_terms: detect_payment_terms(text),
            category: None,
            language,
        });
    }

    ParseOutcome::Failed(ParseFailure::NoTemplateMatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parsed(text: &str) -> TransactionDraft {
        match parse_fast(text, Language::Indonesian) {
            ParseOutcome::Parsed(draft) => draft,
            ParseOutcome::Failed(reason) => panic!("expected parse for {:?}: {}", text, reason),
        }
    }

    #[test]
    fn indonesian_sale_item_first() {
        let draft = parsed("jual nasi goreng 25rb");
        assert_eq!(draft.action, Some(Action::Sale));
        assert_eq!(draft.amount, Some(dec!(25000)));
        assert_eq!(draft.description.as_deref(), Some("nasi goreng"));
    }

    #[test]
    fn indonesian_purchase_amount_first() {
        let draft = parsed("beli Rp 50.000 beras");
        assert_eq!(draft.action, Some(Action::Purchase));
        assert_eq!(draft.amount, Some(dec!(50000)));
        assert_eq!(draft.description.as_deref(), Some("beras"));
    }

    #[test]
    fn english_purchase_with_connective() {
        let draft = parsed("i bought rice for $20");
        assert_eq!(draft.action, Some(Action::Purchase));
        assert_eq!(draft.amount, Some(dec!(20)));
        assert_eq!(draft.description.as_deref(), Some("rice"));
    }

    #[test]
    fn payment_made_and_received() {
        let paid = parsed("bayar listrik 200rb");
        assert_eq!(paid.action, Some(Action::PaymentMade));
        assert_eq!(paid.amount, Some(dec!(200000)));

        let received = parsed("terima 500rb dari budi");
        assert_eq!(received.action, Some(Action::PaymentReceived));
        assert_eq!(received.amount, Some(dec!(500000)));
        assert_eq!(received.description.as_deref(), Some("budi"));
    }

    #[test]
    fn multiplier_shorthand() {
        assert_eq!(parsed("jual bakso 1.5jt").amount, Some(dec!(1500000)));
        assert_eq!(parsed("jual es teh Rp5rb").amount, Some(dec!(5000)));
    }

    #[test]
    fn credit_terms_are_detected() {
        let draft = parsed("jual beras 100rb kredit");
        assert_eq!(draft.payment_terms.as_deref(), Some("kredit"));
        assert_eq!(parsed("jual beras 100rb").payment_terms, None);
    }

    #[test]
    fn amount_without_currency_marker_fails() {
        // "50" has neither a currency prefix nor a multiplier suffix
        let outcome = parse_fast("beli beras 50", Language::Indonesian);
        assert_eq!(outcome, ParseOutcome::Failed(ParseFailure::NoTemplateMatch));
    }

    #[test]
    fn non_transaction_text_fails() {
        let outcome = parse_fast("cuaca hari ini cerah sekali", Language::Indonesian);
        assert!(!outcome.is_parsed());
    }

    #[test]
    fn numeral_separator_conventions() {
        assert_eq!(parse_numeral("50.000"), Some(dec!(50000)));
        assert_eq!(parse_numeral("1.250.000"), Some(dec!(1250000)));
        assert_eq!(parse_numeral("25,5"), Some(dec!(25.5)));
        assert_eq!(parse_numeral("50,000.25"), Some(dec!(50000.25)));
        assert_eq!(parse_numeral("20"), Some(dec!(20)));
    }

    #[test]
    fn strip_prepositions_removes_leading_connectives() {
        assert_eq!(strip_prepositions("dari Toko Jaya"), "Toko Jaya");
        assert_eq!(strip_prepositions("  ke warung bu sri"), "warung bu sri");
        assert_eq!(strip_prepositions("from the supplier"), "the supplier");
        assert_eq!(strip_prepositions("beras premium"), "beras premium");
    }

    #[test]
    fn extract_first_amount_accepts_bare_numbers() {
        assert_eq!(extract_first_amount("50000"), Some(dec!(50000)));
        assert_eq!(extract_first_amount("Rp 25.000 cash"), Some(dec!(25000)));
        assert_eq!(extract_first_amount("sekitar 30rb"), Some(dec!(30000)));
        assert_eq!(extract_first_amount("tidak tahu"), None);
    }
}
