//! Language and intent classification
//!
//! Pure lexical scoring over inbound message text. The classifier decides
//! two things before any parser runs: which language the message is in
//! (Indonesian or English, ties going to Indonesian) and which
//! [`MessageClass`] it belongs to.
//!
//! Classes are evaluated in a fixed precedence order — greeting, help,
//! command, ambiguous, multi-transaction, then the transaction/query
//! split. A message that matches an earlier class is never reclassified
//! downstream, even when it also contains transaction-like tokens.
//!
//! Everything here is a deterministic function of the input text: no
//! state, no I/O, no network.

use crate::types::{Classification, Language, MessageClass};
use lazy_static::lazy_static;
use regex::Regex;

// ============================================
// Lexicons
// ============================================

const ID_BUY_VERBS: &[&str] = &["beli", "membeli", "belanja", "kulak", "dibeli"];
const ID_SELL_VERBS: &[&str] = &["jual", "menjual", "terjual", "laku", "dijual"];
const ID_PAY_VERBS: &[&str] = &["bayar", "membayar", "bayarkan", "melunasi", "lunas"];
const ID_RECEIVE_VERBS: &[&str] = &["terima", "menerima", "diterima", "dapat"];

const EN_BUY_VERBS: &[&str] = &["buy", "bought", "purchase", "purchased", "restock", "restocked"];
const EN_SELL_VERBS: &[&str] = &["sell", "sold", "sale"];
const EN_PAY_VERBS: &[&str] = &["pay", "paid", "payment"];
const EN_RECEIVE_VERBS: &[&str] = &["receive", "received", "collected"];

/// Non-verb Indonesian words scored during language detection: pronouns,
/// connectives, and bookkeeping vocabulary.
const ID_LEXICON: &[&str] = &[
    "saya", "aku", "kamu", "dan", "dari", "untuk", "dengan", "yang", "ke", "di", "hutang", "utang",
    "kredit", "tunai", "uang", "barang", "toko", "warung", "pelanggan", "kemarin", "hari", "ini",
    "tadi", "belum", "sudah", "halo", "hai", "selamat", "makasih", "berapa",
];

const EN_LEXICON: &[&str] = &[
    "i", "you", "the", "and", "from", "for", "with", "to", "of", "cash", "credit", "money",
    "goods", "store", "customer", "yesterday", "today", "just", "some", "hello", "hey", "thanks",
    "good", "how", "much",
];

/// Fixed greeting phrase list, both languages. Matched exact or as a
/// leading phrase.
const GREETINGS: &[&str] = &[
    "halo",
    "hai",
    "hi",
    "hello",
    "hey",
    "selamat pagi",
    "selamat siang",
    "selamat sore",
    "selamat malam",
    "assalamualaikum",
    "pagi",
    "siang",
    "sore",
    "malam",
    "makasih",
    "terima kasih",
    "thanks",
    "thank you",
    "ok",
    "oke",
    "okay",
    "sip",
    "mantap",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Help is a substring match, so these stay specific enough not to fire on
/// ordinary transaction messages.
const HELP_PHRASES: &[&str] = &[
    "help",
    "tolong",
    "bantuan",
    "cara pakai",
    "cara pakainya",
    "gimana cara",
    "bagaimana cara",
    "how do i",
    "how to use",
    "apa itu",
    "menu",
];

/// Whole-message command words (slash-prefixed messages are always commands).
const COMMAND_WORDS: &[&str] = &["laporan", "report", "export", "saldo", "balance"];

const ID_QUESTION_WORDS: &[&str] = &[
    "berapa",
    "apa",
    "apakah",
    "kapan",
    "siapa",
    "dimana",
    "mengapa",
    "kenapa",
    "gimana",
    "bagaimana",
];

const EN_QUESTION_WORDS: &[&str] = &[
    "how", "what", "when", "who", "where", "why", "which", "do", "does", "did", "is", "are", "can",
];

/// Keyboard-adjacent runs used by the gibberish heuristic.
const KEYBOARD_RUNS: &[&str] = &[
    "qwer", "wert", "erty", "rtyu", "asdf", "sdfg", "dfgh", "fghj", "zxcv", "xcvb", "cvbn", "hjkl",
];

lazy_static! {
    /// Weighted patterns counted on top of plain lexicon hits. Currency
    /// idioms and first-person transaction constructions are strong
    /// signals, so they score higher than single word matches.
    static ref ID_WEIGHTED: Vec<(Regex, usize)> = vec![
        (Regex::new(r"(?i)\brp\.?\s*\d").unwrap(), 3),
        (Regex::new(r"(?i)\b\d[\d.,]*\s*(rb|ribu|jt|juta)\b").unwrap(), 3),
        (Regex::new(r"(?i)\b(saya|aku)\s+(beli|jual|bayar|terima)").unwrap(), 3),
    ];
    static ref EN_WEIGHTED: Vec<(Regex, usize)> = vec![
        (Regex::new(r"\$\s*\d").unwrap(), 3),
        (Regex::new(r"(?i)\bi\s+(just\s+)?(bought|sold|paid|received|buy|sell|pay|got)\b").unwrap(), 3),
    ];

    /// A currency-marked amount token in either language.
    static ref CURRENCY_AMOUNT: Regex = Regex::new(
        r"(?i)(?:rp\.?|idr|\$)\s*\d[\d.,]*\s*(?:rb|ribu|jt|juta|k)?|\b\d[\d.,]*\s*(?:rb|ribu|jt|juta)\b"
    )
    .unwrap();

    static ref CONJUNCTION: Regex =
        Regex::new(r"(?i)\b(dan|lalu|terus|kemudian|and|then)\b").unwrap();
}

// ============================================
// Tokenization helpers
// ============================================

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn hits(toks: &[String], lexicon: &[&str]) -> usize {
    toks.iter().filter(|t| lexicon.contains(&t.as_str())).count()
}

fn all_verb_lists() -> [&'static [&'static str]; 8] {
    [
        ID_BUY_VERBS,
        ID_SELL_VERBS,
        ID_PAY_VERBS,
        ID_RECEIVE_VERBS,
        EN_BUY_VERBS,
        EN_SELL_VERBS,
        EN_PAY_VERBS,
        EN_RECEIVE_VERBS,
    ]
}

/// Count tokens that are transaction verbs in either language.
pub fn transaction_verb_hits(text: &str) -> usize {
    let toks = tokens(text);
    all_verb_lists().iter().map(|list| hits(&toks, list)).sum()
}

/// Whether the text contains at least one transaction verb.
pub fn contains_transaction_verb(text: &str) -> bool {
    transaction_verb_hits(text) > 0
}

/// Count currency-marked amount tokens.
pub fn currency_amount_count(text: &str) -> usize {
    CURRENCY_AMOUNT.find_iter(text).count()
}

// ============================================
// Language detection
// ============================================

/// Score each language by lexicon hits plus weighted pattern matches;
/// the higher score wins, ties default to Indonesian.
pub fn detect_language(text: &str) -> Language {
    let toks = tokens(text);

    let mut id_score = hits(&toks, ID_LEXICON)
        + hits(&toks, ID_BUY_VERBS)
        + hits(&toks, ID_SELL_VERBS)
        + hits(&toks, ID_PAY_VERBS)
        + hits(&toks, ID_RECEIVE_VERBS);
    let mut en_score = hits(&toks, EN_LEXICON)
        + hits(&toks, EN_BUY_VERBS)
        + hits(&toks, EN_SELL_VERBS)
        + hits(&toks, EN_PAY_VERBS)
        + hits(&toks, EN_RECEIVE_VERBS);

    for (re, weight) in ID_WEIGHTED.iter() {
        id_score += re.find_iter(text).count() * weight;
    }
    for (re, weight) in EN_WEIGHTED.iter() {
        en_score += re.find_iter(text).count() * weight;
    }

    if en_score > id_score {
        Language::English
    } else {
        Language::Indonesian
    }
}

// ============================================
// Class checks, in precedence order
// ============================================

fn starts_with_phrase(lower: &str, phrase: &str) -> bool {
    match lower.strip_prefix(phrase) {
        Some(rest) => rest.is_empty() || !rest.starts_with(|c: char| c.is_alphanumeric()),
        None => false,
    }
}

fn is_greeting(lower: &str) -> bool {
    GREETINGS.iter().any(|g| starts_with_phrase(lower, g))
}

fn is_help(lower: &str) -> bool {
    if HELP_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    // Short real-word questions; pure punctuation falls through to the
    // ambiguity checks
    let toks = tokens(lower);
    !toks.is_empty() && toks.len() <= 5 && lower.contains('?')
}

fn is_command(lower: &str) -> bool {
    lower.starts_with('/') || COMMAND_WORDS.contains(&lower)
}

fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F
    )
}

fn is_symbol(c: char) -> bool {
    !c.is_alphanumeric() && !c.is_whitespace() && !is_pictographic(c)
}

fn is_gibberish_word(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();

    // Short run of at most two distinct characters, e.g. "aaaa", "hahahahaha"
    if chars.len() > 3 {
        let mut distinct: Vec<char> = chars.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() <= 2 {
            return true;
        }
    }

    if KEYBOARD_RUNS.iter().any(|run| word.contains(run)) {
        return true;
    }

    // Vowel-starved long words read as keyboard noise
    if chars.len() > 4 {
        let vowels = chars
            .iter()
            .filter(|c| matches!(**c, 'a' | 'e' | 'i' | 'o' | 'u'))
            .count();
        let consonants = chars.iter().filter(|c| c.is_alphabetic()).count() - vowels;
        if consonants > 0 && (vowels as f64 / consonants as f64) < 0.2 {
            return true;
        }
    }

    false
}

fn is_ambiguous(text: &str) -> bool {
    let total = text.chars().count();
    if total == 0 {
        return true;
    }

    let symbols = text.chars().filter(|c| is_symbol(*c)).count();
    if symbols as f64 / total as f64 > 0.4 {
        return true;
    }

    let picto = text.chars().filter(|c| is_pictographic(*c)).count();
    if picto as f64 / total as f64 > 0.5 {
        return true;
    }

    if total <= 3 && !text.chars().any(|c| c.is_alphabetic()) {
        return true;
    }

    let words: Vec<String> = tokens(text).into_iter().filter(|w| w.len() > 2).collect();
    if !words.is_empty() {
        let gibberish = words.iter().filter(|w| is_gibberish_word(w)).count();
        if gibberish as f64 / words.len() as f64 > 0.6 {
            return true;
        }
    }

    false
}

/// Which of the three verb classes appear in the text. Receive verbs are
/// folded into the pay class.
fn verb_classes(lower: &str) -> (bool, bool, bool) {
    let toks = tokens(lower);
    let buy = hits(&toks, ID_BUY_VERBS) + hits(&toks, EN_BUY_VERBS) > 0;
    let sell = hits(&toks, ID_SELL_VERBS) + hits(&toks, EN_SELL_VERBS) > 0;
    let pay = hits(&toks, ID_PAY_VERBS)
        + hits(&toks, EN_PAY_VERBS)
        + hits(&toks, ID_RECEIVE_VERBS)
        + hits(&toks, EN_RECEIVE_VERBS)
        > 0;
    (buy, sell, pay)
}

fn is_multi_transaction(lower: &str) -> bool {
    let (buy, sell, pay) = verb_classes(lower);
    let distinct = [buy, sell, pay].iter().filter(|b| **b).count();
    if distinct >= 2 {
        return true;
    }

    // A conjunction with a transaction verb on both sides joins two
    // transactions in one message
    for m in CONJUNCTION.find_iter(lower) {
        let before = &lower[..m.start()];
        let after = &lower[m.end()..];
        if contains_transaction_verb(before) && contains_transaction_verb(after) {
            return true;
        }
    }

    currency_amount_count(lower) > 1 && transaction_verb_hits(lower) > 1
}

fn is_query(lower: &str) -> bool {
    let toks = tokens(lower);
    let Some(first) = toks.first() else {
        return false;
    };
    let opens_with_question = ID_QUESTION_WORDS.contains(&first.as_str())
        || EN_QUESTION_WORDS.contains(&first.as_str());
    opens_with_question && transaction_verb_hits(lower) < 2
}

// ============================================
// Entry point
// ============================================

/// Classify a raw inbound message.
///
/// Deterministic and side-effect free: the same text always yields the
/// same `(language, class)` pair.
pub fn classify(text: &str) -> Classification {
    let language = detect_language(text);
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();

    let class = if is_greeting(&lower) {
        MessageClass::Greeting
    } else if is_help(&lower) {
        MessageClass::Help
    } else if is_command(&lower) {
        MessageClass::Command
    } else if is_ambiguous(trimmed) {
        MessageClass::Ambiguous
    } else if is_multi_transaction(&lower) {
        MessageClass::MultiTransaction
    } else if is_query(&lower) {
        MessageClass::Query
    } else {
        MessageClass::Transaction
    };

    Classification { language, class }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_is_idempotent() {
        let samples = [
            "jual nasi goreng 25rb",
            "halo",
            "????",
            "asdf asdf asdf",
            "berapa omzet saya?",
        ];
        for text in samples {
            let first = classify(text);
            for _ in 0..3 {
                assert_eq!(classify(text), first, "unstable for {:?}", text);
            }
        }
    }

    #[test]
    fn greeting_wins_over_transaction_tokens() {
        let c = classify("makasih sudah beli di toko saya");
        assert_eq!(c.class, MessageClass::Greeting);
    }

    #[test]
    fn detects_indonesian_and_english() {
        assert_eq!(
            detect_language("saya beli beras Rp 50.000"),
            Language::Indonesian
        );
        assert_eq!(
            detect_language("i sold some rice for $20 today"),
            Language::English
        );
        // Tie (no signal either way) defaults to Indonesian
        assert_eq!(detect_language("12345"), Language::Indonesian);
    }

    #[test]
    fn short_question_is_help() {
        assert_eq!(classify("pakai ini gimana?").class, MessageClass::Help);
        assert_eq!(classify("how to use this").class, MessageClass::Help);
    }

    #[test]
    fn slash_and_word_commands() {
        assert_eq!(classify("/laporan").class, MessageClass::Command);
        assert_eq!(classify("laporan").class, MessageClass::Command);
        assert_eq!(classify("saldo").class, MessageClass::Command);
    }

    #[test]
    fn symbol_noise_is_ambiguous() {
        assert_eq!(classify("!!!###???@@@").class, MessageClass::Ambiguous);
        assert_eq!(classify("..").class, MessageClass::Ambiguous);
        assert_eq!(
            classify("\u{1F600}\u{1F600}\u{1F600}").class,
            MessageClass::Ambiguous
        );
    }

    #[test]
    fn gibberish_words_are_ambiguous() {
        assert_eq!(classify("asdf qwer zxcv").class, MessageClass::Ambiguous);
        assert_eq!(classify("aaaa bbbb cccc").class, MessageClass::Ambiguous);
    }

    #[test]
    fn normal_transaction_is_not_ambiguous() {
        assert_eq!(
            classify("beli beras 50rb dari toko jaya").class,
            MessageClass::Transaction
        );
    }

    #[test]
    fn two_verb_classes_flag_multi_transaction() {
        let c = classify("jual nasi 20rb terus beli minyak 30rb");
        assert_eq!(c.class, MessageClass::MultiTransaction);
    }

    #[test]
    fn conjunction_between_verbs_flags_multi_transaction() {
        let c = classify("bayar hutang dan bayar listrik");
        assert_eq!(c.class, MessageClass::MultiTransaction);
    }

    #[test]
    fn single_transaction_with_conjunction_in_item_is_not_multi() {
        // One verb, conjunction only joins item words
        let c = classify("beli gula dan kopi 40rb");
        assert_eq!(c.class, MessageClass::Transaction);
    }

    #[test]
    fn two_amounts_two_verbs_flag_multi_transaction() {
        let c = classify("sold rice for $20 then paid supplier $15 more");
        assert_eq!(c.class, MessageClass::MultiTransaction);
    }

    #[test]
    fn question_opening_is_query() {
        assert_eq!(
            classify("berapa total penjualan bulan ini ya kira kira").class,
            MessageClass::Query
        );
    }

    #[test]
    fn question_word_with_two_verbs_stays_transaction() {
        // Heavy transaction vocabulary overrides the question opening
        let c = classify("did i pay the supplier after i bought the stock last week");
        assert_ne!(c.class, MessageClass::Query);
    }
}
