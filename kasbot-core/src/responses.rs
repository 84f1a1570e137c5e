//! User-facing reply formatting, in both supported languages.
//!
//! The pipeline produces every outbound text through this module so the
//! wording stays in one place. Replies follow the detected language of the
//! inbound message; amounts are always rupiah-formatted.

use crate::types::{
    Action, CccReport, Language, MissingField, PendingCapture, StreakOutcome, TransactionRecord,
};
use rust_decimal::Decimal;

/// Format an amount with thousands grouping: `Rp25.000` in Indonesian,
/// `Rp25,000` in English.
pub fn format_amount(amount: Decimal, language: Language) -> String {
    let (group_sep, decimal_sep) = match language {
        Language::Indonesian => ('.', ','),
        Language::English => (',', '.'),
    };

    let canonical = amount.normalize().to_string();
    let (int_part, frac_part) = match canonical.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (canonical.as_str(), None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (idx, c) in digits.iter().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(group_sep);
        }
        grouped.push(*c);
    }

    match frac_part {
        Some(f) => format!("Rp{}{}{}", grouped, decimal_sep, f),
        None => format!("Rp{}", grouped),
    }
}

pub fn greeting(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Halo! Catat transaksi kamu di sini, misalnya: \"jual nasi goreng 25rb\".".to_string()
        }
        Language::English => {
            "Hi! Log your transactions here, for example: \"sold fried rice for $5\".".to_string()
        }
    }
}

pub fn help(language: Language) -> String {
    match language {
        Language::Indonesian => "Cara pakai:\n\
             - Catat penjualan: \"jual nasi goreng 25rb\"\n\
             - Catat pembelian: \"beli beras 50rb dari Toko Jaya\"\n\
             - Catat pembayaran: \"bayar listrik 200rb\"\n\
             - Lihat laporan kas: ketik \"/laporan\""
            .to_string(),
        Language::English => "How to use:\n\
             - Log a sale: \"sold fried rice for $5\"\n\
             - Log a purchase: \"bought rice for $20 from Jaya Store\"\n\
             - Log a payment: \"paid $15 for electricity\"\n\
             - Cash report: type \"/report\""
            .to_string(),
    }
}

pub fn ambiguous(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Maaf, saya kurang paham. Coba tulis ulang, misalnya: \"jual nasi goreng 25rb\"."
                .to_string()
        }
        Language::English => {
            "Sorry, I did not understand that. Try rephrasing, for example: \"sold fried rice for $5\"."
                .to_string()
        }
    }
}

pub fn multi_transaction(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Sepertinya ada lebih dari satu transaksi. Tolong kirim satu per satu ya.".to_string()
        }
        Language::English => {
            "That looks like more than one transaction. Please split them into separate messages."
                .to_string()
        }
    }
}

pub fn parse_error(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Maaf, saya tidak bisa membaca transaksinya. Coba tulis seperti: \"jual nasi goreng 25rb\"."
                .to_string()
        }
        Language::English => {
            "Sorry, I could not read that as a transaction. Try something like: \"sold fried rice for $5\"."
                .to_string()
        }
    }
}

pub fn store_error(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Gagal menyimpan catatan. Kirim pesan apa saja untuk mencoba lagi.".to_string()
        }
        Language::English => {
            "Saving the record failed. Send any message to retry.".to_string()
        }
    }
}

pub fn media_error(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Maaf, saya tidak bisa membaca struk itu. Coba foto ulang atau ketik transaksinya."
                .to_string()
        }
        Language::English => {
            "Sorry, I could not read that receipt. Try another photo or type the transaction."
                .to_string()
        }
    }
}

pub fn unknown_command(language: Language) -> String {
    match language {
        Language::Indonesian => {
            "Perintah tidak dikenal. Ketik \"/laporan\" untuk laporan kas atau \"bantuan\" untuk panduan."
                .to_string()
        }
        Language::English => {
            "Unknown command. Type \"/report\" for the cash report or \"help\" for guidance."
                .to_string()
        }
    }
}

/// One clarification question, phrased for the action being captured.
pub fn clarification_question(
    language: Language,
    action: Action,
    field: MissingField,
) -> String {
    match (language, field) {
        (Language::Indonesian, MissingField::Item) => match action {
            Action::Sale => "Jual apa?".to_string(),
            Action::Purchase => "Beli apa?".to_string(),
            _ => "Untuk apa?".to_string(),
        },
        (Language::Indonesian, MissingField::Amount) => "Berapa jumlahnya?".to_string(),
        (Language::Indonesian, MissingField::Counterparty) => match action {
            Action::Sale => "Siapa pembelinya?".to_string(),
            Action::Purchase => "Beli dari siapa?".to_string(),
            Action::PaymentMade => "Bayar ke siapa?".to_string(),
            Action::PaymentReceived => "Terima pembayaran dari siapa?".to_string(),
        },
        (Language::English, MissingField::Item) => match action {
            Action::Sale => "What did you sell?".to_string(),
            Action::Purchase => "What did you buy?".to_string(),
            _ => "What was it for?".to_string(),
        },
        (Language::English, MissingField::Amount) => "How much was it?".to_string(),
        (Language::English, MissingField::Counterparty) => match action {
            Action::Sale => "Who was the customer?".to_string(),
            Action::Purchase => "Who did you buy from?".to_string(),
            Action::PaymentMade => "Who did you pay?".to_string(),
            Action::PaymentReceived => "Who paid you?".to_string(),
        },
    }
}

/// One question per missing field, in prompt order.
pub fn clarification_prompt(pending: &PendingCapture) -> String {
    let action = pending.draft.action.unwrap_or(Action::Sale);
    pending
        .missing
        .iter()
        .map(|field| clarification_question(pending.draft.language, action, *field))
        .collect::<Vec<_>>()
        .join("\n")
}

fn action_label(language: Language, action: Action) -> &'static str {
    match (language, action) {
        (Language::Indonesian, Action::Sale) => "penjualan",
        (Language::Indonesian, Action::Purchase) => "pembelian",
        (Language::Indonesian, Action::PaymentMade) => "pembayaran",
        (Language::Indonesian, Action::PaymentReceived) => "penerimaan pembayaran",
        (Language::English, Action::Sale) => "sale",
        (Language::English, Action::Purchase) => "purchase",
        (Language::English, Action::PaymentMade) => "payment",
        (Language::English, Action::PaymentReceived) => "payment received",
    }
}

/// Saved-record confirmation with an optional streak flourish.
pub fn saved(
    record: &TransactionRecord,
    streak: Option<(i64, StreakOutcome)>,
) -> String {
    let language = record.language;
    let label = action_label(language, record.action);
    let amount = format_amount(record.amount, language);

    let mut lines = Vec::new();
    let description = record.description.trim();
    let headline = match language {
        Language::Indonesian if description.is_empty() => {
            format!("Tercatat: {} {}", label, amount)
        }
        Language::Indonesian => format!("Tercatat: {} {} — {}", label, description, amount),
        Language::English if description.is_empty() => {
            format!("Recorded: {} {}", label, amount)
        }
        Language::English => format!("Recorded: {} of {} — {}", label, description, amount),
    };
    lines.push(headline);

    if let Some((count, outcome)) = streak {
        match (language, outcome) {
            (Language::Indonesian, StreakOutcome::Started) => {
                lines.push("Hari pertama mencatat. Lanjutkan besok ya!".to_string())
            }
            (Language::Indonesian, StreakOutcome::Continued) => {
                lines.push(format!("{} hari beruntun mencatat!", count))
            }
            (Language::Indonesian, StreakOutcome::Reset) => {
                lines.push("Mulai lagi dari hari pertama. Semangat!".to_string())
            }
            (Language::English, StreakOutcome::Started) => {
                lines.push("First day of logging. Keep it up tomorrow!".to_string())
            }
            (Language::English, StreakOutcome::Continued) => {
                lines.push(format!("{} days logging in a row!", count))
            }
            (Language::English, StreakOutcome::Reset) => {
                lines.push("Streak restarted at day one. Keep going!".to_string())
            }
            (_, StreakOutcome::Unchanged) => {}
        }
    }

    lines.join("\n")
}

/// Human-readable cash conversion cycle summary.
pub fn ccc_summary(language: Language, report: &CccReport) -> String {
    match report {
        CccReport::NoData => match language {
            Language::Indonesian => {
                "Belum ada transaksi yang tercatat dalam periode laporan.".to_string()
            }
            Language::English => {
                "No transactions recorded in the reporting period yet.".to_string()
            }
        },
        CccReport::Computed(metrics) => {
            let b = &metrics.breakdown;
            match language {
                Language::Indonesian => format!(
                    "Laporan kas {} hari terakhir:\n\
                     - Piutang tertahan (DSO): {} hari\n\
                     - Stok tertahan (DIO): {} hari\n\
                     - Hutang tertahan (DPO): {} hari\n\
                     - Siklus kas (CCC): {} hari\n\
                     Penjualan: {}x ({}), Pembelian: {}x ({}),\n\
                     Pembayaran masuk: {}x ({}), Pembayaran keluar: {}x ({})",
                    metrics.window_days,
                    metrics.dso,
                    metrics.dio,
                    metrics.dpo,
                    metrics.ccc,
                    b.sales.count,
                    format_amount(b.sales.total, language),
                    b.purchases.count,
                    format_amount(b.purchases.total, language),
                    b.payments_received.count,
                    format_amount(b.payments_received.total, language),
                    b.payments_made.count,
                    format_amount(b.payments_made.total, language),
                ),
                Language::English => format!(
                    "Cash report, last {} days:\n\
                     - Days sales outstanding (DSO): {}\n\
                     - Days inventory outstanding (DIO): {}\n\
                     - Days payable outstanding (DPO): {}\n\
                     - Cash conversion cycle (CCC): {}\n\
                     Sales: {}x ({}), Purchases: {}x ({}),\n\
                     Payments in: {}x ({}), Payments out: {}x ({})",
                    metrics.window_days,
                    metrics.dso,
                    metrics.dio,
                    metrics.dpo,
                    metrics.ccc,
                    b.sales.count,
                    format_amount(b.sales.total, language),
                    b.purchases.count,
                    format_amount(b.purchases.total, language),
                    b.payments_received.count,
                    format_amount(b.payments_received.total, language),
                    b.payments_made.count,
                    format_amount(b.payments_made.total, language),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amount_grouping_follows_language() {
        assert_eq!(
            format_amount(dec!(25000), Language::Indonesian),
            "Rp25.000"
        );
        assert_eq!(format_amount(dec!(25000), Language::English), "Rp25,000");
        assert_eq!(
            format_amount(dec!(1250000), Language::Indonesian),
            "Rp1.250.000"
        );
        assert_eq!(format_amount(dec!(500), Language::Indonesian), "Rp500");
        assert_eq!(
            format_amount(dec!(1500.5), Language::Indonesian),
            "Rp1.500,5"
        );
    }

    #[test]
    fn counterparty_question_is_phrased_per_action() {
        let buy = clarification_question(
            Language::English,
            Action::Purchase,
            MissingField::Counterparty,
        );
        let pay = clarification_question(
            Language::English,
            Action::PaymentMade,
            MissingField::Counterparty,
        );
        assert_eq!(buy, "Who did you buy from?");
        assert_eq!(pay, "Who did you pay?");
        assert_ne!(buy, pay);
    }
}
