//! Cash Conversion Cycle engine
//!
//! Computes DSO, DIO, DPO, and CCC over an owner's records inside a fixed
//! lookback window, plus a per-action count/total breakdown. Runs on
//! demand over persisted records; nothing here is cached or stored.
//!
//! Credit-payment matching preserves the original heuristic on purpose:
//! payments are matched to credit sales only by shared counterparty name,
//! ignoring amounts, dates, and partial payments. When counterparty names
//! repeat across unrelated sales this can over- or under-count
//! outstanding receivables.

use crate::config::AnalyticsConfig;
use crate::db::Database;
use crate::error::{Error, Result};
use crate::types::{
    Action, ActionBreakdown, CccBreakdown, CccMetrics, CccReport, TransactionRecord,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Payment-term words that mark a record as credit, matched
/// case-insensitively as substrings of the free-text terms.
const CREDIT_TERMS: &[&str] = &["credit", "kredit", "tempo", "hutang", "utang", "cicilan"];

fn is_credit(record: &TransactionRecord) -> bool {
    record
        .payment_terms
        .as_deref()
        .map(|terms| {
            let lower = terms.to_lowercase();
            CREDIT_TERMS.iter().any(|t| lower.contains(t))
        })
        .unwrap_or(false)
}

fn total(records: &[&TransactionRecord]) -> Decimal {
    records.iter().map(|r| r.amount).sum()
}

fn breakdown_of(records: &[&TransactionRecord]) -> ActionBreakdown {
    ActionBreakdown {
        count: records.len() as i64,
        total: total(records),
    }
}

/// On-demand CCC computation over the owner's record history.
pub struct CccEngine<'a> {
    db: &'a Database,
    config: &'a AnalyticsConfig,
}

impl<'a> CccEngine<'a> {
    pub fn new(db: &'a Database, config: &'a AnalyticsConfig) -> Self {
        Self { db, config }
    }

    /// Compute the CCC report for an owner as of the given instant.
    ///
    /// Returns [`CccReport::NoData`] when the window holds no records at
    /// all — never a zero-valued report that reads as a real measurement.
    pub fn compute(&self, owner_id: &str, as_of: DateTime<Utc>) -> Result<CccReport> {
        let window_days = self.config.window_days;
        let since = as_of - Duration::days(window_days);
        let records = self.db.transactions_for_owner_since(owner_id, since)?;

        if records.is_empty() {
            tracing::debug!(owner_id, window_days, "no records in analytics window");
            return Ok(CccReport::NoData);
        }

        let sales: Vec<&TransactionRecord> = records
            .iter()
            .filter(|r| r.action == Action::Sale)
            .collect();
        let purchases: Vec<&TransactionRecord> = records
            .iter()
            .filter(|r| r.action == Action::Purchase)
            .collect();
        let payments_received: Vec<&TransactionRecord> = records
            .iter()
            .filter(|r| r.action == Action::PaymentReceived)
            .collect();
        let payments_made: Vec<&TransactionRecord> = records
            .iter()
            .filter(|r| r.action == Action::PaymentMade)
            .collect();

        let window = Decimal::from(window_days);

        // DSO: receivables still outstanding on credit sales, with
        // payments matched to credit customers by counterparty name only
        let credit_sales: Vec<&TransactionRecord> =
            sales.iter().copied().filter(|r| is_credit(r)).collect();
        let credit_sales_total = total(&credit_sales);
        let dso = if credit_sales_total.is_zero() {
            Decimal::ZERO
        } else {
            let credit_customers: HashSet<String> = credit_sales
                .iter()
                .filter_map(|r| r.counterparty.as_deref())
                .map(|c| c.to_lowercase())
                .collect();
            let matched: Decimal = payments_received
                .iter()
                .filter(|r| {
                    r.counterparty
                        .as_deref()
                        .map(|c| credit_customers.contains(&c.to_lowercase()))
                        .unwrap_or(false)
                })
                .map(|r| r.amount)
                .sum();
            let outstanding = (credit_sales_total - matched).max(Decimal::ZERO);
            outstanding / credit_sales_total * window
        };

        // DIO: inventory left over after the estimated cost of the
        // window's sales
        let cogs_ratio = Decimal::try_from(self.config.cogs_ratio)
            .map_err(|e| Error::Config(format!("bad analytics.cogs_ratio: {e}")))?;
        let sales_total = total(&sales);
        let purchases_total = total(&purchases);
        let estimated_cogs = cogs_ratio * sales_total;
        let remaining_inventory = (purchases_total - estimated_cogs).max(Decimal::ZERO);
        let dio = if !estimated_cogs.is_zero() {
            remaining_inventory / estimated_cogs * window
        } else if !purchases_total.is_zero() {
            // Purchases but no sales yet: measure against the purchases
            remaining_inventory / purchases_total * window
        } else {
            Decimal::ZERO
        };

        // DPO: payables still outstanding on credit purchases, netted
        // against every payment made in the window
        let credit_purchases_total: Decimal = purchases
            .iter()
            .filter(|r| is_credit(r))
            .map(|r| r.amount)
            .sum();
        let dpo = if credit_purchases_total.is_zero() {
            Decimal::ZERO
        } else {
            let payments_made_total = total(&payments_made);
            let outstanding = (credit_purchases_total - payments_made_total).max(Decimal::ZERO);
            outstanding / credit_purchases_total * window
        };

        let dso = dso.round_dp(1);
        let dio = dio.round_dp(1);
        let dpo = dpo.round_dp(1);
        let ccc = (dso + dio - dpo).round_dp(1);

        Ok(CccReport::Computed(CccMetrics {
            dso,
            dio,
            dpo,
            ccc,
            breakdown: CccBreakdown {
                sales: breakdown_of(&sales),
                purchases: breakdown_of(&purchases),
                payments_received: breakdown_of(&payments_received),
                payments_made: breakdown_of(&payments_made),
            },
            window_days,
        }))
    }
}
