//! Database repository layer
//!
//! Owner-keyed find/insert/upsert operations for all entity types. This is
//! the document store the pipeline persists into; connection lifecycle is
//! limited to opening the embedded SQLite file.

use crate::error::{Error, Result};
use crate::types::{
    AccountMode, Action, Category, Language, MissingField, PendingCapture, StreakState,
    TransactionRecord, UserAccount,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Mutex;

/// Database handle (single connection guarded by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

fn parse_decimal_column(raw: &str, column: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("bad decimal in {column}: {e}").into(),
        )
    })
}

fn parse_datetime_column(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrency between the pipeline and
        // on-demand analytics reads
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Account operations
    // ============================================

    /// Insert or update an owner's account mode
    pub fn upsert_account_mode(&self, owner_id: &str, mode: AccountMode) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO accounts (owner_id, mode, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO UPDATE SET mode = excluded.mode
            "#,
            params![owner_id, mode.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Get an owner's account, if one exists
    pub fn get_account(&self, owner_id: &str) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT owner_id, mode, created_at FROM accounts WHERE owner_id = ?",
            [owner_id],
            |row| {
                let mode_str: String = row.get("mode")?;
                let created_at_str: String = row.get("created_at")?;
                Ok(UserAccount {
                    owner_id: row.get("owner_id")?,
                    mode: AccountMode::from_str(&mode_str).unwrap_or_default(),
                    created_at: parse_datetime_column(&created_at_str),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Owner's account mode, defaulting to business when no account exists
    pub fn account_mode_or_default(&self, owner_id: &str) -> Result<AccountMode> {
        Ok(self
            .get_account(owner_id)?
            .map(|a| a.mode)
            .unwrap_or_default())
    }

    // ============================================
    // Transaction operations
    // ============================================

    /// Insert a completed transaction record
    pub fn insert_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO transactions
                (id, owner_id, action, amount, description, counterparty,
                 payment_terms, category, cogs_estimate, language, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.id,
                record.owner_id,
                record.action.as_str(),
                record.amount.to_string(),
                record.description,
                record.counterparty,
                record.payment_terms,
                record.category.map(|c| c.as_str()),
                record.cogs_estimate.map(|c| c.to_string()),
                record.language.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Set the derived category on an existing record.
    ///
    /// This is the only post-insert write a record ever receives.
    pub fn set_transaction_category(&self, id: &str, category: Category) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE transactions SET category = ?1 WHERE id = ?2",
            params![category.as_str(), id],
        )?;
        Ok(())
    }

    /// All records for an owner created at or after `since`, oldest first
    pub fn transactions_for_owner_since(
        &self,
        owner_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM transactions
            WHERE owner_id = ?1 AND created_at >= ?2
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map(params![owner_id, since.to_rfc3339()], Self::row_to_transaction)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Get a record by ID
    pub fn get_transaction(&self, id: &str) -> Result<Option<TransactionRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM transactions WHERE id = ?",
            [id],
            Self::row_to_transaction,
        )
        .optional()
        .map_err(Error::from)
    }

    fn row_to_transaction(row: &Row) -> rusqlite::Result<TransactionRecord> {
        let action_str: String = row.get("action")?;
        let amount_str: String = row.get("amount")?;
        let category_str: Option<String> = row.get("category")?;
        let cogs_str: Option<String> = row.get("cogs_estimate")?;
        let language_str: String = row.get("language")?;
        let created_at_str: String = row.get("created_at")?;

        Ok(TransactionRecord {
            id: row.get("id")?,
            owner_id: row.get("owner_id")?,
            action: Action::from_str(&action_str).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    e.into(),
                )
            })?,
            amount: parse_decimal_column(&amount_str, "amount")?,
            description: row.get("description")?,
            counterparty: row.get("counterparty")?,
            payment_terms: row.get("payment_terms")?,
            category: category_str.and_then(|c| Category::from_str(&c).ok()),
            cogs_estimate: cogs_str
                .map(|c| parse_decimal_column(&c, "cogs_estimate"))
                .transpose()?,
            language: Language::from_str(&language_str).unwrap_or_default(),
            created_at: parse_datetime_column(&created_at_str),
        })
    }

    // ============================================
    // Pending capture operations
    // ============================================

    /// Insert or overwrite the owner's pending capture
    pub fn upsert_pending_capture(&self, pending: &PendingCapture) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO pending_captures (owner_id, draft, missing, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner_id) DO UPDATE SET
                draft = excluded.draft,
                missing = excluded.missing,
                created_at = excluded.created_at
            "#,
            params![
                pending.owner_id,
                serde_json::to_string(&pending.draft)?,
                serde_json::to_string(&pending.missing)?,
                pending.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get the owner's pending capture, if any
    pub fn get_pending_capture(&self, owner_id: &str) -> Result<Option<PendingCapture>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT owner_id, draft, missing, created_at FROM pending_captures WHERE owner_id = ?",
                [owner_id],
                |row| {
                    let draft: String = row.get("draft")?;
                    let missing: String = row.get("missing")?;
                    let created_at: String = row.get("created_at")?;
                    let owner: String = row.get("owner_id")?;
                    Ok((owner, draft, missing, created_at))
                },
            )
            .optional()?;

        let Some((owner, draft, missing, created_at)) = row else {
            return Ok(None);
        };

        let draft = serde_json::from_str(&draft)?;
        let missing: Vec<MissingField> = serde_json::from_str(&missing)?;
        Ok(Some(PendingCapture {
            owner_id: owner,
            draft,
            missing,
            created_at: parse_datetime_column(&created_at),
        }))
    }

    /// Remove the owner's pending capture
    pub fn delete_pending_capture(&self, owner_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM pending_captures WHERE owner_id = ?",
            [owner_id],
        )?;
        Ok(())
    }

    // ============================================
    // Streak operations
    // ============================================

    /// Get the owner's streak state, if any
    pub fn get_streak(&self, owner_id: &str) -> Result<Option<StreakState>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT owner_id, count, last_logged FROM streaks WHERE owner_id = ?",
            [owner_id],
            |row| {
                let last_logged: String = row.get("last_logged")?;
                Ok(StreakState {
                    owner_id: row.get("owner_id")?,
                    count: row.get("count")?,
                    last_logged: NaiveDate::parse_from_str(&last_logged, "%Y-%m-%d")
                        .unwrap_or_else(|_| Utc::now().date_naive()),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    /// Insert or update the owner's streak state
    pub fn upsert_streak(&self, state: &StreakState) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO streaks (owner_id, count, last_logged)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO UPDATE SET
                count = excluded.count,
                last_logged = excluded.last_logged
            "#,
            params![
                state.owner_id,
                state.count,
                state.last_logged.format("%Y-%m-%d").to_string(),
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Activity log
    // ============================================

    /// Append a handled-message entry (best-effort observability)
    pub fn append_activity(
        &self,
        owner_id: &str,
        class: &str,
        action: Option<Action>,
        outcome: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO activity_log (owner_id, class, action, outcome, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                owner_id,
                class,
                action.map(|a| a.as_str()),
                outcome,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TransactionDraft;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn test_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn sale_record(owner: &str, amount: Decimal) -> TransactionRecord {
        TransactionRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            action: Action::Sale,
            amount,
            description: "nasi goreng".to_string(),
            counterparty: None,
            payment_terms: None,
            category: None,
            cogs_estimate: Some(amount * dec!(0.6)),
            language: Language::Indonesian,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn transaction_insert_and_query_roundtrip() {
        let db = test_db();
        let record = sale_record("owner-1", dec!(25000));
        db.insert_transaction(&record).unwrap();

        let since = Utc::now() - chrono::Duration::days(1);
        let found = db.transactions_for_owner_since("owner-1", since).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, dec!(25000));
        assert_eq!(found[0].cogs_estimate, Some(dec!(15000)));
        assert_eq!(found[0].action, Action::Sale);

        // Other owners see nothing
        assert!(db
            .transactions_for_owner_since("owner-2", since)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn category_update_is_the_only_mutation() {
        let db = test_db();
        let mut record = sale_record("owner-1", dec!(8000));
        record.action = Action::Purchase;
        record.cogs_estimate = None;
        db.insert_transaction(&record).unwrap();

        db.set_transaction_category(&record.id, Category::Inventory)
            .unwrap();
        let found = db.get_transaction(&record.id).unwrap().unwrap();
        assert_eq!(found.category, Some(Category::Inventory));
        assert_eq!(found.amount, dec!(8000));
    }

    #[test]
    fn pending_capture_upsert_replaces() {
        let db = test_db();
        let mut pending = PendingCapture {
            owner_id: "owner-1".to_string(),
            draft: TransactionDraft {
                action: Some(Action::Purchase),
                ..Default::default()
            },
            missing: vec![MissingField::Item, MissingField::Amount],
            created_at: Utc::now(),
        };
        db.upsert_pending_capture(&pending).unwrap();

        pending.draft.description = Some("beras".to_string());
        pending.missing = vec![MissingField::Amount];
        db.upsert_pending_capture(&pending).unwrap();

        let found = db.get_pending_capture("owner-1").unwrap().unwrap();
        assert_eq!(found.draft.description.as_deref(), Some("beras"));
        assert_eq!(found.missing, vec![MissingField::Amount]);

        db.delete_pending_capture("owner-1").unwrap();
        assert!(db.get_pending_capture("owner-1").unwrap().is_none());
    }

    #[test]
    fn account_mode_defaults_to_business() {
        let db = test_db();
        assert_eq!(
            db.account_mode_or_default("owner-1").unwrap(),
            AccountMode::Business
        );
        db.upsert_account_mode("owner-1", AccountMode::Personal)
            .unwrap();
        assert_eq!(
            db.account_mode_or_default("owner-1").unwrap(),
            AccountMode::Personal
        );
    }

    #[test]
    fn on_disk_database_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.db");

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let record = sale_record("owner-1", dec!(25000));
        db.insert_transaction(&record).unwrap();
        drop(db);

        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let found = db.get_transaction(&record.id).unwrap().unwrap();
        assert_eq!(found.amount, dec!(25000));
    }

    #[test]
    fn streak_roundtrip() {
        let db = test_db();
        assert!(db.get_streak("owner-1").unwrap().is_none());

        let state = StreakState {
            owner_id: "owner-1".to_string(),
            count: 3,
            last_logged: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        };
        db.upsert_streak(&state).unwrap();

        let found = db.get_streak("owner-1").unwrap().unwrap();
        assert_eq!(found.count, 3);
        assert_eq!(
            found.last_logged,
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
        );
    }
}
