//! Transaction storage operations

use chrono::NaiveDate;
use rusqlite::params;

use super::Database;
use crate::models::{Transaction, TransactionKind};

use crate::error::Result;

/// Result of inserting a batch of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionInsertResult {
    pub inserted: usize,
    /// Rows whose id already existed
    pub duplicates: usize,
}

impl Database {
    /// Insert transactions, skipping ids that already exist.
    ///
    /// Feed loading is idempotent: re-loading the same file inserts nothing
    /// and reports everything as duplicate.
    pub fn insert_transactions(
        &self,
        transactions: &[Transaction],
    ) -> Result<TransactionInsertResult> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut result = TransactionInsertResult::default();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO transactions (id, date, description, merchant, amount, kind, category)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for t in transactions {
                let changed = stmt.execute(params![
                    t.id,
                    t.date.to_string(),
                    t.description,
                    t.merchant,
                    t.amount,
                    t.kind.as_str(),
                    t.category,
                ])?;
                if changed > 0 {
                    result.inserted += 1;
                } else {
                    result.duplicates += 1;
                }
            }
        }
        tx.commit()?;

        Ok(result)
    }

    /// List all transactions ordered by (date, id) for deterministic
    /// downstream processing
    pub fn list_transactions(&self) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT id, date, description, merchant, amount, kind, category
            FROM transactions
            ORDER BY date, id
            "#,
        )?;

        let transactions = stmt
            .query_map([], |row| {
                let date_str: String = row.get(1)?;
                let kind_str: String = row.get(5)?;

                Ok(Transaction {
                    id: row.get(0)?,
                    date: NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                        .unwrap_or_default(),
                    description: row.get(2)?,
                    merchant: row.get(3)?,
                    amount: row.get(4)?,
                    kind: kind_str
                        .parse::<TransactionKind>()
                        .unwrap_or(TransactionKind::Expense),
                    category: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }

    /// Count stored transactions
    pub fn count_transactions(&self) -> Result<i64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Whether a transaction id exists in storage
    pub fn transaction_exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM transactions WHERE id = ?",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
