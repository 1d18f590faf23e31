//! Recurring-pattern storage operations

use chrono::NaiveDate;
use rusqlite::params;
use tracing::info;

use super::Database;
use crate::error::Result;
use crate::models::{Frequency, PatternKind, RecurringPattern};

fn row_to_pattern(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecurringPattern> {
    let kind_str: String = row.get(4)?;
    let freq_str: Option<String> = row.get(5)?;
    let last_date_str: String = row.get(11)?;
    let next_due_str: Option<String> = row.get(12)?;
    let linked_json: String = row.get(14)?;

    Ok(RecurringPattern {
        id: row.get(0)?,
        merchant_name: row.get(1)?,
        normalized_key: row.get(2)?,
        category: row.get(3)?,
        kind: kind_str
            .parse::<PatternKind>()
            .unwrap_or(PatternKind::Excluded),
        frequency: freq_str.and_then(|s| s.parse::<Frequency>().ok()),
        avg_amount: row.get(6)?,
        amount_variance: row.get(7)?,
        occurrences: row.get::<_, i64>(8)? as usize,
        confidence: row.get(9)?,
        mixed_pattern: row.get(10)?,
        last_transaction_date: NaiveDate::parse_from_str(&last_date_str, "%Y-%m-%d")
            .unwrap_or_default(),
        next_due_date: next_due_str.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        exclude_from_bills: row.get(13)?,
        linked_transaction_ids: serde_json::from_str(&linked_json).unwrap_or_default(),
        auto_detected: row.get(15)?,
    })
}

const PATTERN_COLUMNS: &str = "id, merchant_name, normalized_key, category, kind, frequency, \
     avg_amount, amount_variance, occurrences, confidence, mixed_pattern, \
     last_transaction_date, next_due_date, exclude_from_bills, linked_transaction_ids, \
     auto_detected";

impl Database {
    /// Replace all auto-detected patterns with the given set.
    ///
    /// Delete and insert happen in one SQL transaction so a reader never
    /// observes a half-replaced table. Manually created patterns are left
    /// untouched.
    pub fn replace_detected_patterns(&self, patterns: &[RecurringPattern]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM recurring_patterns WHERE auto_detected = 1", [])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO recurring_patterns (
                    merchant_name, normalized_key, category, kind, frequency,
                    avg_amount, amount_variance, occurrences, confidence, mixed_pattern,
                    last_transaction_date, next_due_date, exclude_from_bills,
                    linked_transaction_ids, auto_detected
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
                "#,
            )?;

            for p in patterns {
                let linked_json = serde_json::to_string(&p.linked_transaction_ids)?;
                stmt.execute(params![
                    p.merchant_name,
                    p.normalized_key,
                    p.category,
                    p.kind.as_str(),
                    p.frequency.map(|f| f.as_str()),
                    p.avg_amount,
                    p.amount_variance,
                    p.occurrences as i64,
                    p.confidence,
                    p.mixed_pattern,
                    p.last_transaction_date.to_string(),
                    p.next_due_date.map(|d| d.to_string()),
                    p.exclude_from_bills,
                    linked_json,
                ])?;
            }
        }
        tx.commit()?;

        info!(count = patterns.len(), "Replaced detected patterns");
        Ok(())
    }

    /// List all patterns ordered by normalized key
    pub fn list_patterns(&self) -> Result<Vec<RecurringPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM recurring_patterns ORDER BY normalized_key, id",
            PATTERN_COLUMNS
        ))?;

        let patterns = stmt
            .query_map([], row_to_pattern)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(patterns)
    }

    /// Fetch a pattern by its normalized merchant key
    pub fn get_pattern_by_key(&self, key: &str) -> Result<Option<RecurringPattern>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM recurring_patterns WHERE normalized_key = ? ORDER BY id LIMIT 1",
                PATTERN_COLUMNS
            ),
            params![key],
            row_to_pattern,
        );

        match result {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
