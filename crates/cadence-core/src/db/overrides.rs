//! Override storage operations

use rusqlite::params;

use super::{parse_datetime, Database};
use crate::error::Result;
use crate::models::{Override, OverrideKind};

impl Database {
    /// Record an override. Idempotent: re-adding an identical override
    /// changes nothing.
    pub fn add_override(
        &self,
        kind: OverrideKind,
        merchant_key: &str,
        transaction_id: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO overrides (kind, merchant_key, transaction_id)
            VALUES (?, ?, ?)
            "#,
            params![kind.as_str(), merchant_key, transaction_id],
        )?;
        Ok(())
    }

    /// Remove overrides of one kind for a merchant. Returns the number of
    /// rows deleted.
    pub fn remove_override(&self, kind: OverrideKind, merchant_key: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM overrides WHERE kind = ? AND merchant_key = ?",
            params![kind.as_str(), merchant_key],
        )?;
        Ok(changed)
    }

    /// List all overrides, oldest first
    pub fn list_overrides(&self) -> Result<Vec<Override>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, kind, merchant_key, transaction_id, created_at
            FROM overrides
            ORDER BY id
            "#,
        )?;

        let overrides = stmt
            .query_map([], |row| {
                let kind_str: String = row.get(1)?;
                let created_at_str: String = row.get(4)?;

                Ok(Override {
                    id: row.get(0)?,
                    kind: kind_str
                        .parse::<OverrideKind>()
                        .unwrap_or(OverrideKind::ExcludeFromBills),
                    merchant_key: row.get(2)?,
                    transaction_id: row.get(3)?,
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(overrides)
    }
}
