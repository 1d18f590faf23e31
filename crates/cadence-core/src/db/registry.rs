//! Merchant registry storage operations

use rusqlite::params;
use tracing::debug;

use super::Database;
use crate::error::{Error, Result};
use crate::models::{BulkImportResult, MerchantRegistryEntry, NewRegistryEntry, PatternKind};
use crate::normalize::normalize;
use crate::registry::MerchantRegistry;

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<MerchantRegistryEntry> {
    let kind_str: String = row.get(4)?;
    let patterns_json: String = row.get(5)?;

    Ok(MerchantRegistryEntry {
        id: row.get(0)?,
        merchant_name: row.get(1)?,
        normalized_name: row.get(2)?,
        category: row.get(3)?,
        kind: kind_str
            .parse::<PatternKind>()
            .unwrap_or(PatternKind::Subscription),
        patterns: serde_json::from_str(&patterns_json).unwrap_or_default(),
        confidence: row.get(6)?,
        logo_url: row.get(7)?,
    })
}

const ENTRY_COLUMNS: &str =
    "id, merchant_name, normalized_name, category, kind, patterns, confidence, logo_url";

impl Database {
    /// Add a registry entry. Fails if the normalized name already exists.
    pub fn add_registry_entry(&self, entry: &NewRegistryEntry) -> Result<i64> {
        let conn = self.conn()?;
        let normalized = normalize(&entry.merchant_name);
        if normalized.is_empty() {
            return Err(Error::InvalidData(format!(
                "merchant name '{}' normalizes to nothing",
                entry.merchant_name
            )));
        }

        let patterns_json = serde_json::to_string(&entry.patterns)?;
        let changed = conn.execute(
            r#"
            INSERT OR IGNORE INTO merchant_registry (merchant_name, normalized_name, category, kind, patterns, confidence, logo_url)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                entry.merchant_name,
                normalized,
                entry.category,
                entry.kind.as_str(),
                patterns_json,
                entry.confidence,
                entry.logo_url,
            ],
        )?;

        if changed == 0 {
            return Err(Error::InvalidData(format!(
                "registry already contains '{}'",
                normalized
            )));
        }
        Ok(conn.last_insert_rowid())
    }

    /// Bulk-add registry entries, skipping duplicates.
    ///
    /// Duplicate means the normalized name already exists, either in the
    /// database or earlier in the same batch. The whole batch commits in
    /// one transaction.
    pub fn bulk_add_registry_entries(
        &self,
        entries: &[NewRegistryEntry],
    ) -> Result<BulkImportResult> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut result = BulkImportResult::default();
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO merchant_registry (merchant_name, normalized_name, category, kind, patterns, confidence, logo_url)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;

            for entry in entries {
                let normalized = normalize(&entry.merchant_name);
                if normalized.is_empty() {
                    debug!(name = %entry.merchant_name, "Skipping unnormalizable registry entry");
                    result.skipped += 1;
                    continue;
                }
                let patterns_json = serde_json::to_string(&entry.patterns)?;
                let changed = stmt.execute(params![
                    entry.merchant_name,
                    normalized,
                    entry.category,
                    entry.kind.as_str(),
                    patterns_json,
                    entry.confidence,
                    entry.logo_url,
                ])?;
                if changed > 0 {
                    result.added += 1;
                } else {
                    result.skipped += 1;
                }
            }
        }
        tx.commit()?;

        Ok(result)
    }

    /// List all registry entries ordered by normalized name
    pub fn list_registry_entries(&self) -> Result<Vec<MerchantRegistryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM merchant_registry ORDER BY normalized_name",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Fetch a registry entry by merchant name (normalized on lookup)
    pub fn get_registry_entry(&self, name: &str) -> Result<Option<MerchantRegistryEntry>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!(
                "SELECT {} FROM merchant_registry WHERE normalized_name = ?",
                ENTRY_COLUMNS
            ),
            params![normalize(name)],
            row_to_entry,
        );

        match result {
            Ok(entry) => Ok(Some(entry)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a registry entry by merchant name. Returns whether a row
    /// was deleted.
    pub fn remove_registry_entry(&self, name: &str) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM merchant_registry WHERE normalized_name = ?",
            params![normalize(name)],
        )?;
        Ok(changed > 0)
    }

    /// Load the full registry as a compiled snapshot for a detection run
    pub fn load_registry(&self) -> Result<MerchantRegistry> {
        Ok(MerchantRegistry::new(self.list_registry_entries()?))
    }
}
