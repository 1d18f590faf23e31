//! Merchant registry snapshot and bulk-import parsing
//!
//! The registry is admin-curated reference data. Detection treats it as a
//! read-only snapshot taken at the start of a run: the matcher consults it to
//! short-circuit grouping for known merchants, and the verifier uses its
//! confidence hint as a floor. An empty registry is fine; detection degrades
//! to pure heuristics.

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MerchantRegistryEntry, NewRegistryEntry, PatternKind};
use crate::normalize::normalize;

/// One registry entry with its match patterns compiled.
///
/// A pattern that compiles as a regex is used as one (case-insensitive);
/// anything else falls back to a substring test on the normalized text.
struct CompiledEntry {
    entry: MerchantRegistryEntry,
    regexes: Vec<Option<Regex>>,
}

/// Immutable registry snapshot used by one detection run
pub struct MerchantRegistry {
    entries: Vec<CompiledEntry>,
}

impl MerchantRegistry {
    pub fn new(mut entries: Vec<MerchantRegistryEntry>) -> Self {
        // Stable lookup order regardless of how the rows came out of storage
        entries.sort_by(|a, b| a.normalized_name.cmp(&b.normalized_name));

        let entries = entries
            .into_iter()
            .map(|entry| {
                let regexes = entry
                    .patterns
                    .iter()
                    .map(|p| Regex::new(&format!("(?i){}", p)).ok())
                    .collect();
                CompiledEntry { entry, regexes }
            })
            .collect();

        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Find the registry entry matching a piece of merchant text.
    ///
    /// Tries normalized-name equality first, then each entry's patterns in
    /// normalized-name order. Returns the first hit, which keeps lookups
    /// deterministic across runs.
    pub fn lookup(&self, text: &str) -> Option<&MerchantRegistryEntry> {
        let key = normalize(text);
        if key.is_empty() {
            return None;
        }

        for compiled in &self.entries {
            if compiled.entry.normalized_name == key {
                return Some(&compiled.entry);
            }
        }

        for compiled in &self.entries {
            for (pattern, regex) in compiled.entry.patterns.iter().zip(&compiled.regexes) {
                let hit = match regex {
                    Some(re) => re.is_match(&key),
                    None => key.contains(&pattern.to_lowercase()),
                };
                if hit {
                    debug!(
                        merchant = %compiled.entry.merchant_name,
                        pattern = %pattern,
                        "Registry pattern hit"
                    );
                    return Some(&compiled.entry);
                }
            }
        }

        None
    }
}

/// Parse pipe-delimited bulk-import lines into registry entries.
///
/// Line format: `name|category|type|frequency|status|confidence`.
/// Name is required; the rest may be empty. Frequency and status are
/// validated for shape but not stored (the registry model carries neither).
/// A malformed line is an error: bulk import is an admin operation and a
/// bad file should be fixed, not half-applied.
pub fn parse_bulk_import<R: std::io::Read>(reader: R) -> Result<Vec<NewRegistryEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entries = Vec::new();

    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let line = i + 1;

        let name = record
            .get(0)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::Import(format!("line {}: missing merchant name", line)))?;

        let category = record
            .get(1)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let kind = match record.get(2).filter(|s| !s.is_empty()) {
            Some(s) => s
                .parse::<PatternKind>()
                .map_err(|e| Error::Import(format!("line {}: {}", line, e)))?,
            None => PatternKind::Subscription,
        };

        // Frequency and status fields are part of the wire format but not
        // the registry model; validate shape only.
        if let Some(freq) = record.get(3).filter(|s| !s.is_empty()) {
            freq.parse::<crate::models::Frequency>()
                .map_err(|e| Error::Import(format!("line {}: {}", line, e)))?;
        }

        let confidence = match record.get(5).filter(|s| !s.is_empty()) {
            Some(s) => Some(s.parse::<f64>().map_err(|_| {
                Error::Import(format!("line {}: invalid confidence '{}'", line, s))
            })?),
            None => None,
        };

        entries.push(NewRegistryEntry {
            merchant_name: name.to_string(),
            category,
            kind,
            // The name itself is the default match pattern
            patterns: vec![name.to_string()],
            confidence,
            logo_url: None,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, patterns: &[&str], kind: PatternKind) -> MerchantRegistryEntry {
        MerchantRegistryEntry {
            id: 0,
            merchant_name: name.to_string(),
            normalized_name: normalize(name),
            category: Some("Entertainment".to_string()),
            kind,
            patterns: patterns.iter().map(|s| s.to_string()).collect(),
            confidence: Some(0.95),
            logo_url: None,
        }
    }

    #[test]
    fn test_lookup_by_normalized_name() {
        let registry = MerchantRegistry::new(vec![entry(
            "Netflix",
            &["netflix"],
            PatternKind::Subscription,
        )]);
        let hit = registry.lookup("NETFLIX").unwrap();
        assert_eq!(hit.merchant_name, "Netflix");
    }

    #[test]
    fn test_lookup_by_substring_pattern() {
        let registry = MerchantRegistry::new(vec![entry(
            "Netflix",
            &["netflix"],
            PatternKind::Subscription,
        )]);
        assert!(registry.lookup("NETFLIX.COM *123").is_some());
    }

    #[test]
    fn test_lookup_by_regex_pattern() {
        let registry = MerchantRegistry::new(vec![entry(
            "Pacific Gas & Electric",
            &[r"pg&?e"],
            PatternKind::Utility,
        )]);
        assert!(registry.lookup("PG&E BILL PAYMENT").is_some());
        assert!(registry.lookup("PGE ENERGY").is_some());
    }

    #[test]
    fn test_lookup_miss_and_empty_registry() {
        let registry = MerchantRegistry::empty();
        assert!(registry.lookup("NETFLIX.COM").is_none());

        let registry =
            MerchantRegistry::new(vec![entry("Netflix", &["netflix"], PatternKind::Subscription)]);
        assert!(registry.lookup("CORNER BAKERY").is_none());
    }

    #[test]
    fn test_empty_text_never_matches() {
        let registry =
            MerchantRegistry::new(vec![entry("Netflix", &[".*"], PatternKind::Subscription)]);
        assert!(registry.lookup("****1234").is_none());
    }

    #[test]
    fn test_parse_bulk_import() {
        let input = "Netflix|Entertainment|subscription|monthly|active|0.95\n\
                     PG&E|Utilities|utility|monthly|active|0.9\n";
        let entries = parse_bulk_import(input.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].merchant_name, "Netflix");
        assert_eq!(entries[0].kind, PatternKind::Subscription);
        assert_eq!(entries[0].confidence, Some(0.95));
        assert_eq!(entries[1].kind, PatternKind::Utility);
    }

    #[test]
    fn test_parse_bulk_import_sparse_fields() {
        let entries = parse_bulk_import("Spotify\n".as_bytes()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, PatternKind::Subscription);
        assert!(entries[0].confidence.is_none());
    }

    #[test]
    fn test_parse_bulk_import_rejects_missing_name() {
        let result = parse_bulk_import("|Entertainment|subscription\n".as_bytes());
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_bulk_import_rejects_bad_confidence() {
        let result = parse_bulk_import("Netflix|||||not-a-number\n".as_bytes());
        assert!(result.is_err());
    }
}
