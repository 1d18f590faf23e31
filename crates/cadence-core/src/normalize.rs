//! Merchant text normalization
//!
//! Turns a raw transaction description into the canonical key used for
//! merchant grouping. Bank narratives embed per-transaction noise (dates,
//! masked card fragments, store numbers) that would otherwise split one
//! merchant across many keys.

use regex::Regex;
use std::sync::OnceLock;

/// ISO dates (2024-01-15) and US-style date fragments (01/15, 01/15/2024)
fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b")
            .expect("static regex")
    })
}

/// Masked card fragments (*123, ****1234) and long digit runs (reference
/// numbers, store ids)
fn card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*+\w*|\b\d{4,}\b").expect("static regex"))
}

/// Normalize a raw description/merchant string into a grouping key.
///
/// Lowercases, strips date-like substrings, masked card fragments, and long
/// digit runs, then collapses whitespace. Pure and total: malformed input
/// never fails, it just falls through with only the lowercase/whitespace
/// treatment applied. A string that is nothing but noise normalizes to the
/// empty key, which the matcher refuses to group on.
pub fn normalize(raw: &str) -> String {
    let lower = raw.to_lowercase();
    let stripped = date_re().replace_all(&lower, " ");
    let stripped = card_re().replace_all(&stripped, " ");
    let stripped = stripped.replace(['#', '*'], " ");

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
