//! CSV transaction-feed parser
//!
//! Expected header: `id,date,description,merchant,amount,type,category`.
//! Only `date`, `description`, and `amount` are required per row; a missing
//! id is filled with a content hash so re-loading the same file never
//! creates duplicate rows. A malformed row is skipped with a reason rather
//! than failing the whole file.

use chrono::NaiveDate;
use csv::ReaderBuilder;
use sha2::{Digest, Sha256};
use std::io::Read;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{SkippedTransaction, Transaction, TransactionKind};

/// Result of parsing one feed file
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub transactions: Vec<Transaction>,
    pub skipped: Vec<SkippedTransaction>,
}

const EXPECTED_COLUMNS: [&str; 7] = [
    "id",
    "date",
    "description",
    "merchant",
    "amount",
    "type",
    "category",
];

/// Parse a transaction feed.
///
/// Header order is fixed; an unrecognized header line is an error since it
/// almost always means the wrong file was supplied. Row-level problems are
/// collected in `skipped`.
pub fn parse_feed<R: Read>(reader: R) -> Result<ParsedFeed> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for (i, expected) in EXPECTED_COLUMNS.iter().enumerate() {
        let got = headers.get(i).unwrap_or("");
        if !got.eq_ignore_ascii_case(expected) {
            return Err(Error::Import(format!(
                "unexpected feed header: column {} is '{}', expected '{}'",
                i + 1,
                got,
                expected
            )));
        }
    }

    let mut feed = ParsedFeed::default();

    for (i, result) in rdr.records().enumerate() {
        // Line 1 is the header
        let line = i + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                feed.skipped.push(SkippedTransaction {
                    id: format!("line {}", line),
                    reason: format!("unreadable record: {}", e),
                });
                continue;
            }
        };

        let date = match record.get(1).filter(|s| !s.is_empty()) {
            Some(s) => match parse_date(s) {
                Ok(d) => d,
                Err(e) => {
                    feed.skipped.push(SkippedTransaction {
                        id: row_label(&record, line),
                        reason: e.to_string(),
                    });
                    continue;
                }
            },
            None => {
                feed.skipped.push(SkippedTransaction {
                    id: row_label(&record, line),
                    reason: "missing date".to_string(),
                });
                continue;
            }
        };

        let description = record.get(2).unwrap_or("").to_string();
        let merchant = record
            .get(3)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        if description.is_empty() && merchant.is_none() {
            feed.skipped.push(SkippedTransaction {
                id: row_label(&record, line),
                reason: "missing description and merchant".to_string(),
            });
            continue;
        }

        let raw_amount = match record.get(4).filter(|s| !s.is_empty()) {
            Some(s) => match parse_amount(s) {
                Ok(a) => a,
                Err(e) => {
                    feed.skipped.push(SkippedTransaction {
                        id: row_label(&record, line),
                        reason: e.to_string(),
                    });
                    continue;
                }
            },
            None => {
                feed.skipped.push(SkippedTransaction {
                    id: row_label(&record, line),
                    reason: "missing amount".to_string(),
                });
                continue;
            }
        };

        // Explicit type column wins; otherwise the sign decides. Stored
        // amounts are unsigned magnitudes.
        let kind = match record.get(5).filter(|s| !s.is_empty()) {
            Some(s) => match s.parse::<TransactionKind>() {
                Ok(k) => k,
                Err(e) => {
                    feed.skipped.push(SkippedTransaction {
                        id: row_label(&record, line),
                        reason: e.to_string(),
                    });
                    continue;
                }
            },
            None if raw_amount < 0.0 => TransactionKind::Expense,
            None => TransactionKind::Income,
        };

        let category = record
            .get(6)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string());

        let id = match record.get(0).filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => generate_id(&date, &description, raw_amount),
        };

        feed.transactions.push(Transaction {
            id,
            date,
            description,
            merchant,
            amount: raw_amount.abs(),
            kind,
            category,
        });
    }

    debug!(
        parsed = feed.transactions.len(),
        skipped = feed.skipped.len(),
        "Parsed transaction feed"
    );
    Ok(feed)
}

/// Content hash used when the feed carries no id column value
fn generate_id(date: &NaiveDate, description: &str, amount: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(date.to_string().as_bytes());
    hasher.update(description.as_bytes());
    hasher.update(amount.to_be_bytes());
    hex::encode(hasher.finalize())
}

fn row_label(record: &csv::StringRecord, line: usize) -> String {
    match record.get(0).filter(|s| !s.is_empty()) {
        Some(id) => id.to_string(),
        None => format!("line {}", line),
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    for fmt in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    Err(Error::Import(format!("unable to parse date: {}", s)))
}

fn parse_amount(s: &str) -> Result<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    let amount = cleaned
        .parse::<f64>()
        .map_err(|_| Error::Import(format!("unable to parse amount: {}", s)))?;
    if !amount.is_finite() {
        return Err(Error::Import(format!("non-finite amount: {}", s)));
    }
    Ok(amount)
}
