//! Domain models for Cadence

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Whether a transaction is money in or money out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" | "credit" => Ok(Self::Income),
            "expense" | "debit" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial transaction from the upstream feed
///
/// Transactions are immutable from the engine's perspective: the pipeline
/// reads them and derives recurring patterns, it never writes them back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque stable identifier from the feed
    pub id: String,
    pub date: NaiveDate,
    /// Raw merchant/narrative string
    pub description: String,
    /// Raw merchant string when the feed provides one separately
    pub merchant: Option<String>,
    /// Unsigned magnitude; `kind` carries the direction
    pub amount: f64,
    pub kind: TransactionKind,
    pub category: Option<String>,
}

impl Transaction {
    /// The text used for merchant grouping: the dedicated merchant field
    /// when present, the description otherwise.
    pub fn merchant_text(&self) -> &str {
        match self.merchant.as_deref() {
            Some(m) if !m.trim().is_empty() => m,
            _ => &self.description,
        }
    }
}

/// Inferred recurrence interval of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
        }
    }

    /// Nominal interval in days, used for display and sanity checks.
    /// Due-date projection uses calendar arithmetic for monthly and up.
    pub fn nominal_days(&self) -> i64 {
        match self {
            Self::Weekly => 7,
            Self::Biweekly => 14,
            Self::Monthly => 30,
            Self::Quarterly => 90,
            Self::Yearly => 365,
        }
    }
}

impl std::str::FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "biweekly" | "fortnightly" => Ok(Self::Biweekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "yearly" | "annual" | "annually" => Ok(Self::Yearly),
            _ => Err(format!("Unknown frequency: {}", s)),
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification outcome for a recurring pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Utility,
    Subscription,
    CreditCard,
    LargeRecurring,
    /// Recorded but not surfaced as a bill (low confidence or no taxonomy fit)
    Excluded,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utility => "utility",
            Self::Subscription => "subscription",
            Self::CreditCard => "credit_card",
            Self::LargeRecurring => "large_recurring",
            Self::Excluded => "excluded",
        }
    }
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utility" => Ok(Self::Utility),
            "subscription" => Ok(Self::Subscription),
            "credit_card" | "creditcard" => Ok(Self::CreditCard),
            "large_recurring" => Ok(Self::LargeRecurring),
            "excluded" => Ok(Self::Excluded),
            _ => Err(format!("Unknown pattern kind: {}", s)),
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Discretized confidence band, for display only.
/// The continuous score is what gets persisted and sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// Band thresholds: high >= 0.75, medium >= 0.45, low otherwise.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::High
        } else if score >= 0.45 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected recurring pattern for one merchant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurringPattern {
    /// Database id; 0 for patterns the engine produced but the consumer has
    /// not persisted yet
    pub id: i64,
    /// Display name, taken from the most recent raw description
    pub merchant_name: String,
    /// Canonical grouping key the cluster formed around
    pub normalized_key: String,
    pub category: Option<String>,
    pub kind: PatternKind,
    /// None when the inter-arrival gaps fit no known cadence
    pub frequency: Option<Frequency>,
    pub avg_amount: f64,
    /// Population standard deviation of member amounts
    pub amount_variance: f64,
    /// Count of matched transactions; always equals linked_transaction_ids.len()
    pub occurrences: usize,
    /// Continuous confidence score in [0, 1]
    pub confidence: f64,
    /// Relative amount variance exceeded the mixed-pattern threshold;
    /// the consumer should prompt for manual review before auto-applying
    pub mixed_pattern: bool,
    pub last_transaction_date: NaiveDate,
    /// Strictly after last_transaction_date when present
    pub next_due_date: Option<NaiveDate>,
    pub exclude_from_bills: bool,
    /// Ids of the contributing transactions, ordered by (date, id)
    pub linked_transaction_ids: Vec<String>,
    /// Produced by the engine vs manually created
    pub auto_detected: bool,
}

impl RecurringPattern {
    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.confidence)
    }
}

/// Admin-curated reference data for a known merchant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantRegistryEntry {
    pub id: i64,
    pub merchant_name: String,
    /// Normalized form of merchant_name; unique across the registry
    pub normalized_name: String,
    pub category: Option<String>,
    pub kind: PatternKind,
    /// Match strings; each is treated as a regex when it compiles,
    /// a case-insensitive substring otherwise
    pub patterns: Vec<String>,
    /// Confidence hint applied as a floor when a cluster hits this entry
    pub confidence: Option<f64>,
    pub logo_url: Option<String>,
}

/// A new registry entry to be inserted (before DB assignment of an id)
#[derive(Debug, Clone)]
pub struct NewRegistryEntry {
    pub merchant_name: String,
    pub category: Option<String>,
    pub kind: PatternKind,
    pub patterns: Vec<String>,
    pub confidence: Option<f64>,
    pub logo_url: Option<String>,
}

/// Result of a registry bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkImportResult {
    pub added: usize,
    /// Entries whose normalized name already existed (in the database or
    /// earlier in the same batch)
    pub skipped: usize,
}

/// Kind of a user/admin override constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// Never surface this merchant as an upcoming bill
    ExcludeFromBills,
    /// A specific transaction must not be clustered under this merchant
    NotRecurring,
    /// The user confirmed this merchant as genuinely recurring
    ConfirmRecurring,
}

impl OverrideKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExcludeFromBills => "exclude_from_bills",
            Self::NotRecurring => "not_recurring",
            Self::ConfirmRecurring => "confirm_recurring",
        }
    }
}

impl std::str::FromStr for OverrideKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exclude_from_bills" | "exclude" => Ok(Self::ExcludeFromBills),
            "not_recurring" => Ok(Self::NotRecurring),
            "confirm_recurring" | "confirm" => Ok(Self::ConfirmRecurring),
            _ => Err(format!("Unknown override kind: {}", s)),
        }
    }
}

impl std::fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted override constraint that detection runs must honor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Override {
    pub id: i64,
    pub kind: OverrideKind,
    /// Normalized merchant key the override is scoped to
    pub merchant_key: String,
    /// Set for NotRecurring overrides; the pinned-out transaction
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A feed record that could not participate in detection, with the reason
#[derive(Debug, Clone, Serialize)]
pub struct SkippedTransaction {
    /// Feed id when one was readable, otherwise a line/position marker
    pub id: String,
    pub reason: String,
}
