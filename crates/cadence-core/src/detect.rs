//! Recurring-pattern detection pipeline
//!
//! Runs Normalizer -> Matcher -> Verifier -> Projector over a snapshot of
//! transactions, a registry snapshot, and the persisted override set. The
//! pipeline is a pure, synchronous, CPU-bound transform: no I/O happens in
//! here, and the same inputs always produce the same output in the same
//! order. Callers may abort and re-run freely; the only side effect
//! (persisting patterns) belongs to the consumer after the run completes.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::matcher;
use crate::models::{
    Override, OverrideKind, RecurringPattern, SkippedTransaction, Transaction,
};
use crate::projector;
use crate::registry::MerchantRegistry;
use crate::verifier;

/// Detection thresholds, all in one place so they are independently
/// testable and tunable
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Minimum transactions before a cluster becomes a pattern
    pub min_occurrences: usize,
    /// Shortest key eligible for a 1-edit fuzzy merge
    pub fuzzy_min_len: usize,
    /// Shortest key eligible for a 2-edit fuzzy merge
    pub fuzzy_two_edit_len: usize,
    /// Max relative difference of cluster average amounts for a fuzzy merge
    pub fuzzy_amount_tolerance: f64,
    /// Occurrence count beyond which more evidence stops raising confidence
    pub occurrence_saturation: usize,
    /// Confidence weight: occurrence count
    pub weight_occurrences: f64,
    /// Confidence weight: inter-arrival gap regularity
    pub weight_gap_regularity: f64,
    /// Confidence weight: amount regularity
    pub weight_amount_regularity: f64,
    /// Relative amount variance above which a cluster is a mixed pattern
    pub mixed_variance_threshold: f64,
    /// Confidence multiplier applied to mixed-pattern clusters
    pub mixed_confidence_factor: f64,
    /// Confidence cap for clusters with a single inter-arrival gap.
    /// Under the default weights a two-occurrence cluster already tops out
    /// below this; the cap backstops heavier weight configurations. A
    /// registry hit or user confirmation outranks it.
    pub single_gap_confidence_cap: f64,
    /// Confidence at or above which a pattern can be treated as a bill
    /// without manual review
    pub auto_classify_threshold: f64,
    /// Confidence floor for clusters that hit a curated registry entry,
    /// and for user-confirmed merchants
    pub registry_confidence_floor: f64,
    /// Below this confidence, patterns with no taxonomy bucket classify
    /// as excluded
    pub default_classify_min_confidence: f64,
    /// Average amount at which a bucket-less pattern reads as
    /// large_recurring rather than subscription
    pub large_recurring_min_amount: f64,
    /// Default lookahead window for upcoming-bill queries
    pub default_horizon_days: i64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 2,
            fuzzy_min_len: 6,
            fuzzy_two_edit_len: 12,
            fuzzy_amount_tolerance: 0.25,
            occurrence_saturation: 6,
            weight_occurrences: 0.35,
            weight_gap_regularity: 0.35,
            weight_amount_regularity: 0.30,
            mixed_variance_threshold: 0.5,
            mixed_confidence_factor: 0.6,
            single_gap_confidence_cap: 0.80,
            auto_classify_threshold: 0.85,
            registry_confidence_floor: 0.9,
            default_classify_min_confidence: 0.45,
            large_recurring_min_amount: 500.0,
            default_horizon_days: 7,
        }
    }
}

/// Output of one detection run
#[derive(Debug, Default)]
pub struct DetectionRun {
    /// Detected patterns, ordered by normalized key
    pub patterns: Vec<RecurringPattern>,
    /// Feed records excluded from clustering, with reasons
    pub skipped: Vec<SkippedTransaction>,
    /// Clusters that met the occurrence threshold
    pub clusters_formed: usize,
    /// Overrides referencing transactions absent from the feed
    pub override_conflicts: usize,
}

/// The detection engine: configuration plus the pipeline entry point
pub struct DetectionEngine {
    config: DetectionConfig,
}

impl Default for DetectionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionEngine {
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
        }
    }

    pub fn with_config(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Run the full pipeline over one snapshot.
    ///
    /// Structurally invalid records are skipped per-record with a reason,
    /// never aborting the batch. Duplicate ids are collapsed to the first
    /// occurrence so re-feeding the same transaction cannot double-count.
    pub fn run(
        &self,
        transactions: &[Transaction],
        registry: &MerchantRegistry,
        overrides: &[Override],
    ) -> DetectionRun {
        let mut skipped = Vec::new();
        let mut seen_ids = BTreeSet::new();
        let constraints = OverrideSet::build(overrides);

        let mut usable: Vec<Transaction> = Vec::with_capacity(transactions.len());
        for tx in transactions {
            if let Some(reason) = validate(tx) {
                skipped.push(SkippedTransaction {
                    id: tx.id.clone(),
                    reason,
                });
                continue;
            }
            if !seen_ids.insert(tx.id.clone()) {
                debug!(id = %tx.id, "Duplicate transaction id in feed, keeping first");
                continue;
            }
            // Honor user splits. Matched by id alone: the transaction's own
            // key can differ from the key the split was recorded under when
            // fuzzy matching folded the charge into a neighboring merchant.
            if let Some(merchant) = constraints.split_merchant(&tx.id) {
                debug!(id = %tx.id, merchant = %merchant, "Excluded by not-recurring override");
                continue;
            }
            usable.push(tx.clone());
        }

        let conflicts = constraints.count_conflicts(&seen_ids);

        let clusters = matcher::cluster(&usable, registry, &self.config);
        let clusters_formed = clusters.len();

        let mut patterns: Vec<RecurringPattern> = clusters
            .iter()
            .map(|c| verifier::verify(c, &self.config))
            .collect();

        for pattern in &mut patterns {
            if constraints.is_confirmed(&pattern.normalized_key) {
                apply_confirmation(pattern, &self.config);
            }
            if constraints.is_excluded(&pattern.normalized_key) {
                pattern.exclude_from_bills = true;
            }
            // last_transaction_date and next_due_date always move together
            projector::project(pattern);
        }

        patterns.sort_by(|a, b| a.normalized_key.cmp(&b.normalized_key));

        info!(
            patterns = patterns.len(),
            clusters = clusters_formed,
            skipped = skipped.len(),
            override_conflicts = conflicts,
            "Detection run complete"
        );

        DetectionRun {
            patterns,
            skipped,
            clusters_formed,
            override_conflicts: conflicts,
        }
    }
}

/// A user confirmation lifts the pattern past the manual-review bar and,
/// when the heuristics had parked it as excluded, re-classifies it on
/// spend size.
fn apply_confirmation(pattern: &mut RecurringPattern, config: &DetectionConfig) {
    pattern.confidence = pattern.confidence.max(config.registry_confidence_floor);
    if pattern.kind == crate::models::PatternKind::Excluded {
        pattern.kind = if pattern.avg_amount >= config.large_recurring_min_amount {
            crate::models::PatternKind::LargeRecurring
        } else {
            crate::models::PatternKind::Subscription
        };
    }
}

/// Structural validation at the engine boundary. Feed parsing catches most
/// of this; the checks here guard direct library callers.
fn validate(tx: &Transaction) -> Option<String> {
    if tx.id.trim().is_empty() {
        return Some("missing transaction id".to_string());
    }
    if !tx.amount.is_finite() {
        return Some(format!("non-finite amount {}", tx.amount));
    }
    if tx.amount < 0.0 {
        return Some("negative amount magnitude".to_string());
    }
    if tx.description.trim().is_empty() && tx.merchant.as_deref().unwrap_or("").trim().is_empty() {
        return Some("empty description and merchant".to_string());
    }
    None
}

/// Persisted override constraints, indexed for the run
struct OverrideSet {
    excluded: BTreeSet<String>,
    confirmed: BTreeSet<String>,
    /// transaction id -> merchant key it was split out of; ids are
    /// globally unique so the id is the whole lookup key
    split_out: BTreeMap<String, String>,
}

impl OverrideSet {
    fn build(overrides: &[Override]) -> Self {
        let mut excluded = BTreeSet::new();
        let mut confirmed = BTreeSet::new();
        let mut split_out: BTreeMap<String, String> = BTreeMap::new();

        for ov in overrides {
            match ov.kind {
                OverrideKind::ExcludeFromBills => {
                    excluded.insert(ov.merchant_key.clone());
                }
                OverrideKind::ConfirmRecurring => {
                    confirmed.insert(ov.merchant_key.clone());
                }
                OverrideKind::NotRecurring => match &ov.transaction_id {
                    Some(tx_id) => {
                        split_out.insert(tx_id.clone(), ov.merchant_key.clone());
                    }
                    None => {
                        warn!(
                            merchant = %ov.merchant_key,
                            "Not-recurring override without a transaction id, ignoring"
                        );
                    }
                },
            }
        }

        Self {
            excluded,
            confirmed,
            split_out,
        }
    }

    fn is_excluded(&self, key: &str) -> bool {
        self.excluded.contains(key)
    }

    fn is_confirmed(&self, key: &str) -> bool {
        self.confirmed.contains(key)
    }

    fn split_merchant(&self, tx_id: &str) -> Option<&str> {
        self.split_out.get(tx_id).map(String::as_str)
    }

    /// Overrides naming transactions that the feed no longer contains.
    /// Logged and ignored per id; never blocks the rest of the set.
    fn count_conflicts(&self, feed_ids: &BTreeSet<String>) -> usize {
        let mut conflicts = 0;
        for (id, merchant) in &self.split_out {
            if !feed_ids.contains(id) {
                warn!(
                    merchant = %merchant,
                    transaction_id = %id,
                    "Override references a transaction not in the feed, ignoring"
                );
                conflicts += 1;
            }
        }
        conflicts
    }
}
