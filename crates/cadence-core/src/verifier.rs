//! Pattern verification
//!
//! Given a merchant cluster, infers the recurrence frequency from
//! inter-arrival gaps, checks amount consistency, scores overall confidence,
//! and classifies the pattern. Soft signal-quality problems (irregular gaps,
//! high variance) never fail; they come out as reduced confidence and the
//! mixed-pattern flag so the consumer can route the cluster to manual review.

use tracing::debug;

use crate::detect::DetectionConfig;
use crate::matcher::MerchantCluster;
use crate::models::{Frequency, PatternKind, RecurringPattern};

/// Inclusive day-range bands mapping a median gap to a frequency.
/// A median outside every band means the cadence is unknown.
const WEEKLY_BAND: (f64, f64) = (5.0, 9.0); // 7 +/- 2
const BIWEEKLY_BAND: (f64, f64) = (11.0, 17.0); // 14 +/- 3
const MONTHLY_BAND: (f64, f64) = (25.0, 35.0); // 30 +/- 5
const QUARTERLY_BAND: (f64, f64) = (80.0, 100.0); // 90 +/- 10
const YEARLY_BAND: (f64, f64) = (350.0, 380.0); // 365 +/- 15

/// Category/merchant keywords for the classification taxonomy
const UTILITY_KEYWORDS: &[&str] = &[
    "utility", "utilities", "electric", "energy", "gas", "water", "sewer", "internet",
    "broadband", "wireless", "phone", "telecom", "comcast", "xfinity", "verizon", "t-mobile",
];
const CREDIT_CARD_KEYWORDS: &[&str] = &[
    "credit card", "card payment", "autopay", "epay", "amex", "visa", "mastercard", "discover",
    "payment thank you",
];
const LARGE_RECURRING_KEYWORDS: &[&str] =
    &["rent", "mortgage", "lease", "loan", "hoa", "tuition"];
const SUBSCRIPTION_KEYWORDS: &[&str] = &[
    "subscription", "membership", "streaming", "netflix", "spotify", "hulu", "disney", "hbo",
    "prime", "icloud", "youtube", "audible", "patreon",
];

/// Verify one cluster into a recurring pattern.
///
/// The cluster must hold at least `min_occurrences` members sorted by
/// (date, id); the matcher guarantees both. The returned pattern has no
/// `next_due_date` yet; the projector fills that in.
pub fn verify(cluster: &MerchantCluster, config: &DetectionConfig) -> RecurringPattern {
    let txs = &cluster.transactions;
    let amounts: Vec<f64> = txs.iter().map(|t| t.amount).collect();
    let gaps: Vec<i64> = txs
        .windows(2)
        .map(|w| (w[1].date - w[0].date).num_days())
        .collect();

    let frequency = infer_frequency(&gaps);

    let avg_amount = mean(&amounts);
    let amount_variance = population_std_dev(&amounts);
    let relative_variance = if avg_amount > 0.0 {
        amount_variance / avg_amount
    } else {
        0.0
    };
    let mixed_pattern = relative_variance > config.mixed_variance_threshold;

    let confidence = score_confidence(cluster, &gaps, relative_variance, mixed_pattern, config);
    let kind = classify(cluster, avg_amount, confidence, config);

    let last = txs.last().map(|t| t.date).unwrap_or_default();
    let merchant_name = txs
        .last()
        .map(|t| t.merchant_text().trim().to_string())
        .unwrap_or_else(|| cluster.key.clone());

    debug!(
        merchant = %cluster.key,
        occurrences = txs.len(),
        ?frequency,
        confidence,
        mixed = mixed_pattern,
        "Verified cluster"
    );

    RecurringPattern {
        id: 0,
        merchant_name,
        normalized_key: cluster.key.clone(),
        category: pick_category(cluster),
        kind,
        frequency,
        avg_amount,
        amount_variance,
        occurrences: txs.len(),
        confidence,
        mixed_pattern,
        last_transaction_date: last,
        next_due_date: None,
        exclude_from_bills: false,
        linked_transaction_ids: txs.iter().map(|t| t.id.clone()).collect(),
        auto_detected: true,
    }
}

/// Map the median inter-arrival gap to a frequency bucket.
/// The median is robust to a single out-of-cycle charge.
fn infer_frequency(gaps: &[i64]) -> Option<Frequency> {
    if gaps.is_empty() {
        return None;
    }
    let m = median(gaps);
    let in_band = |(lo, hi): (f64, f64)| m >= lo && m <= hi;

    if in_band(WEEKLY_BAND) {
        Some(Frequency::Weekly)
    } else if in_band(BIWEEKLY_BAND) {
        Some(Frequency::Biweekly)
    } else if in_band(MONTHLY_BAND) {
        Some(Frequency::Monthly)
    } else if in_band(QUARTERLY_BAND) {
        Some(Frequency::Quarterly)
    } else if in_band(YEARLY_BAND) {
        Some(Frequency::Yearly)
    } else {
        None
    }
}

/// Weighted-sum confidence score, monotonic in every factor:
/// occurrence count (saturating), gap regularity, amount regularity,
/// with a curated-registry floor applied last.
fn score_confidence(
    cluster: &MerchantCluster,
    gaps: &[i64],
    relative_variance: f64,
    mixed_pattern: bool,
    config: &DetectionConfig,
) -> f64 {
    let n = cluster.occurrence_count();
    let occurrence_factor =
        (n.min(config.occurrence_saturation) as f64) / config.occurrence_saturation as f64;

    let gap_regularity = {
        let gap_mean = mean_i64(gaps);
        if gaps.is_empty() || gap_mean <= 0.0 {
            0.0
        } else {
            let cv = population_std_dev_i64(gaps) / gap_mean;
            (1.0 - cv).clamp(0.0, 1.0)
        }
    };

    let amount_regularity = (1.0 - relative_variance).clamp(0.0, 1.0);

    let mut score = config.weight_occurrences * occurrence_factor
        + config.weight_gap_regularity * gap_regularity
        + config.weight_amount_regularity * amount_regularity;

    if mixed_pattern {
        score *= config.mixed_confidence_factor;
    }

    // A single gap is tentative evidence: record the pattern but keep it
    // below the bar for automatic bill classification. The registry floor
    // below outranks this cap; curated merchants are trusted on one gap.
    if gaps.len() < 2 {
        score = score.min(config.single_gap_confidence_cap);
    }

    if let Some(entry) = &cluster.registry_entry {
        let floor = config
            .registry_confidence_floor
            .max(entry.confidence.unwrap_or(0.0));
        score = score.max(floor);
    }

    score.clamp(0.0, 1.0)
}

/// Choose the pattern kind: registry prior first, then taxonomy keyword
/// lookup against category and merchant text, then confidence-gated default.
fn classify(
    cluster: &MerchantCluster,
    avg_amount: f64,
    confidence: f64,
    config: &DetectionConfig,
) -> PatternKind {
    if let Some(entry) = &cluster.registry_entry {
        return entry.kind;
    }

    let mut haystack = cluster.key.clone();
    for tx in &cluster.transactions {
        if let Some(cat) = &tx.category {
            haystack.push(' ');
            haystack.push_str(&cat.to_lowercase());
        }
    }

    let matches_any = |keywords: &[&str]| keywords.iter().any(|k| haystack.contains(k));

    if matches_any(UTILITY_KEYWORDS) {
        return PatternKind::Utility;
    }
    if matches_any(CREDIT_CARD_KEYWORDS) {
        return PatternKind::CreditCard;
    }
    if matches_any(LARGE_RECURRING_KEYWORDS) {
        return PatternKind::LargeRecurring;
    }
    if matches_any(SUBSCRIPTION_KEYWORDS) {
        return PatternKind::Subscription;
    }

    // No taxonomy bucket: low-confidence clusters stay excluded pending
    // manual review, the rest classify on spend size
    if confidence < config.default_classify_min_confidence {
        PatternKind::Excluded
    } else if avg_amount >= config.large_recurring_min_amount {
        PatternKind::LargeRecurring
    } else {
        PatternKind::Subscription
    }
}

/// Registry category wins; otherwise the most common member category,
/// ignoring empty and "Other". Ties break lexicographically.
fn pick_category(cluster: &MerchantCluster) -> Option<String> {
    if let Some(entry) = &cluster.registry_entry {
        if entry.category.is_some() {
            return entry.category.clone();
        }
    }

    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for tx in &cluster.transactions {
        if let Some(cat) = tx.category.as_deref() {
            if !cat.is_empty() && !cat.eq_ignore_ascii_case("other") {
                *counts.entry(cat).or_insert(0) += 1;
            }
        }
    }

    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(cat, _)| cat.to_string())
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_i64(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Population standard deviation (not sample)
fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

fn population_std_dev_i64(values: &[i64]) -> f64 {
    let as_f64: Vec<f64> = values.iter().map(|&v| v as f64).collect();
    population_std_dev(&as_f64)
}

/// Median of day gaps; even-length inputs average the two middle values
fn median(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
    } else {
        sorted[mid] as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ConfidenceBand, MerchantRegistryEntry, Transaction, TransactionKind,
    };
    use chrono::{Duration, NaiveDate};

    fn cluster_of(amounts_and_days: &[(f64, i64)]) -> MerchantCluster {
        let start = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let transactions = amounts_and_days
            .iter()
            .enumerate()
            .map(|(i, (amount, day_offset))| Transaction {
                id: format!("tx-{}", i),
                date: start + Duration::days(*day_offset),
                description: "ACME SERVICE".to_string(),
                merchant: None,
                amount: *amount,
                kind: TransactionKind::Expense,
                category: None,
            })
            .collect();
        MerchantCluster {
            key: "acme service".to_string(),
            transactions,
            registry_entry: None,
        }
    }

    #[test]
    fn test_monthly_round_trip() {
        // Six occurrences, exactly 30 days apart, identical amounts
        let cluster = cluster_of(&[
            (9.99, 0),
            (9.99, 30),
            (9.99, 60),
            (9.99, 90),
            (9.99, 120),
            (9.99, 150),
        ]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert_eq!(pattern.frequency, Some(Frequency::Monthly));
        assert!(pattern.confidence >= 0.75, "got {}", pattern.confidence);
        assert_eq!(pattern.confidence_band(), ConfidenceBand::High);
        assert_eq!(pattern.occurrences, 6);
        assert_eq!(pattern.amount_variance, 0.0);
    }

    #[test]
    fn test_weekly_biweekly_quarterly_yearly() {
        let weekly = cluster_of(&[(5.0, 0), (5.0, 7), (5.0, 14)]);
        assert_eq!(
            verify(&weekly, &DetectionConfig::default()).frequency,
            Some(Frequency::Weekly)
        );

        let biweekly = cluster_of(&[(5.0, 0), (5.0, 14), (5.0, 28)]);
        assert_eq!(
            verify(&biweekly, &DetectionConfig::default()).frequency,
            Some(Frequency::Biweekly)
        );

        let quarterly = cluster_of(&[(5.0, 0), (5.0, 91), (5.0, 182)]);
        assert_eq!(
            verify(&quarterly, &DetectionConfig::default()).frequency,
            Some(Frequency::Quarterly)
        );

        let yearly = cluster_of(&[(5.0, 0), (5.0, 365)]);
        assert_eq!(
            verify(&yearly, &DetectionConfig::default()).frequency,
            Some(Frequency::Yearly)
        );
    }

    #[test]
    fn test_gap_outside_all_bands_is_unknown() {
        let odd = cluster_of(&[(5.0, 0), (5.0, 50), (5.0, 100)]);
        let pattern = verify(&odd, &DetectionConfig::default());
        assert_eq!(pattern.frequency, None);
    }

    #[test]
    fn test_median_robust_to_outlier() {
        // One off-cycle charge does not break monthly inference
        let cluster = cluster_of(&[(9.99, 0), (9.99, 30), (9.99, 33), (9.99, 63), (9.99, 93)]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert_eq!(pattern.frequency, Some(Frequency::Monthly));
    }

    #[test]
    fn test_two_transactions_recorded_but_capped() {
        let config = DetectionConfig::default();
        let cluster = cluster_of(&[(15.49, 0), (15.49, 30)]);
        let pattern = verify(&cluster, &config);
        // Still recorded, still monthly, still high band...
        assert_eq!(pattern.frequency, Some(Frequency::Monthly));
        assert_eq!(pattern.confidence_band(), ConfidenceBand::High);
        // ...but below the automatic bill-classification bar
        assert!(pattern.confidence < config.auto_classify_threshold);
    }

    #[test]
    fn test_single_gap_cap_binds_under_heavier_weights() {
        // 0.60 * (2/6) + 0.35 + 0.30 = 0.85 before the cap
        let config = DetectionConfig {
            weight_occurrences: 0.60,
            ..DetectionConfig::default()
        };
        let cluster = cluster_of(&[(15.49, 0), (15.49, 30)]);
        let pattern = verify(&cluster, &config);
        assert_eq!(pattern.confidence, config.single_gap_confidence_cap);
    }

    #[test]
    fn test_variance_sensitivity() {
        // Amounts varying well past 50% of the mean: flagged mixed, and the
        // classification cannot be a high-confidence utility/subscription
        let cluster = cluster_of(&[
            (12.99, 0),
            (87.50, 11),
            (12.99, 47),
            (200.00, 60),
            (45.00, 88),
        ]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert!(pattern.mixed_pattern);
        assert_ne!(pattern.confidence_band(), ConfidenceBand::High);
    }

    #[test]
    fn test_mixed_cluster_defaults_to_excluded() {
        let cluster = cluster_of(&[(12.99, 0), (87.50, 13), (12.99, 29), (200.00, 55)]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert!(pattern.mixed_pattern);
        assert_eq!(pattern.kind, PatternKind::Excluded);
        assert_eq!(pattern.confidence_band(), ConfidenceBand::Low);
    }

    #[test]
    fn test_registry_floor() {
        let mut cluster = cluster_of(&[(52.10, 0), (61.75, 31)]);
        cluster.registry_entry = Some(MerchantRegistryEntry {
            id: 1,
            merchant_name: "City Power".to_string(),
            normalized_name: "city power".to_string(),
            category: Some("Utilities".to_string()),
            kind: PatternKind::Utility,
            patterns: vec!["city power".to_string()],
            confidence: None,
            logo_url: None,
        });
        let config = DetectionConfig::default();
        let pattern = verify(&cluster, &config);
        assert!(pattern.confidence >= 0.9);
        // The floor applies even to a single-gap cluster the cap would
        // otherwise hold back
        assert!(pattern.confidence > config.single_gap_confidence_cap);
        assert_eq!(pattern.kind, PatternKind::Utility);
        assert_eq!(pattern.category.as_deref(), Some("Utilities"));
    }

    #[test]
    fn test_keyword_classification() {
        let mut cluster = cluster_of(&[(85.0, 0), (85.0, 30), (85.0, 60)]);
        cluster.key = "pacific electric co".to_string();
        assert_eq!(
            verify(&cluster, &DetectionConfig::default()).kind,
            PatternKind::Utility
        );

        let mut cluster = cluster_of(&[(1850.0, 0), (1850.0, 30), (1850.0, 61)]);
        cluster.key = "oakview apartments rent".to_string();
        assert_eq!(
            verify(&cluster, &DetectionConfig::default()).kind,
            PatternKind::LargeRecurring
        );
    }

    #[test]
    fn test_large_amount_without_keywords() {
        let cluster = cluster_of(&[(820.0, 0), (820.0, 30), (820.0, 60), (820.0, 91)]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert_eq!(pattern.kind, PatternKind::LargeRecurring);
    }

    #[test]
    fn test_invariant_occurrences_match_linked_ids() {
        let cluster = cluster_of(&[(9.99, 0), (9.99, 30), (9.99, 60)]);
        let pattern = verify(&cluster, &DetectionConfig::default());
        assert_eq!(pattern.occurrences, pattern.linked_transaction_ids.len());
    }

    #[test]
    fn test_confidence_monotonic_in_occurrences() {
        let config = DetectionConfig::default();
        let mut prev = 0.0;
        for n in 2..=6 {
            let members: Vec<(f64, i64)> = (0..n).map(|i| (9.99, i as i64 * 30)).collect();
            let score = verify(&cluster_of(&members), &config).confidence;
            assert!(score >= prev, "occurrences {} lowered confidence", n);
            prev = score;
        }
    }
}
