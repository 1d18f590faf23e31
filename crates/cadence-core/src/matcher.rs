//! Merchant clustering
//!
//! Groups expense transactions into merchant clusters: an exact pass on
//! normalized keys, then a fuzzy pass that folds near-miss singletons into
//! established clusters, then a registry consultation that tags clusters
//! with curated category/type priors.

use std::collections::BTreeMap;

use tracing::debug;

use crate::detect::DetectionConfig;
use crate::models::{MerchantRegistryEntry, Transaction, TransactionKind};
use crate::normalize::normalize;
use crate::registry::MerchantRegistry;

/// A transient grouping of transactions believed to share a merchant
#[derive(Debug, Clone)]
pub struct MerchantCluster {
    /// The normalized key the cluster formed around
    pub key: String,
    /// Members ordered by (date, id)
    pub transactions: Vec<Transaction>,
    /// Curated prior when the cluster's key matched a registry entry
    pub registry_entry: Option<MerchantRegistryEntry>,
}

impl MerchantCluster {
    pub fn occurrence_count(&self) -> usize {
        self.transactions.len()
    }

    fn first_seen(&self) -> Option<chrono::NaiveDate> {
        self.transactions.first().map(|t| t.date)
    }

    fn avg_amount(&self) -> f64 {
        if self.transactions.is_empty() {
            return 0.0;
        }
        self.transactions.iter().map(|t| t.amount).sum::<f64>() / self.transactions.len() as f64
    }
}

/// Cluster a snapshot of transactions by merchant.
///
/// Income transactions never participate. Transactions whose description
/// normalizes to the empty key are never grouped with each other; they stay
/// singletons and fall to the occurrence threshold. Output clusters are
/// sorted by key and hold members sorted by (date, id), so the same input
/// always yields the same output.
pub fn cluster(
    transactions: &[Transaction],
    registry: &MerchantRegistry,
    config: &DetectionConfig,
) -> Vec<MerchantCluster> {
    // Exact pass: identical normalized keys join the same cluster
    let mut by_key: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
    let mut unkeyed = 0usize;

    for tx in transactions {
        if tx.kind == TransactionKind::Income {
            continue;
        }
        let key = normalize(tx.merchant_text());
        if key.is_empty() {
            // Empty key is not a valid grouping key
            unkeyed += 1;
            continue;
        }
        by_key.entry(key).or_default().push(tx.clone());
    }

    if unkeyed > 0 {
        debug!(count = unkeyed, "Transactions with empty keys left unclustered");
    }

    let mut clusters: Vec<MerchantCluster> = by_key
        .into_iter()
        .map(|(key, mut txs)| {
            txs.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
            MerchantCluster {
                key,
                transactions: txs,
                registry_entry: None,
            }
        })
        .collect();

    // Fuzzy pass: fold singletons into a near-identical cluster when the
    // spend level agrees
    fuzzy_merge(&mut clusters, config);

    // Registry consultation: curated entries override weak heuristic signals
    for cluster in &mut clusters {
        cluster.registry_entry = registry.lookup(&cluster.key).cloned();
    }

    // Not enough evidence of recurrence below the occurrence threshold
    clusters.retain(|c| c.occurrence_count() >= config.min_occurrences);
    clusters.sort_by(|a, b| a.key.cmp(&b.key));
    clusters
}

/// Merge singleton clusters into fuzzy-matching neighbors.
///
/// Candidates are bucketed by first character and pre-filtered by length
/// difference before the edit-distance computation, which keeps the pass
/// near-linear on realistic feeds. A merge also requires the average
/// amounts of the two clusters to sit within a tolerance band, so merchants
/// with coincidentally similar names but different spend levels stay apart.
fn fuzzy_merge(clusters: &mut Vec<MerchantCluster>, config: &DetectionConfig) {
    // Single forward pass in key order. Every iteration either advances the
    // cursor or shrinks the vector, so the pass terminates.
    let mut idx = 0;
    while idx < clusters.len() {
        if clusters[idx].occurrence_count() >= config.min_occurrences {
            idx += 1;
            continue;
        }
        match best_merge_target(clusters, idx, config) {
            Some(j) => {
                let singleton = clusters.remove(idx);
                let j = if j > idx { j - 1 } else { j };
                merge_into(&mut clusters[j], singleton, config);
            }
            None => idx += 1,
        }
    }
}

/// Pick the best cluster to absorb `clusters[i]`, or None.
///
/// Deterministic preference order: smallest edit distance, then larger
/// member count, then earliest first-seen date, then lexicographic key.
fn best_merge_target(
    clusters: &[MerchantCluster],
    i: usize,
    config: &DetectionConfig,
) -> Option<usize> {
    let small = &clusters[i];
    let small_first = small.key.chars().next()?;
    let small_avg = small.avg_amount();

    let mut best: Option<(usize, usize)> = None; // (distance, index)

    for (j, candidate) in clusters.iter().enumerate() {
        if j == i {
            continue;
        }
        // Cheap prefix bucket before the expensive similarity function
        if candidate.key.chars().next() != Some(small_first) {
            continue;
        }

        let min_len = small.key.chars().count().min(candidate.key.chars().count());
        let max_dist = max_edit_distance(min_len, config);
        if max_dist == 0 {
            continue;
        }
        let len_diff = small
            .key
            .chars()
            .count()
            .abs_diff(candidate.key.chars().count());
        if len_diff > max_dist {
            continue;
        }

        let dist = levenshtein(&small.key, &candidate.key);
        if dist == 0 || dist > max_dist {
            continue;
        }

        // Amount tolerance band: unrelated merchants with similar names
        // rarely charge similar amounts
        let cand_avg = candidate.avg_amount();
        let larger = small_avg.max(cand_avg);
        if larger > 0.0 && (small_avg - cand_avg).abs() / larger > config.fuzzy_amount_tolerance {
            continue;
        }

        let better = match best {
            None => true,
            Some((best_dist, best_idx)) => {
                let b = &clusters[best_idx];
                (
                    dist,
                    std::cmp::Reverse(candidate.occurrence_count()),
                    candidate.first_seen(),
                    &candidate.key,
                ) < (
                    best_dist,
                    std::cmp::Reverse(b.occurrence_count()),
                    b.first_seen(),
                    &b.key,
                )
            }
        };
        if better {
            best = Some((dist, j));
        }
    }

    best.map(|(_, j)| j)
}

/// Allowed edit distance for a pair of keys, stepped by the shorter length.
/// Short keys carry too little signal to tolerate any edits.
fn max_edit_distance(min_len: usize, config: &DetectionConfig) -> usize {
    if min_len >= config.fuzzy_two_edit_len {
        2
    } else if min_len >= config.fuzzy_min_len {
        1
    } else {
        0
    }
}

/// Absorb `other` into `cluster`, keeping the key of the larger side.
/// Ties break toward the side with the earliest first-seen transaction,
/// then the lexicographically smaller key.
fn merge_into(cluster: &mut MerchantCluster, other: MerchantCluster, _config: &DetectionConfig) {
    let keep_other_key = match other
        .occurrence_count()
        .cmp(&cluster.occurrence_count())
    {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => match other.first_seen().cmp(&cluster.first_seen()) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => other.key < cluster.key,
        },
    };

    debug!(
        kept = %if keep_other_key { &other.key } else { &cluster.key },
        merged = %if keep_other_key { &cluster.key } else { &other.key },
        "Fuzzy-merged merchant clusters"
    );

    if keep_other_key {
        cluster.key = other.key;
    }
    cluster.transactions.extend(other.transactions);
    cluster
        .transactions
        .sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
}

/// Plain Levenshtein distance, two-row dynamic programming
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
