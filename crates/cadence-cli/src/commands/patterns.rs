//! Pattern management command implementations

use anyhow::Result;
use cadence_core::{db::Database, models::OverrideKind, normalize::normalize};

use super::{run_detection, truncate};

/// Resolve user input to the normalized key of a stored pattern.
///
/// Accepts either a merchant name (normalized before lookup) or an exact
/// normalized key.
fn resolve_key(db: &Database, merchant: &str) -> Result<String> {
    let key = normalize(merchant);
    if key.is_empty() {
        anyhow::bail!("'{}' normalizes to nothing", merchant);
    }
    if db.get_pattern_by_key(&key)?.is_none() {
        anyhow::bail!(
            "No pattern found for '{}'. Run 'cadence patterns list' to see detected merchants.",
            merchant
        );
    }
    Ok(key)
}

pub fn cmd_patterns_list(db: &Database) -> Result<()> {
    let patterns = db.list_patterns()?;

    if patterns.is_empty() {
        println!("No patterns detected yet. Run:");
        println!("  cadence detect");
        return Ok(());
    }

    println!();
    println!("📋 Recurring Patterns");
    println!("   ─────────────────────────────────────────────────────────────");

    for p in patterns {
        let kind_icon = match p.kind {
            cadence_core::PatternKind::Utility => "💡",
            cadence_core::PatternKind::Subscription => "🔁",
            cadence_core::PatternKind::CreditCard => "💳",
            cadence_core::PatternKind::LargeRecurring => "🏠",
            cadence_core::PatternKind::Excluded => "🚫",
        };
        let freq_str = p.frequency.map(|f| f.as_str()).unwrap_or("?");
        let flags = match (p.exclude_from_bills, p.mixed_pattern) {
            (true, _) => " [excluded]",
            (false, true) => " [review]",
            (false, false) => "",
        };

        println!(
            "   {} {:24} │ {:>9}/{:<9} │ {:>3}x │ {:.0}% {}{}",
            kind_icon,
            truncate(&p.merchant_name, 24),
            format!("${:.2}", p.avg_amount),
            freq_str,
            p.occurrences,
            p.confidence * 100.0,
            p.confidence_band(),
            flags,
        );
    }

    Ok(())
}

pub fn cmd_patterns_exclude(db: &Database, merchant: &str) -> Result<()> {
    let key = resolve_key(db, merchant)?;
    db.add_override(OverrideKind::ExcludeFromBills, &key, None)?;
    run_detection(db)?;

    println!("🚫 '{}' excluded from upcoming bills", key);
    println!("   Undo with: cadence patterns include \"{}\"", key);
    Ok(())
}

pub fn cmd_patterns_include(db: &Database, merchant: &str) -> Result<()> {
    let key = resolve_key(db, merchant)?;
    let removed = db.remove_override(OverrideKind::ExcludeFromBills, &key)?;
    if removed == 0 {
        println!("'{}' was not excluded; nothing to do", key);
        return Ok(());
    }
    run_detection(db)?;

    println!("✅ '{}' will appear in upcoming bills again", key);
    Ok(())
}

pub fn cmd_patterns_confirm(db: &Database, merchant: &str) -> Result<()> {
    let key = resolve_key(db, merchant)?;
    db.add_override(OverrideKind::ConfirmRecurring, &key, None)?;
    run_detection(db)?;

    let pattern = db
        .get_pattern_by_key(&key)?
        .ok_or_else(|| anyhow::anyhow!("Pattern disappeared after re-detection"))?;
    println!(
        "✅ '{}' confirmed as recurring ({} at {:.0}% confidence)",
        key,
        pattern.kind,
        pattern.confidence * 100.0
    );
    Ok(())
}

pub fn cmd_patterns_split(db: &Database, merchant: &str, transaction_id: &str) -> Result<()> {
    let key = resolve_key(db, merchant)?;
    if !db.transaction_exists(transaction_id)? {
        anyhow::bail!("Transaction '{}' not found in the feed", transaction_id);
    }

    db.add_override(OverrideKind::NotRecurring, &key, Some(transaction_id))?;
    run_detection(db)?;

    match db.get_pattern_by_key(&key)? {
        Some(p) => println!(
            "✂️  '{}' split out of '{}' ({} occurrences remain)",
            transaction_id, key, p.occurrences
        ),
        None => println!(
            "✂️  '{}' split out of '{}'; the remaining charges no longer form a pattern",
            transaction_id, key
        ),
    }
    Ok(())
}
