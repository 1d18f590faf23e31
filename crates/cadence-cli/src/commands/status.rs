//! Database status command implementation

use anyhow::Result;
use cadence_core::db::Database;

pub fn cmd_status(db: &Database) -> Result<()> {
    let transactions = db.count_transactions()?;
    let patterns = db.list_patterns()?;
    let registry = db.list_registry_entries()?;
    let overrides = db.list_overrides()?;

    let size_str = std::fs::metadata(db.path())
        .map(|m| format!("{:.1} KB", m.len() as f64 / 1024.0))
        .unwrap_or_else(|_| "?".to_string());

    let billable = patterns.iter().filter(|p| !p.exclude_from_bills).count();
    let mixed = patterns.iter().filter(|p| p.mixed_pattern).count();

    println!();
    println!("📊 Cadence Status");
    println!("   ─────────────────────────────");
    println!("   Database: {} ({})", db.path(), size_str);
    println!("   Transactions: {}", transactions);
    println!("   Patterns: {} ({} billable)", patterns.len(), billable);
    if mixed > 0 {
        println!("   ⚠️  Mixed patterns needing review: {}", mixed);
    }
    println!("   Registry entries: {}", registry.len());
    println!("   Overrides: {}", overrides.len());

    if transactions == 0 {
        println!();
        println!("Get started: cadence load --file feed.csv");
    }

    Ok(())
}
