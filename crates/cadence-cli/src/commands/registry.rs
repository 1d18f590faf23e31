//! Merchant registry command implementations

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{db::Database, models::NewRegistryEntry, parse_bulk_import, PatternKind};

use super::truncate;

pub fn cmd_registry_list(db: &Database) -> Result<()> {
    let entries = db.list_registry_entries()?;

    if entries.is_empty() {
        println!("The merchant registry is empty. Seed it with:");
        println!("  cadence registry add \"Netflix\" --category Entertainment");
        println!("  cadence registry import --file merchants.txt");
        return Ok(());
    }

    println!();
    println!("🏪 Merchant Registry ({} entries)", entries.len());
    println!("   ─────────────────────────────────────────────────────────────");

    for e in entries {
        let conf_str = e
            .confidence
            .map(|c| format!("{:.0}%", c * 100.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   {:24} │ {:16} │ {:15} │ {:>4} │ {} patterns",
            truncate(&e.merchant_name, 24),
            e.kind.as_str(),
            truncate(e.category.as_deref().unwrap_or("-"), 15),
            conf_str,
            e.patterns.len(),
        );
    }

    Ok(())
}

pub fn cmd_registry_add(
    db: &Database,
    name: &str,
    category: Option<&str>,
    kind: &str,
    extra_patterns: &[String],
    confidence: Option<f64>,
) -> Result<()> {
    let kind = kind
        .parse::<PatternKind>()
        .map_err(|e| anyhow::anyhow!(e))?;
    if let Some(c) = confidence {
        if !(0.0..=1.0).contains(&c) {
            anyhow::bail!("--confidence must be between 0 and 1");
        }
    }

    // The name itself always matches; extra patterns widen the net
    let mut patterns = vec![name.to_string()];
    patterns.extend(extra_patterns.iter().cloned());

    let id = db.add_registry_entry(&NewRegistryEntry {
        merchant_name: name.to_string(),
        category: category.map(|s| s.to_string()),
        kind,
        patterns,
        confidence,
        logo_url: None,
    })?;

    println!("✅ Added '{}' to the registry (ID: {})", name, id);
    println!("   Takes effect on the next 'cadence detect'");
    Ok(())
}

pub fn cmd_registry_remove(db: &Database, name: &str) -> Result<()> {
    if db.remove_registry_entry(name)? {
        println!("✅ Removed '{}' from the registry", name);
    } else {
        println!("'{}' is not in the registry; nothing to do", name);
    }
    Ok(())
}

pub fn cmd_registry_import(db: &Database, file: &Path) -> Result<()> {
    println!("📥 Importing registry entries from {}...", file.display());

    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let entries = parse_bulk_import(reader).context("Failed to parse import file")?;
    let result = db.bulk_add_registry_entries(&entries)?;

    println!(
        "✅ Import complete: {} added, {} skipped as duplicates",
        result.added, result.skipped
    );
    Ok(())
}
