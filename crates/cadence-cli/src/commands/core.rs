//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `cmd_init` - Initialize the database
//! - `cmd_load` - Load a transaction feed
//! - `cmd_detect` - Run pattern detection
//! - `run_detection` - Detection pass shared by load/detect/override commands

use std::path::Path;

use anyhow::{Context, Result};
use cadence_core::{db::Database, detect::DetectionEngine, feed};

pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Database path is not valid UTF-8"))?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Load transactions: cadence load --file feed.csv");
    println!("  2. Review patterns:   cadence patterns list");
    println!("  3. Check bills:       cadence bills --days 7");

    Ok(())
}

pub fn cmd_load(db: &Database, file: &Path, no_detect: bool) -> Result<()> {
    println!("📥 Loading feed from {}...", file.display());

    let reader = std::fs::File::open(file)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let parsed = feed::parse_feed(reader).context("Failed to parse feed")?;

    let result = db.insert_transactions(&parsed.transactions)?;
    println!(
        "   {} loaded, {} already present",
        result.inserted, result.duplicates
    );

    if !parsed.skipped.is_empty() {
        println!("   ⚠️  {} rows skipped:", parsed.skipped.len());
        for skip in parsed.skipped.iter().take(10) {
            println!("      {} - {}", skip.id, skip.reason);
        }
        if parsed.skipped.len() > 10 {
            println!("      ... and {} more", parsed.skipped.len() - 10);
        }
    }

    if no_detect {
        println!("   Skipping detection (--no-detect)");
        return Ok(());
    }

    println!();
    cmd_detect(db)
}

/// One detection pass over everything in storage. Persists the resulting
/// patterns and returns the run summary.
pub fn run_detection(db: &Database) -> Result<cadence_core::DetectionRun> {
    let transactions = db.list_transactions()?;
    let registry = db.load_registry()?;
    let overrides = db.list_overrides()?;

    let engine = DetectionEngine::new();
    let run = engine.run(&transactions, &registry, &overrides);
    db.replace_detected_patterns(&run.patterns)?;

    Ok(run)
}

pub fn cmd_detect(db: &Database) -> Result<()> {
    println!("🔍 Detecting recurring patterns...");

    let run = run_detection(db)?;
    let engine = DetectionEngine::new();
    let auto_threshold = engine.config().auto_classify_threshold;

    let auto = run
        .patterns
        .iter()
        .filter(|p| p.confidence >= auto_threshold)
        .count();
    let review = run.patterns.iter().filter(|p| p.mixed_pattern).count();
    let billable = run.patterns.iter().filter(|p| !p.exclude_from_bills).count();

    println!();
    println!("📊 Detection Results");
    println!("   ─────────────────────────────");
    println!("   Patterns found: {}", run.patterns.len());
    println!("   Billable: {}", billable);
    println!("   High confidence (auto): {}", auto);
    if review > 0 {
        println!("   ⚠️  Mixed patterns needing review: {}", review);
    }
    if run.override_conflicts > 0 {
        println!(
            "   ⚠️  Overrides referencing missing transactions: {}",
            run.override_conflicts
        );
    }
    if !run.skipped.is_empty() {
        println!("   Skipped records: {}", run.skipped.len());
    }

    println!();
    if run.patterns.is_empty() {
        println!("No recurring patterns yet. Load more history with 'cadence load'.");
    } else {
        println!("Run 'cadence patterns list' to review, 'cadence bills' for due dates.");
    }

    Ok(())
}
