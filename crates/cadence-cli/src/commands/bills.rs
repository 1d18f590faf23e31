//! Upcoming-bill command implementations

use anyhow::Result;
use cadence_core::{db::Database, projector};
use chrono::Local;

use super::truncate;

pub fn cmd_bills(db: &Database, days: i64) -> Result<()> {
    if days < 0 {
        anyhow::bail!("--days must be non-negative");
    }

    let patterns = db.list_patterns()?;
    let today = Local::now().date_naive();
    let due = projector::upcoming(&patterns, today, days);

    println!();
    println!("📅 Upcoming Bills (next {} days)", days);
    println!("   ─────────────────────────────────────────────────────────────");

    if due.is_empty() {
        println!("   Nothing due in this window.");
        if patterns.is_empty() {
            println!();
            println!("No patterns detected yet. Run 'cadence detect' first.");
        }
        return Ok(());
    }

    let mut total = 0.0;
    for p in &due {
        let Some(due_date) = p.next_due_date else {
            continue;
        };
        let days_away = (due_date - today).num_days();
        let when = match days_away {
            0 => "today".to_string(),
            1 => "tomorrow".to_string(),
            n => format!("in {} days", n),
        };

        println!(
            "   {} │ {:24} │ {:>9} │ {}",
            due_date,
            truncate(&p.merchant_name, 24),
            format!("${:.2}", p.avg_amount),
            when,
        );
        total += p.avg_amount;
    }

    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Total expected: ${:.2}", total);

    Ok(())
}
