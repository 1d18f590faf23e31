//! Cadence CLI - Recurring-bill detector
//!
//! Usage:
//!   cadence init                 Initialize database
//!   cadence load --file CSV      Load a transaction feed
//!   cadence detect               Detect recurring patterns
//!   cadence bills --days 7       Show upcoming bills

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Load { file, no_detect } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_load(&db, &file, no_detect)
        }
        Commands::Detect => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_detect(&db)
        }
        Commands::Patterns { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(PatternsAction::List) => commands::cmd_patterns_list(&db),
                Some(PatternsAction::Exclude { merchant }) => {
                    commands::cmd_patterns_exclude(&db, &merchant)
                }
                Some(PatternsAction::Include { merchant }) => {
                    commands::cmd_patterns_include(&db, &merchant)
                }
                Some(PatternsAction::Confirm { merchant }) => {
                    commands::cmd_patterns_confirm(&db, &merchant)
                }
                Some(PatternsAction::Split {
                    merchant,
                    transaction_id,
                }) => commands::cmd_patterns_split(&db, &merchant, &transaction_id),
            }
        }
        Commands::Bills { days } => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_bills(&db, days)
        }
        Commands::Registry { action } => {
            let db = commands::open_db(&cli.db)?;
            match action {
                None | Some(RegistryAction::List) => commands::cmd_registry_list(&db),
                Some(RegistryAction::Add {
                    name,
                    category,
                    kind,
                    pattern,
                    confidence,
                }) => commands::cmd_registry_add(
                    &db,
                    &name,
                    category.as_deref(),
                    &kind,
                    &pattern,
                    confidence,
                ),
                Some(RegistryAction::Remove { name }) => commands::cmd_registry_remove(&db, &name),
                Some(RegistryAction::Import { file }) => commands::cmd_registry_import(&db, &file),
            }
        }
        Commands::Status => {
            let db = commands::open_db(&cli.db)?;
            commands::cmd_status(&db)
        }
    }
}
