//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cadence - Detect recurring charges and forecast upcoming bills
#[derive(Parser)]
#[command(name = "cadence")]
#[command(about = "Recurring-transaction detector and bill forecaster", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cadence.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Load a transaction feed from CSV
    Load {
        /// CSV file with columns: id,date,description,merchant,amount,type,category
        #[arg(short, long)]
        file: PathBuf,

        /// Skip pattern detection after loading
        #[arg(long)]
        no_detect: bool,
    },

    /// Run recurring-pattern detection over stored transactions
    Detect,

    /// Manage detected patterns (list, exclude, include, confirm, split)
    Patterns {
        #[command(subcommand)]
        action: Option<PatternsAction>,
    },

    /// Show upcoming bills
    Bills {
        /// Lookahead window in days
        #[arg(short, long, default_value = "7")]
        days: i64,
    },

    /// Manage the merchant registry (list, add, remove, import)
    Registry {
        #[command(subcommand)]
        action: Option<RegistryAction>,
    },

    /// Show database status
    Status,
}

#[derive(Subcommand)]
pub enum PatternsAction {
    /// List detected patterns
    List,

    /// Exclude a merchant's pattern from upcoming bills
    Exclude {
        /// Merchant name or normalized key
        merchant: String,
    },

    /// Re-include a previously excluded merchant
    Include {
        /// Merchant name or normalized key
        merchant: String,
    },

    /// Confirm a merchant as genuinely recurring
    Confirm {
        /// Merchant name or normalized key
        merchant: String,
    },

    /// Split a transaction out of a merchant's pattern
    Split {
        /// Merchant name or normalized key
        merchant: String,
        /// Feed id of the transaction to split out
        transaction_id: String,
    },
}

#[derive(Subcommand)]
pub enum RegistryAction {
    /// List registry entries
    List,

    /// Add a registry entry
    Add {
        /// Merchant display name
        name: String,

        /// Category (e.g., Utilities, Entertainment)
        #[arg(short, long)]
        category: Option<String>,

        /// Pattern kind: utility, subscription, credit_card, large_recurring
        #[arg(short, long, default_value = "subscription")]
        kind: String,

        /// Extra match pattern (regex or substring); repeatable
        #[arg(short, long)]
        pattern: Vec<String>,

        /// Confidence hint in [0, 1]
        #[arg(long)]
        confidence: Option<f64>,
    },

    /// Remove a registry entry
    Remove {
        /// Merchant name
        name: String,
    },

    /// Bulk-import entries from a pipe-delimited file
    ///
    /// Line format: name|category|type|frequency|status|confidence
    Import {
        /// File to import
        #[arg(short, long)]
        file: PathBuf,
    },
}
