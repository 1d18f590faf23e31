//! Cadence Core Library
//!
//! Shared functionality for the Cadence recurring-bill tool:
//! - Database access and migrations
//! - Transaction feed parsing
//! - Merchant name normalization and fuzzy clustering
//! - Recurrence verification and confidence scoring
//! - Bill projection
//! - Curated merchant registry with bulk import

pub mod db;
pub mod detect;
pub mod error;
pub mod feed;
pub mod matcher;
pub mod models;
pub mod normalize;
pub mod projector;
pub mod registry;
pub mod verifier;

pub use db::{Database, TransactionInsertResult};
pub use detect::{DetectionConfig, DetectionEngine, DetectionRun};
pub use error::{Error, Result};
pub use feed::{parse_feed, ParsedFeed};
pub use matcher::MerchantCluster;
pub use models::{
    BulkImportResult, ConfidenceBand, Frequency, MerchantRegistryEntry, NewRegistryEntry,
    Override, OverrideKind, PatternKind, RecurringPattern, SkippedTransaction, Transaction,
    TransactionKind,
};
pub use registry::{parse_bulk_import, MerchantRegistry};
