//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init, load, detect) and shared utilities (open_db)
//! - `patterns` - Pattern management commands (list, exclude, include, confirm, split)
//! - `bills` - Upcoming-bill commands
//! - `registry` - Merchant registry commands (list, add, remove, import)
//! - `status` - Database status command

pub mod bills;
pub mod core;
pub mod patterns;
pub mod registry;
pub mod status;

// Re-export command functions for main.rs
pub use bills::*;
pub use core::*;
pub use patterns::*;
pub use registry::*;
pub use status::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}...", &s[..max.saturating_sub(3)])
    }
}
