//! Logging infrastructure for AIVerse
//!
//! Provides the JSONL usage log consumed by billing and analytics.

pub mod usage;

pub use usage::{EventType, UsageEvent, UsageLogger};
