//! Database layer for AIVerse
//!
//! Provides MongoDB storage for the creation ledger and entitlement records.

pub mod mongo;
pub mod schemas;

pub use mongo::{MongoClient, MongoCollection};
pub use schemas::{CreationDoc, EntitlementDoc, Metadata};
