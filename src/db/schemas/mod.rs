//! Database schemas for AIVerse
//!
//! Defines MongoDB document structures for creations and entitlements.

mod creation;
mod entitlement;
mod metadata;

pub use creation::{CreationDoc, CREATION_COLLECTION};
pub use entitlement::{EntitlementDoc, ENTITLEMENT_COLLECTION};
pub use metadata::Metadata;
