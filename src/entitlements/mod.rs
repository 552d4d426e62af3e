//! Entitlements - plans, free-usage counters and the request gate
//!
//! The identity provider owns each user's `{plan, free_usage}` record. The
//! [`EntitlementGate`] resolves a request's identity token into an immutable
//! [`DecisionContext`] that the dispatcher consults; it never mutates shared
//! request state.
//!
//! Counter writes go through [`EntitlementStore`], whose implementations must
//! be conflict-safe: increments are atomic and the premium reset is a
//! conditional write, so replaying either is harmless.

pub mod gate;
pub mod store;

pub use gate::EntitlementGate;
pub use store::{EntitlementStore, MemoryEntitlementStore, MongoEntitlementStore};

use serde::{Deserialize, Serialize};

use crate::auth::Plan;

/// A user's plan and free-usage counter as stored by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: String,
    pub plan: Plan,
    /// Successful free-tier calls so far; only meaningful on the free plan
    pub free_usage: u32,
}

impl EntitlementRecord {
    /// Default record for a user seen for the first time
    pub fn first_sign_in(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            plan: Plan::Free,
            free_usage: 0,
        }
    }

    /// Premium records with a leftover counter must converge to zero
    pub fn needs_reset(&self) -> bool {
        self.plan.is_premium() && self.free_usage != 0
    }
}

/// Immutable per-request decision context produced by the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionContext {
    user_id: String,
    plan: Plan,
    free_usage: u32,
}

impl DecisionContext {
    /// Build a context; premium users always report zero usage
    pub fn new(user_id: impl Into<String>, plan: Plan, free_usage: u32) -> Self {
        Self {
            user_id: user_id.into(),
            plan,
            free_usage: if plan.is_premium() { 0 } else { free_usage },
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn plan(&self) -> Plan {
        self.plan
    }

    pub fn free_usage(&self) -> u32 {
        self.free_usage
    }
}

impl From<&EntitlementRecord> for DecisionContext {
    fn from(record: &EntitlementRecord) -> Self {
        DecisionContext::new(record.user_id.clone(), record.plan, record.free_usage)
    }
}
