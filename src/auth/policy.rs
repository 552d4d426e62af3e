//! Plans and per-operation access policies
//!
//! A user's plan is owned by the identity provider; the access policy is
//! declared by each metered operation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription plan of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    /// Default plan, limited by the free-usage quota
    #[default]
    Free,
    /// Paid plan, unmetered and allowed premium-only operations
    Premium,
}

impl Plan {
    /// Parse a stored plan label. Anything other than "premium" is free.
    pub fn from_label(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("premium") {
            Plan::Premium
        } else {
            Plan::Free
        }
    }

    pub fn is_premium(self) -> bool {
        self == Plan::Premium
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access policy declared by a metered operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPolicy {
    /// Free users may call it until their free quota is spent
    FreeTierWithQuota,
    /// Only premium users may call it, regardless of free quota
    PremiumOnly,
}

impl fmt::Display for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPolicy::FreeTierWithQuota => write!(f, "free_tier_with_quota"),
            AccessPolicy::PremiumOnly => write!(f, "premium_only"),
        }
    }
}

/// Why an operation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    PremiumRequired,
    QuotaExhausted,
}

impl Denial {
    pub fn message(self) -> &'static str {
        match self {
            Denial::PremiumRequired => "This feature is only available for premium users.",
            Denial::QuotaExhausted => "Free usage limit reached. Upgrade to continue.",
        }
    }
}

/// Decide whether a caller with `plan` and `free_usage` may invoke an
/// operation declared with `policy`.
pub fn check_access(
    policy: AccessPolicy,
    plan: Plan,
    free_usage: u32,
    quota_ceiling: u32,
) -> Result<(), Denial> {
    match policy {
        AccessPolicy::PremiumOnly if !plan.is_premium() => Err(Denial::PremiumRequired),
        AccessPolicy::PremiumOnly => Ok(()),
        AccessPolicy::FreeTierWithQuota => {
            if plan.is_premium() || free_usage < quota_ceiling {
                Ok(())
            } else {
                Err(Denial::QuotaExhausted)
            }
        }
    }
}
