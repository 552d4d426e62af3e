//! Entitlement gate
//!
//! Verifies the identity token, loads the user's entitlement record and
//! returns the decision context for this request. A premium user still
//! carrying a non-zero free counter gets a background reset; the request
//! never waits for it and a failed reset is only logged.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{DecisionContext, EntitlementStore};
use crate::auth::{extract_token_from_header, JwtValidator};
use crate::logging::{EventType, UsageLogger};
use crate::types::{AiverseError, Result};

const NOT_AUTHENTICATED: &str = "Unauthorized - user not authenticated";

/// Resolves request identity into a [`DecisionContext`]
#[derive(Clone)]
pub struct EntitlementGate {
    validator: JwtValidator,
    store: Arc<dyn EntitlementStore>,
    usage: UsageLogger,
}

impl EntitlementGate {
    pub fn new(validator: JwtValidator, store: Arc<dyn EntitlementStore>, usage: UsageLogger) -> Self {
        Self {
            validator,
            store,
            usage,
        }
    }

    /// Verify the Authorization header and return the user id it names
    pub fn authenticate(&self, auth_header: Option<&str>) -> Result<String> {
        let token = extract_token_from_header(auth_header)
            .ok_or_else(|| AiverseError::Unauthenticated(NOT_AUTHENTICATED.into()))?;

        let result = self.validator.verify_token(token);
        match result.claims {
            Some(claims) if result.valid => Ok(claims.sub),
            _ => {
                debug!(
                    "Rejected identity token: {}",
                    result.error.as_deref().unwrap_or("invalid")
                );
                Err(AiverseError::Unauthenticated(NOT_AUTHENTICATED.into()))
            }
        }
    }

    /// Authenticate the request and build its decision context
    pub async fn resolve(&self, auth_header: Option<&str>) -> Result<DecisionContext> {
        let user_id = self.authenticate(auth_header)?;
        self.context_for(&user_id).await
    }

    /// Build the decision context for an already-authenticated user
    pub async fn context_for(&self, user_id: &str) -> Result<DecisionContext> {
        let record = self.store.get(user_id).await?;

        if record.needs_reset() {
            self.spawn_reset(user_id.to_string());
        }

        Ok(DecisionContext::from(&record))
    }

    fn spawn_reset(&self, user_id: String) {
        let store = Arc::clone(&self.store);
        let usage = self.usage.clone();

        tokio::spawn(async move {
            match store.reset_free_usage(&user_id).await {
                Ok(true) => {
                    info!(user_id = %user_id, "Reset free usage for premium user");
                    usage
                        .log(usage.event(EventType::EntitlementReset).with_user(&user_id))
                        .await;
                }
                Ok(false) => debug!(user_id = %user_id, "Free usage already reset"),
                Err(e) => warn!(user_id = %user_id, error = %e, "Free usage reset failed"),
            }
        });
    }
}
