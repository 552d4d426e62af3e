//! Usage logging for billing and analytics
//!
//! Logs metering events in JSONL format, one event per line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::auth::Plan;

/// Usage event types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Metered operation allowed and sent to the provider
    OperationInvoked,
    /// Metered operation refused by plan or quota
    OperationDenied,
    /// Provider or validation failure after the gate allowed the call
    OperationFailed,
    /// Creation appended to the ledger
    CreationRecorded,
    /// Free-usage counter incremented
    QuotaIncremented,
    /// Premium user's stale free-usage counter reset to zero
    EntitlementReset,
    /// Like toggled on a creation
    LikeToggled,
}

/// Usage event for billing/analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Event type
    pub event_type: EventType,
    /// Gateway node that handled the request
    pub host_id: String,
    /// User identifier (if authenticated)
    pub user_id: Option<String>,
    /// Plan at decision time
    pub plan: Option<Plan>,
    /// Operation name
    pub operation: Option<String>,
    /// Creation the event refers to
    pub creation_id: Option<String>,
    /// Provider call duration in milliseconds
    pub duration_ms: Option<u64>,
    /// Additional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl UsageEvent {
    /// Create a new usage event
    pub fn new(event_type: EventType, host_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            host_id,
            user_id: None,
            plan: None,
            operation: None,
            creation_id: None,
            duration_ms: None,
            metadata: None,
        }
    }

    /// Set the user ID
    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    /// Set the plan
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Set the operation name
    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    /// Set the creation id
    pub fn with_creation(mut self, creation_id: &str) -> Self {
        self.creation_id = Some(creation_id.to_string());
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Attach free-form metadata
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Convert to JSONL line
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Usage logger that writes events to JSONL file
#[derive(Clone)]
pub struct UsageLogger {
    inner: Arc<Mutex<UsageLoggerInner>>,
    host_id: String,
}

struct UsageLoggerInner {
    writer: Option<BufWriter<File>>,
}

impl UsageLogger {
    /// Create a new usage logger (discards events until `init_file`)
    pub fn new(host_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UsageLoggerInner { writer: None })),
            host_id,
        }
    }

    /// Initialize file logging to the specified path
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));

        info!("Usage logging initialized to {}", path.display());
        Ok(())
    }

    /// Start an event stamped with this logger's host id
    pub fn event(&self, event_type: EventType) -> UsageEvent {
        UsageEvent::new(event_type, self.host_id.clone())
    }

    /// Log a usage event
    pub async fn log(&self, event: UsageEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize usage event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write usage event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush usage log: {}", e);
            }
        }
    }
}
