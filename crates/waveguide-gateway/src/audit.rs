//! User action audit trail.
//!
//! Registration, login and logout each leave an [`AuditEntry`]. Recording is
//! best-effort: a failing [`AuditLog`] is logged and never fails the request
//! that triggered it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Audited user actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Registration,
    Login,
    Logout,
}

impl UserAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserAction::Registration => "REGISTRATION",
            UserAction::Login => "LOGIN",
            UserAction::Logout => "LOGOUT",
        }
    }
}

/// One recorded action.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: Uuid,
    /// Absent only when the acting token carried no readable `userId`.
    pub user_id: Option<Uuid>,
    pub username: String,
    pub action: UserAction,
    pub details: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("audit log unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of user actions.
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

/// Record `action` for a user, swallowing any failure.
pub async fn record_user_action(
    log: &dyn AuditLog,
    user_id: Option<Uuid>,
    username: &str,
    action: UserAction,
    details: &str,
) {
    let entry = AuditEntry {
        id: Uuid::new_v4(),
        user_id,
        username: username.to_string(),
        action,
        details: details.to_string(),
        recorded_at: Utc::now(),
    };

    match log.append(entry).await {
        Ok(()) => {
            tracing::debug!(target: "waveguide.audit", action = action.as_str(), "Recorded user action");
        }
        Err(e) => {
            tracing::error!(target: "waveguide.audit", action = action.as_str(), error = %e, "Failed to record user action");
        }
    }
}

/// Process-local audit log.
#[derive(Default)]
pub struct InMemoryAuditLog {
    entries: RwLock<Vec<AuditEntry>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, oldest first.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries.write().await.push(entry);
        Ok(())
    }
}
