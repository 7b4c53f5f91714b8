//! Append-only audit trail for settlement operations
//!
//! Every state transition writes one event here. The log is decoupled from
//! persistence: in production the events would be flushed to a database or
//! an event bus, the registries only ever append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Kind of settlement event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventKind {
    EscrowCreated,
    EscrowReleased,
    EscrowRefunded,
    DisputeOpened,
    DisputeResolved,
    ChainRegistered,
    ChainUpdated,
    ValidatorRegistered,
    ValidatorSlashed,
    RequestCreated,
    RequestValidated,
    RequestCompleted,
}

/// Single audit trail entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,

    // References
    pub escrow_id: Option<u64>,
    pub request_id: Option<Uuid>,

    /// Principal that triggered the transition
    pub actor: Option<String>,

    pub amount: Option<u64>,

    /// Free-form event payload
    pub detail: Option<serde_json::Value>,

    // Immutable once appended
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    /// Create an event with the given kind, remaining fields unset
    pub fn new(kind: AuditEventKind) -> Self {
        Self {
            kind,
            escrow_id: None,
            request_id: None,
            actor: None,
            amount: None,
            detail: None,
            recorded_at: Utc::now(),
        }
    }

    /// Attach an escrow reference
    pub fn escrow(mut self, id: u64) -> Self {
        self.escrow_id = Some(id);
        self
    }

    /// Attach a bridge request reference
    pub fn request(mut self, id: Uuid) -> Self {
        self.request_id = Some(id);
        self
    }

    /// Attach the triggering principal
    pub fn actor<S: Into<String>>(mut self, actor: S) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attach the amount involved
    pub fn amount(mut self, amount: u64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attach a free-form payload
    pub fn detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Shared append-only event log
#[derive(Default, Clone)]
pub struct AuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl AuditLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event
    pub async fn record(&self, event: AuditEvent) {
        self.events.write().await.push(event);
    }

    /// Snapshot of all events in append order
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    /// Events referencing the given escrow
    pub async fn events_for_escrow(&self, escrow_id: u64) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.escrow_id == Some(escrow_id))
            .cloned()
            .collect()
    }

    /// Events referencing the given bridge request
    pub async fn events_for_request(&self, request_id: Uuid) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.request_id == Some(request_id))
            .cloned()
            .collect()
    }
}
