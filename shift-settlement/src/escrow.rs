//! Escrow ledger - settlement state machine for locked engagements
//!
//! Holds value locked by an employer for a freelancer engagement and pays
//! it out exactly once: full release by the employer, full refund after the
//! deadline, or an arbiter-decided split. All registry access goes through
//! a single lock, so conflicting transitions on the same record serialize
//! and the loser fails with `InvalidState`.

use crate::{
    audit::{AuditEvent, AuditEventKind, AuditLog},
    error::SettlementError,
    models::{EscrowRecord, EscrowStatus},
    SettlementResult,
};
use chrono::{DateTime, Utc};
use shift_ledger::{Ledger, LedgerError};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Configuration for the escrow ledger
#[derive(Debug, Clone)]
pub struct EscrowConfig {
    /// Largest amount a single escrow may lock
    pub max_escrow_amount: u64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            max_escrow_amount: 1_000_000_000,
        }
    }
}

/// Escrow creation request
#[derive(Debug, Clone)]
pub struct CreateEscrowRequest {
    pub employer: String,
    pub freelancer: String,
    pub arbiter: String,
    pub amount: u64,
    pub deadline: DateTime<Utc>,
}

/// Registry of escrow records keyed by id
pub struct EscrowLedger {
    config: EscrowConfig,
    /// Administrator allowed to pause intake
    owner: String,
    /// In-memory record storage (in production, this would be a database)
    escrows: Arc<RwLock<HashMap<u64, EscrowRecord>>>,
    next_id: AtomicU64,
    paused: AtomicBool,
    /// Balance-transfer collaborator
    ledger: Arc<dyn Ledger>,
    audit: AuditLog,
}

impl EscrowLedger {
    /// Create a new escrow ledger
    pub fn new(config: EscrowConfig, owner: String, ledger: Arc<dyn Ledger>, audit: AuditLog) -> Self {
        Self {
            config,
            owner,
            escrows: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            paused: AtomicBool::new(false),
            ledger,
            audit,
        }
    }

    /// Create a new escrow, locking `amount` from the employer's balance
    pub async fn create_escrow(&self, request: CreateEscrowRequest) -> SettlementResult<EscrowRecord> {
        if self.paused.load(Ordering::Acquire) {
            return Err(SettlementError::Paused);
        }

        self.validate_create_request(&request)?;

        // Lock the funds before the record exists; a failed debit leaves
        // nothing to clean up
        self.ledger
            .debit(&request.employer, request.amount)
            .await
            .map_err(|err| match err {
                LedgerError::InsufficientFunds { .. } => {
                    SettlementError::InsufficientFunds(err.to_string())
                }
                other => SettlementError::InvalidAmount(other.to_string()),
            })?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = EscrowRecord::new(
            id,
            request.employer,
            request.freelancer,
            request.arbiter,
            request.amount,
            request.deadline,
        );

        self.escrows.write().await.insert(id, record.clone());

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::EscrowCreated)
                    .escrow(id)
                    .actor(record.employer.clone())
                    .amount(record.amount),
            )
            .await;

        info!(
            "Created escrow {} for {} (amount: {})",
            id, record.freelancer, record.amount
        );

        Ok(record)
    }

    /// Release the full amount to the freelancer
    ///
    /// Only the escrow's employer may release, and only while the record is
    /// still Active.
    pub async fn release_to_freelancer(&self, id: u64, caller: &str) -> SettlementResult<EscrowRecord> {
        let mut escrows = self.escrows.write().await;
        let record = Self::get_mut(&mut escrows, id)?;

        if caller != record.employer {
            return Err(SettlementError::unauthorized(
                "only the employer can release escrowed funds",
            ));
        }
        if !record.status.can_release() {
            return Err(SettlementError::invalid_state(
                format!("{:?}", record.status),
                "Released".to_string(),
            ));
        }

        self.ledger
            .credit(&record.freelancer, record.amount)
            .await
            .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;

        record.status = EscrowStatus::Released;
        record.resolved_at = Some(Utc::now());
        let snapshot = record.clone();
        drop(escrows);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::EscrowReleased)
                    .escrow(id)
                    .actor(caller)
                    .amount(snapshot.amount),
            )
            .await;

        info!("Released escrow {} to {}", id, snapshot.freelancer);

        Ok(snapshot)
    }

    /// Refund the full amount to the employer after the deadline
    ///
    /// Expiry is caller-driven: nothing refunds automatically, any of the
    /// three parties may trigger the refund once the deadline has passed.
    pub async fn refund_to_employer(&self, id: u64, caller: &str) -> SettlementResult<EscrowRecord> {
        let mut escrows = self.escrows.write().await;
        let record = Self::get_mut(&mut escrows, id)?;

        if !record.is_party(caller) {
            return Err(SettlementError::unauthorized(
                "only escrow parties can trigger a refund",
            ));
        }
        if !record.status.can_refund() {
            return Err(SettlementError::invalid_state(
                format!("{:?}", record.status),
                "Refunded".to_string(),
            ));
        }
        if Utc::now() < record.deadline {
            return Err(SettlementError::DeadlineNotReached {
                deadline: record.deadline.to_rfc3339(),
            });
        }

        self.ledger
            .credit(&record.employer, record.amount)
            .await
            .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;

        record.status = EscrowStatus::Refunded;
        record.resolved_at = Some(Utc::now());
        let snapshot = record.clone();
        drop(escrows);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::EscrowRefunded)
                    .escrow(id)
                    .actor(caller)
                    .amount(snapshot.amount),
            )
            .await;

        info!("Refunded escrow {} to {}", id, snapshot.employer);

        Ok(snapshot)
    }

    /// Mark the escrow as disputed
    ///
    /// Bookkeeping transition only: the arbiter can resolve straight from
    /// Active, but an open dispute blocks release and refund until resolved.
    pub async fn open_dispute(&self, id: u64, caller: &str) -> SettlementResult<EscrowRecord> {
        let mut escrows = self.escrows.write().await;
        let record = Self::get_mut(&mut escrows, id)?;

        if caller != record.employer && caller != record.freelancer {
            return Err(SettlementError::unauthorized(
                "only employer or freelancer can open a dispute",
            ));
        }
        if !record.status.can_dispute() {
            return Err(SettlementError::invalid_state(
                format!("{:?}", record.status),
                "Disputed".to_string(),
            ));
        }

        record.status = EscrowStatus::Disputed;
        let snapshot = record.clone();
        drop(escrows);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::DisputeOpened)
                    .escrow(id)
                    .actor(caller),
            )
            .await;

        warn!("Dispute opened on escrow {} by {}", id, caller);

        Ok(snapshot)
    }

    /// Resolve a dispute by splitting the locked amount
    ///
    /// Pays `amount` to `recipient` (employer or freelancer) and the
    /// remainder to the other party. Only the escrow's arbiter may resolve.
    pub async fn resolve_dispute(
        &self,
        id: u64,
        caller: &str,
        recipient: &str,
        amount: u64,
    ) -> SettlementResult<EscrowRecord> {
        let mut escrows = self.escrows.write().await;
        let record = Self::get_mut(&mut escrows, id)?;

        if caller != record.arbiter {
            return Err(SettlementError::unauthorized(
                "only the arbiter can resolve disputes",
            ));
        }
        if !record.status.can_resolve() {
            return Err(SettlementError::invalid_state(
                format!("{:?}", record.status),
                "Resolved".to_string(),
            ));
        }
        let counterparty = if recipient == record.freelancer {
            record.employer.clone()
        } else if recipient == record.employer {
            record.freelancer.clone()
        } else {
            return Err(SettlementError::invalid_party(
                "resolution recipient must be the employer or the freelancer",
            ));
        };
        if amount > record.amount {
            return Err(SettlementError::invalid_amount(format!(
                "resolution amount {} exceeds escrowed {}",
                amount, record.amount
            )));
        }

        let remainder = record.amount - amount;

        // The transition commits before the payouts: if a credit fails the
        // record is already terminal, so the resolution can never run twice
        record.status = EscrowStatus::Resolved;
        record.resolved_at = Some(Utc::now());
        let snapshot = record.clone();

        self.ledger
            .credit(recipient, amount)
            .await
            .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;
        if remainder > 0 {
            self.ledger
                .credit(&counterparty, remainder)
                .await
                .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;
        }
        drop(escrows);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::DisputeResolved)
                    .escrow(id)
                    .actor(caller)
                    .amount(amount)
                    .detail(serde_json::json!({
                        "recipient": recipient,
                        "remainder": remainder,
                    })),
            )
            .await;

        info!(
            "Resolved escrow {}: {} to {}, {} to counterparty",
            id, amount, recipient, remainder
        );

        Ok(snapshot)
    }

    /// Get an escrow record by id
    pub async fn get_escrow(&self, id: u64) -> SettlementResult<EscrowRecord> {
        self.escrows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| SettlementError::not_found(format!("escrow {}", id)))
    }

    /// Stop accepting new escrows; in-flight records stay settleable
    pub fn pause(&self, caller: &str) -> SettlementResult<()> {
        if caller != self.owner {
            return Err(SettlementError::unauthorized("only the owner can pause"));
        }
        self.paused.store(true, Ordering::Release);
        warn!("Escrow ledger paused");
        Ok(())
    }

    /// Resume accepting new escrows
    pub fn resume(&self, caller: &str) -> SettlementResult<()> {
        if caller != self.owner {
            return Err(SettlementError::unauthorized("only the owner can resume"));
        }
        self.paused.store(false, Ordering::Release);
        info!("Escrow ledger resumed");
        Ok(())
    }

    fn get_mut(
        escrows: &mut HashMap<u64, EscrowRecord>,
        id: u64,
    ) -> SettlementResult<&mut EscrowRecord> {
        escrows
            .get_mut(&id)
            .ok_or_else(|| SettlementError::not_found(format!("escrow {}", id)))
    }

    /// Validate an escrow creation request
    fn validate_create_request(&self, request: &CreateEscrowRequest) -> SettlementResult<()> {
        for (role, address) in [
            ("employer", &request.employer),
            ("freelancer", &request.freelancer),
            ("arbiter", &request.arbiter),
        ] {
            if address.trim().is_empty() {
                return Err(SettlementError::invalid_party(format!(
                    "{} address cannot be empty",
                    role
                )));
            }
        }
        if request.employer == request.freelancer
            || request.employer == request.arbiter
            || request.freelancer == request.arbiter
        {
            return Err(SettlementError::invalid_party(
                "employer, freelancer, and arbiter must be distinct",
            ));
        }

        if request.amount == 0 {
            return Err(SettlementError::invalid_amount(
                "amount must be greater than 0",
            ));
        }
        if request.amount > self.config.max_escrow_amount {
            return Err(SettlementError::invalid_amount(format!(
                "amount {} exceeds maximum {}",
                request.amount, self.config.max_escrow_amount
            )));
        }

        if request.deadline <= Utc::now() {
            return Err(SettlementError::InvalidDeadline(
                "deadline must be strictly in the future".to_string(),
            ));
        }

        Ok(())
    }
}
