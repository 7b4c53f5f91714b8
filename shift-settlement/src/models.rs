//! Core data models for the settlement registries
//!
//! State machine enums, escrow and bridge records, and the validator and
//! chain registry entries. Records are append-only from the outside: every
//! mutation goes through the owning registry's API and is guarded by the
//! status predicates defined here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Escrow status state machine
///
/// Active is the only non-terminal state reachable after creation; Disputed
/// is a bookkeeping intermediate that still allows arbiter resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Funds locked, awaiting release, refund, or dispute
    Active,
    /// Full amount paid to the freelancer
    Released,
    /// Full amount returned to the employer after the deadline
    Refunded,
    /// Dispute opened by employer or freelancer, awaiting the arbiter
    Disputed,
    /// Arbiter split the amount between the parties
    Resolved,
}

impl EscrowStatus {
    /// Check if this is a terminal state (payout already happened)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded | Self::Resolved)
    }

    /// Check if this state allows release to the freelancer
    pub fn can_release(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows a deadline refund
    pub fn can_refund(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows opening a dispute
    pub fn can_dispute(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Check if this state allows arbiter resolution
    ///
    /// The arbiter may resolve straight from Active; an open dispute is not
    /// a prerequisite.
    pub fn can_resolve(&self) -> bool {
        matches!(self, Self::Active | Self::Disputed)
    }
}

/// Escrow record for a single employer/freelancer engagement
///
/// The locked amount is debited from the employer at creation and paid out
/// exactly once over the record's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowRecord {
    pub id: u64,

    // Parties
    pub employer: String,
    pub freelancer: String,
    pub arbiter: String,

    // Locked value, fixed at creation
    pub amount: u64,

    /// Absolute timestamp after which refund becomes eligible
    pub deadline: DateTime<Utc>,

    pub status: EscrowStatus,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl EscrowRecord {
    /// Create a new active escrow record
    pub fn new(
        id: u64,
        employer: String,
        freelancer: String,
        arbiter: String,
        amount: u64,
        deadline: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            employer,
            freelancer,
            arbiter,
            amount,
            deadline,
            status: EscrowStatus::Active,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Check whether `who` is one of the three named principals
    pub fn is_party(&self, who: &str) -> bool {
        who == self.employer || who == self.freelancer || who == self.arbiter
    }
}

/// Bridge request status state machine
///
/// Transitions run strictly forward: Pending -> Validating -> Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Created, no attestations yet
    Pending,
    /// At least one attestation, quorum not yet reached
    Validating,
    /// Quorum reached, funds released to the recipient
    Completed,
    /// Request failed and will not finalize
    Failed,
    /// Request frozen pending off-protocol review
    Disputed,
}

impl RequestStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check if this state accepts further validator attestations
    pub fn can_validate(&self) -> bool {
        matches!(self, Self::Pending | Self::Validating)
    }
}

/// Cross-chain transfer request coordinated by the bridge registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub id: Uuid,

    // Route
    pub source_chain: u64,
    pub target_chain: u64,

    // Parties and value
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
    pub token_symbol: String,

    /// Sender's hex-encoded transfer authorization signature
    pub signature: String,

    pub status: RequestStatus,

    /// Addresses of validators that attested, in attestation order
    pub validations: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BridgeRequest {
    /// Check whether `validator` already attested to this request
    pub fn has_validated(&self, validator: &str) -> bool {
        self.validations.iter().any(|v| v == validator)
    }
}

/// Registry entry for a staked bridge validator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub address: String,

    /// Bonded stake, strictly decreased by slashing
    pub stake: u64,

    /// Active exactly while stake covers the registry minimum
    pub is_active: bool,

    /// Chain ids this validator attests for
    pub supported_chains: Vec<u64>,

    /// Lifetime count of accepted attestations
    pub validation_count: u64,

    pub registered_at: DateTime<Utc>,
}

impl ValidatorInfo {
    /// Check whether this validator attests for `chain_id`
    pub fn supports_chain(&self, chain_id: u64) -> bool {
        self.supported_chains.contains(&chain_id)
    }
}

/// Transfer policy for a registered chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Smallest transfer the chain accepts
    pub min_transfer_amount: u64,
    /// Largest transfer the chain accepts
    pub max_transfer_amount: u64,
    /// Total volume accepted per UTC day
    pub daily_limit: u64,
    /// Bridge fee in basis points, deducted from the payout
    pub fee_bps: u32,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            min_transfer_amount: 1,
            max_transfer_amount: 1_000_000_000,
            daily_limit: 10_000_000_000,
            fee_bps: 0,
        }
    }
}

/// Registry entry for a registered chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainInfo {
    pub chain_id: u64,
    pub name: String,

    /// Bridge contract address on the remote chain
    pub remote_contract: String,

    /// Confirmations required before attestations count
    pub confirmations: u32,

    pub is_active: bool,
    pub settings: ChainSettings,
    pub registered_at: DateTime<Utc>,
}

/// Auditable record of a validator slash
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlashRecord {
    pub validator: String,
    pub amount: u64,
    pub reason: String,
    pub slashed_at: DateTime<Utc>,
}
