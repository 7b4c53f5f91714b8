//! Settlement core for the Shift payment protocol
//!
//! Two cooperating registries built on the same pattern of append-only
//! records with guarded state transitions:
//! - [`escrow::EscrowLedger`] holds locked value for an employer/freelancer
//!   engagement until mutual release, arbiter decision, or deadline refund.
//! - [`bridge::BridgeRegistry`] coordinates cross-chain transfer requests
//!   through staked validator attestations until a quorum finalizes them.
//!
//! Neither registry moves value itself; both delegate balance changes to
//! the `shift-ledger` collaborator and write an audit trail of every
//! transition.

pub mod audit;
pub mod bridge;
pub mod error;
pub mod escrow;
pub mod models;
pub mod signature;

use error::SettlementError;

/// Result type alias for settlement operations
pub type SettlementResult<T> = Result<T, SettlementError>;
