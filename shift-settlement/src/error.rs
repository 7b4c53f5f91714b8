//! Error types for the settlement core
//!
//! Every operation surfaces failures as synchronous return values; no error
//! crosses the module boundary as a panic, and a rejected operation leaves
//! registry state unchanged. Callers can match on the variant to decide
//! whether a retry makes sense (`InvalidState` after racing a concurrent
//! transition) or not (parameter and authorization failures).

use thiserror::Error;

/// Main error type for escrow and bridge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Malformed, duplicate, or otherwise invalid participant reference
    #[error("Invalid party: {0}")]
    InvalidParty(String),

    /// Authorization signature missing, stale, or not from the sender
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Deadline not strictly in the future at creation time
    #[error("Invalid deadline: {0}")]
    InvalidDeadline(String),

    /// Amount fails a validation rule (zero, or exceeds the escrowed value)
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Transfer amount outside the chain's configured min/max window
    #[error("Amount out of range: {amount} not within [{min}, {max}]")]
    AmountOutOfRange { amount: u64, min: u64, max: u64 },

    /// Chain's daily transfer volume limit would be exceeded
    #[error("Daily limit exceeded for chain {chain_id}: {attempted} over limit {limit}")]
    DailyLimitExceeded {
        chain_id: u64,
        attempted: u64,
        limit: u64,
    },

    /// Employer cannot cover the escrow amount
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Validator stake below the registration minimum
    #[error("Insufficient stake: offered {offered}, minimum {minimum}")]
    InsufficientStake { offered: u64, minimum: u64 },

    /// Sender cannot cover the bridged amount
    #[error("Insufficient payment: {0}")]
    InsufficientPayment(String),

    /// Caller is not the principal required for this operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Record is in a terminal or incompatible state for the transition
    #[error("Invalid state transition: {current} -> {requested}")]
    InvalidState { current: String, requested: String },

    /// Refund attempted before the escrow deadline has passed
    #[error("Deadline not reached: refundable after {deadline}")]
    DeadlineNotReached { deadline: String },

    /// Validator already attested to this request
    #[error("Already validated by {0}")]
    AlreadyValidated(String),

    /// Chain id is already present in the registry
    #[error("Chain {0} already registered")]
    ChainAlreadyRegistered(u64),

    /// Chain is unknown, inactive, or outside the validator's supported set
    #[error("Chain not supported: {0}")]
    ChainNotSupported(u64),

    /// Caller is not an active validator
    #[error("Not an active validator: {0}")]
    NotActiveValidator(String),

    /// Registry is paused for new entries
    #[error("Registry is paused")]
    Paused,

    /// No record under the given id
    #[error("Not found: {0}")]
    NotFound(String),
}

impl SettlementError {
    /// Create an invalid-party error
    pub fn invalid_party<S: Into<String>>(msg: S) -> Self {
        Self::InvalidParty(msg.into())
    }

    /// Create an invalid-signature error
    pub fn invalid_signature<S: Into<String>>(msg: S) -> Self {
        Self::InvalidSignature(msg.into())
    }

    /// Create an invalid-amount error
    pub fn invalid_amount<S: Into<String>>(msg: S) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create an unauthorized error
    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a state transition error
    pub fn invalid_state<S: Into<String>>(current: S, requested: S) -> Self {
        Self::InvalidState {
            current: current.into(),
            requested: requested.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }
}
