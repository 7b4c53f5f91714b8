//! Token ledger capability for the Shift settlement core
//!
//! The settlement registries never move value themselves; they delegate
//! every balance change to a [`Ledger`] collaborator. Each call is atomic
//! from the caller's point of view: a debit either fully succeeds or leaves
//! the account untouched, so a rejected settlement operation never leaves a
//! partial transfer behind.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors surfaced by ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account cannot cover the requested debit
    #[error("insufficient funds for {account}: required {required}, available {available}")]
    InsufficientFunds {
        account: String,
        required: u64,
        available: u64,
    },

    /// Credit would overflow the account balance
    #[error("balance overflow for {account}")]
    BalanceOverflow { account: String },
}

/// Balance-transfer capability consumed by the settlement registries
///
/// Implementations must apply each call atomically: no partial debits, no
/// observable intermediate states between the check and the mutation.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Remove `amount` from `account`, failing if the balance cannot cover it
    async fn debit(&self, account: &str, amount: u64) -> LedgerResult<()>;

    /// Add `amount` to `account`
    async fn credit(&self, account: &str, amount: u64) -> LedgerResult<()>;

    /// Current balance of `account` (zero for unknown accounts)
    async fn balance_of(&self, account: &str) -> u64;
}

/// In-memory ledger backed by a single locked balance map
///
/// In production this would sit in front of the token contract or a
/// database; the lock gives the same atomicity guarantees either way.
#[derive(Default)]
pub struct InMemoryLedger {
    balances: Arc<RwLock<HashMap<String, u64>>>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an account balance, used when bootstrapping and in tests
    pub async fn deposit(&self, account: &str, amount: u64) {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(account.to_string()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn debit(&self, account: &str, amount: u64) -> LedgerResult<()> {
        let mut balances = self.balances.write().await;
        let available = balances.get(account).copied().unwrap_or(0);

        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                account: account.to_string(),
                required: amount,
                available,
            });
        }

        balances.insert(account.to_string(), available - amount);
        debug!("Debited {} from {}", amount, account);

        Ok(())
    }

    async fn credit(&self, account: &str, amount: u64) -> LedgerResult<()> {
        let mut balances = self.balances.write().await;
        let entry = balances.entry(account.to_string()).or_insert(0);

        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| LedgerError::BalanceOverflow {
                account: account.to_string(),
            })?;
        debug!("Credited {} to {}", amount, account);

        Ok(())
    }

    async fn balance_of(&self, account: &str) -> u64 {
        self.balances.read().await.get(account).copied().unwrap_or(0)
    }
}
