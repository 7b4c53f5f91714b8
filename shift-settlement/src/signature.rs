//! Transfer authorization signatures for bridge requests
//!
//! A cross-chain request carries an ECDSA signature from the sender over
//! the full transfer tuple (target chain, recipient, amount, token symbol,
//! timestamp). Binding every field plus the timestamp into the digest
//! prevents a captured signature from being replayed for a different
//! transfer or replayed later; the registry additionally enforces a
//! freshness window on the timestamp.
//!
//! Sender addresses are hex-encoded compressed secp256k1 public keys, so
//! verification needs no recovery step.

use crate::{error::SettlementError, SettlementResult};
use chrono::{DateTime, Utc};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey, Verification};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sender authorization accompanying a cross-chain request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferAuthorization {
    /// Hex-encoded compact ECDSA signature over the transfer digest
    pub signature: String,
    /// Signing time, bound into the digest and checked for freshness
    pub timestamp: DateTime<Utc>,
}

/// Hex address for a secp256k1 public key (compressed encoding)
pub fn address_for(public_key: &PublicKey) -> String {
    hex::encode(public_key.serialize())
}

/// Digest of the transfer tuple a sender signs
///
/// Fields are length-prefixed where variable-sized so no two distinct
/// tuples can collide on the same byte stream.
pub fn transfer_digest(
    target_chain: u64,
    recipient: &str,
    amount: u64,
    token_symbol: &str,
    timestamp: DateTime<Utc>,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(target_chain.to_be_bytes());
    hasher.update((recipient.len() as u64).to_be_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.update((token_symbol.len() as u64).to_be_bytes());
    hasher.update(token_symbol.as_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.finalize().into()
}

/// Produce a transfer authorization for the given secret key
///
/// Client-side counterpart of [`verify_transfer`]; the registry never signs.
pub fn sign_transfer(
    secret_key: &SecretKey,
    target_chain: u64,
    recipient: &str,
    amount: u64,
    token_symbol: &str,
    timestamp: DateTime<Utc>,
) -> TransferAuthorization {
    let secp = Secp256k1::new();
    let digest = transfer_digest(target_chain, recipient, amount, token_symbol, timestamp);
    // Digest is a fixed 32 bytes, so Message construction cannot fail
    let message = Message::from_digest_slice(&digest).expect("32-byte digest");
    let signature = secp.sign_ecdsa(&message, secret_key);

    TransferAuthorization {
        signature: hex::encode(signature.serialize_compact()),
        timestamp,
    }
}

/// Verify a transfer authorization against the sender's address
pub fn verify_transfer<C: Verification>(
    secp: &Secp256k1<C>,
    sender: &str,
    target_chain: u64,
    recipient: &str,
    amount: u64,
    token_symbol: &str,
    authorization: &TransferAuthorization,
) -> SettlementResult<()> {
    let key_bytes = hex::decode(sender)
        .map_err(|_| SettlementError::invalid_party("sender address is not valid hex"))?;
    let public_key = PublicKey::from_slice(&key_bytes)
        .map_err(|_| SettlementError::invalid_party("sender address is not a valid public key"))?;

    let sig_bytes = hex::decode(&authorization.signature)
        .map_err(|_| SettlementError::invalid_signature("signature is not valid hex"))?;
    let signature = Signature::from_compact(&sig_bytes)
        .map_err(|_| SettlementError::invalid_signature("malformed compact signature"))?;

    let digest = transfer_digest(
        target_chain,
        recipient,
        amount,
        token_symbol,
        authorization.timestamp,
    );
    let message = Message::from_digest_slice(&digest).expect("32-byte digest");

    secp.verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| SettlementError::invalid_signature("signature does not match sender"))
}
