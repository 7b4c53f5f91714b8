//! Bridge registry - validator-quorum cross-chain request protocol
//!
//! Coordinates a value transfer claim from this chain to a registered
//! target chain. The sender's funds are escrowed by the registry at request
//! creation; independent staked validators attest to the request, and once
//! a fixed quorum of attestations is reached the request finalizes and the
//! escrowed amount is released to the recipient.
//!
//! Lock discipline: the validators lock is always taken before the
//! requests lock, and the chains lock is never held while acquiring either
//! of them. Slashing and validation contend on the same validators lock,
//! so a slash that deactivates a validator is visible to every attestation
//! that serializes after it.

use crate::{
    audit::{AuditEvent, AuditEventKind, AuditLog},
    error::SettlementError,
    models::{BridgeRequest, ChainInfo, ChainSettings, RequestStatus, SlashRecord, ValidatorInfo},
    signature::{self, TransferAuthorization},
    SettlementResult,
};
use chrono::{Duration, NaiveDate, Utc};
use secp256k1::{Secp256k1, VerifyOnly};
use shift_ledger::{Ledger, LedgerError};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

/// Configuration for the bridge registry
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Minimum stake to register and stay active as a validator
    pub min_validator_stake: u64,
    /// Distinct attestations required to finalize a request
    ///
    /// A fixed small-committee constant rather than a fraction of the
    /// registered validator set.
    pub quorum_threshold: usize,
    /// Freshness window for transfer authorization timestamps
    pub signature_max_age_secs: i64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            min_validator_stake: 100_000,
            quorum_threshold: 3,
            signature_max_age_secs: 3600, // 1 hour
        }
    }
}

/// Per-chain registry entry plus its rolling daily-volume window
#[derive(Debug, Clone)]
struct ChainState {
    info: ChainInfo,
    volume_date: NaiveDate,
    volume_today: u64,
}

/// Registry coordinating cross-chain requests, validators, and chains
pub struct BridgeRegistry {
    config: BridgeConfig,
    /// Administrator for chain registration, slashing, and pausing
    owner: String,
    /// Chain id this registry settles from
    source_chain_id: u64,
    /// In-memory registries (in production, these would be a database)
    chains: Arc<RwLock<HashMap<u64, ChainState>>>,
    validators: Arc<RwLock<HashMap<String, ValidatorInfo>>>,
    requests: Arc<RwLock<HashMap<Uuid, BridgeRequest>>>,
    slashes: Arc<RwLock<Vec<SlashRecord>>>,
    paused: AtomicBool,
    ledger: Arc<dyn Ledger>,
    audit: AuditLog,
    secp: Secp256k1<VerifyOnly>,
}

impl BridgeRegistry {
    /// Create a new bridge registry for the given source chain
    pub fn new(
        config: BridgeConfig,
        owner: String,
        source_chain_id: u64,
        ledger: Arc<dyn Ledger>,
        audit: AuditLog,
    ) -> Self {
        Self {
            config,
            owner,
            source_chain_id,
            chains: Arc::new(RwLock::new(HashMap::new())),
            validators: Arc::new(RwLock::new(HashMap::new())),
            requests: Arc::new(RwLock::new(HashMap::new())),
            slashes: Arc::new(RwLock::new(Vec::new())),
            paused: AtomicBool::new(false),
            ledger,
            audit,
            secp: Secp256k1::verification_only(),
        }
    }

    /// Register a target chain with its transfer policy
    pub async fn register_chain(
        &self,
        caller: &str,
        chain_id: u64,
        name: String,
        remote_contract: String,
        confirmations: u32,
        settings: ChainSettings,
    ) -> SettlementResult<ChainInfo> {
        self.require_owner(caller)?;
        Self::validate_settings(&settings)?;

        let mut chains = self.chains.write().await;
        if chains.contains_key(&chain_id) {
            return Err(SettlementError::ChainAlreadyRegistered(chain_id));
        }

        let chain_info = ChainInfo {
            chain_id,
            name: name.clone(),
            remote_contract,
            confirmations,
            is_active: true,
            settings,
            registered_at: Utc::now(),
        };
        chains.insert(
            chain_id,
            ChainState {
                info: chain_info.clone(),
                volume_date: Utc::now().date_naive(),
                volume_today: 0,
            },
        );
        drop(chains);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ChainRegistered)
                    .actor(caller)
                    .detail(serde_json::json!({ "chain_id": chain_id, "name": name })),
            )
            .await;

        info!("Registered chain {} ({})", chain_id, chain_info.name);

        Ok(chain_info)
    }

    /// Update a registered chain's confirmations and transfer policy
    pub async fn update_chain_settings(
        &self,
        caller: &str,
        chain_id: u64,
        confirmations: u32,
        settings: ChainSettings,
    ) -> SettlementResult<ChainInfo> {
        self.require_owner(caller)?;
        Self::validate_settings(&settings)?;

        let mut chains = self.chains.write().await;
        let state = chains
            .get_mut(&chain_id)
            .ok_or(SettlementError::ChainNotSupported(chain_id))?;
        state.info.confirmations = confirmations;
        state.info.settings = settings;
        let snapshot = state.info.clone();
        drop(chains);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ChainUpdated)
                    .actor(caller)
                    .detail(serde_json::json!({ "chain_id": chain_id })),
            )
            .await;

        Ok(snapshot)
    }

    /// Register the caller as a validator, bonding `stake`
    pub async fn register_validator(
        &self,
        caller: &str,
        supported_chains: Vec<u64>,
        stake: u64,
    ) -> SettlementResult<ValidatorInfo> {
        if self.paused.load(Ordering::Acquire) {
            return Err(SettlementError::Paused);
        }
        if stake < self.config.min_validator_stake {
            return Err(SettlementError::InsufficientStake {
                offered: stake,
                minimum: self.config.min_validator_stake,
            });
        }
        if supported_chains.is_empty() {
            return Err(SettlementError::invalid_party(
                "validator must support at least one chain",
            ));
        }

        let mut validators = self.validators.write().await;
        if validators.contains_key(caller) {
            return Err(SettlementError::invalid_party(format!(
                "validator {} already registered",
                caller
            )));
        }

        // Bond the stake before the entry becomes visible
        self.ledger
            .debit(caller, stake)
            .await
            .map_err(|err| SettlementError::InsufficientFunds(err.to_string()))?;

        let validator = ValidatorInfo {
            address: caller.to_string(),
            stake,
            is_active: true,
            supported_chains,
            validation_count: 0,
            registered_at: Utc::now(),
        };
        validators.insert(caller.to_string(), validator.clone());
        drop(validators);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ValidatorRegistered)
                    .actor(caller)
                    .amount(stake),
            )
            .await;

        info!("Registered validator {} (stake: {})", caller, stake);

        Ok(validator)
    }

    /// Create a cross-chain transfer request, escrowing the sender's funds
    ///
    /// The authorization signature must bind the full transfer tuple and
    /// carry a timestamp inside the freshness window; the amount must fall
    /// within the target chain's policy and its remaining daily volume.
    pub async fn create_cross_chain_request(
        &self,
        sender: &str,
        target_chain: u64,
        recipient: String,
        amount: u64,
        token_symbol: String,
        authorization: TransferAuthorization,
    ) -> SettlementResult<BridgeRequest> {
        if self.paused.load(Ordering::Acquire) {
            return Err(SettlementError::Paused);
        }
        if recipient.trim().is_empty() {
            return Err(SettlementError::invalid_party(
                "recipient address cannot be empty",
            ));
        }

        let mut chains = self.chains.write().await;
        let state = chains
            .get_mut(&target_chain)
            .filter(|s| s.info.is_active)
            .ok_or(SettlementError::ChainNotSupported(target_chain))?;

        let settings = &state.info.settings;
        if amount < settings.min_transfer_amount || amount > settings.max_transfer_amount {
            return Err(SettlementError::AmountOutOfRange {
                amount,
                min: settings.min_transfer_amount,
                max: settings.max_transfer_amount,
            });
        }

        // Daily window rolls over on the UTC date
        let today = Utc::now().date_naive();
        if state.volume_date != today {
            state.volume_date = today;
            state.volume_today = 0;
        }
        let attempted = state.volume_today.saturating_add(amount);
        if attempted > settings.daily_limit {
            return Err(SettlementError::DailyLimitExceeded {
                chain_id: target_chain,
                attempted,
                limit: settings.daily_limit,
            });
        }

        let age = Utc::now().signed_duration_since(authorization.timestamp);
        let window = Duration::seconds(self.config.signature_max_age_secs);
        if age > window || age < -window {
            return Err(SettlementError::invalid_signature(
                "authorization timestamp outside the freshness window",
            ));
        }
        signature::verify_transfer(
            &self.secp,
            sender,
            target_chain,
            &recipient,
            amount,
            &token_symbol,
            &authorization,
        )?;

        // All checks passed; escrow the transfer amount
        self.ledger.debit(sender, amount).await.map_err(|err| match err {
            LedgerError::InsufficientFunds { .. } => {
                SettlementError::InsufficientPayment(err.to_string())
            }
            other => SettlementError::InvalidAmount(other.to_string()),
        })?;
        state.volume_today = attempted;
        drop(chains);

        let request = BridgeRequest {
            id: Uuid::new_v4(),
            source_chain: self.source_chain_id,
            target_chain,
            sender: sender.to_string(),
            recipient,
            amount,
            token_symbol,
            signature: authorization.signature,
            status: RequestStatus::Pending,
            validations: Vec::new(),
            created_at: Utc::now(),
            completed_at: None,
        };
        self.requests.write().await.insert(request.id, request.clone());

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::RequestCreated)
                    .request(request.id)
                    .actor(sender)
                    .amount(amount),
            )
            .await;

        info!(
            "Created cross-chain request {} ({} -> chain {})",
            request.id, request.amount, request.target_chain
        );

        Ok(request)
    }

    /// Record a validator attestation; finalizes the request at quorum
    ///
    /// On finalization the escrowed amount, minus the chain fee, is
    /// credited to the recipient; the fee goes to the registry owner.
    pub async fn validate_request(
        &self,
        caller: &str,
        request_id: Uuid,
        proof: String,
    ) -> SettlementResult<BridgeRequest> {
        let mut validators = self.validators.write().await;
        let validator = validators
            .get_mut(caller)
            .filter(|v| v.is_active)
            .ok_or_else(|| SettlementError::NotActiveValidator(caller.to_string()))?;

        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&request_id)
            .ok_or_else(|| SettlementError::not_found(format!("request {}", request_id)))?;

        if !request.status.can_validate() {
            return Err(SettlementError::invalid_state(
                format!("{:?}", request.status),
                "Validating".to_string(),
            ));
        }
        if !validator.supports_chain(request.target_chain) {
            return Err(SettlementError::ChainNotSupported(request.target_chain));
        }
        if request.has_validated(caller) {
            return Err(SettlementError::AlreadyValidated(caller.to_string()));
        }

        request.validations.push(caller.to_string());
        request.status = RequestStatus::Validating;
        validator.validation_count += 1;
        drop(validators);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::RequestValidated)
                    .request(request_id)
                    .actor(caller)
                    .detail(serde_json::json!({
                        "proof": proof,
                        "validations": request.validations.len(),
                    })),
            )
            .await;

        info!(
            "Request {} validated by {} ({}/{})",
            request_id,
            caller,
            request.validations.len(),
            self.config.quorum_threshold
        );

        if request.validations.len() >= self.config.quorum_threshold {
            let fee = Self::fee_for(&self.chain_settings(request.target_chain).await?, request.amount);
            let payout = request.amount - fee;

            // Finalize before releasing funds: with the request already
            // terminal, a failed credit cannot let a later attestation
            // re-enter this branch and pay out a second time
            request.status = RequestStatus::Completed;
            request.completed_at = Some(Utc::now());

            self.ledger
                .credit(&request.recipient, payout)
                .await
                .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;
            if fee > 0 {
                self.ledger
                    .credit(&self.owner, fee)
                    .await
                    .map_err(|err| SettlementError::InvalidAmount(err.to_string()))?;
            }

            self.audit
                .record(
                    AuditEvent::new(AuditEventKind::RequestCompleted)
                        .request(request_id)
                        .amount(payout),
                )
                .await;

            info!(
                "Request {} completed: {} to {} (fee: {})",
                request_id, payout, request.recipient, fee
            );
        }

        Ok(request.clone())
    }

    /// Punitively reduce a validator's stake
    ///
    /// Dropping below the minimum stake deactivates the validator; any
    /// attestation serialized after the slash fails `NotActiveValidator`.
    pub async fn slash_validator(
        &self,
        caller: &str,
        validator_address: &str,
        amount: u64,
        reason: String,
    ) -> SettlementResult<ValidatorInfo> {
        self.require_owner(caller)?;
        if amount == 0 {
            return Err(SettlementError::invalid_amount(
                "slash amount must be greater than 0",
            ));
        }

        let mut validators = self.validators.write().await;
        let validator = validators
            .get_mut(validator_address)
            .ok_or_else(|| SettlementError::not_found(format!("validator {}", validator_address)))?;

        if amount > validator.stake {
            return Err(SettlementError::invalid_amount(format!(
                "slash amount {} exceeds stake {}",
                amount, validator.stake
            )));
        }

        validator.stake -= amount;
        if validator.stake < self.config.min_validator_stake {
            validator.is_active = false;
        }
        let snapshot = validator.clone();
        drop(validators);

        let record = SlashRecord {
            validator: validator_address.to_string(),
            amount,
            reason: reason.clone(),
            slashed_at: Utc::now(),
        };
        self.slashes.write().await.push(record);

        self.audit
            .record(
                AuditEvent::new(AuditEventKind::ValidatorSlashed)
                    .actor(validator_address)
                    .amount(amount)
                    .detail(serde_json::json!({ "reason": reason })),
            )
            .await;

        warn!(
            "Slashed validator {} by {} ({}); active: {}",
            validator_address, amount, reason, snapshot.is_active
        );

        Ok(snapshot)
    }

    /// Get a bridge request by id
    pub async fn get_request_info(&self, request_id: Uuid) -> SettlementResult<BridgeRequest> {
        self.requests
            .read()
            .await
            .get(&request_id)
            .cloned()
            .ok_or_else(|| SettlementError::not_found(format!("request {}", request_id)))
    }

    /// Get a validator registry entry by address
    pub async fn get_validator_info(&self, address: &str) -> SettlementResult<ValidatorInfo> {
        self.validators
            .read()
            .await
            .get(address)
            .cloned()
            .ok_or_else(|| SettlementError::not_found(format!("validator {}", address)))
    }

    /// Get a chain registry entry by id
    pub async fn get_chain_info(&self, chain_id: u64) -> SettlementResult<ChainInfo> {
        self.chains
            .read()
            .await
            .get(&chain_id)
            .map(|state| state.info.clone())
            .ok_or_else(|| SettlementError::not_found(format!("chain {}", chain_id)))
    }

    /// Snapshot of the slash trail in append order
    pub async fn slash_records(&self) -> Vec<SlashRecord> {
        self.slashes.read().await.clone()
    }

    /// Stop accepting new requests and validator registrations
    pub fn pause(&self, caller: &str) -> SettlementResult<()> {
        self.require_owner(caller)?;
        self.paused.store(true, Ordering::Release);
        warn!("Bridge registry paused");
        Ok(())
    }

    /// Resume accepting new requests and validator registrations
    pub fn resume(&self, caller: &str) -> SettlementResult<()> {
        self.require_owner(caller)?;
        self.paused.store(false, Ordering::Release);
        info!("Bridge registry resumed");
        Ok(())
    }

    fn require_owner(&self, caller: &str) -> SettlementResult<()> {
        if caller != self.owner {
            return Err(SettlementError::unauthorized(
                "caller is not the registry owner",
            ));
        }
        Ok(())
    }

    async fn chain_settings(&self, chain_id: u64) -> SettlementResult<ChainSettings> {
        self.chains
            .read()
            .await
            .get(&chain_id)
            .map(|state| state.info.settings.clone())
            .ok_or(SettlementError::ChainNotSupported(chain_id))
    }

    fn fee_for(settings: &ChainSettings, amount: u64) -> u64 {
        amount / 10_000 * u64::from(settings.fee_bps)
            + amount % 10_000 * u64::from(settings.fee_bps) / 10_000
    }

    /// Validate a chain's transfer policy
    fn validate_settings(settings: &ChainSettings) -> SettlementResult<()> {
        if settings.min_transfer_amount >= settings.max_transfer_amount {
            return Err(SettlementError::invalid_amount(
                "min transfer amount must be below max transfer amount",
            ));
        }
        if settings.fee_bps > 10_000 {
            return Err(SettlementError::invalid_amount(
                "fee cannot exceed 10000 basis points",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{address_for, sign_transfer};
    use secp256k1::{rand, SecretKey};
    use shift_ledger::InMemoryLedger;

    const OWNER: &str = "bridge-owner";
    const SOURCE_CHAIN: u64 = 1;
    const TARGET_CHAIN: u64 = 137;
    const STAKE: u64 = 100_000;
    const VALIDATORS: [&str; 3] = ["validator-1", "validator-2", "validator-3"];

    fn sender_keypair() -> (SecretKey, String) {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::new(&mut rand::thread_rng());
        let address = address_for(&secret_key.public_key(&secp));
        (secret_key, address)
    }

    async fn setup() -> (BridgeRegistry, Arc<InMemoryLedger>) {
        setup_with_settings(ChainSettings {
            min_transfer_amount: 10,
            max_transfer_amount: 100_000,
            daily_limit: 200_000,
            fee_bps: 0,
        })
        .await
    }

    async fn setup_with_settings(settings: ChainSettings) -> (BridgeRegistry, Arc<InMemoryLedger>) {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let ledger = Arc::new(InMemoryLedger::new());
        let registry = BridgeRegistry::new(
            BridgeConfig::default(),
            OWNER.to_string(),
            SOURCE_CHAIN,
            ledger.clone(),
            AuditLog::new(),
        );

        registry
            .register_chain(
                OWNER,
                TARGET_CHAIN,
                "Polygon".to_string(),
                "0x0".to_string(),
                12,
                settings,
            )
            .await
            .unwrap();

        for validator in VALIDATORS {
            ledger.deposit(validator, STAKE).await;
            registry
                .register_validator(validator, vec![SOURCE_CHAIN, TARGET_CHAIN], STAKE)
                .await
                .unwrap();
        }

        (registry, ledger)
    }

    async fn funded_request(
        registry: &BridgeRegistry,
        ledger: &InMemoryLedger,
        amount: u64,
    ) -> BridgeRequest {
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, amount).await;
        let now = Utc::now();
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", amount, "ETH", now);

        registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                amount,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_chain_and_duplicates() {
        let (registry, _) = setup().await;

        let info = registry.get_chain_info(TARGET_CHAIN).await.unwrap();
        assert_eq!(info.name, "Polygon");
        assert!(info.is_active);
        assert_eq!(info.confirmations, 12);

        let err = registry
            .register_chain(
                OWNER,
                TARGET_CHAIN,
                "Polygon".to_string(),
                "0x0".to_string(),
                12,
                ChainSettings::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, SettlementError::ChainAlreadyRegistered(TARGET_CHAIN));

        assert!(matches!(
            registry
                .register_chain(
                    "stranger",
                    56,
                    "BSC".to_string(),
                    "0x0".to_string(),
                    12,
                    ChainSettings::default(),
                )
                .await
                .unwrap_err(),
            SettlementError::Unauthorized(_)
        ));
    }

    #[tokio::test]
    async fn test_register_chain_validates_settings() {
        let (registry, _) = setup().await;

        let inverted = ChainSettings {
            min_transfer_amount: 100,
            max_transfer_amount: 100,
            ..ChainSettings::default()
        };
        let err = registry
            .register_chain(OWNER, 56, "BSC".to_string(), "0x0".to_string(), 12, inverted)
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn test_update_chain_settings() {
        let (registry, _) = setup().await;

        let updated = registry
            .update_chain_settings(
                OWNER,
                TARGET_CHAIN,
                24,
                ChainSettings {
                    min_transfer_amount: 5,
                    max_transfer_amount: 50_000,
                    daily_limit: 100_000,
                    fee_bps: 25,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.confirmations, 24);
        assert_eq!(updated.settings.fee_bps, 25);
    }

    #[tokio::test]
    async fn test_register_validator_requires_minimum_stake() {
        let (registry, ledger) = setup().await;
        ledger.deposit("validator-4", STAKE).await;

        let err = registry
            .register_validator("validator-4", vec![TARGET_CHAIN], STAKE - 1)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::InsufficientStake {
                offered: STAKE - 1,
                minimum: STAKE,
            }
        );

        let validator = registry
            .register_validator("validator-4", vec![TARGET_CHAIN], STAKE)
            .await
            .unwrap();
        assert!(validator.is_active);
        assert_eq!(validator.stake, STAKE);
        assert_eq!(validator.validation_count, 0);
        // Stake is bonded out of the validator's balance
        assert_eq!(ledger.balance_of("validator-4").await, 0);

        // Double registration is rejected
        ledger.deposit("validator-4", STAKE).await;
        assert!(matches!(
            registry
                .register_validator("validator-4", vec![TARGET_CHAIN], STAKE)
                .await
                .unwrap_err(),
            SettlementError::InvalidParty(_)
        ));
    }

    #[tokio::test]
    async fn test_create_request_escrows_sender_funds() {
        let (registry, ledger) = setup().await;
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 5_000).await;

        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 1_000, "ETH", Utc::now());
        let request = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                1_000,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap();

        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.source_chain, SOURCE_CHAIN);
        assert_eq!(request.target_chain, TARGET_CHAIN);
        assert_eq!(request.sender, sender);
        assert_eq!(request.recipient, "recipient-1");
        assert_eq!(request.token_symbol, "ETH");
        assert!(request.validations.is_empty());
        assert_eq!(ledger.balance_of(&sender).await, 4_000);

        let fetched = registry.get_request_info(request.id).await.unwrap();
        assert_eq!(fetched.amount, 1_000);
    }

    #[tokio::test]
    async fn test_create_request_rejects_bad_authorization() {
        let (registry, ledger) = setup().await;
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 5_000).await;

        // Signature over a different amount
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 999, "ETH", Utc::now());
        let err = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                1_000,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidSignature(_)));

        // Stale timestamp outside the freshness window
        let stale = Utc::now() - Duration::hours(2);
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 1_000, "ETH", stale);
        let err = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                1_000,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidSignature(_)));

        // Future-dated timestamp outside the freshness window
        let future = Utc::now() + Duration::hours(2);
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 1_000, "ETH", future);
        let err = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                1_000,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidSignature(_)));

        // Rejected requests never touch the sender's balance
        assert_eq!(ledger.balance_of(&sender).await, 5_000);
    }

    #[tokio::test]
    async fn test_create_request_enforces_chain_policy() {
        let (registry, ledger) = setup().await;
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 500_000).await;
        let now = Utc::now();

        // Unregistered chain
        let auth = sign_transfer(&secret_key, 99, "recipient-1", 1_000, "ETH", now);
        assert_eq!(
            registry
                .create_cross_chain_request(
                    &sender,
                    99,
                    "recipient-1".to_string(),
                    1_000,
                    "ETH".to_string(),
                    auth,
                )
                .await
                .unwrap_err(),
            SettlementError::ChainNotSupported(99)
        );

        // Below minimum
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 5, "ETH", now);
        assert!(matches!(
            registry
                .create_cross_chain_request(
                    &sender,
                    TARGET_CHAIN,
                    "recipient-1".to_string(),
                    5,
                    "ETH".to_string(),
                    auth,
                )
                .await
                .unwrap_err(),
            SettlementError::AmountOutOfRange { amount: 5, .. }
        ));

        // Above maximum
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 200_000, "ETH", now);
        assert!(matches!(
            registry
                .create_cross_chain_request(
                    &sender,
                    TARGET_CHAIN,
                    "recipient-1".to_string(),
                    200_000,
                    "ETH".to_string(),
                    auth,
                )
                .await
                .unwrap_err(),
            SettlementError::AmountOutOfRange { .. }
        ));
    }

    #[tokio::test]
    async fn test_create_request_enforces_daily_limit() {
        let (registry, ledger) = setup().await;
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 400_000).await;
        let now = Utc::now();

        // Two max transfers exhaust the 200k daily limit
        for _ in 0..2 {
            let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 100_000, "ETH", now);
            registry
                .create_cross_chain_request(
                    &sender,
                    TARGET_CHAIN,
                    "recipient-1".to_string(),
                    100_000,
                    "ETH".to_string(),
                    auth,
                )
                .await
                .unwrap();
        }

        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 100, "ETH", now);
        let err = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                100,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::DailyLimitExceeded { .. }));
    }

    #[tokio::test]
    async fn test_create_request_requires_payment() {
        let (registry, ledger) = setup().await;
        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 100).await;

        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 1_000, "ETH", Utc::now());
        let err = registry
            .create_cross_chain_request(
                &sender,
                TARGET_CHAIN,
                "recipient-1".to_string(),
                1_000,
                "ETH".to_string(),
                auth,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientPayment(_)));
        assert_eq!(ledger.balance_of(&sender).await, 100);
    }

    #[tokio::test]
    async fn test_quorum_completes_request_and_pays_recipient() {
        let (registry, ledger) = setup().await;
        let request = funded_request(&registry, &ledger, 1_000).await;

        // First two attestations leave the request short of quorum
        for validator in &VALIDATORS[..2] {
            let updated = registry
                .validate_request(validator, request.id, "proof".to_string())
                .await
                .unwrap();
            assert_eq!(updated.status, RequestStatus::Validating);
        }
        assert_eq!(ledger.balance_of("recipient-1").await, 0);

        // Third attestation reaches quorum and finalizes
        let completed = registry
            .validate_request(VALIDATORS[2], request.id, "proof".to_string())
            .await
            .unwrap();
        assert_eq!(completed.status, RequestStatus::Completed);
        assert_eq!(completed.validations.len(), 3);
        assert!(completed.completed_at.is_some());
        assert_eq!(ledger.balance_of("recipient-1").await, 1_000);

        let fetched = registry.get_request_info(request.id).await.unwrap();
        assert_eq!(fetched.status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn test_validator_cannot_attest_twice() {
        let (registry, ledger) = setup().await;
        let request = funded_request(&registry, &ledger, 1_000).await;

        registry
            .validate_request(VALIDATORS[0], request.id, "proof".to_string())
            .await
            .unwrap();
        let err = registry
            .validate_request(VALIDATORS[0], request.id, "proof".to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::AlreadyValidated(VALIDATORS[0].to_string())
        );

        let info = registry.get_validator_info(VALIDATORS[0]).await.unwrap();
        assert_eq!(info.validation_count, 1);
    }

    #[tokio::test]
    async fn test_completed_request_rejects_further_attestations() {
        let (registry, ledger) = setup().await;
        ledger.deposit("validator-4", STAKE).await;
        registry
            .register_validator("validator-4", vec![TARGET_CHAIN], STAKE)
            .await
            .unwrap();

        let request = funded_request(&registry, &ledger, 1_000).await;
        for validator in VALIDATORS {
            registry
                .validate_request(validator, request.id, "proof".to_string())
                .await
                .unwrap();
        }

        let err = registry
            .validate_request("validator-4", request.id, "proof".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidState { .. }));
        // Completion pays out exactly once
        assert_eq!(ledger.balance_of("recipient-1").await, 1_000);
    }

    #[tokio::test]
    async fn test_validation_requires_supported_chain_and_registration() {
        let (registry, ledger) = setup().await;
        let request = funded_request(&registry, &ledger, 1_000).await;

        assert_eq!(
            registry
                .validate_request("stranger", request.id, "proof".to_string())
                .await
                .unwrap_err(),
            SettlementError::NotActiveValidator("stranger".to_string())
        );

        // Active validator that does not support the target chain
        ledger.deposit("validator-5", STAKE).await;
        registry
            .register_validator("validator-5", vec![SOURCE_CHAIN], STAKE)
            .await
            .unwrap();
        assert_eq!(
            registry
                .validate_request("validator-5", request.id, "proof".to_string())
                .await
                .unwrap_err(),
            SettlementError::ChainNotSupported(TARGET_CHAIN)
        );
    }

    #[tokio::test]
    async fn test_slash_reduces_stake_and_deactivates_below_minimum() {
        let (registry, ledger) = setup().await;
        let request = funded_request(&registry, &ledger, 1_000).await;

        assert!(matches!(
            registry
                .slash_validator("stranger", VALIDATORS[0], 1, "nope".to_string())
                .await
                .unwrap_err(),
            SettlementError::Unauthorized(_)
        ));

        let slashed = registry
            .slash_validator(OWNER, VALIDATORS[0], 50_000, "missed attestations".to_string())
            .await
            .unwrap();
        assert_eq!(slashed.stake, STAKE - 50_000);
        assert!(!slashed.is_active);

        // A deactivated validator can no longer attest
        let err = registry
            .validate_request(VALIDATORS[0], request.id, "proof".to_string())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::NotActiveValidator(VALIDATORS[0].to_string())
        );

        let records = registry.slash_records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].validator, VALIDATORS[0]);
        assert_eq!(records[0].amount, 50_000);
        assert_eq!(records[0].reason, "missed attestations");
    }

    #[tokio::test]
    async fn test_slash_cannot_exceed_stake() {
        let (registry, _) = setup().await;

        let err = registry
            .slash_validator(OWNER, VALIDATORS[0], STAKE + 1, "overreach".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount(_)));

        let info = registry.get_validator_info(VALIDATORS[0]).await.unwrap();
        assert_eq!(info.stake, STAKE);
        assert!(info.is_active);
    }

    #[tokio::test]
    async fn test_chain_fee_is_deducted_from_payout() {
        let (registry, ledger) = setup_with_settings(ChainSettings {
            min_transfer_amount: 10,
            max_transfer_amount: 100_000,
            daily_limit: 200_000,
            fee_bps: 100, // 1%
        })
        .await;

        let request = funded_request(&registry, &ledger, 10_000).await;
        for validator in VALIDATORS {
            registry
                .validate_request(validator, request.id, "proof".to_string())
                .await
                .unwrap();
        }

        assert_eq!(ledger.balance_of("recipient-1").await, 9_900);
        assert_eq!(ledger.balance_of(OWNER).await, 100);
    }

    #[tokio::test]
    async fn test_failed_fee_credit_cannot_reopen_completion() {
        let (registry, ledger) = setup_with_settings(ChainSettings {
            min_transfer_amount: 10,
            max_transfer_amount: 100_000,
            daily_limit: 200_000,
            fee_bps: 100, // 1%
        })
        .await;

        // Saturate the owner account so the fee credit overflows
        ledger.deposit(OWNER, u64::MAX).await;

        let request = funded_request(&registry, &ledger, 10_000).await;
        for validator in &VALIDATORS[..2] {
            registry
                .validate_request(validator, request.id, "proof".to_string())
                .await
                .unwrap();
        }
        let err = registry
            .validate_request(VALIDATORS[2], request.id, "proof".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidAmount(_)));

        // The recipient payout settled, and the request is already terminal
        assert_eq!(ledger.balance_of("recipient-1").await, 9_900);
        let fetched = registry.get_request_info(request.id).await.unwrap();
        assert_eq!(fetched.status, RequestStatus::Completed);

        // A further attestation cannot re-trigger the payout
        ledger.deposit("validator-4", STAKE).await;
        registry
            .register_validator("validator-4", vec![TARGET_CHAIN], STAKE)
            .await
            .unwrap();
        assert!(matches!(
            registry
                .validate_request("validator-4", request.id, "proof".to_string())
                .await
                .unwrap_err(),
            SettlementError::InvalidState { .. }
        ));
        assert_eq!(ledger.balance_of("recipient-1").await, 9_900);
    }

    #[tokio::test]
    async fn test_pause_blocks_new_entries() {
        let (registry, ledger) = setup().await;
        registry.pause(OWNER).unwrap();

        let (secret_key, sender) = sender_keypair();
        ledger.deposit(&sender, 5_000).await;
        let auth = sign_transfer(&secret_key, TARGET_CHAIN, "recipient-1", 1_000, "ETH", Utc::now());
        assert_eq!(
            registry
                .create_cross_chain_request(
                    &sender,
                    TARGET_CHAIN,
                    "recipient-1".to_string(),
                    1_000,
                    "ETH".to_string(),
                    auth,
                )
                .await
                .unwrap_err(),
            SettlementError::Paused
        );

        ledger.deposit("validator-6", STAKE).await;
        assert_eq!(
            registry
                .register_validator("validator-6", vec![TARGET_CHAIN], STAKE)
                .await
                .unwrap_err(),
            SettlementError::Paused
        );

        registry.resume(OWNER).unwrap();
        registry
            .register_validator("validator-6", vec![TARGET_CHAIN], STAKE)
            .await
            .unwrap();
    }
}
