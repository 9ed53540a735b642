#![allow(dead_code)]

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use cardwallet_core::api::{AddressInfo, BroadcastAck, FailoverCoordinator, NetworkProvider};
use cardwallet_core::fees::{FeeEstimate, FeeUnit};
use cardwallet_core::manager::{AccountWalletManager, UtxoWalletManager};
use cardwallet_core::tx::{
    BinanceTransactionBuilder, SignedTransaction, StellarTransactionBuilder, UtxoTransactionBuilder,
};
use cardwallet_core::wallet::address::output_script;
use cardwallet_core::{
    AccountState, Amount, Chain, PreImageHash, SignerError, SignerIdentity, SigningAlgorithm,
    Token, TransactionSigner, UnspentOutput, WalletConfig, WalletError, WalletResult,
};

pub const SECP_SECRET: [u8; 32] = [0x11; 32];
pub const ED25519_SECRET: [u8; 32] = [0x22; 32];

pub fn coin(chain: Chain, value: &str) -> Amount {
    Amount::parse_coin(chain, value).unwrap()
}

pub fn secp_public_key() -> Vec<u8> {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&SECP_SECRET).unwrap();
    PublicKey::from_secret_key(&secp, &secret).serialize().to_vec()
}

pub fn ed25519_public_key() -> Vec<u8> {
    SigningKey::from_bytes(&ED25519_SECRET).verifying_key().to_bytes().to_vec()
}

/// Scripted chain backend. Broadcasts bump the account sequence like a node would.
pub struct MockProvider {
    name: String,
    pub info: Mutex<AddressInfo>,
    pub fee: Mutex<FeeEstimate>,
    pub info_failures: Mutex<VecDeque<WalletError>>,
    pub broadcast_failure: Mutex<Option<WalletError>>,
    pub unknown_accounts: Mutex<HashSet<String>>,
    pub broadcasts: Mutex<Vec<SignedTransaction>>,
    pub info_calls: Mutex<usize>,
}

impl MockProvider {
    pub fn new(name: &str, info: AddressInfo, fee: FeeEstimate) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            info: Mutex::new(info),
            fee: Mutex::new(fee),
            info_failures: Mutex::new(VecDeque::new()),
            broadcast_failure: Mutex::new(None),
            unknown_accounts: Mutex::new(HashSet::new()),
            broadcasts: Mutex::new(Vec::new()),
            info_calls: Mutex::new(0),
        })
    }

    pub fn fail_next_info(&self, error: WalletError) {
        self.info_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_broadcast(&self, error: WalletError) {
        *self.broadcast_failure.lock().unwrap() = Some(error);
    }

    pub fn set_sequence(&self, sequence: u64) {
        if let Some(account) = self.info.lock().unwrap().account.as_mut() {
            account.sequence = sequence;
        }
    }

    pub fn sequence(&self) -> Option<u64> {
        self.info.lock().unwrap().account.map(|account| account.sequence)
    }

    pub fn broadcasts(&self) -> Vec<SignedTransaction> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub fn info_calls(&self) -> usize {
        *self.info_calls.lock().unwrap()
    }
}

#[async_trait]
impl NetworkProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_info(&self, _address: &str) -> WalletResult<AddressInfo> {
        *self.info_calls.lock().unwrap() += 1;
        if let Some(error) = self.info_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self.info.lock().unwrap().clone())
    }

    async fn get_fee(&self) -> WalletResult<FeeEstimate> {
        Ok(*self.fee.lock().unwrap())
    }

    async fn broadcast(&self, transaction: &SignedTransaction) -> WalletResult<BroadcastAck> {
        if let Some(error) = self.broadcast_failure.lock().unwrap().take() {
            return Err(error);
        }
        self.broadcasts.lock().unwrap().push(transaction.clone());
        if let Some(account) = self.info.lock().unwrap().account.as_mut() {
            account.sequence += 1;
        }
        Ok(BroadcastAck { hash: transaction.hash.clone() })
    }

    async fn account_exists(&self, address: &str) -> WalletResult<bool> {
        Ok(!self.unknown_accounts.lock().unwrap().contains(address))
    }
}

pub fn as_providers(providers: &[Arc<MockProvider>]) -> Vec<Arc<dyn NetworkProvider>> {
    providers
        .iter()
        .map(|provider| Arc::clone(provider) as Arc<dyn NetworkProvider>)
        .collect()
}

pub fn account_info(chain: Chain, balance: &str, account_number: u64, sequence: u64) -> AddressInfo {
    AddressInfo {
        exists: true,
        balance: coin(chain, balance),
        token_balances: HashMap::new(),
        reserve: None,
        new_account_minimum: None,
        unspent_outputs: Vec::new(),
        account: Some(AccountState { account_number, sequence }),
        has_unconfirmed: false,
    }
}

pub fn utxo_info(chain: Chain, address: &str, values: &[u64]) -> AddressInfo {
    let script = output_script(chain, address).unwrap();
    let unspent_outputs: Vec<UnspentOutput> = values
        .iter()
        .enumerate()
        .map(|(index, amount)| UnspentOutput {
            transaction_hash: format!("{:064x}", index + 1),
            output_index: index as u32,
            amount: *amount,
            output_script: script.clone(),
        })
        .collect();
    let total: u64 = values.iter().sum();
    AddressInfo {
        exists: true,
        balance: Amount::from_minor_units(
            chain.symbol(),
            chain.decimals(),
            u128::from(total),
            cardwallet_core::AmountKind::Coin,
        ),
        token_balances: HashMap::new(),
        reserve: None,
        new_account_minimum: None,
        unspent_outputs,
        account: None,
        has_unconfirmed: false,
    }
}

pub fn utxo_manager(chain: Chain, providers: &[Arc<MockProvider>]) -> UtxoWalletManager {
    let config = WalletConfig::new(chain, secp_public_key());
    let wallet = config.wallet().unwrap();
    let builder = UtxoTransactionBuilder::new(chain, &config.public_key, &wallet.address).unwrap();
    let failover = FailoverCoordinator::new(as_providers(providers)).unwrap();
    UtxoWalletManager::new(wallet, builder, failover, None)
}

pub fn binance_manager(
    providers: &[Arc<MockProvider>],
) -> AccountWalletManager<BinanceTransactionBuilder> {
    let config = WalletConfig::new(Chain::Binance, secp_public_key());
    let wallet = config.wallet().unwrap();
    let builder = BinanceTransactionBuilder::new(Chain::Binance, &config.public_key, None).unwrap();
    let failover = FailoverCoordinator::new(as_providers(providers)).unwrap();
    AccountWalletManager::new(wallet, builder, failover, None, Duration::from_secs(120))
}

pub fn stellar_manager(
    token: Option<Token>,
    providers: &[Arc<MockProvider>],
) -> AccountWalletManager<StellarTransactionBuilder> {
    let mut config = WalletConfig::new(Chain::Stellar, ed25519_public_key());
    config.token = token.clone();
    let wallet = config.wallet().unwrap();
    let builder = StellarTransactionBuilder::new(Chain::Stellar, &config.public_key, token).unwrap();
    let failover = FailoverCoordinator::new(as_providers(providers)).unwrap();
    AccountWalletManager::new(wallet, builder, failover, None, Duration::from_secs(120))
}

pub fn flat_fee(unit: FeeUnit, rate: u64) -> FeeEstimate {
    FeeEstimate::flat(unit, rate)
}

/// Signs with in-memory keys and records every request.
#[derive(Default)]
pub struct SoftwareSigner {
    pub requests: Mutex<Vec<Vec<PreImageHash>>>,
}

impl SoftwareSigner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<Vec<PreImageHash>> {
        self.requests.lock().unwrap().clone()
    }

    fn sign_all(&self, hashes: &[PreImageHash]) -> Vec<Vec<u8>> {
        self.requests.lock().unwrap().push(hashes.to_vec());
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&SECP_SECRET).unwrap();
        let ed25519 = SigningKey::from_bytes(&ED25519_SECRET);
        hashes
            .iter()
            .map(|hash| match hash.algorithm {
                SigningAlgorithm::Secp256k1Ecdsa => secp
                    .sign_ecdsa(&Message::from_digest(hash.hash), &secret)
                    .serialize_compact()
                    .to_vec(),
                SigningAlgorithm::Ed25519 => ed25519.sign(&hash.hash).to_bytes().to_vec(),
            })
            .collect()
    }
}

#[async_trait]
impl TransactionSigner for SoftwareSigner {
    async fn sign(
        &self,
        hashes: &[PreImageHash],
        _identity: &SignerIdentity,
    ) -> Result<Vec<Vec<u8>>, SignerError> {
        Ok(self.sign_all(hashes))
    }
}

/// Waits for `release` before signing; announces itself through `started`.
#[derive(Default)]
pub struct BlockingSigner {
    pub inner: SoftwareSigner,
    pub started: Notify,
    pub release: Notify,
}

impl BlockingSigner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl TransactionSigner for BlockingSigner {
    async fn sign(
        &self,
        hashes: &[PreImageHash],
        _identity: &SignerIdentity,
    ) -> Result<Vec<Vec<u8>>, SignerError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.inner.sign_all(hashes))
    }
}

/// Always fails with the configured error.
pub struct FailingSigner(pub SignerError);

#[async_trait]
impl TransactionSigner for FailingSigner {
    async fn sign(
        &self,
        _hashes: &[PreImageHash],
        _identity: &SignerIdentity,
    ) -> Result<Vec<Vec<u8>>, SignerError> {
        Err(self.0.clone())
    }
}

/// Address of the software signer's secp256k1 key on `chain`.
pub fn secp_address(chain: Chain) -> String {
    WalletConfig::new(chain, secp_public_key()).wallet().unwrap().address
}
