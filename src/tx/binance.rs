//! Binance Chain transaction builder
//!
//! Transfers are amino-encoded `StdTx` messages wrapping a single `Send`.
//! The signed hash is SHA-256 over the canonical JSON sign document.

use serde_json::json;
use sha2::{Digest, Sha256};

use crate::error::{WalletError, WalletResult};
use crate::signing::{canonical_compact, PreImageHash, SigningAlgorithm};
use crate::tx::{AccountBuildContext, AccountTransactionBuilder, SignedTransaction};
use crate::types::{Chain, ChainFamily, Token};
use crate::wallet::address::{compress_public_key, decode_address, derive_address};
use crate::wallet::{AccountState, AmountKind, Memo, TransactionData};

// Amino type prefixes
const SEND_PREFIX: [u8; 4] = [0x2a, 0x2c, 0x87, 0xfa];
const STD_TX_PREFIX: [u8; 4] = [0xf0, 0x62, 0x5d, 0xee];
const PUB_KEY_SECP256K1_PREFIX: [u8; 4] = [0xeb, 0x5a, 0xe9, 0x87];

const NATIVE_DENOM: &str = "BNB";
const SOURCE: u64 = 0;

pub fn chain_id(chain: Chain) -> &'static str {
    if chain.is_testnet() {
        "Binance-Chain-Ganges"
    } else {
        "Binance-Chain-Tigris"
    }
}

/// Builder state carried from `build_unsigned` to `build_signed`
#[derive(Debug, Clone)]
pub struct UnsignedBinanceTransaction {
    /// Amino-encoded `Send` message
    pub message: Vec<u8>,
    pub sign_document: Vec<u8>,
    pub memo: String,
    pub account: AccountState,
}

pub struct BinanceTransactionBuilder {
    chain: Chain,
    public_key: [u8; 33],
    address: String,
    token: Option<Token>,
}

impl BinanceTransactionBuilder {
    pub fn new(chain: Chain, public_key: &[u8], token: Option<Token>) -> WalletResult<Self> {
        if chain.family() != ChainFamily::Binance {
            return Err(WalletError::configuration(format!("{} is not Binance Chain", chain)));
        }
        Ok(Self {
            chain,
            public_key: compress_public_key(public_key)?,
            address: derive_address(chain, public_key)?,
            token,
        })
    }

    fn denom(&self, kind: AmountKind) -> WalletResult<&str> {
        match kind {
            AmountKind::Coin => Ok(NATIVE_DENOM),
            AmountKind::Token => self
                .token
                .as_ref()
                .map(|token| token.contract_address.as_str())
                .ok_or_else(|| WalletError::configuration("Wallet has no token configured")),
            AmountKind::Reserve => Err(WalletError::encoding("Reserve amounts cannot be sent")),
        }
    }

    pub fn sign_document(
        &self,
        destination: &str,
        denom: &str,
        amount: i64,
        memo: &str,
        account: &AccountState,
    ) -> WalletResult<Vec<u8>> {
        // serde_json maps are key-sorted, which is the canonical order.
        let coins = json!([{ "amount": amount, "denom": denom }]);
        let document = json!({
            "account_number": account.account_number.to_string(),
            "chain_id": chain_id(self.chain),
            "data": null,
            "memo": memo,
            "msgs": [{
                "inputs": [{ "address": self.address, "coins": coins }],
                "outputs": [{ "address": destination, "coins": coins }],
            }],
            "sequence": account.sequence.to_string(),
            "source": SOURCE.to_string(),
        });
        serde_json::to_vec(&document)
            .map_err(|e| WalletError::encoding(format!("Sign document encoding failed: {}", e)))
    }
}

impl AccountTransactionBuilder for BinanceTransactionBuilder {
    type Unsigned = UnsignedBinanceTransaction;

    fn chain(&self) -> Chain {
        self.chain
    }

    fn build_unsigned(
        &self,
        transaction: &TransactionData,
        context: &AccountBuildContext,
    ) -> WalletResult<(PreImageHash, UnsignedBinanceTransaction)> {
        if transaction.is_trustline_opt_in() {
            return Err(WalletError::encoding("Binance Chain assets need no trust line"));
        }
        let destination = decode_address(self.chain, &transaction.destination_address)?;
        let source = decode_address(self.chain, &self.address)?;
        let denom = self.denom(transaction.amount.kind)?;
        let amount = transaction.amount.to_minor_i64()?;
        if amount <= 0 {
            return Err(WalletError::encoding("Amount must be greater than zero"));
        }
        let memo = match &transaction.extra.memo {
            Some(Memo::Text(text)) => text.clone(),
            Some(Memo::Id(id)) => id.to_string(),
            None => String::new(),
        };

        let sign_document = self.sign_document(
            &transaction.destination_address,
            denom,
            amount,
            &memo,
            &context.account,
        )?;
        let hash: [u8; 32] = Sha256::digest(&sign_document).into();

        let mut message = SEND_PREFIX.to_vec();
        message.extend_from_slice(&encode_send(
            &source.payload,
            &destination.payload,
            denom,
            amount,
        ));

        let pre_image = PreImageHash::new(hash, SigningAlgorithm::Secp256k1Ecdsa)
            .with_description(format!("{} {} transfer", chain_id(self.chain), denom));
        Ok((
            pre_image,
            UnsignedBinanceTransaction {
                message,
                sign_document,
                memo,
                account: context.account,
            },
        ))
    }

    fn build_signed(
        &self,
        unsigned: &UnsignedBinanceTransaction,
        signature: &[u8],
    ) -> WalletResult<SignedTransaction> {
        let signature = canonical_compact(signature)?;

        let mut pub_key = PUB_KEY_SECP256K1_PREFIX.to_vec();
        pub_key.push(self.public_key.len() as u8);
        pub_key.extend_from_slice(&self.public_key);

        // StdSignature carries no amino prefix.
        let mut std_signature = Vec::new();
        put_bytes_field(&mut std_signature, 1, &pub_key);
        put_bytes_field(&mut std_signature, 2, &signature);
        put_varint_field(&mut std_signature, 3, unsigned.account.account_number);
        put_varint_field(&mut std_signature, 4, unsigned.account.sequence);

        let mut std_tx = STD_TX_PREFIX.to_vec();
        put_bytes_field(&mut std_tx, 1, &unsigned.message);
        put_bytes_field(&mut std_tx, 2, &std_signature);
        put_bytes_field(&mut std_tx, 3, unsigned.memo.as_bytes());
        put_varint_field(&mut std_tx, 4, SOURCE);

        let mut raw = Vec::with_capacity(std_tx.len() + 3);
        put_varint(&mut raw, std_tx.len() as u64);
        raw.extend_from_slice(&std_tx);

        let hash = hex::encode_upper(Sha256::digest(&raw));
        Ok(SignedTransaction { raw, hash })
    }
}

fn encode_send(from: &[u8], to: &[u8], denom: &str, amount: i64) -> Vec<u8> {
    let mut coin = Vec::new();
    put_bytes_field(&mut coin, 1, denom.as_bytes());
    put_varint_field(&mut coin, 2, amount as u64);

    let party = |address: &[u8]| {
        let mut encoded = Vec::new();
        put_bytes_field(&mut encoded, 1, address);
        put_bytes_field(&mut encoded, 2, &coin);
        encoded
    };

    let mut send = Vec::new();
    put_bytes_field(&mut send, 1, &party(from));
    put_bytes_field(&mut send, 2, &party(to));
    send
}

// Protobuf helpers; zero values are omitted as in proto3.

fn put_varint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

fn put_varint_field(buf: &mut Vec<u8>, field: u32, value: u64) {
    if value == 0 {
        return;
    }
    put_varint(buf, u64::from(field << 3));
    put_varint(buf, value);
}

fn put_bytes_field(buf: &mut Vec<u8>, field: u32, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    put_varint(buf, u64::from(field << 3 | 2));
    put_varint(buf, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}
