//! Stellar transaction builder
//!
//! Produces XDR `Transaction`s with a single operation:
//! - `CreateAccount` when the destination is not active yet
//! - `Payment` in XLM or in the wallet's credit asset
//! - `ChangeTrust` for an explicit trust line opt-in
//!
//! The signed hash is SHA-256(network id || ENVELOPE_TYPE_TX || tx).

use sha2::{Digest, Sha256};

use crate::error::{WalletError, WalletResult};
use crate::signing::{ensure_ed25519, PreImageHash, SigningAlgorithm};
use crate::tx::{AccountBuildContext, AccountTransactionBuilder, SignedTransaction};
use crate::types::{Chain, ChainFamily, Token};
use crate::wallet::address::{decode_stellar_address, derive_address};
use crate::wallet::{AmountKind, Memo, TransactionData};

const ENVELOPE_TYPE_TX: i32 = 2;
const KEY_TYPE_ED25519: i32 = 0;
const PRECOND_TIME: i32 = 1;

const MEMO_NONE: i32 = 0;
const MEMO_TEXT: i32 = 1;
const MEMO_ID: i32 = 2;
const MEMO_TEXT_MAX_BYTES: usize = 28;

const ASSET_TYPE_NATIVE: i32 = 0;
const ASSET_TYPE_CREDIT_ALPHANUM4: i32 = 1;
const ASSET_TYPE_CREDIT_ALPHANUM12: i32 = 2;

/// Trust line limit used when opting in to an asset (900000000000 units)
pub const TRUSTLINE_LIMIT: i64 = 9_000_000_000_000_000_000;

pub fn network_passphrase(chain: Chain) -> &'static str {
    if chain.is_testnet() {
        "Test SDF Network ; September 2015"
    } else {
        "Public Global Stellar Network ; September 2015"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    CreateAccount = 0,
    Payment = 1,
    ChangeTrust = 6,
}

/// Builder state carried from `build_unsigned` to `build_signed`
#[derive(Debug, Clone)]
pub struct UnsignedStellarTransaction {
    /// XDR `Transaction`
    pub transaction: Vec<u8>,
    pub hash: [u8; 32],
    pub operation: OperationType,
}

pub struct StellarTransactionBuilder {
    chain: Chain,
    public_key: [u8; 32],
    network_id: [u8; 32],
    token: Option<Token>,
}

impl StellarTransactionBuilder {
    pub fn new(chain: Chain, public_key: &[u8], token: Option<Token>) -> WalletResult<Self> {
        if chain.family() != ChainFamily::Stellar {
            return Err(WalletError::configuration(format!("{} is not Stellar", chain)));
        }
        // Validates the key as a point and yields the account id.
        let address = derive_address(chain, public_key)?;
        Ok(Self {
            chain,
            public_key: decode_stellar_address(&address)?,
            network_id: Sha256::digest(network_passphrase(chain).as_bytes()).into(),
            token,
        })
    }

    fn token(&self) -> WalletResult<&Token> {
        self.token
            .as_ref()
            .ok_or_else(|| WalletError::configuration("Wallet has no token configured"))
    }

    fn write_asset(&self, xdr: &mut XdrWriter, kind: AmountKind) -> WalletResult<()> {
        match kind {
            AmountKind::Coin => {
                xdr.int32(ASSET_TYPE_NATIVE);
                Ok(())
            }
            AmountKind::Token => {
                let token = self.token()?;
                let code = token.symbol.as_bytes();
                let issuer = decode_stellar_address(&token.contract_address)?;
                let width = match code.len() {
                    1..=4 => {
                        xdr.int32(ASSET_TYPE_CREDIT_ALPHANUM4);
                        4
                    }
                    5..=12 => {
                        xdr.int32(ASSET_TYPE_CREDIT_ALPHANUM12);
                        12
                    }
                    _ => {
                        return Err(WalletError::encoding(format!(
                            "Invalid asset code: {}",
                            token.symbol
                        )))
                    }
                };
                let mut padded = vec![0u8; width];
                padded[..code.len()].copy_from_slice(code);
                xdr.fixed(&padded);
                xdr.account_id(&issuer);
                Ok(())
            }
            AmountKind::Reserve => Err(WalletError::encoding("Reserve amounts cannot be sent")),
        }
    }

    fn write_memo(&self, xdr: &mut XdrWriter, memo: Option<&Memo>) -> WalletResult<()> {
        match memo {
            None => xdr.int32(MEMO_NONE),
            Some(Memo::Text(text)) => {
                if text.len() > MEMO_TEXT_MAX_BYTES {
                    return Err(WalletError::encoding(format!(
                        "Memo text is {} bytes, at most {} allowed",
                        text.len(),
                        MEMO_TEXT_MAX_BYTES
                    )));
                }
                xdr.int32(MEMO_TEXT);
                xdr.variable(text.as_bytes());
            }
            Some(Memo::Id(id)) => {
                xdr.int32(MEMO_ID);
                xdr.uint64(*id);
            }
        }
        Ok(())
    }

    fn select_operation(
        &self,
        transaction: &TransactionData,
        context: &AccountBuildContext,
    ) -> WalletResult<OperationType> {
        if transaction.is_trustline_opt_in() {
            if transaction.amount.kind != AmountKind::Token || !transaction.amount.is_zero() {
                return Err(WalletError::encoding("A trust line opt-in moves no funds"));
            }
            return Ok(OperationType::ChangeTrust);
        }
        match transaction.amount.kind {
            AmountKind::Coin if context.destination_exists => Ok(OperationType::Payment),
            AmountKind::Coin => Ok(OperationType::CreateAccount),
            AmountKind::Token if !context.has_trustline => Err(WalletError::insufficient_funds(
                "No trust line for this asset, opt in before sending it",
            )),
            AmountKind::Token if !context.destination_exists => Err(WalletError::encoding(
                "Destination account does not exist and cannot receive assets",
            )),
            AmountKind::Token => Ok(OperationType::Payment),
            AmountKind::Reserve => Err(WalletError::encoding("Reserve amounts cannot be sent")),
        }
    }
}

impl AccountTransactionBuilder for StellarTransactionBuilder {
    type Unsigned = UnsignedStellarTransaction;

    fn chain(&self) -> Chain {
        self.chain
    }

    fn needs_destination_lookup(&self) -> bool {
        true
    }

    fn build_unsigned(
        &self,
        transaction: &TransactionData,
        context: &AccountBuildContext,
    ) -> WalletResult<(PreImageHash, UnsignedStellarTransaction)> {
        let operation = self.select_operation(transaction, context)?;
        let amount = transaction.amount.to_minor_i64()?;
        if amount <= 0 && operation != OperationType::ChangeTrust {
            return Err(WalletError::encoding("Amount must be greater than zero"));
        }
        let fee = u32::try_from(transaction.fee.to_minor_units()?)
            .map_err(|_| WalletError::encoding(format!("Fee {} is too large", transaction.fee)))?;
        let sequence = i64::try_from(context.account.sequence)
            .ok()
            .and_then(|sequence| sequence.checked_add(1))
            .ok_or_else(|| WalletError::encoding("Sequence number overflow"))?;

        let mut xdr = XdrWriter::default();
        xdr.muxed_account(&self.public_key);
        xdr.uint32(fee);
        xdr.int64(sequence);

        xdr.int32(PRECOND_TIME);
        xdr.uint64(0);
        xdr.uint64(context.valid_until);

        self.write_memo(&mut xdr, transaction.extra.memo.as_ref())?;

        // one operation, no per-operation source account
        xdr.uint32(1);
        xdr.uint32(0);
        xdr.int32(operation as i32);
        match operation {
            OperationType::CreateAccount => {
                let destination = decode_stellar_address(&transaction.destination_address)?;
                xdr.account_id(&destination);
                xdr.int64(amount);
            }
            OperationType::Payment => {
                let destination = decode_stellar_address(&transaction.destination_address)?;
                xdr.muxed_account(&destination);
                self.write_asset(&mut xdr, transaction.amount.kind)?;
                xdr.int64(amount);
            }
            OperationType::ChangeTrust => {
                self.write_asset(&mut xdr, AmountKind::Token)?;
                xdr.int64(TRUSTLINE_LIMIT);
            }
        }

        // ext
        xdr.int32(0);
        let transaction_xdr = xdr.into_bytes();

        let mut payload = self.network_id.to_vec();
        payload.extend_from_slice(&ENVELOPE_TYPE_TX.to_be_bytes());
        payload.extend_from_slice(&transaction_xdr);
        let hash: [u8; 32] = Sha256::digest(&payload).into();

        let pre_image = PreImageHash::new(hash, SigningAlgorithm::Ed25519)
            .with_description(format!("{} {:?}", self.chain, operation));
        Ok((
            pre_image,
            UnsignedStellarTransaction {
                transaction: transaction_xdr,
                hash,
                operation,
            },
        ))
    }

    fn build_signed(
        &self,
        unsigned: &UnsignedStellarTransaction,
        signature: &[u8],
    ) -> WalletResult<SignedTransaction> {
        let signature = ensure_ed25519(signature)?;

        let mut xdr = XdrWriter::default();
        xdr.int32(ENVELOPE_TYPE_TX);
        xdr.raw(&unsigned.transaction);
        // DecoratedSignature<20>
        xdr.uint32(1);
        xdr.fixed(&self.public_key[28..]);
        xdr.variable(&signature);

        Ok(SignedTransaction {
            raw: xdr.into_bytes(),
            hash: hex::encode(unsigned.hash),
        })
    }
}

/// Minimal XDR encoder: big-endian integers, 4-byte aligned opaque data.
#[derive(Default)]
struct XdrWriter {
    buf: Vec<u8>,
}

impl XdrWriter {
    fn int32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn uint32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn int64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn uint64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn fixed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.pad(bytes.len());
    }

    fn variable(&mut self, bytes: &[u8]) {
        self.uint32(bytes.len() as u32);
        self.fixed(bytes);
    }

    fn pad(&mut self, len: usize) {
        let padding = (4 - len % 4) % 4;
        self.buf.extend(std::iter::repeat(0u8).take(padding));
    }

    fn account_id(&mut self, key: &[u8; 32]) {
        self.int32(KEY_TYPE_ED25519);
        self.fixed(key);
    }

    fn muxed_account(&mut self, key: &[u8; 32]) {
        // KEY_TYPE_ED25519 arm of MuxedAccount shares the AccountID layout.
        self.account_id(key);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
