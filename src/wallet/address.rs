//! Address derivation and validation
//!
//! Addresses are derived from the public key reported by the signer:
//! - Bitcoin family: legacy base58check P2PKH of the compressed key
//! - Binance Chain: bech32 (`bnb` / `tbnb`) of the compressed key's hash160
//! - Stellar: StrKey `G...` account id of the ed25519 key
//!
//! Destinations may additionally be P2SH or segwit v0 on Bitcoin-family chains.

use bech32::{self, FromBase32, ToBase32, Variant};
use bitcoin::hashes::{hash160, Hash};
use data_encoding::BASE32;
use ed25519_dalek::VerifyingKey;

use crate::error::{WalletError, WalletResult};
use crate::types::{Chain, ChainFamily};

/// StrKey version byte for ed25519 account ids (`G...`)
const STELLAR_ACCOUNT_VERSION: u8 = 6 << 3;

/// Address type classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    P2PKH,
    P2SH,
    P2WPKH,
    P2WSH,
    Binance,
    Stellar,
}

/// Decoded destination, ready for a transaction builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAddress {
    pub address_type: AddressType,
    /// hash160, witness program or ed25519 key, depending on the type
    pub payload: Vec<u8>,
}

struct UtxoParams {
    p2pkh: u8,
    p2sh: u8,
    bech32_hrp: Option<&'static str>,
}

fn utxo_params(chain: Chain) -> WalletResult<UtxoParams> {
    let params = match chain {
        Chain::Bitcoin => UtxoParams { p2pkh: 0x00, p2sh: 0x05, bech32_hrp: Some("bc") },
        Chain::BitcoinTestnet => UtxoParams { p2pkh: 0x6f, p2sh: 0xc4, bech32_hrp: Some("tb") },
        Chain::Litecoin => UtxoParams { p2pkh: 0x30, p2sh: 0x32, bech32_hrp: Some("ltc") },
        Chain::Ducatus => UtxoParams { p2pkh: 0x31, p2sh: 0x33, bech32_hrp: None },
        other => {
            return Err(WalletError::configuration(format!(
                "{} is not a UTXO chain",
                other
            )))
        }
    };
    Ok(params)
}

fn binance_hrp(chain: Chain) -> &'static str {
    if chain.is_testnet() {
        "tbnb"
    } else {
        "bnb"
    }
}

/// Accept a 33-byte compressed or 65-byte uncompressed secp256k1 key and
/// return the compressed form.
pub fn compress_public_key(public_key: &[u8]) -> WalletResult<[u8; 33]> {
    let key = secp256k1::PublicKey::from_slice(public_key)
        .map_err(|e| WalletError::encoding(format!("Invalid secp256k1 public key: {}", e)))?;
    Ok(key.serialize())
}

pub fn hash160(data: &[u8]) -> [u8; 20] {
    hash160::Hash::hash(data).to_byte_array()
}

/// Derive the wallet address for `public_key` on `chain`.
pub fn derive_address(chain: Chain, public_key: &[u8]) -> WalletResult<String> {
    match chain.family() {
        ChainFamily::Utxo => {
            let params = utxo_params(chain)?;
            let compressed = compress_public_key(public_key)?;
            let mut payload = vec![params.p2pkh];
            payload.extend_from_slice(&hash160(&compressed));
            Ok(bitcoin::base58::encode_check(&payload))
        }
        ChainFamily::Binance => {
            let compressed = compress_public_key(public_key)?;
            bech32::encode(binance_hrp(chain), hash160(&compressed).to_base32(), Variant::Bech32)
                .map_err(|e| WalletError::encoding(format!("Bech32 encoding failed: {}", e)))
        }
        ChainFamily::Stellar => {
            let key: [u8; 32] = public_key.try_into().map_err(|_| {
                WalletError::encoding(format!(
                    "Stellar public key must be 32 bytes, got {}",
                    public_key.len()
                ))
            })?;
            VerifyingKey::from_bytes(&key)
                .map_err(|e| WalletError::encoding(format!("Invalid ed25519 public key: {}", e)))?;
            Ok(encode_stellar_address(&key))
        }
    }
}

/// Decode and classify an address for `chain`.
pub fn decode_address(chain: Chain, address: &str) -> WalletResult<DecodedAddress> {
    let invalid = || WalletError::encoding(format!("Invalid {} address: {}", chain, address));
    match chain.family() {
        ChainFamily::Utxo => {
            let params = utxo_params(chain)?;
            if let Some(hrp) = params.bech32_hrp {
                if address.to_ascii_lowercase().starts_with(&format!("{}1", hrp)) {
                    return decode_segwit(hrp, address).ok_or_else(invalid);
                }
            }
            let raw = bitcoin::base58::decode_check(address).map_err(|_| invalid())?;
            if raw.len() != 21 {
                return Err(invalid());
            }
            let address_type = if raw[0] == params.p2pkh {
                AddressType::P2PKH
            } else if raw[0] == params.p2sh {
                AddressType::P2SH
            } else {
                return Err(invalid());
            };
            Ok(DecodedAddress { address_type, payload: raw[1..].to_vec() })
        }
        ChainFamily::Binance => {
            let (hrp, data, variant) = bech32::decode(address).map_err(|_| invalid())?;
            if hrp != binance_hrp(chain) || variant != Variant::Bech32 {
                return Err(invalid());
            }
            let payload = Vec::<u8>::from_base32(&data).map_err(|_| invalid())?;
            if payload.len() != 20 {
                return Err(invalid());
            }
            Ok(DecodedAddress { address_type: AddressType::Binance, payload })
        }
        ChainFamily::Stellar => {
            let key = decode_stellar_address(address)?;
            Ok(DecodedAddress { address_type: AddressType::Stellar, payload: key.to_vec() })
        }
    }
}

fn decode_segwit(hrp: &str, address: &str) -> Option<DecodedAddress> {
    let (decoded_hrp, data, variant) = bech32::decode(address).ok()?;
    if decoded_hrp != hrp || variant != Variant::Bech32 || data.is_empty() {
        return None;
    }
    // Only witness v0 is spendable by this engine's output scripts.
    if data[0].to_u8() != 0 {
        return None;
    }
    let program = Vec::<u8>::from_base32(&data[1..]).ok()?;
    let address_type = match program.len() {
        20 => AddressType::P2WPKH,
        32 => AddressType::P2WSH,
        _ => return None,
    };
    Some(DecodedAddress { address_type, payload: program })
}

pub fn validate_address(chain: Chain, address: &str) -> bool {
    decode_address(chain, address).is_ok()
}

/// Locking script paying to `address` on a Bitcoin-family chain.
pub fn output_script(chain: Chain, address: &str) -> WalletResult<Vec<u8>> {
    let decoded = decode_address(chain, address)?;
    let payload = &decoded.payload;
    let script = match decoded.address_type {
        AddressType::P2PKH => {
            // OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
            let mut script = vec![0x76, 0xa9, 0x14];
            script.extend_from_slice(payload);
            script.extend_from_slice(&[0x88, 0xac]);
            script
        }
        AddressType::P2SH => {
            // OP_HASH160 <20> OP_EQUAL
            let mut script = vec![0xa9, 0x14];
            script.extend_from_slice(payload);
            script.push(0x87);
            script
        }
        AddressType::P2WPKH | AddressType::P2WSH => {
            let mut script = vec![0x00, payload.len() as u8];
            script.extend_from_slice(payload);
            script
        }
        AddressType::Binance | AddressType::Stellar => {
            return Err(WalletError::configuration(format!(
                "{} has no output scripts",
                chain
            )))
        }
    };
    Ok(script)
}

pub fn encode_stellar_address(public_key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(STELLAR_ACCOUNT_VERSION);
    payload.extend_from_slice(public_key);
    let checksum = crc16_xmodem(&payload);
    payload.extend_from_slice(&checksum.to_le_bytes());
    BASE32.encode(&payload)
}

/// Decode a `G...` account id into the raw ed25519 public key.
pub fn decode_stellar_address(address: &str) -> WalletResult<[u8; 32]> {
    let invalid = || WalletError::encoding(format!("Invalid Stellar address: {}", address));
    let raw = BASE32.decode(address.as_bytes()).map_err(|_| invalid())?;
    if raw.len() != 35 || raw[0] != STELLAR_ACCOUNT_VERSION {
        return Err(invalid());
    }
    let (body, checksum) = raw.split_at(33);
    if crc16_xmodem(body).to_le_bytes() != checksum {
        return Err(invalid());
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&body[1..]);
    Ok(key)
}

/// CRC16-XModem checksum used by Stellar StrKey
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    // secp256k1 generator point
    const G_COMPRESSED: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const G_UNCOMPRESSED: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    #[test]
    fn bitcoin_p2pkh_from_known_key() {
        let key = hex::decode(G_COMPRESSED).unwrap();
        let address = derive_address(Chain::Bitcoin, &key).unwrap();
        assert_eq!(address, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert!(validate_address(Chain::Bitcoin, &address));
        assert!(!validate_address(Chain::Litecoin, &address));
    }

    #[test]
    fn uncompressed_keys_are_compressed_first() {
        let compressed = hex::decode(G_COMPRESSED).unwrap();
        let uncompressed = hex::decode(G_UNCOMPRESSED).unwrap();
        assert_eq!(
            derive_address(Chain::Binance, &compressed).unwrap(),
            derive_address(Chain::Binance, &uncompressed).unwrap()
        );
    }

    #[test]
    fn binance_address_round_trips_hash160() {
        let key = hex::decode(G_COMPRESSED).unwrap();
        let address = derive_address(Chain::Binance, &key).unwrap();
        assert!(address.starts_with("bnb1"));
        let decoded = decode_address(Chain::Binance, &address).unwrap();
        assert_eq!(
            hex::encode(decoded.payload),
            "751e76e8199196d454941c45d1b3a323f1433bd6"
        );

        let testnet = derive_address(Chain::BinanceTestnet, &key).unwrap();
        assert!(testnet.starts_with("tbnb1"));
        assert!(!validate_address(Chain::Binance, &testnet));
    }

    #[test]
    fn stellar_zero_key_vector() {
        let address = encode_stellar_address(&[0u8; 32]);
        assert_eq!(
            address,
            "GAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAWHF"
        );
        assert_eq!(decode_stellar_address(&address).unwrap(), [0u8; 32]);
    }

    #[test]
    fn stellar_checksum_is_verified() {
        let mut address = encode_stellar_address(&[7u8; 32]);
        address.replace_range(10..11, if &address[10..11] == "A" { "B" } else { "A" });
        assert!(decode_stellar_address(&address).is_err());
    }

    #[test]
    fn output_scripts_by_type() {
        let p2pkh = output_script(Chain::Bitcoin, "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH").unwrap();
        assert_eq!(
            hex::encode(p2pkh),
            "76a914751e76e8199196d454941c45d1b3a323f1433bd688ac"
        );

        let p2wpkh =
            output_script(Chain::Bitcoin, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4").unwrap();
        assert_eq!(
            hex::encode(p2wpkh),
            "0014751e76e8199196d454941c45d1b3a323f1433bd6"
        );

        assert!(output_script(Chain::Stellar, "GAAAA").is_err());
    }

    #[test]
    fn litecoin_addresses_use_their_own_version() {
        let key = hex::decode(G_COMPRESSED).unwrap();
        let address = derive_address(Chain::Litecoin, &key).unwrap();
        assert!(address.starts_with('L'));
        let decoded = decode_address(Chain::Litecoin, &address).unwrap();
        assert_eq!(decoded.address_type, AddressType::P2PKH);
    }
}
