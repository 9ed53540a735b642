//! Signature canonicalization
//!
//! Cards return raw `r || s` ECDSA signatures and may produce either `s` or
//! `n - s`. Chains only accept the low-S form, so every secp256k1 signature
//! goes through [`canonical_ecdsa`] before it is compiled.

use secp256k1::ecdsa::Signature;

use crate::error::{WalletError, WalletResult};

fn parse_compact(raw: &[u8]) -> WalletResult<Signature> {
    if raw.len() != 64 {
        return Err(WalletError::encoding(format!(
            "ECDSA signature must be 64 bytes, got {}",
            raw.len()
        )));
    }
    Ok(Signature::from_compact(raw)?)
}

/// Low-S normalized signature.
pub fn canonical_ecdsa(raw: &[u8]) -> WalletResult<Signature> {
    let mut signature = parse_compact(raw)?;
    signature.normalize_s();
    Ok(signature)
}

/// Low-S `r || s`.
pub fn canonical_compact(raw: &[u8]) -> WalletResult<[u8; 64]> {
    Ok(canonical_ecdsa(raw)?.serialize_compact())
}

/// Low-S DER encoding.
pub fn canonical_der(raw: &[u8]) -> WalletResult<Vec<u8>> {
    Ok(canonical_ecdsa(raw)?.serialize_der().to_vec())
}

pub fn ensure_ed25519(raw: &[u8]) -> WalletResult<[u8; 64]> {
    raw.try_into().map_err(|_| {
        WalletError::encoding(format!("Ed25519 signature must be 64 bytes, got {}", raw.len()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::constants::CURVE_ORDER;

    fn negate_s(compact: &[u8; 64]) -> [u8; 64] {
        let mut out = *compact;
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let diff = CURVE_ORDER[i] as i16 - compact[32 + i] as i16 - borrow;
            borrow = if diff < 0 { 1 } else { 0 };
            out[32 + i] = (diff & 0xff) as u8;
        }
        out
    }

    fn sample_signature() -> [u8; 64] {
        let secp = secp256k1::Secp256k1::new();
        let key = secp256k1::SecretKey::from_slice(&[0x42; 32]).unwrap();
        let message = secp256k1::Message::from_digest([0x11; 32]);
        secp.sign_ecdsa(&message, &key).serialize_compact()
    }

    #[test]
    fn high_s_is_normalized() {
        let low = sample_signature();
        let high = negate_s(&low);
        assert_ne!(low, high);
        assert_eq!(canonical_compact(&high).unwrap(), low);
        assert_eq!(canonical_der(&high).unwrap(), canonical_der(&low).unwrap());
    }

    #[test]
    fn wrong_lengths_are_rejected() {
        assert!(canonical_der(&[0u8; 63]).is_err());
        assert!(ensure_ed25519(&[0u8; 65]).is_err());
        assert!(ensure_ed25519(&[0u8; 64]).is_ok());
    }
}
