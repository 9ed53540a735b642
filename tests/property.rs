use cardwallet_core::signing::canonical_compact;
use cardwallet_core::wallet::address::{
    decode_address, decode_stellar_address, derive_address, encode_stellar_address, hash160,
};
use cardwallet_core::wallet::amount::{from_minor_units, to_minor_units};
use cardwallet_core::wallet::utxo::{select_first_fit, MAX_INPUTS_PER_TRANSACTION};
use cardwallet_core::{Chain, Decimal, UnspentOutput};
use proptest::prelude::*;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

fn any_secret_key() -> impl Strategy<Value = SecretKey> {
    prop::array::uniform32(any::<u8>()).prop_filter_map("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(&bytes).ok()
    })
}

fn outputs(values: &[u64]) -> Vec<UnspentOutput> {
    values
        .iter()
        .enumerate()
        .map(|(index, amount)| UnspentOutput {
            transaction_hash: format!("{:064x}", index),
            output_index: index as u32,
            amount: *amount,
            output_script: Vec::new(),
        })
        .collect()
}

proptest! {
    #[test]
    fn minor_units_survive_decimal_conversion(units in any::<u64>(), decimals in 0u8..=18) {
        let value = from_minor_units(u128::from(units), decimals);
        prop_assert_eq!(to_minor_units(&value, decimals).unwrap(), u128::from(units));

        let reparsed: Decimal = value.to_string().parse().unwrap();
        prop_assert_eq!(reparsed, value);
    }

    #[test]
    fn decimal_arithmetic_matches_minor_units(a in any::<u32>(), b in any::<u32>(), decimals in 0u8..=8) {
        let x = from_minor_units(u128::from(a), decimals);
        let y = from_minor_units(u128::from(b), decimals);
        prop_assert_eq!(x.cmp(&y), a.cmp(&b));

        let sum = x.checked_add(&y).unwrap();
        prop_assert_eq!(to_minor_units(&sum, decimals).unwrap(), u128::from(a) + u128::from(b));
        prop_assert_eq!(x.checked_sub(&y).is_ok(), a >= b);
    }

    #[test]
    fn excess_precision_is_refused(units in 1u64..1_000_000, decimals in 0u8..8) {
        // one digit finer than the chain supports
        let value = Decimal::new(u128::from(units) * 10 + 1, u32::from(decimals) + 1).unwrap();
        prop_assert!(to_minor_units(&value, decimals).is_err());
    }

    #[test]
    fn first_fit_selection_is_minimal_prefix(
        values in prop::collection::vec(1u64..1_000_000, 1..20),
        target in 1u64..5_000_000,
    ) {
        let available = outputs(&values);
        match select_first_fit(&available, target) {
            Ok(selection) => {
                let count = selection.selected.len();
                prop_assert!(count <= MAX_INPUTS_PER_TRANSACTION);
                prop_assert!(selection.total_value >= target);
                prop_assert_eq!(selection.total_value, values[..count].iter().sum::<u64>());
                prop_assert!(values[..count - 1].iter().sum::<u64>() < target);
            }
            Err(_) => {
                let reachable: u64 = values.iter().take(MAX_INPUTS_PER_TRANSACTION).sum();
                prop_assert!(reachable < target);
            }
        }
    }

    #[test]
    fn canonicalization_is_idempotent_and_low_s(secret in any_secret_key(), digest in prop::array::uniform32(any::<u8>())) {
        let secp = Secp256k1::new();
        let message = Message::from_digest(digest);
        let raw = secp.sign_ecdsa(&message, &secret).serialize_compact();

        let canonical = canonical_compact(&raw).unwrap();
        prop_assert_eq!(canonical_compact(&canonical).unwrap(), canonical);

        // high bit of s clear is necessary for low-S
        prop_assert!(canonical[32] < 0x80);
        let signature = secp256k1::ecdsa::Signature::from_compact(&canonical).unwrap();
        let public_key = PublicKey::from_secret_key(&secp, &secret);
        prop_assert!(secp.verify_ecdsa(&message, &signature, &public_key).is_ok());
    }

    #[test]
    fn derived_addresses_decode_to_key_hash(secret in any_secret_key()) {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret);

        for chain in [Chain::Bitcoin, Chain::BitcoinTestnet, Chain::Litecoin, Chain::Ducatus, Chain::Binance] {
            let compressed = derive_address(chain, &public_key.serialize()).unwrap();
            let uncompressed = derive_address(chain, &public_key.serialize_uncompressed()).unwrap();
            prop_assert_eq!(&compressed, &uncompressed);

            let decoded = decode_address(chain, &compressed).unwrap();
            prop_assert_eq!(decoded.payload, hash160(&public_key.serialize()).to_vec());
        }
    }

    #[test]
    fn stellar_account_ids_round_trip(key in prop::array::uniform32(any::<u8>())) {
        let address = encode_stellar_address(&key);
        prop_assert!(address.starts_with('G'));
        prop_assert_eq!(address.len(), 56);
        prop_assert_eq!(decode_stellar_address(&address).unwrap(), key);
    }
}
