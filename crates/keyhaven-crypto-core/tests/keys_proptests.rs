#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]

//! Property-based tests for the master-password key hierarchy and the vault
//! container.

use keyhaven_crypto_core::kdf::Argon2idParams;
use keyhaven_crypto_core::keys::{derive_and_verify, setup};
use keyhaven_crypto_core::symmetric::{decrypt, encrypt, KEY_LEN};
use keyhaven_crypto_core::vault_format;
use keyhaven_crypto_core::CryptoError;
use proptest::prelude::*;

/// Small params for fast property tests.
const PROP_PARAMS: Argon2idParams = Argon2idParams {
    m_cost: 32,
    t_cost: 1,
    p_cost: 1,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// A sealed entry set opens to the same bytes under the re-derived key.
    #[test]
    fn container_roundtrip_under_derived_key(
        password in "[ -~]{1,32}",
        payload in proptest::collection::vec(any::<u8>(), 0..2048),
    ) {
        let (meta, key) = setup(password.as_bytes(), &PROP_PARAMS).expect("setup");
        let bytes = vault_format::seal(&meta, &payload, key.expose()).expect("seal");

        let header = vault_format::parse_metadata(&bytes).expect("parse");
        let again = derive_and_verify(password.as_bytes(), &header).expect("verify");
        let opened = vault_format::open(&bytes, again.expose()).expect("open");
        prop_assert_eq!(opened.expose(), payload.as_slice());
    }

    /// Any different password is rejected, however close to the original.
    #[test]
    fn wrong_password_always_rejected(
        password in "[ -~]{1,24}",
        flip in 0usize..24,
    ) {
        let (meta, _) = setup(password.as_bytes(), &PROP_PARAMS).expect("setup");

        let mut wrong = password.clone().into_bytes();
        let idx = flip % wrong.len();
        wrong[idx] ^= 0x01;
        prop_assume!(wrong != password.as_bytes());

        prop_assert!(matches!(
            derive_and_verify(&wrong, &meta),
            Err(CryptoError::VerifierMismatch)
        ));
        let mut longer = password.clone().into_bytes();
        longer.push(b'x');
        prop_assert!(derive_and_verify(&longer, &meta).is_err());
    }
}

proptest! {
    /// Encrypt/decrypt roundtrip with arbitrary AAD.
    #[test]
    fn encrypt_decrypt_roundtrip(
        plaintext in proptest::collection::vec(any::<u8>(), 0..4096),
        aad in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let key = [0xCC; KEY_LEN];
        let sealed = encrypt(&plaintext, &key, &aad).expect("encrypt");
        let opened = decrypt(&sealed, &key, &aad).expect("decrypt");
        prop_assert_eq!(opened.expose(), plaintext.as_slice());
    }

    /// Any single flipped ciphertext bit fails closed.
    #[test]
    fn flipped_bit_never_decrypts(
        plaintext in proptest::collection::vec(any::<u8>(), 1..512),
        pos in any::<usize>(),
        bit in 0u8..8,
    ) {
        let key = [0xCC; KEY_LEN];
        let mut sealed = encrypt(&plaintext, &key, &[]).expect("encrypt");
        let idx = pos % sealed.ciphertext.len();
        sealed.ciphertext[idx] ^= 1 << bit;
        prop_assert!(matches!(
            decrypt(&sealed, &key, &[]),
            Err(CryptoError::IntegrityFailure)
        ));
    }
}
