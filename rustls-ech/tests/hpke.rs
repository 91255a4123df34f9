//! Interoperability of our HPKE with hpke-rs, in every mode and both directions.

use hpke_rs::{Hpke as HpkeRs, Mode as HpkeRsMode};
use hpke_rs_crypto::types::{AeadAlgorithm, KdfAlgorithm, KemAlgorithm};
use hpke_rs_rust_crypto::HpkeRustCrypto;
use rustls_ech::crypto::hpke::{
    EncapsulatedSecret, HpkeOpener, HpkePrivateKey, HpkePublicKey, HpkeRevision, HpkeSealer,
    HpkeSuite, Mode, ModeInputs,
};
use rustls_ech::crypto::rust_crypto::RustCryptoHpke;
use rustls_ech::crypto::HPKE_PROVIDER;
use rustls_ech::msgs::enums::{HpkeAead, HpkeKdf, HpkeKem};
use rustls_ech::msgs::handshake::HpkeSymmetricCipherSuite;

const INFO: &[u8] = b"tls ech\0interop";
const AAD: &[u8] = b"outer client hello";
const PLAINTEXT: &[u8] = b"inner client hello";
const PSK: &[u8] = &[0x5a; 32];
const PSK_ID: &[u8] = b"psk identity";

const MODES: [Mode; 4] = [Mode::Base, Mode::Psk, Mode::Auth, Mode::AuthPsk];

fn suites() -> Vec<HpkeSuite> {
    [
        (
            HpkeKem::DHKEM_X25519_HKDF_SHA256,
            HpkeKdf::HKDF_SHA256,
            HpkeAead::AES_128_GCM,
        ),
        (
            HpkeKem::DHKEM_X25519_HKDF_SHA256,
            HpkeKdf::HKDF_SHA256,
            HpkeAead::CHACHA20_POLY_1305,
        ),
        (
            HpkeKem::DHKEM_P256_HKDF_SHA256,
            HpkeKdf::HKDF_SHA256,
            HpkeAead::AES_128_GCM,
        ),
        (
            HpkeKem::DHKEM_P256_HKDF_SHA256,
            HpkeKdf::HKDF_SHA512,
            HpkeAead::AES_256_GCM,
        ),
    ]
    .into_iter()
    .map(|(kem, kdf_id, aead_id)| HpkeSuite {
        kem,
        sym: HpkeSymmetricCipherSuite { kdf_id, aead_id },
    })
    .collect()
}

fn hpke_rs_mode(mode: Mode) -> HpkeRsMode {
    match mode {
        Mode::Base => HpkeRsMode::Base,
        Mode::Psk => HpkeRsMode::Psk,
        Mode::Auth => HpkeRsMode::Auth,
        Mode::AuthPsk => HpkeRsMode::AuthPsk,
    }
}

fn hpke_rs_for(suite: &HpkeSuite, mode: Mode) -> HpkeRs<HpkeRustCrypto> {
    HpkeRs::new(
        hpke_rs_mode(mode),
        KemAlgorithm::try_from(u16::from(suite.kem)).unwrap(),
        KdfAlgorithm::try_from(u16::from(suite.sym.kdf_id)).unwrap(),
        AeadAlgorithm::try_from(u16::from(suite.sym.aead_id)).unwrap(),
    )
}

struct Keys {
    recipient: (HpkePublicKey, HpkePrivateKey),
    sender: (HpkePublicKey, HpkePrivateKey),
}

impl Keys {
    fn generate(suite: &HpkeSuite) -> Self {
        let hpke = HPKE_PROVIDER.start(suite).unwrap();
        Self {
            recipient: hpke.generate_key_pair().unwrap(),
            sender: hpke.generate_key_pair().unwrap(),
        }
    }

    fn theirs_public(key: &HpkePublicKey) -> hpke_rs::HpkePublicKey {
        hpke_rs::HpkePublicKey::new(key.0.clone())
    }

    fn theirs_private(key: &HpkePrivateKey) -> hpke_rs::HpkePrivateKey {
        hpke_rs::HpkePrivateKey::new(key.secret_bytes().to_vec())
    }
}

fn psk_for(mode: Mode) -> (Option<&'static [u8]>, Option<&'static [u8]>) {
    match mode {
        Mode::Psk | Mode::AuthPsk => (Some(PSK), Some(PSK_ID)),
        Mode::Base | Mode::Auth => (None, None),
    }
}

fn authenticated(mode: Mode) -> bool {
    matches!(mode, Mode::Auth | Mode::AuthPsk)
}

#[test]
fn we_seal_they_open() {
    let _ = env_logger::builder()
        .is_test(true)
        .try_init();

    for suite in suites() {
        for mode in MODES {
            println!("sealing {suite:?} in {mode:?}");
            let keys = Keys::generate(&suite);
            let (psk, psk_id) = psk_for(mode);

            let mut inputs = ModeInputs {
                psk,
                psk_id,
                ..ModeInputs::default()
            };
            if authenticated(mode) {
                inputs = inputs.with_sender_private_key(&keys.sender.1);
            }

            let ours = RustCryptoHpke::new(&suite, HpkeRevision::V1).unwrap();
            let (enc, mut sealer) = ours
                .setup_sealer_with(mode, INFO, &keys.recipient.0, &inputs)
                .unwrap();
            let first = sealer.seal(AAD, PLAINTEXT).unwrap();
            let second = sealer.seal(b"", b"second").unwrap();

            let sender_pk = Keys::theirs_public(&keys.sender.0);
            let mut context = hpke_rs_for(&suite, mode)
                .setup_receiver(
                    &enc.0,
                    &Keys::theirs_private(&keys.recipient.1),
                    INFO,
                    psk,
                    psk_id,
                    authenticated(mode).then_some(&sender_pk),
                )
                .unwrap();
            assert_eq!(context.open(AAD, &first).unwrap(), PLAINTEXT);
            assert_eq!(context.open(b"", &second).unwrap(), b"second");

            assert_eq!(
                context.export(b"exporter", 42).unwrap(),
                sealer.export(b"exporter", 42).unwrap()
            );
        }
    }
}

#[test]
fn they_seal_we_open() {
    for suite in suites() {
        for mode in MODES {
            println!("opening {suite:?} in {mode:?}");
            let keys = Keys::generate(&suite);
            let (psk, psk_id) = psk_for(mode);

            let sender_sk = Keys::theirs_private(&keys.sender.1);
            let (enc, mut context) = hpke_rs_for(&suite, mode)
                .setup_sender(
                    &Keys::theirs_public(&keys.recipient.0),
                    INFO,
                    psk,
                    psk_id,
                    authenticated(mode).then_some(&sender_sk),
                )
                .unwrap();
            let ciphertext = context.seal(AAD, PLAINTEXT).unwrap();

            let mut inputs = ModeInputs {
                psk,
                psk_id,
                ..ModeInputs::default()
            };
            if authenticated(mode) {
                inputs = inputs.with_sender_public_key(&keys.sender.0);
            }

            let ours = RustCryptoHpke::new(&suite, HpkeRevision::V1).unwrap();
            let mut opener = ours
                .setup_opener_with(
                    mode,
                    &EncapsulatedSecret(enc),
                    INFO,
                    &keys.recipient.1,
                    &inputs,
                )
                .unwrap();
            assert_eq!(opener.open(AAD, &ciphertext).unwrap(), PLAINTEXT);
            assert_eq!(
                opener.export(b"", 32).unwrap(),
                context.export(b"", 32).unwrap()
            );

            // the sequence number moved on, so a replay fails
            assert!(opener.open(AAD, &ciphertext).is_err());
        }
    }
}

#[test]
fn draft05_does_not_interoperate_with_v1() {
    let suite = suites()[0];
    let keys = Keys::generate(&suite);

    let draft = RustCryptoHpke::new(&suite, HpkeRevision::Draft05).unwrap();
    let (enc, ciphertext) = draft
        .seal_with(
            Mode::Base,
            INFO,
            AAD,
            PLAINTEXT,
            &keys.recipient.0,
            &ModeInputs::default(),
        )
        .unwrap();

    assert!(hpke_rs_for(&suite, Mode::Base)
        .open(
            &enc.0,
            &Keys::theirs_private(&keys.recipient.1),
            INFO,
            AAD,
            &ciphertext,
            None,
            None,
            None,
        )
        .is_err());

    assert_eq!(
        draft
            .open_with(
                Mode::Base,
                &enc,
                INFO,
                AAD,
                &ciphertext,
                &keys.recipient.1,
                &ModeInputs::default(),
            )
            .unwrap(),
        PLAINTEXT
    );
}
