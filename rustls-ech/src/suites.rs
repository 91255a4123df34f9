//! The registry of HPKE algorithms we know about, and which of them are wired up.

use crate::crypto::hkdf::HashAlgorithm;
use crate::crypto::hpke::HpkeSuite;
use crate::error::Error;
use crate::msgs::enums::{HpkeAead, HpkeKdf, HpkeKem};
use crate::msgs::handshake::HpkeSymmetricCipherSuite;

/// Diffie-Hellman groups behind the DHKEMs we implement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum DhGroup {
    P256,
    P384,
    X25519,
}

/// Parameters of a wired KEM, from RFC 9180 §7.1.
#[derive(Debug, PartialEq, Eq)]
pub struct KemParams {
    pub id: HpkeKem,
    /// `Nsecret`: length of the KEM shared secret.
    pub n_secret: usize,
    /// `Nenc`: length of the encapsulated key.
    pub n_enc: usize,
    /// `Npk`: length of a serialized public key.
    pub n_pk: usize,
    /// `Nsk`: length of a serialized private key.
    pub n_sk: usize,
    pub(crate) group: DhGroup,
    pub(crate) hash: HashAlgorithm,
}

/// Parameters of a wired KDF, from RFC 9180 §7.2.
#[derive(Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub id: HpkeKdf,
    /// `Nh`: output size of `Extract`.
    pub n_h: usize,
    pub(crate) hash: HashAlgorithm,
}

/// Parameters of a wired AEAD, from RFC 9180 §7.3.
#[derive(Debug, PartialEq, Eq)]
pub struct AeadParams {
    pub id: HpkeAead,
    /// `Nk`: key length.
    pub n_k: usize,
    /// `Nn`: nonce length.
    pub n_n: usize,
    /// `Nt`: tag length.
    pub n_t: usize,
}

/// The resolved parameters of a whole suite.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SuiteParams {
    pub kem: &'static KemParams,
    pub kdf: &'static KdfParams,
    pub aead: &'static AeadParams,
}

static KEMS: &[KemParams] = &[
    KemParams {
        id: HpkeKem::DHKEM_P256_HKDF_SHA256,
        n_secret: 32,
        n_enc: 65,
        n_pk: 65,
        n_sk: 32,
        group: DhGroup::P256,
        hash: HashAlgorithm::Sha256,
    },
    KemParams {
        id: HpkeKem::DHKEM_P384_HKDF_SHA384,
        n_secret: 48,
        n_enc: 97,
        n_pk: 97,
        n_sk: 48,
        group: DhGroup::P384,
        hash: HashAlgorithm::Sha384,
    },
    KemParams {
        id: HpkeKem::DHKEM_X25519_HKDF_SHA256,
        n_secret: 32,
        n_enc: 32,
        n_pk: 32,
        n_sk: 32,
        group: DhGroup::X25519,
        hash: HashAlgorithm::Sha256,
    },
];

static KDFS: &[KdfParams] = &[
    KdfParams {
        id: HpkeKdf::HKDF_SHA256,
        n_h: 32,
        hash: HashAlgorithm::Sha256,
    },
    KdfParams {
        id: HpkeKdf::HKDF_SHA384,
        n_h: 48,
        hash: HashAlgorithm::Sha384,
    },
    KdfParams {
        id: HpkeKdf::HKDF_SHA512,
        n_h: 64,
        hash: HashAlgorithm::Sha512,
    },
];

static AEADS: &[AeadParams] = &[
    AeadParams {
        id: HpkeAead::AES_128_GCM,
        n_k: 16,
        n_n: 12,
        n_t: 16,
    },
    AeadParams {
        id: HpkeAead::AES_256_GCM,
        n_k: 32,
        n_n: 12,
        n_t: 16,
    },
    AeadParams {
        id: HpkeAead::CHACHA20_POLY_1305,
        n_k: 32,
        n_n: 12,
        n_t: 16,
    },
];

pub fn lookup_kem(id: HpkeKem) -> Option<&'static KemParams> {
    KEMS.iter().find(|k| k.id == id)
}

pub fn lookup_kdf(id: HpkeKdf) -> Option<&'static KdfParams> {
    KDFS.iter().find(|k| k.id == id)
}

/// Export-only is a known AEAD identifier but can never seal or open, so it
/// is absent here.
pub fn lookup_aead(id: HpkeAead) -> Option<&'static AeadParams> {
    AEADS.iter().find(|a| a.id == id)
}

/// Resolve every identifier in `suite`, failing if any is unknown or not wired.
pub fn lookup(suite: &HpkeSuite) -> Result<SuiteParams, Error> {
    match (
        lookup_kem(suite.kem),
        lookup_kdf(suite.sym.kdf_id),
        lookup_aead(suite.sym.aead_id),
    ) {
        (Some(kem), Some(kdf), Some(aead)) => Ok(SuiteParams { kem, kdf, aead }),
        _ => Err(Error::UnsupportedSuite(*suite)),
    }
}

pub fn is_supported(suite: &HpkeSuite) -> bool {
    lookup(suite).is_ok()
}

const fn suite(kem: HpkeKem, kdf_id: HpkeKdf, aead_id: HpkeAead) -> HpkeSuite {
    HpkeSuite {
        kem,
        sym: HpkeSymmetricCipherSuite { kdf_id, aead_id },
    }
}

const fn all_supported_suites() -> [HpkeSuite; 27] {
    let kems = [
        HpkeKem::DHKEM_X25519_HKDF_SHA256,
        HpkeKem::DHKEM_P256_HKDF_SHA256,
        HpkeKem::DHKEM_P384_HKDF_SHA384,
    ];
    let kdfs = [
        HpkeKdf::HKDF_SHA256,
        HpkeKdf::HKDF_SHA384,
        HpkeKdf::HKDF_SHA512,
    ];
    let aeads = [
        HpkeAead::AES_128_GCM,
        HpkeAead::AES_256_GCM,
        HpkeAead::CHACHA20_POLY_1305,
    ];

    let mut out = [suite(kems[0], kdfs[0], aeads[0]); 27];
    let mut i = 0;
    while i < out.len() {
        out[i] = suite(kems[i / 9], kdfs[(i / 3) % 3], aeads[i % 3]);
        i += 1;
    }
    out
}

/// Every KEM, KDF and AEAD triple that is wired, in preference order.
pub static ALL_SUPPORTED_SUITES: &[HpkeSuite] = &all_supported_suites();
