//! HPKE: the interface ECH is written against, and an implementation of it.

pub(crate) mod aead;
pub(crate) mod hkdf;
pub(crate) mod kem;

/// HPKE interfaces.
pub mod hpke;

/// HPKE over the RustCrypto crates.
pub mod rust_crypto;

pub use crate::rand::{GetRandomFailed, SecureRandom};
pub use rust_crypto::{DRAFT05_HPKE_PROVIDER, HPKE_PROVIDER};
