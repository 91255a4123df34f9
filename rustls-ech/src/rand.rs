//! The single place where we generate random material for our own use.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;

use rand_core::{OsRng, RngCore};

/// A source of cryptographically secure randomness.
pub trait SecureRandom: Send + Sync + Debug {
    /// Fill the given buffer with random bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed>;
}

/// [`SecureRandom`] backed by the operating system.
#[derive(Debug)]
pub struct OsRandom;

impl SecureRandom for OsRandom {
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|_| GetRandomFailed)
    }
}

/// The default randomness source.
pub static DEFAULT_SECURE_RANDOM: &dyn SecureRandom = &OsRandom;

/// Make a [`Vec<u8>`] of the given size containing random material.
pub(crate) fn random_vec(
    secure_random: &dyn SecureRandom,
    len: usize,
) -> Result<Vec<u8>, GetRandomFailed> {
    let mut v = vec![0; len];
    secure_random.fill(&mut v)?;
    Ok(v)
}

/// Random material generation failed.
#[derive(Debug)]
pub struct GetRandomFailed;
