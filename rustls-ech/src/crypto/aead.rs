use alloc::vec::Vec;

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::ChaCha20Poly1305;
use zeroize::Zeroize;

use crate::error::Error;
use crate::msgs::enums::HpkeAead;
use crate::suites::AeadParams;

/// A symmetric key for one of the HPKE AEADs, zeroed on drop.
pub(crate) struct AeadKey {
    alg: &'static AeadParams,
    buf: [u8; Self::MAX_LEN],
}

impl AeadKey {
    const MAX_LEN: usize = 32;

    /// Build a key from `Nk` bytes of key schedule output.
    pub(crate) fn new(alg: &'static AeadParams, key: &[u8]) -> Result<Self, Error> {
        if key.len() != alg.n_k || key.len() > Self::MAX_LEN {
            return Err(Error::General("AEAD key has the wrong length".into()));
        }
        let mut buf = [0u8; Self::MAX_LEN];
        buf[..key.len()].copy_from_slice(key);
        Ok(Self { alg, buf })
    }

    fn as_slice(&self) -> &[u8] {
        &self.buf[..self.alg.n_k]
    }

    /// Encrypt `plaintext`, appending the `Nt`-byte tag.
    pub(crate) fn seal(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        let payload = Payload {
            msg: plaintext,
            aad,
        };

        macro_rules! run {
            ($cipher:ty) => {
                <$cipher>::new_from_slice(self.as_slice())
                    .map_err(|_| Error::EncryptError)?
                    .encrypt(GenericArray::from_slice(nonce), payload)
                    .map_err(|_| Error::EncryptError)
            };
        }

        self.check_nonce(nonce)?;
        match self.alg.id {
            HpkeAead::AES_128_GCM => run!(Aes128Gcm),
            HpkeAead::AES_256_GCM => run!(Aes256Gcm),
            HpkeAead::CHACHA20_POLY_1305 => run!(ChaCha20Poly1305),
            _ => Err(Error::EncryptError),
        }
    }

    /// Decrypt and authenticate `ciphertext` (tag included).
    ///
    /// No plaintext is returned unless the tag verifies.
    pub(crate) fn open(&self, nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if ciphertext.len() < self.alg.n_t {
            return Err(Error::DecryptError);
        }

        let payload = Payload {
            msg: ciphertext,
            aad,
        };

        macro_rules! run {
            ($cipher:ty) => {
                <$cipher>::new_from_slice(self.as_slice())
                    .map_err(|_| Error::DecryptError)?
                    .decrypt(GenericArray::from_slice(nonce), payload)
                    .map_err(|_| Error::DecryptError)
            };
        }

        self.check_nonce(nonce)
            .map_err(|_| Error::DecryptError)?;
        match self.alg.id {
            HpkeAead::AES_128_GCM => run!(Aes128Gcm),
            HpkeAead::AES_256_GCM => run!(Aes256Gcm),
            HpkeAead::CHACHA20_POLY_1305 => run!(ChaCha20Poly1305),
            _ => Err(Error::DecryptError),
        }
    }

    fn check_nonce(&self, nonce: &[u8]) -> Result<(), Error> {
        match nonce.len() == self.alg.n_n {
            true => Ok(()),
            false => Err(Error::EncryptError),
        }
    }
}

impl Drop for AeadKey {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}
