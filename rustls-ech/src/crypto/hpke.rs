use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt::{self, Debug};

use zeroize::Zeroize;

use crate::error::Error;
use crate::msgs::enums::HpkeKem;
use crate::msgs::handshake::HpkeSymmetricCipherSuite;

/// The largest plaintext or ciphertext we will seal or open.
///
/// This matches the bound of the ECH `payload` field, which has a u16 length.
pub const MAX_HPKE_PAYLOAD_LEN: usize = 0xffff;

/// A KEM together with the KDF and AEAD pairing an ECH config advertises.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct HpkeSuite {
    pub kem: HpkeKem,
    pub sym: HpkeSymmetricCipherSuite,
}

/// The four HPKE modes of [RFC 9180 §5].
///
/// [RFC 9180 §5]: https://www.rfc-editor.org/rfc/rfc9180.html#section-5
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Mode {
    #[default]
    Base,
    Psk,
    Auth,
    AuthPsk,
}

impl Mode {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Self::Base => 0x00,
            Self::Psk => 0x01,
            Self::Auth => 0x02,
            Self::AuthPsk => 0x03,
        }
    }

    pub(crate) fn uses_psk(self) -> bool {
        matches!(self, Self::Psk | Self::AuthPsk)
    }

    pub(crate) fn is_authenticated(self) -> bool {
        matches!(self, Self::Auth | Self::AuthPsk)
    }
}

/// Which revision of the HPKE key schedule to run.
///
/// Deployed ECH draft-09 peers were built against draft-05 of HPKE, which
/// differs from RFC 9180 in its version label, in how the PSK is mixed into
/// the secret, and in the name of the nonce label.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HpkeRevision {
    /// RFC 9180.
    #[default]
    V1,
    /// draft-irtf-cfrg-hpke-05.
    Draft05,
}

impl HpkeRevision {
    pub(crate) fn version_label(self) -> &'static [u8] {
        match self {
            Self::V1 => b"HPKE-v1",
            Self::Draft05 => b"HPKE-05 ",
        }
    }
}

/// The optional inputs that select between the HPKE modes.
///
/// Empty `psk`/`psk_id` values are treated as absent.
#[derive(Clone, Copy, Default)]
pub struct ModeInputs<'a> {
    /// The pre-shared key, for [`Mode::Psk`] and [`Mode::AuthPsk`].
    pub psk: Option<&'a [u8]>,
    /// Identifier of the pre-shared key.
    pub psk_id: Option<&'a [u8]>,
    /// The sender's static key, needed by the sealer in authenticated modes.
    pub sender_private_key: Option<&'a HpkePrivateKey>,
    /// The sender's static public key, needed by the opener in authenticated modes.
    pub sender_public_key: Option<&'a HpkePublicKey>,
}

impl<'a> ModeInputs<'a> {
    pub fn with_psk(mut self, psk: &'a [u8], psk_id: &'a [u8]) -> Self {
        self.psk = Some(psk);
        self.psk_id = Some(psk_id);
        self
    }

    pub fn with_sender_private_key(mut self, key: &'a HpkePrivateKey) -> Self {
        self.sender_private_key = Some(key);
        self
    }

    pub fn with_sender_public_key(mut self, key: &'a HpkePublicKey) -> Self {
        self.sender_public_key = Some(key);
        self
    }

    pub(crate) fn psk(&self) -> &'a [u8] {
        self.psk.unwrap_or_default()
    }

    pub(crate) fn psk_id(&self) -> &'a [u8] {
        self.psk_id.unwrap_or_default()
    }
}

impl Debug for ModeInputs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeInputs")
            .field("psk", &self.psk.map(|_| "<redacted>"))
            .field("psk_id", &self.psk_id)
            .field("sender_private_key", &self.sender_private_key.is_some())
            .field("sender_public_key", &self.sender_public_key)
            .finish()
    }
}

/// A source of [`Hpke`] instances, one per suite.
pub trait HpkeProvider: Debug + Send + Sync {
    /// An instance for `suite`, or [`Error::UnsupportedSuite`].
    fn start(&self, suite: &HpkeSuite) -> Result<Box<dyn Hpke + 'static>, Error>;

    fn supports_suite(&self, suite: &HpkeSuite) -> bool;
}

/// Base-mode HPKE for one suite.
///
/// Names follow RFC 9180: the recipient's keys are `pkR` and `skR`.
pub trait Hpke: Debug + Send + Sync {
    /// Single-shot `Seal(pkR, info, aad, pt)`: encapsulate to `pub_key` and
    /// seal one message.
    fn seal(
        &self,
        info: &[u8],
        aad: &[u8],
        plaintext: &[u8],
        pub_key: &HpkePublicKey,
    ) -> Result<(EncapsulatedSecret, Vec<u8>), Error> {
        let (enc, mut sealer) = self.setup_sealer(info, pub_key)?;
        Ok((enc, sealer.seal(aad, plaintext)?))
    }

    /// `SetupBaseS(pkR, info)`. The returned `enc` goes to the recipient.
    fn setup_sealer(
        &self,
        info: &[u8],
        pub_key: &HpkePublicKey,
    ) -> Result<(EncapsulatedSecret, Box<dyn HpkeSealer + 'static>), Error>;

    /// Single-shot `Open(enc, skR, info, aad, ct)`.
    ///
    /// Fails with [`Error::DecryptError`] if `ciphertext` was not sealed to
    /// this key with the same `info` and `aad`.
    fn open(
        &self,
        enc: &EncapsulatedSecret,
        info: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        secret_key: &HpkePrivateKey,
    ) -> Result<Vec<u8>, Error> {
        self.setup_opener(enc, info, secret_key)?
            .open(aad, ciphertext)
    }

    /// `SetupBaseR(enc, skR, info)`.
    fn setup_opener(
        &self,
        enc: &EncapsulatedSecret,
        info: &[u8],
        secret_key: &HpkePrivateKey,
    ) -> Result<Box<dyn HpkeOpener + 'static>, Error>;

    /// A fresh recipient key pair, in the KEM's serialized form.
    fn generate_key_pair(&self) -> Result<(HpkePublicKey, HpkePrivateKey), Error>;

    fn suite(&self) -> HpkeSuite;
}

/// The sender's half of an HPKE context.
///
/// Each `seal` uses the next sequence number, so messages must be opened
/// in the order they were sealed.
pub trait HpkeSealer: Debug + Send + Sync + 'static {
    fn seal(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>;

    /// Derive `len` bytes of secret from this context for `exporter_context`.
    fn export(&self, exporter_context: &[u8], len: usize) -> Result<Vec<u8>, Error>;
}

/// The recipient's half of an HPKE context.
pub trait HpkeOpener: Debug + Send + Sync + 'static {
    /// A failed open does not advance the sequence number.
    fn open(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error>;

    /// Derive `len` bytes of secret from this context for `exporter_context`.
    fn export(&self, exporter_context: &[u8], len: usize) -> Result<Vec<u8>, Error>;
}

/// A serialized KEM public key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HpkePublicKey(pub Vec<u8>);

/// A serialized KEM private key. Zeroed on drop.
#[derive(Clone)]
pub struct HpkePrivateKey(Vec<u8>);

impl HpkePrivateKey {
    pub fn secret_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl From<Vec<u8>> for HpkePrivateKey {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Debug for HpkePrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HpkePrivateKey")
            .field(&"<redacted>")
            .finish()
    }
}

impl Drop for HpkePrivateKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// The KEM output `enc` that travels from sender to recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncapsulatedSecret(pub Vec<u8>);

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::vec;

    use super::*;

    #[test]
    fn private_keys_are_not_printed() {
        let key = HpkePrivateKey::from(vec![0xaa; 32]);
        assert_eq!(format!("{key:?}"), "HpkePrivateKey(\"<redacted>\")");
    }

    #[test]
    fn mode_inputs_default_to_absent() {
        let inputs = ModeInputs::default();
        assert!(inputs.psk().is_empty());
        assert!(inputs.psk_id().is_empty());

        let inputs = inputs.with_psk(b"secret", b"id");
        assert_eq!(inputs.psk(), b"secret");
        assert!(!format!("{inputs:?}").contains("secret"));
    }

    #[test]
    fn mode_codes() {
        assert_eq!(Mode::Base.to_u8(), 0);
        assert_eq!(Mode::AuthPsk.to_u8(), 3);
        assert!(Mode::AuthPsk.uses_psk());
        assert!(Mode::AuthPsk.is_authenticated());
        assert!(!Mode::Psk.is_authenticated());
    }
}
