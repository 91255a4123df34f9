//! HKDF over the SHA-2 family, as used by HPKE and by TLS1.3 key derivation.

use alloc::vec::Vec;
use core::fmt;

use hkdf::{Hkdf, HkdfExtract};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroize;

use crate::crypto::hpke::{HpkeRevision, HpkeSuite};
use crate::msgs::enums::{HpkeKdf, HpkeKem};

/// Hash functions that back a KDF.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HashAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    pub(crate) fn for_kdf(kdf: HpkeKdf) -> Option<Self> {
        match kdf {
            HpkeKdf::HKDF_SHA256 => Some(Self::Sha256),
            HpkeKdf::HKDF_SHA384 => Some(Self::Sha384),
            HpkeKdf::HKDF_SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// `Nh`: the output size of the hash, and so of `Extract`.
    pub(crate) fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// `Hash(concat(parts))`.
    pub(crate) fn hash(self, parts: &[&[u8]]) -> OkmBlock {
        fn run<D: Digest>(parts: &[&[u8]]) -> OkmBlock {
            let mut ctx = D::new();
            for p in parts {
                ctx.update(p);
            }
            OkmBlock::new(&ctx.finalize())
        }

        match self {
            Self::Sha256 => run::<Sha256>(parts),
            Self::Sha384 => run::<Sha384>(parts),
            Self::Sha512 => run::<Sha512>(parts),
        }
    }

    /// `HKDF-Extract(salt, concat(ikm))`.
    ///
    /// An empty `salt` is equivalent to `Nh` zero bytes.
    pub(crate) fn extract(self, salt: &[u8], ikm: &[&[u8]]) -> Prk {
        macro_rules! run {
            ($hash:ty) => {{
                let mut ctx = HkdfExtract::<$hash>::new(Some(salt));
                for part in ikm {
                    ctx.input_ikm(part);
                }
                let (mut prk, _) = ctx.finalize();
                let block = OkmBlock::new(&prk);
                prk.as_mut_slice().zeroize();
                block
            }};
        }

        let block = match self {
            Self::Sha256 => run!(Sha256),
            Self::Sha384 => run!(Sha384),
            Self::Sha512 => run!(Sha512),
        };
        Prk { alg: self, block }
    }

    /// Treat `prk` (which must be `Nh` bytes long) as a pseudorandom key.
    pub(crate) fn prk_from_bytes(self, prk: &[u8]) -> Result<Prk, OutputLengthError> {
        if prk.len() != self.output_len() {
            return Err(OutputLengthError);
        }
        Ok(Prk {
            alg: self,
            block: OkmBlock::new(prk),
        })
    }
}

/// A pseudorandom key: the output of `Extract`, the input of `Expand`.
pub(crate) struct Prk {
    alg: HashAlgorithm,
    block: OkmBlock,
}

impl Prk {
    /// `HKDF-Expand(PRK, concat(info), L)` where `L` is `output.len()`.
    pub(crate) fn expand_slice(
        &self,
        info: &[&[u8]],
        output: &mut [u8],
    ) -> Result<(), OutputLengthError> {
        if output.len() > 255 * self.alg.output_len() {
            return Err(OutputLengthError);
        }

        macro_rules! run {
            ($hash:ty) => {
                Hkdf::<$hash>::from_prk(self.block.as_ref())
                    .map_err(|_| OutputLengthError)?
                    .expand_multi_info(info, output)
                    .map_err(|_| OutputLengthError)
            };
        }

        match self.alg {
            HashAlgorithm::Sha256 => run!(Sha256),
            HashAlgorithm::Sha384 => run!(Sha384),
            HashAlgorithm::Sha512 => run!(Sha512),
        }
    }

    /// `HKDF-Expand-Label` from RFC8446 section 7.1.
    pub(crate) fn expand_label(
        &self,
        label: &[u8],
        context: &[u8],
        output: &mut [u8],
    ) -> Result<(), OutputLengthError> {
        const LABEL_PREFIX: &[u8] = b"tls13 ";

        let output_len = u16::try_from(output.len())
            .map_err(|_| OutputLengthError)?
            .to_be_bytes();
        let label_len = [(LABEL_PREFIX.len() + label.len()) as u8];
        let context_len = [context.len() as u8];

        let info = &[
            &output_len[..],
            &label_len[..],
            LABEL_PREFIX,
            label,
            &context_len[..],
            context,
        ];
        self.expand_slice(info, output)
    }
}

impl AsRef<[u8]> for Prk {
    fn as_ref(&self) -> &[u8] {
        self.block.as_ref()
    }
}

impl fmt::Debug for Prk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prk")
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

/// See [RFC 9180 §4 "Cryptographic Dependencies"][0].
///
/// [0]: https://www.rfc-editor.org/rfc/rfc9180.html#section-4
pub(crate) fn labeled_extract(
    hash: HashAlgorithm,
    revision: HpkeRevision,
    suite_id: &LabeledSuiteId,
    salt: &[u8],
    label: Label,
    ikm: &[u8],
) -> Prk {
    // def LabeledExtract(salt, label, ikm):
    //   labeled_ikm = concat("HPKE-v1", suite_id, label, ikm)
    //   return Extract(salt, labeled_ikm)
    hash.extract(
        salt,
        &[
            revision.version_label(),
            &suite_id.encoded(),
            label.as_bytes(revision),
            ikm,
        ],
    )
}

/// See [RFC 9180 §4 "Cryptographic Dependencies"][0].
///
/// [0]: https://www.rfc-editor.org/rfc/rfc9180.html#section-4
pub(crate) fn labeled_expand(
    prk: &Prk,
    revision: HpkeRevision,
    suite_id: &LabeledSuiteId,
    label: Label,
    info: &[u8],
    output: &mut [u8],
) -> Result<(), OutputLengthError> {
    // def LabeledExpand(prk, label, info, L):
    //   labeled_info = concat(I2OSP(L, 2), "HPKE-v1", suite_id,
    //                         label, info)
    //   return Expand(prk, labeled_info, L)
    let output_len = u16::try_from(output.len())
        .map_err(|_| OutputLengthError)?
        .to_be_bytes();
    prk.expand_slice(
        &[
            &output_len[..],
            revision.version_label(),
            &suite_id.encoded(),
            label.as_bytes(revision),
            info,
        ],
        output,
    )
}

/// The labels used with [labeled_extract] and [labeled_expand].
#[derive(Clone, Copy, Debug)]
pub(crate) enum Label {
    PskIdHash,
    InfoHash,
    PskHash,
    Secret,
    Key,
    BaseNonce,
    Exporter,
    EaePrk,
    SharedSecret,
    Export,
}

impl Label {
    fn as_bytes(self, revision: HpkeRevision) -> &'static [u8] {
        match self {
            Self::PskIdHash => b"psk_id_hash",
            Self::InfoHash => b"info_hash",
            Self::PskHash => b"psk_hash",
            Self::Secret => b"secret",
            Self::Key => b"key",
            Self::BaseNonce => match revision {
                HpkeRevision::V1 => b"base_nonce",
                HpkeRevision::Draft05 => b"nonce",
            },
            Self::Exporter => b"exp",
            Self::EaePrk => b"eae_prk",
            Self::SharedSecret => b"shared_secret",
            Self::Export => b"sec",
        }
    }
}

/// The suite ID encoding depends on the context of use. In the general HPKE context,
/// we use a "HPKE" prefix and encode the entire ciphersuite. In the KEM context we use a
/// "KEM" prefix and only encode the KEM ID.
#[derive(Debug, Copy, Clone)]
pub(crate) enum LabeledSuiteId {
    Hpke(HpkeSuite),
    Kem(HpkeKem),
}

impl LabeledSuiteId {
    fn encoded(&self) -> Vec<u8> {
        match self {
            Self::Hpke(suite) => [
                &b"HPKE"[..],
                &u16::from(suite.kem).to_be_bytes(),
                &u16::from(suite.sym.kdf_id).to_be_bytes(),
                &u16::from(suite.sym.aead_id).to_be_bytes(),
            ]
            .concat(),
            Self::Kem(kem) => [&b"KEM"[..], &u16::from(*kem).to_be_bytes()].concat(),
        }
    }
}

/// A buffer of at most one hash output, zeroed on drop.
#[derive(Clone)]
pub(crate) struct OkmBlock {
    buf: [u8; Self::MAX_LEN],
    used: usize,
}

impl OkmBlock {
    /// Size of the largest hash we support.
    pub(crate) const MAX_LEN: usize = 64;

    pub(crate) fn new(bytes: &[u8]) -> Self {
        let mut tag = Self {
            buf: [0u8; Self::MAX_LEN],
            used: bytes.len(),
        };
        tag.buf[..bytes.len()].copy_from_slice(bytes);
        tag
    }
}

impl AsRef<[u8]> for OkmBlock {
    fn as_ref(&self) -> &[u8] {
        &self.buf[..self.used]
    }
}

impl Drop for OkmBlock {
    fn drop(&mut self) {
        self.buf.zeroize();
    }
}

/// An error type used for `Prk::expand_slice` when
/// the slice exceeds the maximum HKDF output length.
#[derive(Debug)]
pub(crate) struct OutputLengthError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test case 1 from RFC5869.
    #[test]
    fn rfc5869_test_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();

        let prk = HashAlgorithm::Sha256.extract(&salt, &[&ikm]);
        assert_eq!(
            prk.as_ref(),
            &hex::decode("077709362c2e32df0ddc3f0dc47bba6390b6c73bb50f9c3122ec844ad7c2b3e5")
                .unwrap()[..]
        );

        let mut okm = [0u8; 42];
        prk.expand_slice(&[&info[..5], &info[5..]], &mut okm)
            .unwrap();
        assert_eq!(
            okm.to_vec(),
            hex::decode(
                "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
            )
            .unwrap()
        );
    }

    #[test]
    fn split_ikm_matches_joined_ikm() {
        let joined = HashAlgorithm::Sha384.extract(b"salt", &[b"abcdef"]);
        let split = HashAlgorithm::Sha384.extract(b"salt", &[b"ab", b"", b"cdef"]);
        assert_eq!(joined.as_ref(), split.as_ref());
        assert_eq!(joined.as_ref().len(), 48);
    }

    #[test]
    fn expand_rejects_overlong_output() {
        let prk = HashAlgorithm::Sha256.extract(b"", &[b"ikm"]);
        let mut out = [0u8; 255 * 32 + 1];
        assert!(prk.expand_slice(&[], &mut out).is_err());
        assert!(prk
            .expand_slice(&[], &mut out[..255 * 32])
            .is_ok());
    }

    #[test]
    fn prk_from_bytes_checks_length() {
        assert!(HashAlgorithm::Sha256
            .prk_from_bytes(&[0u8; 31])
            .is_err());
        assert!(HashAlgorithm::Sha512
            .prk_from_bytes(&[0u8; 64])
            .is_ok());
    }

    #[test]
    fn suite_ids() {
        assert_eq!(
            LabeledSuiteId::Kem(HpkeKem::DHKEM_X25519_HKDF_SHA256).encoded(),
            b"KEM\x00\x20"
        );
        let suite = HpkeSuite {
            kem: HpkeKem::DHKEM_P256_HKDF_SHA256,
            sym: crate::msgs::handshake::HpkeSymmetricCipherSuite {
                kdf_id: HpkeKdf::HKDF_SHA256,
                aead_id: crate::msgs::enums::HpkeAead::CHACHA20_POLY_1305,
            },
        };
        assert_eq!(
            LabeledSuiteId::Hpke(suite).encoded(),
            b"HPKE\x00\x10\x00\x01\x00\x03"
        );
    }

    #[test]
    fn nonce_label_depends_on_revision() {
        assert_eq!(Label::BaseNonce.as_bytes(HpkeRevision::V1), b"base_nonce");
        assert_eq!(Label::BaseNonce.as_bytes(HpkeRevision::Draft05), b"nonce");
    }

    #[test]
    fn labeled_expand_prefixes_length() {
        let suite_id = LabeledSuiteId::Kem(HpkeKem::DHKEM_X25519_HKDF_SHA256);
        let prk = HashAlgorithm::Sha256.extract(b"", &[b"ikm"]);
        let mut labeled = [0u8; 7];
        labeled_expand(
            &prk,
            HpkeRevision::V1,
            &suite_id,
            Label::SharedSecret,
            b"ctx",
            &mut labeled,
        )
        .unwrap();

        let mut manual = [0u8; 7];
        prk.expand_slice(
            &[b"\x00\x07", b"HPKE-v1", b"KEM\x00\x20", b"shared_secret", b"ctx"],
            &mut manual,
        )
        .unwrap();
        assert_eq!(labeled, manual);
    }

    #[test]
    fn kdf_mapping() {
        assert_eq!(
            HashAlgorithm::for_kdf(HpkeKdf::HKDF_SHA512),
            Some(HashAlgorithm::Sha512)
        );
        assert_eq!(HashAlgorithm::for_kdf(HpkeKdf::Unknown(9)), None);
    }

    #[test]
    fn hash_of_parts() {
        let whole = HashAlgorithm::Sha256.hash(&[b"abc"]);
        let parts = HashAlgorithm::Sha256.hash(&[b"a", b"bc"]);
        assert_eq!(whole.as_ref(), parts.as_ref());
        assert_eq!(
            whole.as_ref(),
            &hex::decode("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
                .unwrap()[..]
        );
    }
}
