//! Diffie-Hellman based KEMs, per [RFC 9180 §4.1].
//!
//! [RFC 9180 §4.1]: https://www.rfc-editor.org/rfc/rfc9180.html#section-4.1

use alloc::vec::Vec;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use zeroize::Zeroizing;

use crate::crypto::hkdf::{Label, LabeledSuiteId, OkmBlock, labeled_expand, labeled_extract};
use crate::crypto::hpke::{EncapsulatedSecret, HpkePrivateKey, HpkePublicKey, HpkeRevision};
use crate::error::{Error, KeyScheduleError};
use crate::rand::SecureRandom;
use crate::suites::{DhGroup, KemParams};

/// Upper bound on rejection-sampling attempts for NIST curve scalars.
///
/// For P-256 and P-384 a uniformly random string is out of range with
/// probability below 2^-32, so running out of attempts means the RNG is broken.
const MAX_KEYGEN_ATTEMPTS: usize = 16;

/// A DH-based Key Encapsulation Mechanism (KEM).
#[derive(Debug)]
pub(crate) struct DhKem {
    params: &'static KemParams,
    revision: HpkeRevision,
}

impl DhKem {
    pub(crate) fn new(params: &'static KemParams, revision: HpkeRevision) -> Self {
        Self { params, revision }
    }

    /// Generate an ephemeral key pair and encapsulate a shared secret to `recipient`.
    ///
    /// With `sender` set this is `AuthEncap`, otherwise `Encap`.
    pub(crate) fn encap(
        &self,
        recipient: &HpkePublicKey,
        sender: Option<&HpkePrivateKey>,
        secure_random: &dyn SecureRandom,
    ) -> Result<(KemSharedSecret, EncapsulatedSecret), Error> {
        let (_, sk_e) = self.generate_key_pair(secure_random)?;
        self.encap_with_ephemeral(recipient, sender, &sk_e)
    }

    /// As [`DhKem::encap`], with the ephemeral private key chosen by the caller.
    pub(crate) fn encap_with_ephemeral(
        &self,
        recipient: &HpkePublicKey,
        sender: Option<&HpkePrivateKey>,
        sk_e: &HpkePrivateKey,
    ) -> Result<(KemSharedSecret, EncapsulatedSecret), Error> {
        // def Encap(pkR):
        //   skE, pkE = GenerateKeyPair()
        //   dh = DH(skE, pkR)
        //   enc = SerializePublicKey(pkE)
        //   pkRm = SerializePublicKey(pkR)
        //   kem_context = concat(enc, pkRm)
        //   shared_secret = ExtractAndExpand(dh, kem_context)
        //   return shared_secret, enc
        let enc = self.public_key_of(sk_e)?;
        let mut dh = self.dh(sk_e.secret_bytes(), &recipient.0)?;
        let mut kem_context = [&enc.0[..], &recipient.0[..]].concat();

        // def AuthEncap(pkR, skS):
        //   dh = concat(DH(skE, pkR), DH(skS, pkR))
        //   kem_context = concat(enc, pkRm, pkSm)
        if let Some(sk_s) = sender {
            let pk_s = self.public_key_of(sk_s)?;
            dh.extend_from_slice(&self.dh(sk_s.secret_bytes(), &recipient.0)?);
            kem_context.extend_from_slice(&pk_s.0);
        }

        let shared_secret = self.extract_and_expand(&dh, &kem_context)?;
        Ok((shared_secret, EncapsulatedSecret(enc.0)))
    }

    /// Recover the shared secret from `enc` using the recipient's key.
    ///
    /// With `sender` set this is `AuthDecap`, otherwise `Decap`.
    pub(crate) fn decap(
        &self,
        enc: &EncapsulatedSecret,
        recipient: &HpkePrivateKey,
        sender: Option<&HpkePublicKey>,
    ) -> Result<KemSharedSecret, Error> {
        // def Decap(enc, skR):
        //   pkE = DeserializePublicKey(enc)
        //   dh = DH(skR, pkE)
        //   pkRm = SerializePublicKey(pk(skR))
        //   kem_context = concat(enc, pkRm)
        //   shared_secret = ExtractAndExpand(dh, kem_context)
        //   return shared_secret
        if enc.0.len() != self.params.n_enc {
            return Err(KeyScheduleError::InvalidPublicKey.into());
        }

        let pk_r = self.public_key_of(recipient)?;
        let mut dh = self.dh(recipient.secret_bytes(), &enc.0)?;
        let mut kem_context = [&enc.0[..], &pk_r.0[..]].concat();

        // def AuthDecap(enc, skR, pkS):
        //   dh = concat(DH(skR, pkE), DH(skR, pkS))
        //   kem_context = concat(enc, pkRm, pkSm)
        if let Some(pk_s) = sender {
            dh.extend_from_slice(&self.dh(recipient.secret_bytes(), &pk_s.0)?);
            kem_context.extend_from_slice(&pk_s.0);
        }

        self.extract_and_expand(&dh, &kem_context)
    }

    pub(crate) fn generate_key_pair(
        &self,
        secure_random: &dyn SecureRandom,
    ) -> Result<(HpkePublicKey, HpkePrivateKey), Error> {
        let mut candidate = Zeroizing::new(alloc::vec![0u8; self.params.n_sk]);

        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            secure_random.fill(&mut candidate)?;
            let sk = HpkePrivateKey::from(candidate.to_vec());
            match self.public_key_of(&sk) {
                Ok(pk) => return Ok((pk, sk)),
                Err(Error::KeySchedule(KeyScheduleError::InvalidPrivateKey)) => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::FailedToGetRandomBytes)
    }

    /// Serialize the public key matching `sk`, validating `sk` on the way.
    pub(crate) fn public_key_of(&self, sk: &HpkePrivateKey) -> Result<HpkePublicKey, Error> {
        let sk = sk.secret_bytes();
        if sk.len() != self.params.n_sk {
            return Err(KeyScheduleError::InvalidPrivateKey.into());
        }

        let pk = match self.params.group {
            DhGroup::X25519 => {
                let secret = x25519_dalek::StaticSecret::from(x25519_array(
                    sk,
                    KeyScheduleError::InvalidPrivateKey,
                )?);
                x25519_dalek::PublicKey::from(&secret)
                    .as_bytes()
                    .to_vec()
            }
            DhGroup::P256 => p256::SecretKey::from_slice(sk)
                .map_err(|_| KeyScheduleError::InvalidPrivateKey)?
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
            DhGroup::P384 => p384::SecretKey::from_slice(sk)
                .map_err(|_| KeyScheduleError::InvalidPrivateKey)?
                .public_key()
                .to_encoded_point(false)
                .as_bytes()
                .to_vec(),
        };

        Ok(HpkePublicKey(pk))
    }

    /// `DH(sk, pk)`: the raw shared secret, `Ndh` bytes.
    fn dh(&self, sk: &[u8], pk: &[u8]) -> Result<Zeroizing<Vec<u8>>, KeyScheduleError> {
        if sk.len() != self.params.n_sk {
            return Err(KeyScheduleError::InvalidPrivateKey);
        }
        if pk.len() != self.params.n_pk {
            return Err(KeyScheduleError::InvalidPublicKey);
        }

        macro_rules! nist_dh {
            ($curve:ident) => {{
                let sk = $curve::SecretKey::from_slice(sk)
                    .map_err(|_| KeyScheduleError::InvalidPrivateKey)?;
                let pk = $curve::PublicKey::from_sec1_bytes(pk)
                    .map_err(|_| KeyScheduleError::InvalidPublicKey)?;
                let shared = $curve::ecdh::diffie_hellman(sk.to_nonzero_scalar(), pk.as_affine());
                dh_output(shared.raw_secret_bytes().as_slice())
            }};
        }

        Ok(match self.params.group {
            DhGroup::X25519 => {
                let secret = x25519_dalek::StaticSecret::from(x25519_array(
                    sk,
                    KeyScheduleError::InvalidPrivateKey,
                )?);
                let public = x25519_dalek::PublicKey::from(x25519_array(
                    pk,
                    KeyScheduleError::InvalidPublicKey,
                )?);
                let shared = secret.diffie_hellman(&public);
                // RFC 9180 §7.1.4: senders and recipients MUST check the
                // output is not the all-zero value and abort if so.
                if !shared.was_contributory() {
                    return Err(KeyScheduleError::NonContributory);
                }
                dh_output(shared.as_bytes())
            }
            DhGroup::P256 => nist_dh!(p256),
            DhGroup::P384 => nist_dh!(p384),
        })
    }

    fn extract_and_expand(
        &self,
        dh: &[u8],
        kem_context: &[u8],
    ) -> Result<KemSharedSecret, Error> {
        // def ExtractAndExpand(dh, kem_context):
        //   eae_prk = LabeledExtract("", "eae_prk", dh)
        //   shared_secret = LabeledExpand(eae_prk, "shared_secret",
        //                                 kem_context, Nsecret)
        //   return shared_secret
        let suite_id = LabeledSuiteId::Kem(self.params.id);
        let eae_prk = labeled_extract(
            self.params.hash,
            self.revision,
            &suite_id,
            &[],
            Label::EaePrk,
            dh,
        );

        let mut shared_secret = Zeroizing::new(alloc::vec![0u8; self.params.n_secret]);
        labeled_expand(
            &eae_prk,
            self.revision,
            &suite_id,
            Label::SharedSecret,
            kem_context,
            &mut shared_secret,
        )
        .map_err(|_| KeyScheduleError::OutputLength)?;

        Ok(KemSharedSecret(OkmBlock::new(&shared_secret)))
    }
}

/// A DH output in a secret buffer that can take the second output of the
/// authenticated modes without moving.
fn dh_output(shared: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(Vec::with_capacity(2 * shared.len()));
    out.extend_from_slice(shared);
    out
}

fn x25519_array(bytes: &[u8], err: KeyScheduleError) -> Result<[u8; 32], KeyScheduleError> {
    <[u8; 32]>::try_from(bytes).map_err(|_| err)
}

/// A KEM shared secret, zeroed on drop.
pub(crate) struct KemSharedSecret(OkmBlock);

impl core::fmt::Debug for KemSharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("KemSharedSecret")
    }
}

impl AsRef<[u8]> for KemSharedSecret {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::HpkeKem;
    use crate::rand::DEFAULT_SECURE_RANDOM;
    use crate::suites::lookup_kem;

    fn kem(id: HpkeKem) -> DhKem {
        DhKem::new(lookup_kem(id).unwrap(), HpkeRevision::V1)
    }

    const ALL_KEMS: [HpkeKem; 3] = [
        HpkeKem::DHKEM_X25519_HKDF_SHA256,
        HpkeKem::DHKEM_P256_HKDF_SHA256,
        HpkeKem::DHKEM_P384_HKDF_SHA384,
    ];

    #[test]
    fn encap_decap_agree() {
        for id in ALL_KEMS {
            let kem = kem(id);
            let (pk_r, sk_r) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();
            assert_eq!(pk_r.0.len(), kem.params.n_pk);
            assert_eq!(sk_r.secret_bytes().len(), kem.params.n_sk);

            let (ss_sender, enc) = kem
                .encap(&pk_r, None, DEFAULT_SECURE_RANDOM)
                .unwrap();
            assert_eq!(enc.0.len(), kem.params.n_enc);
            let ss_receiver = kem.decap(&enc, &sk_r, None).unwrap();
            assert_eq!(ss_sender.as_ref(), ss_receiver.as_ref());
            assert_eq!(ss_sender.as_ref().len(), kem.params.n_secret);
        }
    }

    #[test]
    fn auth_encap_decap_agree() {
        for id in ALL_KEMS {
            let kem = kem(id);
            let (pk_r, sk_r) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();
            let (pk_s, sk_s) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();

            let (ss_sender, enc) = kem
                .encap(&pk_r, Some(&sk_s), DEFAULT_SECURE_RANDOM)
                .unwrap();
            let ss_receiver = kem.decap(&enc, &sk_r, Some(&pk_s)).unwrap();
            assert_eq!(ss_sender.as_ref(), ss_receiver.as_ref());

            // Without the sender's key, the receiver derives something else.
            let unauthenticated = kem.decap(&enc, &sk_r, None).unwrap();
            assert_ne!(ss_sender.as_ref(), unauthenticated.as_ref());
        }
    }

    #[test]
    fn dh_buffer_fits_both_outputs() {
        for id in ALL_KEMS {
            let kem = kem(id);
            let (_, sk_a) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();
            let (pk_b, sk_b) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();

            let mut dh = kem
                .dh(sk_a.secret_bytes(), &pk_b.0)
                .unwrap();
            let n_dh = dh.len();
            let first = dh.as_ptr();
            dh.extend_from_slice(
                &kem.dh(sk_b.secret_bytes(), &pk_b.0)
                    .unwrap(),
            );
            assert_eq!(dh.len(), 2 * n_dh);
            assert_eq!(dh.as_ptr(), first);
        }
    }

    #[test]
    fn wrong_length_keys_are_rejected() {
        for id in ALL_KEMS {
            let kem = kem(id);
            let short = HpkePublicKey(alloc::vec![4u8; kem.params.n_pk - 1]);
            let err = kem
                .encap(&short, None, DEFAULT_SECURE_RANDOM)
                .unwrap_err();
            assert_eq!(err, Error::KeySchedule(KeyScheduleError::InvalidPublicKey));

            let sk = HpkePrivateKey::from(alloc::vec![1u8; kem.params.n_sk + 1]);
            assert_eq!(
                kem.public_key_of(&sk).unwrap_err(),
                Error::KeySchedule(KeyScheduleError::InvalidPrivateKey)
            );

            let enc = EncapsulatedSecret(alloc::vec![4u8; kem.params.n_enc + 1]);
            let (_, sk_r) = kem
                .generate_key_pair(DEFAULT_SECURE_RANDOM)
                .unwrap();
            assert_eq!(
                kem.decap(&enc, &sk_r, None).err().unwrap(),
                Error::KeySchedule(KeyScheduleError::InvalidPublicKey)
            );
        }
    }

    #[test]
    fn compressed_nist_points_are_rejected() {
        let kem = kem(HpkeKem::DHKEM_P256_HKDF_SHA256);
        let (pk_r, _) = kem
            .generate_key_pair(DEFAULT_SECURE_RANDOM)
            .unwrap();
        let compressed = p256::PublicKey::from_sec1_bytes(&pk_r.0)
            .unwrap()
            .to_encoded_point(true);
        let err = kem
            .encap(
                &HpkePublicKey(compressed.as_bytes().to_vec()),
                None,
                DEFAULT_SECURE_RANDOM,
            )
            .unwrap_err();
        assert_eq!(err, Error::KeySchedule(KeyScheduleError::InvalidPublicKey));
    }

    #[test]
    fn zero_scalar_is_invalid() {
        let kem = kem(HpkeKem::DHKEM_P256_HKDF_SHA256);
        let sk = HpkePrivateKey::from(alloc::vec![0u8; 32]);
        assert_eq!(
            kem.public_key_of(&sk).unwrap_err(),
            Error::KeySchedule(KeyScheduleError::InvalidPrivateKey)
        );
    }

    #[test]
    fn x25519_low_order_point_is_non_contributory() {
        let kem = kem(HpkeKem::DHKEM_X25519_HKDF_SHA256);
        let zero_point = HpkePublicKey(alloc::vec![0u8; 32]);
        let err = kem
            .encap(&zero_point, None, DEFAULT_SECURE_RANDOM)
            .unwrap_err();
        assert_eq!(err, Error::KeySchedule(KeyScheduleError::NonContributory));
    }
}
