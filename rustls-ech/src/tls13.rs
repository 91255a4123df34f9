//! The slice of the TLS1.3 key schedule that ECH acceptance signalling needs.

use core::ops::Range;

use crate::crypto::hkdf::HashAlgorithm;
use crate::error::{Error, KeyScheduleError};
use crate::hash_hs::HandshakeHashBuffer;
use crate::msgs::enums::CipherSuite;

/// The last eight bytes of the ServerHello's random, within the encoded
/// handshake message.
///
/// This skips:
/// - a HandshakeType (1 byte),
/// - an exterior length (3 bytes),
/// - the legacy_version (2 bytes), and
/// - the balance of the random field (24 bytes).
pub(crate) const SERVER_HELLO_ECH_CONFIRMATION_SPAN: Range<usize> =
    (1 + 3 + 2 + 24)..(1 + 3 + 2 + 32);

const ECH_CONFIRMATION_LABEL: &[u8] = b"ech accept confirmation";

/// The transcript hash of a TLS1.3 cipher suite.
pub(crate) fn suite_hash(suite: CipherSuite) -> Result<HashAlgorithm, Error> {
    match suite {
        CipherSuite::TLS13_AES_128_GCM_SHA256 | CipherSuite::TLS13_CHACHA20_POLY1305_SHA256 => {
            Ok(HashAlgorithm::Sha256)
        }
        CipherSuite::TLS13_AES_256_GCM_SHA384 => Ok(HashAlgorithm::Sha384),
        _ => Err(Error::General(alloc::format!(
            "no transcript hash for {suite:?}"
        ))),
    }
}

/// Compute `accept_confirmation` for an encoded ServerHello.
///
/// ```text
/// accept_confirmation = HKDF-Expand-Label(
///   HKDF-Extract(0, ClientHelloInner.random),
///   "ech accept confirmation",
///   Hash(ClientHelloInner .. ServerHello with random[24..32] zeroed),
///   8)
/// ```
///
/// `inner_transcript` must hold the inner ClientHello (and nothing after it);
/// the confirmation bytes of `server_hello` are ignored.
pub(crate) fn server_ech_confirmation_secret(
    alg: HashAlgorithm,
    client_hello_inner_random: &[u8],
    inner_transcript: &HandshakeHashBuffer,
    server_hello: &[u8],
) -> Result<[u8; 8], Error> {
    let Some(head) = server_hello.get(..SERVER_HELLO_ECH_CONFIRMATION_SPAN.start) else {
        return Err(crate::error::InvalidMessage::MessageTooShort.into());
    };
    let Some(tail) = server_hello.get(SERVER_HELLO_ECH_CONFIRMATION_SPAN.end..) else {
        return Err(crate::error::InvalidMessage::MessageTooShort.into());
    };

    let mut conf_hello = head.to_vec();
    conf_hello.extend_from_slice(&[0u8; 8]);
    conf_hello.extend_from_slice(tail);
    let hs_hash = inner_transcript.hash_given(alg, &conf_hello);

    let mut out = [0u8; 8];
    alg.extract(&[], &[client_hello_inner_random])
        .expand_label(ECH_CONFIRMATION_LABEL, hs_hash.as_ref(), &mut out)
        .map_err(|_| KeyScheduleError::OutputLength)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::vec;
    use std::vec::Vec;

    use super::*;

    fn transcript() -> HandshakeHashBuffer {
        let mut t = HandshakeHashBuffer::new();
        t.add_message(&[1, 0, 0, 2, 0xaa, 0xbb]);
        t
    }

    fn server_hello(tail: u8) -> Vec<u8> {
        let mut sh = vec![2, 0, 0, 40, 3, 3];
        sh.extend_from_slice(&[0x55; 32]);
        sh.extend_from_slice(&[0, 0x13, 0x01, tail]);
        sh
    }

    #[test]
    fn confirmation_ignores_its_own_span() {
        let mut sh = server_hello(0);
        let before =
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[7; 32], &transcript(), &sh)
                .unwrap();
        sh[SERVER_HELLO_ECH_CONFIRMATION_SPAN].copy_from_slice(&before);
        let after =
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[7; 32], &transcript(), &sh)
                .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn confirmation_binds_transcript_and_random() {
        let sh = server_hello(0);
        let base =
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[7; 32], &transcript(), &sh)
                .unwrap();

        let other_random =
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[8; 32], &transcript(), &sh)
                .unwrap();
        assert_ne!(base, other_random);

        let other_hello = server_ech_confirmation_secret(
            HashAlgorithm::Sha256,
            &[7; 32],
            &transcript(),
            &server_hello(1),
        )
        .unwrap();
        assert_ne!(base, other_hello);

        let mut longer = transcript();
        longer.add_message(&[8, 0, 0, 0]);
        let other_transcript =
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[7; 32], &longer, &sh).unwrap();
        assert_ne!(base, other_transcript);
    }

    #[test]
    fn short_server_hello() {
        assert!(
            server_ech_confirmation_secret(HashAlgorithm::Sha256, &[7; 32], &transcript(), &[2; 31])
                .is_err()
        );
    }

    #[test]
    fn suite_hashes() {
        assert_eq!(
            suite_hash(CipherSuite::TLS13_AES_256_GCM_SHA384),
            Ok(HashAlgorithm::Sha384)
        );
        assert_eq!(
            suite_hash(CipherSuite::TLS13_CHACHA20_POLY1305_SHA256),
            Ok(HashAlgorithm::Sha256)
        );
        assert!(suite_hash(CipherSuite::Unknown(0xc02f)).is_err());
    }
}
