use alloc::vec::Vec;
use core::fmt;

use crate::crypto::hkdf::{HashAlgorithm, OkmBlock};
use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, Reader, u24};
use crate::msgs::enums::HandshakeType;

/// Buffering of handshake messages for a transcript hash.
///
/// ECH needs the raw messages rather than a running hash: when the server
/// promotes the inner ClientHello, the outer ClientHello at the front of
/// the transcript is swapped for the inner one and everything after it is
/// kept.
#[derive(Clone, Default)]
pub(crate) struct HandshakeHashBuffer {
    buffer: Vec<u8>,
}

impl HandshakeHashBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Buffer a complete handshake message, header included.
    pub(crate) fn add_message(&mut self, encoded: &[u8]) {
        self.buffer
            .extend_from_slice(encoded);
    }

    /// Swap the leading ClientHello for `client_hello`, keeping any
    /// messages that followed it.
    pub(crate) fn replace_client_hello(&mut self, client_hello: &[u8]) -> Result<(), InvalidMessage> {
        let first_len = self.leading_client_hello_len()?;

        let mut buffer = Vec::with_capacity(client_hello.len() + self.buffer.len() - first_len);
        buffer.extend_from_slice(client_hello);
        buffer.extend_from_slice(&self.buffer[first_len..]);
        self.buffer = buffer;
        Ok(())
    }

    /// The hash of everything buffered so far.
    pub(crate) fn hash(&self, alg: HashAlgorithm) -> OkmBlock {
        alg.hash(&[self.buffer.as_slice()])
    }

    /// The hash if we were to add `extra` too.
    pub(crate) fn hash_given(&self, alg: HashAlgorithm, extra: &[u8]) -> OkmBlock {
        alg.hash(&[self.buffer.as_slice(), extra])
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn leading_client_hello_len(&self) -> Result<usize, InvalidMessage> {
        let mut r = Reader::init(&self.buffer);
        let typ = HandshakeType::read(&mut r)?;
        if typ != HandshakeType::ClientHello {
            return Err(InvalidMessage::InvalidHandshakeType(u8::from(typ)));
        }
        let len = usize::from(u24::read(&mut r)?);
        r.take(len)
            .ok_or(InvalidMessage::MessageTooShort)?;
        Ok(r.used())
    }
}

impl fmt::Debug for HandshakeHashBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeHashBuffer")
            .field("len", &self.buffer.len())
            .finish()
    }
}
