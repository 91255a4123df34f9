//! The `EncodedClientHelloInner` carried inside the ECH extension: the
//! inner ClientHello with its session id removed, extensions it shares with
//! the outer hello replaced by an `ech_outer_extensions` marker, and padding.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::{OuterAction, OuterExtensionPolicy};
use crate::error::{DecodeCompressionError, Error};
use crate::log::trace;
use crate::msgs::codec::{Codec, Reader, put_u24, u24};
use crate::msgs::ech::ECH_OUTERS_MAX;
use crate::msgs::enums::{ExtensionType, HandshakeType};
use crate::msgs::handshake::{
    ClientHelloPayload, HANDSHAKE_HEADER_LEN, RANDOM_LEN, RawExtension, SessionId,
    has_duplicates,
};

/// Where the session id length byte sits in an encoded ClientHello
/// handshake message: after the header, the version and the random.
pub const SESSION_ID_OFFSET: usize = HANDSHAKE_HEADER_LEN + 2 + RANDOM_LEN;

/// The body of the `ech_outer_extensions` marker.
#[derive(Clone, Debug, PartialEq)]
pub struct OuterExtensions(pub Vec<ExtensionType>);

impl Codec<'_> for OuterExtensions {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.0.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, crate::error::InvalidMessage> {
        Ok(Self(Vec::read(r)?))
    }
}

impl OuterExtensions {
    fn validate(&self) -> Result<(), DecodeCompressionError> {
        if self.0.is_empty() {
            return Err(DecodeCompressionError::EmptyOuterExtensions);
        }
        if self.0.len() > ECH_OUTERS_MAX {
            return Err(DecodeCompressionError::TooManyOuterExtensions(self.0.len()));
        }

        for (i, typ) in self.0.iter().enumerate() {
            if matches!(
                typ,
                ExtensionType::EncryptedClientHello
                    | ExtensionType::EncryptedClientHelloOuterExtensions
            ) {
                return Err(DecodeCompressionError::IllegalOuterExtension(u16::from(
                    *typ,
                )));
            }
            if self.0[..i].contains(typ) {
                return Err(DecodeCompressionError::DuplicateOuterExtension(u16::from(
                    *typ,
                )));
            }
        }

        Ok(())
    }
}

/// The client's encoding of its inner hello, ready for sealing.
#[derive(Clone, Debug)]
pub struct EncodedInnerHello {
    /// The handshake message, with an empty session id and any padding.
    pub bytes: Vec<u8>,

    /// The extension types that the marker refers to, in marker order.
    pub outer_only: Vec<ExtensionType>,

    /// The inner hello as the server will reconstruct it: the input with
    /// its session id removed.
    pub expanded: ClientHelloPayload,
}

impl EncodedInnerHello {
    /// The complete inner ClientHello message once `session_id` is put
    /// back, which is what the inner transcript starts with.
    pub fn transcript_message(&self, session_id: SessionId) -> Vec<u8> {
        let mut hello = self.expanded.clone();
        hello.session_id = session_id;
        hello.encode_message()
    }
}

/// A decrypted, decompressed inner hello.
#[derive(Clone, Debug)]
pub struct DecompressedInnerHello {
    /// The complete handshake message, header included.
    pub bytes: Vec<u8>,

    /// The same, decoded.
    pub hello: ClientHelloPayload,
}

/// Encode `inner` for sealing into an outer hello with extensions `outer_exts`.
///
/// Starting at the first extension the policy says to compress whose body
/// is identical in `outer_exts`, the adjacent run of such extensions is
/// replaced by one `ech_outer_extensions` marker listing them in order. The
/// run stops at [`ECH_OUTERS_MAX`]; anything outside it is carried in full.
///
/// The result is padded according to `maximum_name_length` from the
/// server's configuration, and then to a multiple of 32 bytes.
pub fn encode_inner(
    inner: &ClientHelloPayload,
    outer_exts: &[RawExtension],
    policy: &OuterExtensionPolicy,
    maximum_name_length: u16,
) -> Result<EncodedInnerHello, Error> {
    let compressible = |ext: &RawExtension| {
        policy.classify_for_outer(ext.typ) == OuterAction::Compress
            && outer_exts
                .iter()
                .find(|outer| outer.typ == ext.typ)
                .is_some_and(|outer| outer.body == ext.body)
    };

    let mut wire = inner.clone();
    wire.session_id = SessionId::empty();
    let expanded = wire.clone();

    // One adjacent run, listed in inner order.
    let mut outer_only = Vec::new();
    if let Some(first) = inner.extensions.iter().position(compressible) {
        outer_only = inner.extensions[first..]
            .iter()
            .take(ECH_OUTERS_MAX)
            .take_while(|ext| compressible(*ext))
            .map(|ext| ext.typ)
            .collect();

        let marker = RawExtension::new(
            ExtensionType::EncryptedClientHelloOuterExtensions,
            OuterExtensions(outer_only.clone()).get_encoding(),
        );
        wire.extensions
            .splice(first..first + outer_only.len(), [marker]);
    }

    if wire.has_duplicate_extension() {
        return Err(DecodeCompressionError::MalformedInner.into());
    }

    let mut bytes = wire.encode_message();

    let name_len = inner
        .server_name()?
        .map(|name| name.wire_len());
    let padding_len = padding_len(bytes.len(), name_len, maximum_name_length);
    bytes.extend(vec![0; padding_len]);

    trace!(
        "ECH inner hello encoded: {} bytes, {} compressed",
        bytes.len(),
        outer_only.len()
    );

    Ok(EncodedInnerHello {
        bytes,
        outer_only,
        expanded,
    })
}

/// Zero bytes to append to an encoded inner hello of `len` bytes.
///
/// `name_len` is the length of the inner server name, if there is one.
pub(crate) fn padding_len(len: usize, name_len: Option<usize>, maximum_name_length: u16) -> usize {
    let max_name_len = match maximum_name_length {
        0 => 255,
        l => usize::from(l),
    };

    let name_padding = match name_len {
        Some(name_len) => max_name_len.saturating_sub(name_len),
        // the size of a `server_name` extension holding a name of that length
        None => max_name_len + 9,
    };

    name_padding + 31 - ((len + name_padding - 1) % 32)
}

/// Decode a decrypted `EncodedClientHelloInner` against the outer hello it
/// arrived in.
///
/// The outer session id is put back, and any `ech_outer_extensions` marker
/// is replaced by the extensions it names, copied from `outer`.
pub fn decode_inner(
    encoded: &[u8],
    outer: &ClientHelloPayload,
) -> Result<DecompressedInnerHello, Error> {
    let message = strip_padding(encoded)?;

    // The session id must have been left out.
    if message.get(SESSION_ID_OFFSET) != Some(&0) {
        return Err(DecodeCompressionError::MalformedInner.into());
    }

    let mut spliced = Vec::with_capacity(message.len() + 32);
    spliced.extend_from_slice(&message[..SESSION_ID_OFFSET]);
    outer.session_id.encode(&mut spliced);
    spliced.extend_from_slice(&message[SESSION_ID_OFFSET + 1..]);
    let body_len = spliced.len() - HANDSHAKE_HEADER_LEN;
    put_u24(body_len, &mut spliced[1..HANDSHAKE_HEADER_LEN]);

    let mut hello = ClientHelloPayload::read_message(&spliced)
        .map_err(|_| DecodeCompressionError::MalformedInner)?;

    let marker_idx = match hello
        .extensions
        .iter()
        .position(|ext| ext.typ == ExtensionType::EncryptedClientHelloOuterExtensions)
    {
        Some(idx) => idx,
        None => {
            trace!("ECH inner hello has no compressed extensions");
            return Ok(DecompressedInnerHello {
                bytes: spliced,
                hello,
            });
        }
    };

    let listed = OuterExtensions::read_bytes(&hello.extensions[marker_idx].body)
        .map_err(|_| DecodeCompressionError::MalformedInner)?;
    listed.validate()?;

    // One pass over the outer extensions finds every listed type.
    let mut found = BTreeMap::new();
    for ext in &outer.extensions {
        if listed.0.contains(&ext.typ) {
            found.insert(u16::from(ext.typ), ext);
        }
    }

    let mut decompressed = Vec::with_capacity(listed.0.len());
    for typ in &listed.0 {
        match found.get(&u16::from(*typ)) {
            Some(ext) => decompressed.push((*ext).clone()),
            None => {
                return Err(DecodeCompressionError::MissingOuterExtension(u16::from(*typ)).into());
            }
        }
    }

    hello
        .extensions
        .splice(marker_idx..marker_idx + 1, decompressed);

    if has_duplicates::<_, _, u16>(
        hello
            .extensions
            .iter()
            .map(|ext| ext.typ),
    ) {
        return Err(DecodeCompressionError::MalformedInner.into());
    }

    trace!(
        "ECH inner hello decompressed {} extensions",
        listed.0.len()
    );

    Ok(DecompressedInnerHello {
        bytes: hello.encode_message(),
        hello,
    })
}

/// The handshake message at the front of `encoded`, after checking that
/// whatever follows it is zero.
fn strip_padding(encoded: &[u8]) -> Result<&[u8], DecodeCompressionError> {
    let mut r = Reader::init(encoded);
    let typ = HandshakeType::read(&mut r).map_err(|_| DecodeCompressionError::MalformedInner)?;
    if typ != HandshakeType::ClientHello {
        return Err(DecodeCompressionError::MalformedInner);
    }
    let len = u24::read(&mut r)
        .map(usize::from)
        .map_err(|_| DecodeCompressionError::MalformedInner)?;
    if r.take(len).is_none() {
        return Err(DecodeCompressionError::MalformedInner);
    }

    let end = HANDSHAKE_HEADER_LEN + len;
    match r.rest().iter().all(|b| *b == 0) {
        true => Ok(&encoded[..end]),
        false => Err(DecodeCompressionError::NonZeroPadding),
    }
}

#[cfg(test)]
#[path = "inner_hello_test.rs"]
mod tests;
