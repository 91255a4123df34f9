use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use crate::dns_name::DnsName;
use crate::error::InvalidMessage;
use crate::msgs::base::{PayloadU16, hex};
use crate::msgs::codec::{
    Codec, LengthPrefixedBuffer, ListLength, Reader, TlsListElement, u24,
};
use crate::msgs::enums::{
    CipherSuite, Compression, ExtensionType, HandshakeType, HpkeAead, HpkeKdf, ProtocolVersion,
    ServerNameType,
};
use crate::rand::{GetRandomFailed, SecureRandom};

/// Length of the fixed-size `random` field.
pub const RANDOM_LEN: usize = 32;

/// Length of a handshake message header: one type byte then a u24 length.
pub const HANDSHAKE_HEADER_LEN: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Random(pub [u8; RANDOM_LEN]);

impl fmt::Debug for Random {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hex(f, &self.0)
    }
}

impl Codec<'_> for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let bytes = match r.take(RANDOM_LEN) {
            Some(bytes) => bytes,
            None => return Err(InvalidMessage::MissingData("Random")),
        };

        let mut opaque = [0; RANDOM_LEN];
        opaque.clone_from_slice(bytes);
        Ok(Self(opaque))
    }
}

impl Random {
    pub fn new(secure_random: &dyn SecureRandom) -> Result<Self, GetRandomFailed> {
        let mut data = [0u8; RANDOM_LEN];
        secure_random.fill(&mut data)?;
        Ok(Self(data))
    }
}

impl From<[u8; RANDOM_LEN]> for Random {
    #[inline]
    fn from(bytes: [u8; RANDOM_LEN]) -> Self {
        Self(bytes)
    }
}

#[derive(Copy, Clone, Eq)]
pub struct SessionId {
    len: usize,
    data: [u8; 32],
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        hex(f, self.as_ref())
    }
}

impl PartialEq for SessionId {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }

        let mut diff = 0u8;
        for i in 0..self.len {
            diff |= self.data[i] ^ other.data[i];
        }

        diff == 0u8
    }
}

impl Codec<'_> for SessionId {
    fn encode(&self, bytes: &mut Vec<u8>) {
        debug_assert!(self.len <= 32);
        bytes.push(self.len as u8);
        bytes.extend_from_slice(self.as_ref());
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = u8::read(r)? as usize;
        if len > 32 {
            return Err(InvalidMessage::TrailingData("SessionID"));
        }

        let bytes = match r.take(len) {
            Some(bytes) => bytes,
            None => return Err(InvalidMessage::MissingData("SessionID")),
        };

        let mut out = [0u8; 32];
        out[..len].clone_from_slice(&bytes[..len]);
        Ok(Self { data: out, len })
    }
}

impl SessionId {
    pub fn random(secure_random: &dyn SecureRandom) -> Result<Self, GetRandomFailed> {
        let mut data = [0u8; 32];
        secure_random.fill(&mut data)?;
        Ok(Self { data, len: 32 })
    }

    pub fn empty() -> Self {
        Self {
            data: [0u8; 32],
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// One KDF and AEAD pairing advertised in an ECH configuration.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct HpkeSymmetricCipherSuite {
    pub kdf_id: HpkeKdf,
    pub aead_id: HpkeAead,
}

impl Codec<'_> for HpkeSymmetricCipherSuite {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.kdf_id.encode(bytes);
        self.aead_id.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            kdf_id: HpkeKdf::read(r)?,
            aead_id: HpkeAead::read(r)?,
        })
    }
}

impl TlsListElement for HpkeSymmetricCipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}

impl TlsListElement for CipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}

impl TlsListElement for Compression {
    const SIZE_LEN: ListLength = ListLength::U8;
}

/// The body of the `ech_outer_extensions` marker is a u8-prefixed list.
impl TlsListElement for ExtensionType {
    const SIZE_LEN: ListLength = ListLength::U8;
}

/// An extension carried as its type and opaque body.
///
/// Nothing here interprets extension bodies except for `server_name`.
#[derive(Clone, PartialEq, Eq)]
pub struct RawExtension {
    pub typ: ExtensionType,
    pub body: Vec<u8>,
}

impl RawExtension {
    pub fn new(typ: ExtensionType, body: Vec<u8>) -> Self {
        Self { typ, body }
    }
}

impl fmt::Debug for RawExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawExtension")
            .field("typ", &self.typ)
            .field("len", &self.body.len())
            .finish()
    }
}

impl Codec<'_> for RawExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        PayloadU16::encode_slice(&self.body, bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let typ = ExtensionType::read(r)?;
        let body = PayloadU16::read_slice(r)?.to_vec();
        Ok(Self { typ, body })
    }
}

impl TlsListElement for RawExtension {
    const SIZE_LEN: ListLength = ListLength::U16;
}

pub(crate) fn has_duplicates<I: IntoIterator<Item = E>, E: Into<T>, T: Ord>(iter: I) -> bool {
    let mut seen = BTreeSet::new();

    for x in iter {
        if !seen.insert(x.into()) {
            return true;
        }
    }

    false
}

fn first_duplicate(exts: &[RawExtension]) -> Option<ExtensionType> {
    let mut seen = BTreeSet::new();
    exts.iter()
        .find(|ext| !seen.insert(u16::from(ext.typ)))
        .map(|ext| ext.typ)
}

fn read_extensions(r: &mut Reader<'_>) -> Result<Vec<RawExtension>, InvalidMessage> {
    // The extensions block may be omitted entirely.
    if !r.any_left() {
        return Ok(Vec::new());
    }

    let exts = Vec::<RawExtension>::read(r)?;
    if let Some(dup) = first_duplicate(&exts) {
        return Err(InvalidMessage::DuplicateExtension(u16::from(dup)));
    }
    Ok(exts)
}

/// Writes a handshake header for `typ`, then whatever `body` appends,
/// patching the u24 length afterwards.
pub(crate) fn encode_handshake(
    typ: HandshakeType,
    bytes: &mut Vec<u8>,
    body: impl FnOnce(&mut Vec<u8>),
) {
    typ.encode(bytes);
    let nested = LengthPrefixedBuffer::new(ListLength::U24 { max: u24::MAX }, bytes);
    body(nested.buf);
}

/// Checks a handshake header against `expect` and returns a reader over
/// exactly the message body.
pub(crate) fn read_handshake<'a>(
    r: &mut Reader<'a>,
    expect: HandshakeType,
) -> Result<Reader<'a>, InvalidMessage> {
    let typ = HandshakeType::read(r)?;
    if typ != expect {
        return Err(InvalidMessage::InvalidHandshakeType(u8::from(typ)));
    }
    let len = usize::from(u24::read(r)?);
    r.sub(len)
}

/// The model of a ClientHello the ECH codec works over.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientHelloPayload {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<Compression>,
    pub extensions: Vec<RawExtension>,
}

impl Codec<'_> for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suites.encode(bytes);
        self.compression_methods.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let ret = Self {
            client_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionId::read(r)?,
            cipher_suites: Vec::read(r)?,
            compression_methods: Vec::read(r)?,
            extensions: read_extensions(r)?,
        };

        r.expect_empty("ClientHelloPayload")?;
        Ok(ret)
    }
}

impl ClientHelloPayload {
    /// Decode a complete handshake message, header included.
    pub fn read_message(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        let mut r = Reader::init(bytes);
        let mut body = read_handshake(&mut r, HandshakeType::ClientHello)?;
        r.expect_empty("ClientHello")?;
        Self::read(&mut body)
    }

    /// Encode as a complete handshake message, header included.
    pub fn encode_message(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_handshake(HandshakeType::ClientHello, &mut bytes, |buf| {
            self.encode(buf)
        });
        bytes
    }

    pub fn find_extension(&self, typ: ExtensionType) -> Option<&RawExtension> {
        self.extensions
            .iter()
            .find(|ext| ext.typ == typ)
    }

    /// Replace the extension of the same type in place, or append it.
    pub fn set_extension(&mut self, ext: RawExtension) {
        match self
            .extensions
            .iter_mut()
            .find(|e| e.typ == ext.typ)
        {
            Some(existing) => *existing = ext,
            None => self.extensions.push(ext),
        }
    }

    pub fn remove_extension(&mut self, typ: ExtensionType) -> Option<RawExtension> {
        let idx = self
            .extensions
            .iter()
            .position(|ext| ext.typ == typ)?;
        Some(self.extensions.remove(idx))
    }

    pub fn has_duplicate_extension(&self) -> bool {
        first_duplicate(&self.extensions).is_some()
    }

    /// The host name in the `server_name` extension, if one is present.
    pub fn server_name(&self) -> Result<Option<DnsName>, InvalidMessage> {
        match self.find_extension(ExtensionType::ServerName) {
            Some(ext) => Ok(Some(ServerNamePayload::read_bytes(&ext.body)?.0)),
            None => Ok(None),
        }
    }
}

/// The `server_name` extension body, restricted to a single host name.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerNamePayload(pub DnsName);

impl Codec<'_> for ServerNamePayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        let list = LengthPrefixedBuffer::new(ListLength::U16, bytes);
        ServerNameType::HostName.encode(list.buf);
        PayloadU16::encode_slice(
            self.0
                .without_trailing_dot()
                .as_bytes(),
            list.buf,
        );
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = usize::from(u16::read(r)?);
        let mut list = r.sub(len)?;

        let mut found = None;
        while list.any_left() {
            let typ = ServerNameType::read(&mut list)?;
            let name = PayloadU16::read_slice(&mut list)?;
            if typ == ServerNameType::HostName && found.is_none() {
                found = Some(name);
            }
        }

        let name = found.ok_or(InvalidMessage::InvalidServerName)?;
        DnsName::try_from_ascii(name)
            .map(Self)
            .map_err(|_| InvalidMessage::InvalidServerName)
    }
}

/// The model of a ServerHello needed for ECH acceptance signalling.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerHelloPayload {
    pub legacy_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suite: CipherSuite,
    pub compression_method: Compression,
    pub extensions: Vec<RawExtension>,
}

impl Codec<'_> for ServerHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.legacy_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suite.encode(bytes);
        self.compression_method.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let ret = Self {
            legacy_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionId::read(r)?,
            cipher_suite: CipherSuite::read(r)?,
            compression_method: Compression::read(r)?,
            extensions: read_extensions(r)?,
        };

        r.expect_empty("ServerHelloPayload")?;
        Ok(ret)
    }
}

impl ServerHelloPayload {
    pub fn read_message(bytes: &[u8]) -> Result<Self, InvalidMessage> {
        let mut r = Reader::init(bytes);
        let mut body = read_handshake(&mut r, HandshakeType::ServerHello)?;
        r.expect_empty("ServerHello")?;
        Self::read(&mut body)
    }

    pub fn encode_message(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        encode_handshake(HandshakeType::ServerHello, &mut bytes, |buf| {
            self.encode(buf)
        });
        bytes
    }
}

#[cfg(test)]
#[path = "handshake_test.rs"]
mod tests;
