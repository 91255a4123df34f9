//! ECH configuration records and the ClientHello `encrypted_client_hello`
//! extension, as encoded by draft-ietf-tls-esni-09.

use alloc::vec::Vec;

use crate::crypto::hkdf::HashAlgorithm;
use crate::dns_name::DnsName;
use crate::error::{EchConfigError, Error, InvalidMessage};
use crate::log::warn;
use crate::msgs::base::{PayloadU8, PayloadU16};
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength, Reader, TlsListElement};
use crate::msgs::enums::{EchVersion, ExtensionType, HpkeKdf, HpkeKem};
use crate::msgs::handshake::{HpkeSymmetricCipherSuite, has_duplicates};
use crate::suites;

/// Smallest acceptable encoding of one ECHConfig record, header included.
pub const MIN_ECH_CONFIG_LEN: usize = 32;

/// One more than the largest acceptable encoding of one ECHConfig record.
pub const MAX_ECH_CONFIG_LEN: usize = 512;

/// Upper bound on the `config_id` field of the ECH extension.
pub const MAX_CONFIG_ID_LEN: usize = 0x30;

/// Upper bound on the `enc` field of the ECH extension.
pub const MAX_ENC_LEN: usize = 0x60;

/// The maximum number of extension types an `outer_extensions` marker may list.
pub const ECH_OUTERS_MAX: usize = 10;

const CONFIG_ID_LABEL: &[u8] = b"tls ech config id";

/// One ECHConfig record.
#[derive(Clone, Debug, PartialEq)]
pub enum EchConfigPayload {
    /// A well-formed record of the version we implement.
    V09(EchConfigContents),
    /// A record of the version we implement whose body was rejected.
    ///
    /// It is kept so that the list re-encodes exactly.
    Invalid {
        version: EchVersion,
        contents: PayloadU16,
        error: EchConfigError,
    },
    /// A record of some other version, skipped unparsed.
    Unknown {
        version: EchVersion,
        contents: PayloadU16,
    },
}

impl EchConfigPayload {
    pub fn version(&self) -> EchVersion {
        match self {
            Self::V09(_) => EchVersion::V09,
            Self::Invalid { version, .. } | Self::Unknown { version, .. } => *version,
        }
    }

    /// The parsed contents, if this record is usable at all.
    pub fn contents(&self) -> Option<&EchConfigContents> {
        match self {
            Self::V09(contents) => Some(contents),
            _ => None,
        }
    }

    fn read_contents(version: EchVersion, body: &[u8]) -> Self {
        let total_len = 4 + body.len();
        let rejected = |error| Self::Invalid {
            version,
            contents: PayloadU16::new(body.to_vec()),
            error,
        };

        if !(MIN_ECH_CONFIG_LEN..MAX_ECH_CONFIG_LEN).contains(&total_len) {
            return rejected(EchConfigError::LengthOutOfRange(total_len));
        }

        match EchConfigContents::read_checked(&mut Reader::init(body)) {
            Ok(contents) => Self::V09(contents),
            Err(error) => rejected(error),
        }
    }
}

impl Codec<'_> for EchConfigPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.version().encode(bytes);
        match self {
            Self::V09(contents) => {
                let body = LengthPrefixedBuffer::new(ListLength::U16, bytes);
                contents.encode(body.buf);
            }
            Self::Invalid { contents, .. } | Self::Unknown { contents, .. } => {
                contents.encode(bytes);
            }
        }
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let version = EchVersion::read(r)?;
        // A length running past the list poisons the whole list.
        let body = PayloadU16::read_slice(r)?;

        Ok(match version {
            EchVersion::V09 => Self::read_contents(version, body),
            _ => Self::Unknown {
                version,
                contents: PayloadU16::new(body.to_vec()),
            },
        })
    }
}

impl TlsListElement for EchConfigPayload {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// The body of a draft-09 ECHConfig.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigContents {
    pub public_name: DnsName,
    pub public_key: PayloadU16,
    pub kem_id: HpkeKem,
    pub symmetric_cipher_suites: Vec<HpkeSymmetricCipherSuite>,
    pub maximum_name_length: u16,
    pub extensions: Vec<EchConfigExtension>,
}

impl EchConfigContents {
    /// Does this record carry an extension we must understand but don't?
    pub fn has_unknown_mandatory_extension(&self) -> bool {
        self.extensions
            .iter()
            // An extension is mandatory if the high bit of its type is set,
            // and we implement none.
            .any(|ext| ext.is_mandatory())
    }

    pub fn has_duplicate_extension(&self) -> bool {
        has_duplicates::<_, _, u16>(
            self.extensions
                .iter()
                .map(|ext| ext.typ),
        )
    }

    /// Is this record fit for a client to encrypt to?
    pub fn is_usable(&self) -> bool {
        !self.has_unknown_mandatory_extension() && !self.has_duplicate_extension()
    }

    /// The `config_id` for this record under the KDF `kdf`.
    ///
    /// `Expand(Extract("", ECHConfig), "tls ech config id", Nh)`, where
    /// `ECHConfig` is the whole record including its version and length.
    pub fn config_id(&self, kdf: HpkeKdf) -> Result<Vec<u8>, Error> {
        let params = suites::lookup_kdf(kdf).ok_or(Error::NoCompatibleConfig)?;
        let hash = HashAlgorithm::for_kdf(kdf).ok_or(Error::NoCompatibleConfig)?;

        let record = self.record_encoding();
        let prk = hash.extract(&[], &[record.as_slice()]);
        let mut config_id = alloc::vec![0u8; params.n_h];
        prk.expand_slice(&[CONFIG_ID_LABEL], &mut config_id)
            .map_err(|_| Error::General("config id expansion failed".into()))?;
        Ok(config_id)
    }

    /// The full ECHConfig encoding: version, length, then these contents.
    pub fn record_encoding(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        EchVersion::V09.encode(&mut bytes);
        let body = LengthPrefixedBuffer::new(ListLength::U16, &mut bytes);
        self.encode(body.buf);
        drop(body);
        bytes
    }

    /// The HPKE `info` parameter for encryption to this record.
    pub fn hpke_info(&self) -> Vec<u8> {
        let mut info = Vec::with_capacity(128);
        // "tls ech" || 0x00 || ECHConfig
        info.extend_from_slice(b"tls ech\0");
        info.extend_from_slice(&self.record_encoding());
        info
    }

    /// Read a body, consuming all of `r`, with every field checked.
    fn read_checked(r: &mut Reader<'_>) -> Result<Self, EchConfigError> {
        let malformed = |_| EchConfigError::MalformedContents;

        let public_name = PayloadU16::read_slice(r).map_err(malformed)?;
        if !(2..=255).contains(&public_name.len()) {
            return Err(EchConfigError::InvalidPublicName);
        }
        let public_name =
            DnsName::try_from_ascii(public_name).map_err(|_| EchConfigError::InvalidPublicName)?;

        let public_key = PayloadU16::read(r).map_err(malformed)?;
        let kem_id = HpkeKem::read(r).map_err(malformed)?;
        if let Some(kem) = suites::lookup_kem(kem_id) {
            if public_key.0.len() != kem.n_pk {
                return Err(EchConfigError::PublicKeyLength {
                    expected: kem.n_pk,
                    got: public_key.0.len(),
                });
            }
        } else if public_key.0.is_empty() {
            return Err(EchConfigError::MalformedContents);
        }

        let symmetric_cipher_suites =
            Vec::<HpkeSymmetricCipherSuite>::read(r).map_err(malformed)?;
        if symmetric_cipher_suites.is_empty() {
            return Err(EchConfigError::NoCipherSuites);
        }

        let maximum_name_length = u16::read(r).map_err(malformed)?;
        let extensions = Vec::<EchConfigExtension>::read(r).map_err(malformed)?;

        if r.any_left() {
            return Err(EchConfigError::ContentLengthMismatch);
        }

        Ok(Self {
            public_name,
            public_key,
            kem_id,
            symmetric_cipher_suites,
            maximum_name_length,
            extensions,
        })
    }
}

impl Codec<'_> for EchConfigContents {
    fn encode(&self, bytes: &mut Vec<u8>) {
        // As published: `config_id` and `hpke_info` hash these bytes.
        PayloadU16::encode_slice(self.public_name.as_ref().as_bytes(), bytes);
        self.public_key.encode(bytes);
        self.kem_id.encode(bytes);
        self.symmetric_cipher_suites.encode(bytes);
        self.maximum_name_length.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Self::read_checked(r).map_err(|_| InvalidMessage::MissingData("EchConfigContents"))
    }
}

/// An extension inside an ECHConfig record. We implement none, so the
/// body is opaque.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigExtension {
    pub typ: ExtensionType,
    pub body: PayloadU16,
}

impl EchConfigExtension {
    pub fn is_mandatory(&self) -> bool {
        u16::from(self.typ) & 0x8000 != 0
    }
}

impl Codec<'_> for EchConfigExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        self.body.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            typ: ExtensionType::read(r)?,
            body: PayloadU16::read(r)?,
        })
    }
}

impl TlsListElement for EchConfigExtension {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// A decoded ECHConfigList, as published in DNS.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigList {
    pub configs: Vec<EchConfigPayload>,
}

impl EchConfigList {
    /// Parse a whole list, with nothing following it.
    ///
    /// Individual records that are rejected stay in the list as
    /// [`EchConfigPayload::Invalid`]; only a framing failure fails the list.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let list = Self::read_bytes(bytes)?;
        if list.configs.is_empty() {
            return Err(EchConfigError::EmptyList.into());
        }

        for (_i, config) in list.configs.iter().enumerate() {
            match config {
                EchConfigPayload::V09(_) => {}
                EchConfigPayload::Invalid { error: _error, .. } => {
                    warn!("ECH config {} rejected: {:?}", _i + 1, _error);
                }
                EchConfigPayload::Unknown {
                    version: _version, ..
                } => {
                    warn!(
                        "ECH config {} has unsupported version {:?}",
                        _i + 1,
                        _version
                    );
                }
            }
        }

        Ok(list)
    }

    /// Number of records, including unknown and invalid ones.
    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// The records a client could encrypt to, in list order.
    pub fn usable(&self) -> impl Iterator<Item = &EchConfigContents> + '_ {
        self.configs
            .iter()
            .filter_map(EchConfigPayload::contents)
            .filter(|contents| contents.is_usable())
    }

    pub fn usable_count(&self) -> usize {
        self.usable().count()
    }
}

impl Codec<'_> for EchConfigList {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.configs.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            configs: Vec::read(r)?,
        })
    }
}

/// The body of the `encrypted_client_hello` ClientHello extension.
#[derive(Clone, Debug, PartialEq)]
pub struct EchPayload {
    pub cipher_suite: HpkeSymmetricCipherSuite,
    pub config_id: PayloadU8,
    pub enc: PayloadU16,
    pub payload: PayloadU16,
}

impl EchPayload {
    /// A copy with the same lengths and an all-zero `payload`, as used in
    /// the associated data.
    pub(crate) fn with_zeroed_payload(&self) -> Self {
        Self {
            payload: PayloadU16::new(alloc::vec![0; self.payload.0.len()]),
            ..self.clone()
        }
    }
}

impl Codec<'_> for EchPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.cipher_suite.encode(bytes);
        self.config_id.encode(bytes);
        self.enc.encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let cipher_suite = HpkeSymmetricCipherSuite::read(r)?;

        let config_id = PayloadU8::read(r)?;
        if config_id.0.len() > MAX_CONFIG_ID_LEN {
            return Err(InvalidMessage::MessageTooLarge);
        }

        let enc = PayloadU16::read(r)?;
        if enc.0.is_empty() {
            return Err(InvalidMessage::InvalidEmptyPayload);
        }
        if enc.0.len() > MAX_ENC_LEN {
            return Err(InvalidMessage::MessageTooLarge);
        }

        let payload = PayloadU16::read(r)?;
        if payload.0.is_empty() {
            return Err(InvalidMessage::InvalidEmptyPayload);
        }

        Ok(Self {
            cipher_suite,
            config_id,
            enc,
            payload,
        })
    }
}

#[cfg(test)]
#[path = "ech_test.rs"]
mod tests;
