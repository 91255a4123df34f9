use alloc::string::String;
use core::fmt;

use crate::crypto::hpke::HpkeSuite;
use crate::rand::GetRandomFailed;

/// rustls-ech reports failures using this type.
///
/// Every variant produced while processing a received ECH extension must map
/// onto the same handshake outcome on the wire.
#[non_exhaustive]
#[derive(Debug, PartialEq, Clone)]
pub enum Error {
    /// A received or supplied message was malformed.
    InvalidMessage(InvalidMessage),

    /// An ECH configuration record could not be used.
    InvalidEchConfig(EchConfigError),

    /// The given HPKE suite is not known, or known but not implemented.
    UnsupportedSuite(HpkeSuite),

    /// None of the supplied ECH configurations can be used with the
    /// locally implemented HPKE suites.
    NoCompatibleConfig,

    /// The HPKE key schedule could not be completed.
    KeySchedule(KeyScheduleError),

    /// We couldn't decrypt a message.
    DecryptError,

    /// We couldn't encrypt a message.
    EncryptError,

    /// Reconstructing the inner ClientHello from its encoded form failed.
    ///
    /// This is always fatal to the connection.
    DecodeCompression(DecodeCompressionError),

    /// The deferred server name decision refused the inner server name.
    InnerNameRejected,

    /// A generic handshake failure, carrying no detail about why.
    HandshakeFailure,

    /// We failed to acquire random bytes from the system.
    FailedToGetRandomBytes,

    /// A catch-all error for unlikely errors.
    General(String),
}

/// A corrupt message payload that resulted in an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidMessage {
    /// An extension type appeared more than once.
    DuplicateExtension(u16),
    /// A handshake message carried an unexpected type byte.
    InvalidHandshakeType(u8),
    /// A message was zero-length when its kind forbids it.
    InvalidEmptyPayload,
    /// A server name could not be decoded.
    InvalidServerName,
    /// A payload was larger than allowed.
    MessageTooLarge,
    /// Message is shorter than the expected length.
    MessageTooShort,
    /// Missing data for the named value.
    MissingData(&'static str),
    /// Bytes remained after the named value was fully decoded.
    TrailingData(&'static str),
}

impl From<InvalidMessage> for Error {
    #[inline]
    fn from(e: InvalidMessage) -> Self {
        Self::InvalidMessage(e)
    }
}

/// Why a single ECH configuration record was rejected.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EchConfigError {
    /// The list held no records at all.
    EmptyList,
    /// The record's encoded length fell outside the accepted range.
    LengthOutOfRange(usize),
    /// The record's body did not consume exactly its declared length.
    ContentLengthMismatch,
    /// A field inside the record's body could not be decoded.
    MalformedContents,
    /// The public name was not a usable DNS name.
    InvalidPublicName,
    /// The public key had the wrong size for the declared KEM.
    PublicKeyLength {
        /// What the KEM requires.
        expected: usize,
        /// What the record carried.
        got: usize,
    },
    /// The record listed no cipher suites.
    NoCipherSuites,
    /// The record carries a mandatory extension we do not understand.
    UnknownMandatoryExtension,
    /// The record carries the same extension twice.
    DuplicateExtension,
}

impl From<EchConfigError> for Error {
    #[inline]
    fn from(e: EchConfigError) -> Self {
        Self::InvalidEchConfig(e)
    }
}

/// Failures inside the HPKE key schedule.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyScheduleError {
    /// A peer public key (or `enc`) was malformed for its group.
    InvalidPublicKey,
    /// A private key was malformed for its group.
    InvalidPrivateKey,
    /// A Diffie-Hellman output was the all-zero value.
    NonContributory,
    /// PSK and PSK identifier were not both present (or both absent) as the mode requires.
    InconsistentPsk,
    /// An authenticated mode was used without the sender's key.
    MissingSenderKey,
    /// The derived nonce length does not match the AEAD.
    NonceLength,
    /// The requested output length cannot be produced by the KDF.
    OutputLength,
    /// The context's sequence number is exhausted.
    MessageLimitReached,
}

impl From<KeyScheduleError> for Error {
    #[inline]
    fn from(e: KeyScheduleError) -> Self {
        Self::KeySchedule(e)
    }
}

/// Failures while expanding an encoded inner ClientHello.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeCompressionError {
    /// The encoded inner hello could not be parsed.
    MalformedInner,
    /// The encoded inner hello was followed by non-zero padding.
    NonZeroPadding,
    /// The `outer_extensions` marker listed nothing.
    EmptyOuterExtensions,
    /// The `outer_extensions` marker listed more types than allowed.
    TooManyOuterExtensions(usize),
    /// The `outer_extensions` marker listed a type twice.
    DuplicateOuterExtension(u16),
    /// The `outer_extensions` marker referenced a type that may not be compressed.
    IllegalOuterExtension(u16),
    /// A referenced type was absent from the outer ClientHello.
    MissingOuterExtension(u16),
}

impl From<DecodeCompressionError> for Error {
    #[inline]
    fn from(e: DecodeCompressionError) -> Self {
        Self::DecodeCompression(e)
    }
}

impl From<GetRandomFailed> for Error {
    fn from(_: GetRandomFailed) -> Self {
        Self::FailedToGetRandomBytes
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidMessage(typ) => {
                write!(f, "received corrupt message of type {typ:?}")
            }
            Self::InvalidEchConfig(why) => write!(f, "unusable ECH configuration: {why:?}"),
            Self::UnsupportedSuite(suite) => write!(f, "unsupported HPKE suite {suite:?}"),
            Self::NoCompatibleConfig => write!(f, "no compatible ECH configuration"),
            // The sub-step is kept out of the message.
            Self::KeySchedule(_) => write!(f, "HPKE key schedule failed"),
            Self::DecryptError => write!(f, "cannot decrypt peer's message"),
            Self::EncryptError => write!(f, "cannot encrypt message"),
            Self::DecodeCompression(why) => {
                write!(f, "cannot reconstruct inner client hello: {why:?}")
            }
            Self::InnerNameRejected => write!(f, "inner server name was rejected"),
            Self::HandshakeFailure => write!(f, "handshake failure"),
            Self::FailedToGetRandomBytes => write!(f, "failed to get random bytes"),
            Self::General(err) => write!(f, "unexpected error: {err}"),
        }
    }
}

impl core::error::Error for Error {}
