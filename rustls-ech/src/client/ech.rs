use alloc::boxed::Box;
use alloc::vec::Vec;

use subtle::ConstantTimeEq;

use crate::config::{EchClientConfig, OuterExtensionPolicy};
use crate::crypto::hkdf::HashAlgorithm;
use crate::crypto::hpke::{
    EncapsulatedSecret, HpkeProvider, HpkePublicKey, HpkeSealer, HpkeSuite,
};
use crate::dns_name::DnsName;
use crate::error::Error;
use crate::hash_hs::HandshakeHashBuffer;
use crate::log::{debug, trace, warn};
use crate::msgs::base::{PayloadU8, PayloadU16};
use crate::msgs::codec::Codec;
use crate::msgs::ech::{EchConfigContents, EchConfigList, EchConfigPayload, EchPayload};
use crate::msgs::enums::ExtensionType;
use crate::msgs::handshake::{
    ClientHelloPayload, HpkeSymmetricCipherSuite, Random, RawExtension, ServerHelloPayload,
    ServerNamePayload,
};
use crate::msgs::inner_hello::{self, EncodedInnerHello};
use crate::rand::{SecureRandom, random_vec};
use crate::tls13;

/// Controls how Encrypted Client Hello (ECH) is used in a client handshake.
#[derive(Clone, Debug)]
pub enum EchMode {
    /// ECH is enabled and the ClientHello will be encrypted based on the provided
    /// configuration.
    Enable(EchConfig),

    /// No ECH configuration is available but the client should act as though it were.
    ///
    /// This is an anti-ossification measure, sometimes referred to as "GREASE"[^0].
    /// [^0]: <https://www.rfc-editor.org/rfc/rfc8701>
    Grease(EchGreaseConfig),
}

impl EchMode {
    /// Build the ClientHello to send in place of `inner`.
    ///
    /// For [`EchMode::Enable`] the result is an outer hello carrying `inner`
    /// encrypted, and the returned [`EchOffer`] holds what is needed to
    /// check the server's answer. For [`EchMode::Grease`] the result is
    /// `inner` itself with a GREASE extension added.
    pub fn offer(
        &self,
        inner: ClientHelloPayload,
        outer_values: &[RawExtension],
        config: &EchClientConfig,
    ) -> Result<EchOffer, Error> {
        match self {
            Self::Enable(ech_config) => {
                let mut state = ech_config.state(config)?;
                let hello = state.ech_hello(inner, outer_values)?;
                Ok(EchOffer {
                    hello,
                    state: Some(state),
                })
            }
            Self::Grease(grease_config) => {
                let mut hello = inner;
                let ext = grease_config.grease_ext(config, &hello)?;
                hello.set_extension(ext);
                Ok(EchOffer { hello, state: None })
            }
        }
    }
}

impl From<EchConfig> for EchMode {
    fn from(config: EchConfig) -> Self {
        Self::Enable(config)
    }
}

impl From<EchGreaseConfig> for EchMode {
    fn from(config: EchGreaseConfig) -> Self {
        Self::Grease(config)
    }
}

/// The ClientHello produced by [`EchMode::offer`].
#[derive(Debug)]
pub struct EchOffer {
    /// The ClientHello to put on the wire.
    pub hello: ClientHelloPayload,

    /// Present when ECH was really offered.
    pub state: Option<EchState>,
}

impl EchOffer {
    pub fn status(&self) -> EchStatus {
        match &self.state {
            Some(state) => state.status(),
            None => EchStatus::Grease,
        }
    }
}

/// Configuration for performing encrypted client hello.
///
/// Note: differs from the protocol-encoded ECHConfig (`EchConfigPayload`).
#[derive(Clone, Debug)]
pub struct EchConfig {
    /// The selected ECHConfig.
    pub(crate) contents: EchConfigContents,

    /// A suite from `contents` that `provider` supports.
    pub(crate) suite: HpkeSuite,

    pub(crate) provider: &'static dyn HpkeProvider,
}

impl EchConfig {
    /// Construct an EchConfig by selecting an ECHConfig from the provided
    /// list bytes that is compatible with `provider`.
    ///
    /// The list bytes are typically sourced from the `echconfig` value of a
    /// DNS record, base64 decoded.
    ///
    /// Records of versions other than draft-09, records with unknown
    /// mandatory extensions, and records none of whose suites `provider`
    /// implements are skipped. If nothing is left,
    /// [`Error::NoCompatibleConfig`] is returned.
    pub fn new(ech_config_list: &[u8], provider: &'static dyn HpkeProvider) -> Result<Self, Error> {
        let list = EchConfigList::from_bytes(ech_config_list)?;

        // Note: we name the index var _i because if the log feature is disabled
        //       it is unused.
        #[cfg_attr(not(feature = "logging"), allow(clippy::unused_enumerate_index))]
        for (_i, config) in list.configs.iter().enumerate() {
            let contents = match config {
                EchConfigPayload::V09(contents) => contents,
                _ => {
                    warn!(
                        "ECH config {} has unsupported version {:?}",
                        _i + 1,
                        config.version()
                    );
                    continue;
                }
            };

            if !contents.is_usable() {
                warn!("ECH config has duplicate, or unknown mandatory extensions: {contents:?}");
                continue;
            }

            for cipher_suite in &contents.symmetric_cipher_suites {
                if cipher_suite.aead_id.tag_len().is_none() {
                    continue; // Unsupported EXPORT_ONLY AEAD cipher suite.
                }

                let suite = HpkeSuite {
                    kem: contents.kem_id,
                    sym: *cipher_suite,
                };
                if provider.supports_suite(&suite) {
                    debug!(
                        "selected ECH config suite {:?} public_name {:?}",
                        suite, contents.public_name
                    );
                    return Ok(Self {
                        contents: contents.clone(),
                        suite,
                        provider,
                    });
                }
            }
        }

        Err(Error::NoCompatibleConfig)
    }

    /// The public name, which the outer hello is addressed to.
    pub fn public_name(&self) -> &DnsName {
        &self.contents.public_name
    }

    pub fn suite(&self) -> HpkeSuite {
        self.suite
    }

    /// Start a fresh ECH offer.
    pub fn state(&self, config: &EchClientConfig) -> Result<EchState, Error> {
        EchState::new(self, config)
    }
}

/// Configuration for GREASE Encrypted Client Hello.
#[derive(Clone, Debug)]
pub struct EchGreaseConfig {
    pub(crate) suite: HpkeSuite,
    pub(crate) placeholder_key: HpkePublicKey,
}

impl EchGreaseConfig {
    /// Construct a GREASE ECH configuration.
    ///
    /// This configuration is used when the client wishes to offer ECH to prevent ossification,
    /// but doesn't have a real ECH configuration to use for the remote server. In this case
    /// a placeholder or "GREASE"[^0] extension is used.
    ///
    /// `placeholder_key` must be a valid public key for `suite.kem`.
    ///
    /// [^0]: <https://www.rfc-editor.org/rfc/rfc8701>
    pub fn new(suite: HpkeSuite, placeholder_key: HpkePublicKey) -> Self {
        Self {
            suite,
            placeholder_key,
        }
    }

    /// Build a GREASE ECH extension for `hello`.
    ///
    /// The extension is indistinguishable on the wire from a real one: the
    /// config id has the length of a real one for the suite's KDF, `enc` is
    /// a real encapsulation to the placeholder key, and the payload is random
    /// bytes as long as `hello` would be once encoded and sealed.
    pub(crate) fn grease_ext(
        &self,
        config: &EchClientConfig,
        hello: &ClientHelloPayload,
    ) -> Result<RawExtension, Error> {
        trace!("Preparing GREASE ECH extension");

        let unsupported = || Error::UnsupportedSuite(self.suite);
        let tag_len = self
            .suite
            .sym
            .aead_id
            .tag_len()
            .ok_or_else(unsupported)?;
        let config_id_len = HashAlgorithm::for_kdf(self.suite.sym.kdf_id)
            .ok_or_else(unsupported)?
            .output_len();

        let (enc, _) = config
            .hpke_provider
            .start(&self.suite)?
            .setup_sealer(b"", &self.placeholder_key)?;

        // Construct an inner hello from the outgoing hello - this allows us to
        // know the size of dummy payload we should use.
        let encoded = inner_hello::encode_inner(hello, &[], &OuterExtensionPolicy::copy_all(), 0)?;

        let secure_random = config.secure_random;
        let payload = EchPayload {
            cipher_suite: self.suite.sym,
            config_id: PayloadU8::new(random_vec(secure_random, config_id_len)?),
            enc: PayloadU16::new(enc.0),
            payload: PayloadU16::new(random_vec(secure_random, encoded.bytes.len() + tag_len)?),
        };

        Ok(RawExtension::new(
            ExtensionType::EncryptedClientHello,
            payload.get_encoding(),
        ))
    }
}

/// An enum representing ECH offer status.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum EchStatus {
    /// ECH was not offered - it is a normal TLS handshake.
    #[default]
    NotOffered,
    /// GREASE ECH was sent. This is not considered offering ECH.
    Grease,
    /// ECH was offered but we do not yet know whether the offer was accepted or rejected.
    Offered,
    /// ECH was offered and the server accepted.
    Accepted,
    /// ECH was offered and the server rejected.
    Rejected,
}

/// Contextual data for a TLS client handshake that offers encrypted client hello (ECH).
pub struct EchState {
    // The public DNS name from the ECH configuration we've chosen - this is the SNI
    // value for the outer hello unless the caller supplies its own.
    outer_name: DnsName,
    // A random value we use for the inner hello.
    inner_hello_random: Random,
    // The inner hello as the server will reconstruct it. Once ECH is confirmed we switch to
    // using this transcript for the handshake.
    inner_hello_transcript: HandshakeHashBuffer,
    // A source of secure random data.
    secure_random: &'static dyn SecureRandom,
    // An HPKE sealer context that can be used for encrypting ECH data.
    sender: Box<dyn HpkeSealer>,
    // The ID of the ECH configuration we've chosen - this is included in the outer ECH extension.
    config_id: Vec<u8>,
    // The advertised maximum name length from the ECH configuration we've chosen - this is used
    // for padding calculations.
    maximum_name_length: u16,
    // The symmetric half of the chosen suite - this is included in the outer ECH extension.
    cipher_suite: HpkeSymmetricCipherSuite,
    // A secret encapsulated to the public key of the remote server.
    enc: EncapsulatedSecret,
    // How inner extensions relate to the outer hello.
    policy: OuterExtensionPolicy,
    status: EchStatus,
}

impl EchState {
    pub(crate) fn new(config: &EchConfig, client_config: &EchClientConfig) -> Result<Self, Error> {
        let contents = &config.contents;

        // Encapsulate a secret for the server's public key, and set up a sender context
        // we can use to seal messages.
        let (enc, sender) = config
            .provider
            .start(&config.suite)?
            .setup_sealer(
                &contents.hpke_info(),
                &HpkePublicKey(contents.public_key.0.clone()),
            )?;

        Ok(Self {
            outer_name: contents.public_name.clone(),
            inner_hello_random: Random::new(client_config.secure_random)?,
            inner_hello_transcript: HandshakeHashBuffer::new(),
            secure_random: client_config.secure_random,
            sender,
            config_id: contents.config_id(config.suite.sym.kdf_id)?,
            maximum_name_length: contents.maximum_name_length,
            cipher_suite: config.suite.sym,
            enc,
            policy: client_config
                .outer_extension_policy
                .clone(),
            status: EchStatus::NotOffered,
        })
    }

    /// Construct an outer ClientHello offering ECH for `inner`.
    ///
    /// `inner` keeps its session id, cipher suites and extensions; its random is replaced by
    /// one private to this offer. The outer hello shares the session id, has a fresh random,
    /// and has its extensions built by the outer extension policy, taking `Copy` values from
    /// `outer_values`. Unless `outer_values` names a server, the outer hello is addressed to
    /// the config's public name.
    ///
    /// An offer can be made once.
    pub fn ech_hello(
        &mut self,
        mut inner: ClientHelloPayload,
        outer_values: &[RawExtension],
    ) -> Result<ClientHelloPayload, Error> {
        if self.status != EchStatus::NotOffered {
            return Err(Error::General("ECH already offered".into()));
        }
        trace!("Preparing ECH offer");

        inner.random = self.inner_hello_random;
        inner.remove_extension(ExtensionType::EncryptedClientHello);

        let mut outer_values = outer_values.to_vec();
        if !outer_values
            .iter()
            .any(|ext| ext.typ == ExtensionType::ServerName)
        {
            outer_values.push(RawExtension::new(
                ExtensionType::ServerName,
                ServerNamePayload(self.outer_name.clone()).get_encoding(),
            ));
        }

        let mut outer_hello = ClientHelloPayload {
            client_version: inner.client_version,
            random: Random::new(self.secure_random)?,
            session_id: inner.session_id,
            cipher_suites: inner.cipher_suites.clone(),
            compression_methods: inner.compression_methods.clone(),
            extensions: self
                .policy
                .build_outer_extensions(&inner.extensions, &outer_values),
        };

        // Construct the encoded inner hello and update the transcript.
        let encoded_inner_hello = self.encode_inner_hello(&inner, &outer_hello)?;

        // Complete the AAD with an ech extension, the payload should be a placeholder
        // of size L, all zeroes. L == length of encrypting encoded client hello inner w/ the
        // selected HPKE AEAD. (sum of plaintext + tag length, typically).
        let payload_len = encoded_inner_hello.bytes.len()
            + self
                .cipher_suite
                .aead_id
                .tag_len()
                .ok_or(Error::EncryptError)?;

        outer_hello.set_extension(self.outer_hello_ext(alloc::vec![0; payload_len]));

        // Next we compute the proper extension payload.
        let payload = self
            .sender
            .seal(&outer_hello.encode_message(), &encoded_inner_hello.bytes)?;
        debug_assert_eq!(payload.len(), payload_len);

        // And then we replace the placeholder extension with the real one.
        outer_hello.set_extension(self.outer_hello_ext(payload));

        self.status = EchStatus::Offered;
        Ok(outer_hello)
    }

    /// Confirm whether an ECH offer was accepted based on examining the
    /// encoded ServerHello handshake message.
    ///
    /// On acceptance the ServerHello joins the inner transcript, which then
    /// carries the rest of the handshake.
    pub fn confirm_acceptance(&mut self, server_hello_encoded: &[u8]) -> Result<EchStatus, Error> {
        if self.status != EchStatus::Offered {
            return Err(Error::General("no ECH offer outstanding".into()));
        }

        let server_hello = ServerHelloPayload::read_message(server_hello_encoded)?;
        let hash = tls13::suite_hash(server_hello.cipher_suite)?;

        // Derive a confirmation secret from the inner hello random and the confirmation
        // transcript, and check it against the last 8 bytes of the server random.
        let derived = tls13::server_ech_confirmation_secret(
            hash,
            &self.inner_hello_random.0,
            &self.inner_hello_transcript,
            server_hello_encoded,
        )?;

        self.status = match ConstantTimeEq::ct_eq(&derived[..], &server_hello.random.0[24..]).into()
        {
            true => {
                trace!("ECH accepted by server");
                self.inner_hello_transcript
                    .add_message(server_hello_encoded);
                EchStatus::Accepted
            }
            false => {
                trace!("ECH rejected by server");
                EchStatus::Rejected
            }
        };
        Ok(self.status)
    }

    pub fn status(&self) -> EchStatus {
        self.status
    }

    /// The random of the inner hello.
    pub fn inner_random(&self) -> &Random {
        &self.inner_hello_random
    }

    /// The inner handshake transcript so far, as raw handshake messages.
    pub fn inner_transcript(&self) -> &[u8] {
        self.inner_hello_transcript.as_bytes()
    }

    fn encode_inner_hello(
        &mut self,
        inner: &ClientHelloPayload,
        outer_hello: &ClientHelloPayload,
    ) -> Result<EncodedInnerHello, Error> {
        let encoded = inner_hello::encode_inner(
            inner,
            &outer_hello.extensions,
            &self.policy,
            self.maximum_name_length,
        )?;

        // Update the inner transcript buffer with the inner hello message.
        self.inner_hello_transcript
            .add_message(&encoded.transcript_message(inner.session_id));

        Ok(encoded)
    }

    fn outer_hello_ext(&self, payload: Vec<u8>) -> RawExtension {
        let payload = EchPayload {
            cipher_suite: self.cipher_suite,
            config_id: PayloadU8::new(self.config_id.clone()),
            enc: PayloadU16::new(self.enc.0.clone()),
            payload: PayloadU16::new(payload),
        };
        RawExtension::new(ExtensionType::EncryptedClientHello, payload.get_encoding())
    }
}

impl core::fmt::Debug for EchState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EchState")
            .field("outer_name", &self.outer_name)
            .field("cipher_suite", &self.cipher_suite)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "ech_test.rs"]
mod tests;
