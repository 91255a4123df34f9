use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use zeroize::Zeroizing;

use crate::config::EchServerConfig;
use crate::crypto::hpke::{EncapsulatedSecret, HpkeProvider, HpkeSuite};
use crate::dns_name::DnsName;
use crate::ech_key::EchKeyBinding;
use crate::error::Error;
use crate::hash_hs::HandshakeHashBuffer;
use crate::log::{debug, trace, warn};
use crate::msgs::codec::Codec;
use crate::msgs::ech::{EchConfigContents, EchPayload};
use crate::msgs::enums::ExtensionType;
use crate::msgs::handshake::{ClientHelloPayload, RawExtension, ServerHelloPayload};
use crate::msgs::inner_hello::{DecompressedInnerHello, decode_inner};
use crate::tls13::{self, SERVER_HELLO_ECH_CONFIRMATION_SPAN};

/// The deferred decision about which name the server answers as.
///
/// It runs only once the inner hello has been promoted, so it sees the
/// name the client really asked for.
pub trait ServerNameDecision: Send + Sync {
    /// Return false to refuse the connection for `name`.
    ///
    /// `name` is the inner hello's `server_name`, or else the binding's
    /// configured inner name, if any.
    fn accept_inner_name(&self, name: Option<&DnsName>) -> bool;
}

impl<F> ServerNameDecision for F
where
    F: Fn(Option<&DnsName>) -> bool + Send + Sync,
{
    fn accept_inner_name(&self, name: Option<&DnsName>) -> bool {
        self(name)
    }
}

/// Where a server-side ECH session is.
///
/// ```text
/// ReceivedOuter -> NotOffered
///               -> DecryptFailed
///               -> Decrypted -> (promote) PromotedHandshake
/// ```
///
/// A decode failure after decryption is an error, not a state.
#[derive(Debug)]
pub enum EchServerState {
    /// Nothing tried yet.
    ReceivedOuter,
    /// The outer hello carried no ECH extension.
    NotOffered,
    /// No binding could open the ECH extension. The outer hello is final.
    ///
    /// This covers a wrong key, a tampered payload and GREASE alike.
    DecryptFailed,
    /// The inner hello was opened and decoded, and awaits promotion.
    Decrypted(DecryptedInner),
}

/// An opened and decompressed inner hello, with the binding that opened it.
pub struct DecryptedInner {
    pub inner: DecompressedInnerHello,
    pub binding: Arc<EchKeyBinding>,
}

impl fmt::Debug for DecryptedInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedInner")
            .field("inner_len", &self.inner.bytes.len())
            .field("binding", &self.binding.source())
            .finish()
    }
}

/// Server-side ECH processing for one received ClientHello.
///
/// `IO` is whatever the surrounding connection reads and writes through; it
/// is carried into the [`PromotedHandshake`] untouched.
pub struct EchServerSession<IO> {
    io: IO,
    config: Arc<EchServerConfig>,
    outer: ClientHelloPayload,
    transcript: HandshakeHashBuffer,
    state: EchServerState,
}

impl<IO> EchServerSession<IO> {
    /// Start processing the encoded ClientHello handshake message `client_hello`.
    pub fn new(io: IO, config: Arc<EchServerConfig>, client_hello: &[u8]) -> Result<Self, Error> {
        let outer = ClientHelloPayload::read_message(client_hello)?;
        let mut transcript = HandshakeHashBuffer::new();
        transcript.add_message(client_hello);

        Ok(Self {
            io,
            config,
            outer,
            transcript,
            state: EchServerState::ReceivedOuter,
        })
    }

    /// Add a later handshake message to the transcript.
    ///
    /// These are kept, after the inner hello, on promotion.
    pub fn add_message(&mut self, encoded: &[u8]) {
        self.transcript.add_message(encoded);
    }

    /// Trial-decrypt the outer hello's ECH extension.
    ///
    /// Every binding in the current key snapshot whose configs match the
    /// extension's cipher suite and config id is tried in turn (an empty
    /// config id matches them all). If none opens it, the state becomes
    /// [`EchServerState::DecryptFailed`], or, when the config asks for hard
    /// failure, [`Error::HandshakeFailure`] is returned.
    ///
    /// A decrypted inner hello that does not decode is always an error.
    pub fn decrypt(&mut self) -> Result<&EchServerState, Error> {
        if !matches!(self.state, EchServerState::ReceivedOuter) {
            return Ok(&self.state);
        }

        let Some(ext) = self
            .outer
            .find_extension(ExtensionType::EncryptedClientHello)
        else {
            trace!("no ECH extension in client hello");
            self.state = EchServerState::NotOffered;
            return Ok(&self.state);
        };
        let ech = EchPayload::read_bytes(&ext.body)?;

        let aad = compute_ech_aad(&self.outer, &ech);
        let provider = self.config.hpke_provider;

        let snapshot = self.config.keys.snapshot();
        // An outer SNI that is not a host name matches no pinned binding.
        let outer_sni = match snapshot
            .iter()
            .any(|b| b.outer_name().is_some())
        {
            true => self.outer.server_name().ok().flatten(),
            false => None,
        };
        let mut opened = None;
        'bindings: for binding in snapshot
            .iter()
            .filter(|b| b.accepts_outer_name(outer_sni.as_ref()))
        {
            for (suite, contents) in find_matching_ech_configs(binding, provider, &ech) {
                match open(provider, suite, contents, binding, &ech, &aad) {
                    Ok(plaintext) => {
                        debug!("ECH opened with key from {}", binding.source());
                        opened = Some((Arc::clone(binding), Zeroizing::new(plaintext)));
                        break 'bindings;
                    }
                    Err(_) => continue,
                }
            }
        }

        let Some((binding, plaintext)) = opened else {
            trace!("ECH decryption failed");
            self.state = EchServerState::DecryptFailed;
            return match self.config.hard_fail {
                true => Err(Error::HandshakeFailure),
                false => Ok(&self.state),
            };
        };

        let inner = decode_inner(&plaintext, &self.outer).inspect_err(|_err| {
            warn!("decrypted ECH inner hello is invalid: {_err:?}");
        })?;

        self.state = EchServerState::Decrypted(DecryptedInner { inner, binding });
        Ok(&self.state)
    }

    /// Make the decrypted inner hello the handshake's ClientHello.
    ///
    /// The transcript has the outer hello swapped for the inner one, then
    /// `decision` is asked about the inner name; if it refuses, the
    /// connection fails with [`Error::InnerNameRejected`].
    pub fn promote(self, decision: &dyn ServerNameDecision) -> Result<PromotedHandshake<IO>, Error> {
        let Self {
            io,
            mut transcript,
            state,
            ..
        } = self;

        let EchServerState::Decrypted(DecryptedInner { inner, binding }) = state else {
            return Err(Error::General(
                "no decrypted inner hello to promote".into(),
            ));
        };

        transcript.replace_client_hello(&inner.bytes)?;

        let server_name = match inner.hello.server_name()? {
            Some(name) => Some(name),
            None => binding.inner_name().cloned(),
        };

        if !decision.accept_inner_name(server_name.as_ref()) {
            debug!("inner server name {server_name:?} rejected");
            return Err(Error::InnerNameRejected);
        }

        trace!("promoted ECH inner hello");
        Ok(PromotedHandshake {
            io,
            client_hello: inner.hello,
            server_name,
            transcript,
            binding,
        })
    }

    pub fn state(&self) -> &EchServerState {
        &self.state
    }

    /// The ClientHello as received.
    pub fn outer_hello(&self) -> &ClientHelloPayload {
        &self.outer
    }

    /// The raw transcript so far.
    pub fn transcript(&self) -> &[u8] {
        self.transcript.as_bytes()
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    /// Give up on ECH, keeping the transport.
    pub fn into_io(self) -> IO {
        self.io
    }
}

impl<IO> fmt::Debug for EchServerSession<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchServerSession")
            .field("state", &self.state)
            .field("transcript", &self.transcript)
            .finish_non_exhaustive()
    }
}

/// A handshake that continues with the client's inner hello.
pub struct PromotedHandshake<IO> {
    io: IO,
    client_hello: ClientHelloPayload,
    server_name: Option<DnsName>,
    transcript: HandshakeHashBuffer,
    binding: Arc<EchKeyBinding>,
}

impl<IO> PromotedHandshake<IO> {
    /// The authoritative ClientHello.
    pub fn client_hello(&self) -> &ClientHelloPayload {
        &self.client_hello
    }

    /// The name that was accepted.
    pub fn server_name(&self) -> Option<&DnsName> {
        self.server_name.as_ref()
    }

    /// The key binding that opened the inner hello.
    pub fn binding(&self) -> &EchKeyBinding {
        &self.binding
    }

    /// The raw transcript: the inner hello, then anything added since.
    pub fn transcript(&self) -> &[u8] {
        self.transcript.as_bytes()
    }

    pub fn add_message(&mut self, encoded: &[u8]) {
        self.transcript.add_message(encoded);
    }

    /// Signal acceptance to the client.
    ///
    /// `server_hello` is the encoded ServerHello handshake message; the last
    /// eight bytes of its random are overwritten with the confirmation value
    /// for this transcript, and the result joins the transcript. Call this
    /// before adding anything else.
    pub fn accept_confirmation(&mut self, server_hello: &mut [u8]) -> Result<(), Error> {
        let parsed = ServerHelloPayload::read_message(server_hello)?;
        let hash = tls13::suite_hash(parsed.cipher_suite)?;

        let confirmation = tls13::server_ech_confirmation_secret(
            hash,
            &self.client_hello.random.0,
            &self.transcript,
            server_hello,
        )?;
        server_hello[SERVER_HELLO_ECH_CONFIRMATION_SPAN].copy_from_slice(&confirmation);

        self.transcript.add_message(server_hello);
        Ok(())
    }

    pub fn io(&self) -> &IO {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }

    pub fn into_io(self) -> IO {
        self.io
    }
}

impl<IO> fmt::Debug for PromotedHandshake<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromotedHandshake")
            .field("server_name", &self.server_name)
            .field("binding", &self.binding.source())
            .finish_non_exhaustive()
    }
}

/// The configs of `binding` that could have produced `ech`, with the suite to open it with.
fn find_matching_ech_configs<'a>(
    binding: &'a EchKeyBinding,
    provider: &dyn HpkeProvider,
    ech: &EchPayload,
) -> Vec<(HpkeSuite, &'a EchConfigContents)> {
    binding
        .config_list()
        .usable()
        .filter_map(|contents| {
            if !contents
                .symmetric_cipher_suites
                .contains(&ech.cipher_suite)
            {
                return None;
            }

            let suite = HpkeSuite {
                kem: contents.kem_id,
                sym: ech.cipher_suite,
            };
            if !provider.supports_suite(&suite) {
                return None;
            }

            // An empty config id means "try them all".
            if !ech.config_id.0.is_empty() {
                match contents.config_id(suite.sym.kdf_id) {
                    Ok(id) if id == ech.config_id.0 => {}
                    _ => return None,
                }
            }

            Some((suite, contents))
        })
        .collect()
}

fn open(
    provider: &dyn HpkeProvider,
    suite: HpkeSuite,
    contents: &EchConfigContents,
    binding: &EchKeyBinding,
    ech: &EchPayload,
    aad: &[u8],
) -> Result<Vec<u8>, Error> {
    provider.start(&suite)?.open(
        &EncapsulatedSecret(ech.enc.0.clone()),
        &contents.hpke_info(),
        aad,
        &ech.payload.0,
        binding.private_key(),
    )
}

/// The outer hello, encoded, with the ECH extension's payload zeroed.
fn compute_ech_aad(outer: &ClientHelloPayload, ech: &EchPayload) -> Vec<u8> {
    let mut hello = outer.clone();
    hello.set_extension(RawExtension::new(
        ExtensionType::EncryptedClientHello,
        ech.with_zeroed_payload().get_encoding(),
    ));
    hello.encode_message()
}

#[cfg(test)]
#[path = "ech_test.rs"]
mod tests;
