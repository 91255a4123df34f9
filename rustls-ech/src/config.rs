use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use crate::crypto::HPKE_PROVIDER;
use crate::crypto::hpke::HpkeProvider;
use crate::ech_key::EchKeyStore;
use crate::msgs::enums::ExtensionType;
use crate::msgs::handshake::RawExtension;
use crate::rand::{DEFAULT_SECURE_RANDOM, SecureRandom};

/// What happens to an inner ClientHello extension when the outer hello is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OuterAction {
    /// The outer hello carries the same value, and the encoded inner hello
    /// refers to it through the `ech_outer_extensions` marker.
    Compress,
    /// The outer hello carries its own value, if one is supplied, and the
    /// inner hello carries its value in full.
    Copy,
    /// The outer hello omits the extension altogether.
    NeverSent,
}

/// Per-extension choices for building the outer hello and compressing the
/// inner one, keyed by extension type code.
#[derive(Clone, PartialEq, Eq)]
pub struct OuterExtensionPolicy {
    actions: BTreeMap<u16, OuterAction>,
    default_action: OuterAction,
}

impl OuterExtensionPolicy {
    /// A policy that copies everything, with no compression.
    pub fn copy_all() -> Self {
        Self {
            actions: BTreeMap::new(),
            default_action: OuterAction::Copy,
        }
    }

    /// Set the action for one extension type.
    pub fn with(mut self, typ: ExtensionType, action: OuterAction) -> Self {
        self.actions
            .insert(u16::from(typ), action);
        self
    }

    /// The action for an extension type.
    ///
    /// The ECH extension and the `ech_outer_extensions` marker are never
    /// subject to policy: the former is always the outer hello's own, and
    /// the latter never appears in an outer hello.
    pub fn classify_for_outer(&self, typ: ExtensionType) -> OuterAction {
        match typ {
            ExtensionType::EncryptedClientHello => OuterAction::Copy,
            ExtensionType::EncryptedClientHelloOuterExtensions => OuterAction::NeverSent,
            _ => self
                .actions
                .get(&u16::from(typ))
                .copied()
                .unwrap_or(self.default_action),
        }
    }

    /// Build the outer hello's extensions from the inner hello's.
    ///
    /// `outer_values` supplies the outer hello's own value for `Copy`
    /// extensions (typically `server_name` with the public name, and a fresh
    /// `key_share`). Extensions in `outer_values` that the inner hello lacks
    /// are appended in the order given.
    pub fn build_outer_extensions(
        &self,
        inner: &[RawExtension],
        outer_values: &[RawExtension],
    ) -> Vec<RawExtension> {
        let own_value = |typ| {
            outer_values
                .iter()
                .find(|ext| ext.typ == typ)
        };

        let mut outer = Vec::with_capacity(inner.len() + outer_values.len());
        for ext in inner {
            match self.classify_for_outer(ext.typ) {
                OuterAction::Compress => outer.push(ext.clone()),
                OuterAction::Copy => outer.push(
                    own_value(ext.typ)
                        .unwrap_or(ext)
                        .clone(),
                ),
                OuterAction::NeverSent => {}
            }
        }

        for ext in outer_values {
            if !inner
                .iter()
                .any(|i| i.typ == ext.typ)
                && self.classify_for_outer(ext.typ) != OuterAction::NeverSent
            {
                outer.push(ext.clone());
            }
        }

        outer
    }
}

impl Default for OuterExtensionPolicy {
    /// Compresses `max_fragment_length`, `srp`, `ec_point_formats` and
    /// `supported_groups`; everything else is copied.
    fn default() -> Self {
        Self::copy_all()
            .with(ExtensionType::MaxFragmentLength, OuterAction::Compress)
            .with(ExtensionType::SRP, OuterAction::Compress)
            .with(ExtensionType::ECPointFormats, OuterAction::Compress)
            .with(ExtensionType::EllipticCurves, OuterAction::Compress)
            .with(ExtensionType::ServerName, OuterAction::Copy)
            .with(ExtensionType::ALProtocolNegotiation, OuterAction::Copy)
            .with(ExtensionType::KeyShare, OuterAction::Copy)
    }
}

impl fmt::Debug for OuterExtensionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.actions
                    .iter()
                    .map(|(typ, action)| (ExtensionType::from(*typ), action)),
            )
            .entry(&"default", &self.default_action)
            .finish()
    }
}

/// Client-side ECH settings.
#[derive(Clone, Debug)]
pub struct EchClientConfig {
    /// Where HPKE comes from.
    pub hpke_provider: &'static dyn HpkeProvider,

    /// Source of the inner random, GREASE values and ephemeral keys.
    pub secure_random: &'static dyn SecureRandom,

    /// How inner extensions relate to the outer hello.
    pub outer_extension_policy: OuterExtensionPolicy,
}

impl Default for EchClientConfig {
    fn default() -> Self {
        Self {
            hpke_provider: HPKE_PROVIDER,
            secure_random: DEFAULT_SECURE_RANDOM,
            outer_extension_policy: OuterExtensionPolicy::default(),
        }
    }
}

/// Server-side ECH settings.
#[derive(Clone, Debug)]
pub struct EchServerConfig {
    /// Where HPKE comes from.
    pub hpke_provider: &'static dyn HpkeProvider,

    /// The keys to trial-decrypt with.
    pub keys: Arc<EchKeyStore>,

    /// When true, a ClientHello whose ECH extension cannot be decrypted
    /// fails the handshake instead of continuing with the outer hello.
    ///
    /// The default is `false`.
    pub hard_fail: bool,
}

impl EchServerConfig {
    /// Make a config over `keys`, with defaults otherwise.
    pub fn new(keys: Arc<EchKeyStore>) -> Self {
        Self {
            hpke_provider: HPKE_PROVIDER,
            keys,
            hard_fail: false,
        }
    }
}
