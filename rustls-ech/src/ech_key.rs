//! Server-side ECH keys: each [`EchKeyBinding`] ties a private key to the
//! ECHConfigList it was published with, and an [`EchKeyStore`] holds the
//! current set of bindings.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::crypto::hpke::{HpkePrivateKey, HpkeProvider, HpkePublicKey, HpkeSuite};
use crate::dns_name::DnsName;
use crate::error::Error;
use crate::lock::RwLock;
use crate::log::{debug, warn};
use crate::msgs::base::PayloadU16;
use crate::msgs::codec::Codec;
use crate::msgs::ech::{EchConfigContents, EchConfigList, EchConfigPayload};

/// A freshly generated HPKE key pair for a KEM.
#[derive(Debug)]
pub struct EchKeyPair {
    pub suite: HpkeSuite,
    pub public_key: HpkePublicKey,
    pub private_key: HpkePrivateKey,
}

impl EchKeyPair {
    /// Generate a key pair for `suite` using `provider`.
    pub fn generate(provider: &dyn HpkeProvider, suite: HpkeSuite) -> Result<Self, Error> {
        let (public_key, private_key) = provider
            .start(&suite)?
            .generate_key_pair()?;
        Ok(Self {
            suite,
            public_key,
            private_key,
        })
    }

    /// A one-record ECHConfigList publishing this key under `public_name`.
    pub fn config_list(&self, public_name: DnsName, maximum_name_length: u16) -> EchConfigList {
        EchConfigList {
            configs: alloc::vec![EchConfigPayload::V09(EchConfigContents {
                public_name,
                public_key: PayloadU16::new(self.public_key.0.clone()),
                kem_id: self.suite.kem,
                symmetric_cipher_suites: alloc::vec![self.suite.sym],
                maximum_name_length,
                extensions: Vec::new(),
            })],
        }
    }
}

/// A private key and the ECHConfigList that publishes its public half.
pub struct EchKeyBinding {
    source: String,
    config_list: EchConfigList,
    private_key: Arc<HpkePrivateKey>,
    loaded_at: Duration,
    inner_name: Option<DnsName>,
    outer_name: Option<DnsName>,
}

impl EchKeyBinding {
    /// Bind `private_key` to the encoded ECHConfigList `config_list`.
    ///
    /// `source` identifies where the pair came from (a file name, say);
    /// [`EchKeyStore::reload_if_newer`] uses it to find the binding a reload
    /// supersedes. `loaded_at` is the time since the Unix epoch at which
    /// the pair was read.
    ///
    /// The list must contain at least one record of a version we implement.
    pub fn new(
        source: impl Into<String>,
        config_list: &[u8],
        private_key: HpkePrivateKey,
        loaded_at: Duration,
    ) -> Result<Self, Error> {
        let config_list = EchConfigList::from_bytes(config_list)?;
        if config_list.usable_count() == 0 {
            return Err(Error::NoCompatibleConfig);
        }

        Ok(Self {
            source: source.into(),
            config_list,
            private_key: Arc::new(private_key),
            loaded_at,
            inner_name: None,
            outer_name: None,
        })
    }

    /// As [`EchKeyBinding::new`], stamped with the current time.
    pub fn new_now(
        source: impl Into<String>,
        config_list: &[u8],
        private_key: HpkePrivateKey,
    ) -> Result<Self, Error> {
        Self::new(source, config_list, private_key, unix_now())
    }

    /// Generate a new key for `suite` and publish it under `public_name`.
    pub fn generate(
        source: impl Into<String>,
        provider: &dyn HpkeProvider,
        suite: HpkeSuite,
        public_name: DnsName,
    ) -> Result<Self, Error> {
        let key_pair = EchKeyPair::generate(provider, suite)?;
        let config_list = key_pair
            .config_list(public_name, 0)
            .get_encoding();
        Self::new_now(source, &config_list, key_pair.private_key)
    }

    /// The name to hand to the server name decision when the inner hello
    /// carries none.
    pub fn with_inner_name(mut self, name: DnsName) -> Self {
        self.inner_name = Some(name);
        self
    }

    /// Only try this binding for outer hellos whose `server_name` is `name`.
    pub fn with_outer_name(mut self, name: DnsName) -> Self {
        self.outer_name = Some(name);
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config_list(&self) -> &EchConfigList {
        &self.config_list
    }

    /// The ECHConfigList as it would be published in DNS.
    pub fn config_list_bytes(&self) -> Vec<u8> {
        self.config_list.get_encoding()
    }

    pub fn loaded_at(&self) -> Duration {
        self.loaded_at
    }

    pub fn inner_name(&self) -> Option<&DnsName> {
        self.inner_name.as_ref()
    }

    pub fn outer_name(&self) -> Option<&DnsName> {
        self.outer_name.as_ref()
    }

    pub(crate) fn private_key(&self) -> &Arc<HpkePrivateKey> {
        &self.private_key
    }

    /// Should an outer hello naming `outer_sni` be tried against this binding?
    pub(crate) fn accepts_outer_name(&self, outer_sni: Option<&DnsName>) -> bool {
        match (&self.outer_name, outer_sni) {
            (None, _) => true,
            (Some(expected), Some(sni)) => expected == sni,
            (Some(_), None) => false,
        }
    }
}

impl Clone for EchKeyBinding {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            config_list: self.config_list.clone(),
            private_key: Arc::clone(&self.private_key),
            loaded_at: self.loaded_at,
            inner_name: self.inner_name.clone(),
            outer_name: self.outer_name.clone(),
        }
    }
}

impl fmt::Debug for EchKeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EchKeyBinding")
            .field("source", &self.source)
            .field("configs", &self.config_list.len())
            .field("loaded_at", &self.loaded_at)
            .field("inner_name", &self.inner_name)
            .field("outer_name", &self.outer_name)
            .finish_non_exhaustive()
    }
}

/// An immutable view of the bindings in an [`EchKeyStore`].
pub type EchKeySnapshot = Arc<[Arc<EchKeyBinding>]>;

/// The set of bindings a server decrypts with.
///
/// Readers take a [`EchKeySnapshot`] and keep it for as long as they need;
/// writers build a new set and swap it in. A superseded binding (and its
/// private key) is freed once the last snapshot holding it is dropped.
#[derive(Debug)]
pub struct EchKeyStore {
    current: RwLock<EchKeySnapshot>,
}

impl EchKeyStore {
    pub fn new() -> Self {
        Self::from_bindings(Vec::new())
    }

    pub fn from_bindings(bindings: Vec<EchKeyBinding>) -> Self {
        Self {
            current: RwLock::new(
                bindings
                    .into_iter()
                    .map(Arc::new)
                    .collect(),
            ),
        }
    }

    /// The current bindings.
    pub fn snapshot(&self) -> EchKeySnapshot {
        match self.current.read() {
            Some(current) => Arc::clone(&current),
            None => {
                warn!("ECH key store lock poisoned");
                Arc::from(Vec::new())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a binding alongside the existing ones.
    pub fn add(&self, binding: EchKeyBinding) {
        self.update(|bindings| {
            bindings.push(Arc::new(binding));
            true
        });
    }

    /// Install `binding`, replacing any binding from the same source that
    /// was loaded earlier.
    ///
    /// Returns false, and changes nothing, if the existing binding from
    /// that source is at least as new.
    pub fn reload_if_newer(&self, binding: EchKeyBinding) -> bool {
        self.update(|bindings| {
            match bindings
                .iter()
                .position(|b| b.source == binding.source)
            {
                Some(idx) if bindings[idx].loaded_at >= binding.loaded_at => {
                    debug!("ECH key from {} is not newer, keeping it", binding.source);
                    false
                }
                Some(idx) => {
                    debug!("reloading ECH key from {}", binding.source);
                    bindings[idx] = Arc::new(binding);
                    true
                }
                None => {
                    bindings.push(Arc::new(binding));
                    true
                }
            }
        })
    }

    /// Drop bindings loaded before `cutoff` (time since the Unix epoch).
    ///
    /// Returns how many were dropped.
    pub fn flush_older_than(&self, cutoff: Duration) -> usize {
        let mut flushed = 0;
        self.update(|bindings| {
            let before = bindings.len();
            bindings.retain(|b| b.loaded_at >= cutoff);
            flushed = before - bindings.len();
            flushed > 0
        });
        if flushed > 0 {
            debug!("flushed {flushed} ECH keys");
        }
        flushed
    }

    /// Drop bindings loaded more than `age` ago.
    pub fn flush_older_than_age(&self, age: Duration) -> usize {
        self.flush_older_than(unix_now().saturating_sub(age))
    }

    /// Copy the current set, let `f` edit it, and swap the result in if
    /// `f` returns true. Returns whether it did.
    fn update(&self, f: impl FnOnce(&mut Vec<Arc<EchKeyBinding>>) -> bool) -> bool {
        let Some(mut current) = self.current.write() else {
            warn!("ECH key store lock poisoned");
            return false;
        };

        let mut bindings = current.to_vec();
        let changed = f(&mut bindings);
        if changed {
            *current = bindings.into();
        }
        changed
    }
}

impl Default for EchKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Time since the Unix epoch, or zero if the clock is before it.
pub(crate) fn unix_now() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "ech_key_test.rs"]
mod tests;
