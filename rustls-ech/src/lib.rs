//! # rustls-ech: Encrypted ClientHello for TLS1.3
//!
//! This crate hides the real destination of a TLS connection by encrypting
//! the ClientHello under a key the server publishes out of band (in DNS),
//! following draft-ietf-tls-esni-09.
//!
//! It provides two layers:
//!
//! - an HPKE engine ([`crypto::hpke`], [`crypto::rust_crypto`]) implementing
//!   RFC 9180 in all four modes, plus the draft-05 key schedule that
//!   ECH draft-09 deployments were built against;
//! - the ECH wire codec ([`msgs::ech`], [`msgs::inner_hello`]) and the client
//!   and server halves of the exchange ([`client`], [`server`]).
//!
//! It deliberately is *not* a TLS implementation: it produces and consumes
//! ClientHello and ServerHello messages, and leaves the rest of the
//! handshake to its caller.
//!
//! ## Getting started
//!
//! A client starts from the `ECHConfigList` it found in DNS:
//!
//! ```rust,ignore
//! use rustls_ech::client::{EchConfig, EchMode};
//! use rustls_ech::crypto::HPKE_PROVIDER;
//! use rustls_ech::EchClientConfig;
//!
//! let config = EchConfig::new(&ech_config_list, HPKE_PROVIDER)?;
//! let offer = EchMode::from(config).offer(inner_hello, &[], &EchClientConfig::default())?;
//! // send offer.hello; later:
//! let status = offer.state.unwrap().confirm_acceptance(&server_hello)?;
//! ```
//!
//! A server keeps its keys in an [`EchKeyStore`], and runs each received
//! ClientHello through a [`server::EchServerSession`]:
//!
//! ```rust,ignore
//! let mut session = EchServerSession::new(io, server_config.clone(), &client_hello)?;
//! if let EchServerState::Decrypted(_) = session.decrypt()? {
//!     let mut handshake = session.promote(&|name: Option<&DnsName>| name.is_some())?;
//!     handshake.accept_confirmation(&mut server_hello)?;
//! }
//! ```
//!
//! ## Crate features
//!
//! - `logging` (enabled by default): make the crate emit log messages via
//!   the `log` crate. Secrets are never logged.

#![no_std]
#![forbid(unsafe_code, unused_must_use)]
#![deny(
    clippy::clone_on_ref_ptr,
    clippy::use_self,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_extern_crates
)]
// Relax these clippy lints:
// - too_many_arguments: HPKE's mode inputs are just a lot of state
// - new_ret_no_self: constructors returning `Result<Self, _>` are fine
// - single_component_path_imports: our top-level `use log` import causes
//   a false positive, https://github.com/rust-lang/rust-clippy/issues/5210
#![allow(
    clippy::too_many_arguments,
    clippy::new_ret_no_self,
    clippy::single_component_path_imports
)]

extern crate alloc;
// The key store's clock and lock come from std.
extern crate std;

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
#[macro_use]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! warn     ( ($($tt:tt)*) => {{}} );
    macro_rules! error    ( ($($tt:tt)*) => {{}} );
    #[allow(unused_imports)]
    pub(crate) use {debug, error, trace, warn};
}

#[macro_use]
pub mod msgs;

mod dns_name;
mod error;
mod hash_hs;
mod lock;
mod rand;
mod tls13;

pub mod config;
pub mod crypto;
pub mod ech_key;
pub mod suites;

pub mod client;
pub mod server;

// The public interface is:
pub use crate::config::{EchClientConfig, EchServerConfig, OuterAction, OuterExtensionPolicy};
pub use crate::dns_name::{DnsName, InvalidDnsNameError};
pub use crate::ech_key::{EchKeyBinding, EchKeyPair, EchKeySnapshot, EchKeyStore};
pub use crate::error::{
    DecodeCompressionError, EchConfigError, Error, InvalidMessage, KeyScheduleError,
};
pub use crate::msgs::ech::{EchConfigList, EchConfigPayload, EchPayload};
pub use crate::msgs::inner_hello::{
    decode_inner, encode_inner, DecompressedInnerHello, EncodedInnerHello,
};
pub use crate::rand::{GetRandomFailed, SecureRandom, DEFAULT_SECURE_RANDOM};
