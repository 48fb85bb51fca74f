//! # tls-ech — Encrypted ClientHello for TLS 1.3
//!
//! This crate is the protocol engine for Encrypted ClientHello (ECH),
//! drafts 09/10 of `draft-ietf-tls-esni`.  ECH conceals the true server
//! name (and the rest of the sensitive ClientHello contents) from passive
//! observers: the real ("inner") ClientHello is encrypted under a public
//! key published in DNS and carried as an extension of a cover ("outer")
//! ClientHello that names only the configuration's `public_name`.
//!
//! The engine covers:
//!
//! - parsing and validating `ECHConfigList` structures from the binary,
//!   base64, ascii-hex and SVCB/HTTPS transports ([`read_config_lists`],
//!   [`read_svcb_config_lists`]);
//! - the server-side key store with reload and age-based flushing
//!   ([`EchKeyStore`]);
//! - building the `EncodedClientHelloInner` with `outer_extensions`
//!   compression, sealing it, and splicing the ECH extension into the
//!   outer hello ([`client::EchState`]);
//! - server-side trial decryption keyed on the one-byte `config_id`,
//!   with mis-decryption downgraded to GREASE handling
//!   ([`server::decrypt_client_hello`]);
//! - the accept-confirmation signal in `ServerHello.random` and the
//!   transcript swap from outer to inner hello ([`ConfirmationSuite`],
//!   [`EchSession::swap_to_inner`]);
//! - GREASE ECH for clients with no real configuration
//!   ([`client::EchGreaseConfig`]);
//! - one-shot raw decryption for split-mode front-ends
//!   ([`server::raw_decrypt`]).
//!
//! It is not a TLS stack: the handshake state machine, record layer and
//! certificate policy live elsewhere and call in at the seams above.
//! Cryptography is reached only through the traits in [`crypto`];
//! implementations backed by *ring* and the *hpke* crate are provided.

#![forbid(unsafe_code)]
#![warn(clippy::use_self, trivial_casts, trivial_numeric_casts, unused_qualifications)]

extern crate alloc;

// log for logging (optional).
#[cfg(feature = "logging")]
use log;

#[cfg(not(feature = "logging"))]
mod log {
    macro_rules! trace    ( ($($tt:tt)*) => {{}} );
    macro_rules! debug    ( ($($tt:tt)*) => {{}} );
    macro_rules! _warn    ( ($($tt:tt)*) => {{}} );
    pub(crate) use {_warn as warn, debug, trace};
}

#[macro_use]
pub mod msgs;

/// Client-side ECH: config selection, offer assembly, GREASE.
pub mod client;

/// Server-side ECH: trial decryption, inner reconstruction, split mode.
pub mod server;

/// Crypto provider interface.
pub mod crypto;

mod confirm;
mod error;
mod hash_hs;
mod pemfile;
mod session;
mod store;
mod transport;

pub use crate::confirm::ConfirmationSuite;
pub use crate::error::{EncryptedClientHelloError, Error, InvalidMessage};
pub use crate::hash_hs::{HandshakeHash, HandshakeHashBuffer};
pub use crate::msgs::config::{EchConfigBuilder, EchConfigExtension, EchConfigList};
pub use crate::session::{EchSession, EchStatus, OuterSni};
pub use crate::store::{EchKey, EchKeyStore, KeyLoadOutcome, KeySource};
pub use crate::transport::{
    guess_format, read_config_lists, read_svcb_config_lists, EchFormat,
};
