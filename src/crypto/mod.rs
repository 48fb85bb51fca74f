//! Crypto provider seams.
//!
//! The ECH engine never implements cryptographic primitives itself; it
//! calls through the traits here. Concrete implementations backed by
//! *ring* (hashing, HMAC, randomness) and the *hpke* crate (HPKE) live in
//! [`ring`] and [`rust_hpke`].

use core::fmt::Debug;

use crate::error::Error;

/// Hashing interfaces.
pub mod hash;

/// HMAC interfaces.
pub mod hmac;

/// Hybrid public key encryption interfaces.
pub mod hpke;

/// Cryptography specific to TLS1.3.
pub mod tls13;

/// Hash, HMAC and randomness implemented with *ring*.
pub mod ring;

/// HPKE implemented with the *hpke* crate.
pub mod rust_hpke;

/// A source of cryptographically secure randomness.
pub trait SecureRandom: Debug + Send + Sync {
    /// Fill the given buffer with random bytes.
    ///
    /// The bytes must be sourced from a cryptographically secure random
    /// number generator seeded with good quality, secret entropy.
    fn fill(&self, buf: &mut [u8]) -> Result<(), GetRandomFailed>;
}

/// Random material generation failed.
#[derive(Debug)]
pub struct GetRandomFailed;

impl From<GetRandomFailed> for Error {
    fn from(_: GetRandomFailed) -> Self {
        Self::FailedToGetRandomBytes
    }
}
