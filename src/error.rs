//! Error types used throughout this crate.

use alloc::string::String;
use core::fmt;

use crate::msgs::enums::AlertDescription;

/// This crate reports protocol errors using this type.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An error occurred while handling Encrypted Client Hello (ECH).
    InvalidEncryptedClientHello(EncryptedClientHelloError),

    /// The peer sent us a TLS message with invalid contents.
    InvalidMessage(InvalidMessage),

    /// We failed to acquire random bytes from the system.
    FailedToGetRandomBytes,

    /// A catch-all error for unlikely errors.
    General(String),
}

impl Error {
    /// The alert a TLS endpoint should send when refusing a handshake
    /// because of this error, if any.
    ///
    /// Server-side HPKE failures never reach this function: those are
    /// downgraded to GREASE handling rather than alerted on, to avoid
    /// presenting a decryption oracle.
    pub fn alert(&self) -> Option<AlertDescription> {
        match self {
            Self::InvalidMessage(e) => Some(e.alert()),
            Self::InvalidEncryptedClientHello(EncryptedClientHelloError::HpkeFailure) => {
                Some(AlertDescription::InternalError)
            }
            Self::InvalidEncryptedClientHello(_) => None,
            Self::FailedToGetRandomBytes | Self::General(_) => {
                Some(AlertDescription::InternalError)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncryptedClientHello(e) => {
                write!(f, "encrypted client hello error: {e:?}")
            }
            Self::InvalidMessage(e) => write!(f, "invalid peer message: {e:?}"),
            Self::FailedToGetRandomBytes => write!(f, "failed to get random bytes"),
            Self::General(e) => write!(f, "unexpected error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

/// A corrupt TLS message payload that resulted in an error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidMessage {
    /// A TLS message payload was larger than allowed by the specification.
    MessageTooLarge,
    /// Message is shorter than the expected length
    MessageTooShort,
    /// Missing data for the named handshake payload value
    MissingData(&'static str),
    /// Trailing data found for the named handshake payload value
    TrailingData(&'static str),
    /// A peer sent an unexpected message type.
    UnexpectedMessage(&'static str),
    /// A peer's server name could not be decoded
    InvalidServerName,
    /// An ECHConfigList's declared length disagrees with its contents.
    InvalidEchConfigList,
    /// An ECHConfig carried an empty or non-4-byte-multiple cipher suite list.
    InvalidEchCipherSuites,
    /// An ECHConfig's public_name length was outside `(1, 255]`.
    InvalidEchPublicName,
    /// An ECHConfig extension value met or exceeded the 1500 octet limit.
    EchConfigExtensionTooLong,
    /// The ECH extension's `enc` value exceeded 1024 octets.
    EchEncTooLong,
    /// The ECH extension's payload exceeded 16384 octets.
    EchPayloadTooLong,
    /// The inner hello's `outer_extensions` referenced an extension the
    /// outer hello does not carry (in order), or referenced ECH itself.
    InvalidEchOuterExtensions,
    /// A peer sent a message where a given extension type was repeated
    DuplicateExtension(u16),
    /// A peer sent an empty list of items, but a non-empty list is required.
    ///
    /// The argument names the context.
    IllegalEmptyList(&'static str),
    /// A peer sent a non-null compression method.
    UnsupportedCompression,
}

impl InvalidMessage {
    pub(crate) fn alert(&self) -> AlertDescription {
        match self {
            Self::DuplicateExtension(_) | Self::InvalidEchOuterExtensions => {
                AlertDescription::IllegalParameter
            }
            _ => AlertDescription::DecodeError,
        }
    }
}

impl From<InvalidMessage> for Error {
    #[inline]
    fn from(e: InvalidMessage) -> Self {
        Self::InvalidMessage(e)
    }
}

/// An error that occurred while handling Encrypted Client Hello (ECH).
#[non_exhaustive]
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EncryptedClientHelloError {
    /// The provided ECH configuration list was invalid.
    InvalidConfigList,
    /// No ECH configuration of a supported version was present.
    ///
    /// On a client this means ECH cannot be attempted; it is not fatal to
    /// the connection.
    UnsupportedVersion,
    /// No compatible ECH configuration.
    NoCompatibleConfig,
    /// HPKE seal or open failed.
    ///
    /// Fatal on a client; a server must instead treat the offer as GREASE.
    HpkeFailure,
    /// The stored key container did not hold exactly one ECHConfig.
    NotExactlyOneConfig,
}

impl From<EncryptedClientHelloError> for Error {
    #[inline]
    fn from(e: EncryptedClientHelloError) -> Self {
        Self::InvalidEncryptedClientHello(e)
    }
}
