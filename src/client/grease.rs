//! GREASE ECH: a well-formed but meaningless ECH extension, sent by
//! clients with no real config so that real ECH traffic has cover.

use alloc::vec::Vec;

use crate::crypto::SecureRandom;
use crate::error::Error;
use crate::log::trace;
use crate::msgs::base::{Payload, PayloadU16};
use crate::msgs::client_hello::{append_extension, scan_hello_body, Extension};
use crate::msgs::codec::Codec;
use crate::msgs::ech::EncryptedClientHelloOuter;
use crate::msgs::enums::{ExtensionType, HpkeAead, HpkeKdf, HpkeKem, HpkeSymmetricCipherSuite};
use crate::session::EchSession;

/// Length of the random ciphertext in a GREASE ECH extension.
///
/// This is what the real offer path produces for a padded inner hello with
/// the default configuration; it does not vary with small changes to the
/// inner SNI length.
const GREASE_PAYLOAD_LEN: usize = 0x1d3;

/// Configuration for GREASE Encrypted Client Hello.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchGreaseConfig {
    /// The KEM whose public-key length the random `enc` value imitates.
    /// Nothing is ever encrypted to it.
    pub kem_id: HpkeKem,
    /// The symmetric suite advertised in the extension.
    pub suite: HpkeSymmetricCipherSuite,
}

impl Default for EchGreaseConfig {
    fn default() -> Self {
        Self {
            kem_id: HpkeKem::DHKEM_X25519_HKDF_SHA256,
            suite: HpkeSymmetricCipherSuite::default(),
        }
    }
}

impl EchGreaseConfig {
    /// Parse a `"<kdf>,<aead>"` suite preference, as registry names
    /// (`"hkdf-sha256,aes-128-gcm"`), compact names
    /// (`"hkdf-sha256,aes128gcm"`), or numeric ids (`"1,3"`, `"0x1,0x3"`).
    pub fn from_suite_str(suite: &str) -> Option<Self> {
        let (kdf, aead) = suite.split_once(',')?;
        Some(Self {
            kem_id: HpkeKem::DHKEM_X25519_HKDF_SHA256,
            suite: HpkeSymmetricCipherSuite {
                kdf_id: kdf_from_str(kdf.trim())?,
                aead_id: aead_from_str(aead.trim())?,
            },
        })
    }

    /// Build a GREASE ECH extension: a random config id, a random `enc`
    /// of this KEM's public-key length, and a fixed-length random
    /// ciphertext.
    pub fn grease_ext(
        &self,
        secure_random: &'static dyn SecureRandom,
    ) -> Result<Extension, Error> {
        trace!("preparing GREASE ECH extension");

        let mut config_id = [0u8; 1];
        secure_random.fill(&mut config_id)?;

        let enc_len = self
            .kem_id
            .public_key_len()
            .ok_or_else(|| Error::General("unknown KEM for GREASE ECH".into()))?;
        let mut enc = vec![0u8; enc_len];
        secure_random.fill(&mut enc)?;

        let mut payload = vec![0u8; GREASE_PAYLOAD_LEN];
        secure_random.fill(&mut payload)?;

        Ok(Extension {
            typ: ExtensionType::EncryptedClientHello,
            payload: Payload::new(
                EncryptedClientHelloOuter {
                    cipher_suite: self.suite,
                    config_id: config_id[0],
                    enc: PayloadU16::new(enc),
                    payload: PayloadU16::new(payload),
                }
                .get_encoding(),
            ),
        })
    }
}

/// Splice a GREASE ECH extension into an outer ClientHello body and mark
/// the session accordingly.
pub fn add_grease(
    outer_body: &mut Vec<u8>,
    config: &EchGreaseConfig,
    secure_random: &'static dyn SecureRandom,
    session: &mut EchSession,
) -> Result<(), Error> {
    let ext = config.grease_ext(secure_random)?;
    let offsets = scan_hello_body(outer_body)?;
    append_extension(outer_body, &offsets, &ext.get_encoding())?;
    session.attempted = true;
    session.grease = true;
    Ok(())
}

fn kdf_from_str(s: &str) -> Option<HpkeKdf> {
    Some(match s.to_ascii_lowercase().as_str() {
        "hkdf-sha256" | "hkdf_sha256" => HpkeKdf::HKDF_SHA256,
        "hkdf-sha384" | "hkdf_sha384" => HpkeKdf::HKDF_SHA384,
        "hkdf-sha512" | "hkdf_sha512" => HpkeKdf::HKDF_SHA512,
        other => match parse_id(other)? {
            id @ 0x0001..=0x0003 => HpkeKdf::from(id),
            _ => return None,
        },
    })
}

fn aead_from_str(s: &str) -> Option<HpkeAead> {
    Some(match s.to_ascii_lowercase().as_str() {
        "aes-128-gcm" | "aes128gcm" => HpkeAead::AES_128_GCM,
        "aes-256-gcm" | "aes256gcm" => HpkeAead::AES_256_GCM,
        "chacha20-poly1305" | "chacha20poly1305" | "chachapoly1305" => {
            HpkeAead::CHACHA20_POLY_1305
        }
        other => match parse_id(other)? {
            id @ 0x0001..=0x0003 => HpkeAead::from(id),
            _ => return None,
        },
    })
}

fn parse_id(s: &str) -> Option<u16> {
    match s.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
