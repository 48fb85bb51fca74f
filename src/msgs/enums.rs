#![allow(clippy::upper_case_acronyms)]
#![allow(non_camel_case_types)]

use alloc::vec::Vec;

use crate::error::InvalidMessage;
use crate::msgs::codec::{Codec, ListLength, Reader, TlsListElement};

enum_builder! {
    /// The `ExtensionType` TLS protocol enum.  Values in this enum are taken
    /// from the various RFCs covering TLS, and are listed by IANA.
    /// The `Unknown` item is used when processing unrecognised ordinals.
    #[repr(u16)]
    pub enum ExtensionType {
        ServerName => 0x0000,
        MaxFragmentLength => 0x0001,
        StatusRequest => 0x0005,
        EllipticCurves => 0x000a,
        ECPointFormats => 0x000b,
        SignatureAlgorithms => 0x000d,
        UseSRTP => 0x000e,
        ALProtocolNegotiation => 0x0010,
        SCT => 0x0012,
        Padding => 0x0015,
        ExtendedMasterSecret => 0x0017,
        SessionTicket => 0x0023,
        PreSharedKey => 0x0029,
        EarlyData => 0x002a,
        SupportedVersions => 0x002b,
        Cookie => 0x002c,
        PSKKeyExchangeModes => 0x002d,
        CertificateAuthorities => 0x002f,
        SignatureAlgorithmsCert => 0x0032,
        KeyShare => 0x0033,
        TransportParameters => 0x0039,
        EchIsInner => 0xda09,
        EchOuterExtensions => 0xfd00,
        EncryptedClientHello => 0xfe0a,
        RenegotiationInfo => 0xff01,
    }
}

impl TlsListElement for ExtensionType {
    const SIZE_LEN: ListLength = ListLength::U16;
}

enum_builder! {
    /// The version of an `ECHConfig` structure, by draft.
    ///
    /// The two values here are the only ones this implementation will
    /// parse; anything else is skipped over whole during list decoding.
    #[repr(u16)]
    pub enum EchVersion {
        V9 => 0xff09,
        V10 => 0xfe0d,
    }
}

enum_builder! {
    /// The `HandshakeType` TLS protocol enum.
    #[repr(u8)]
    pub enum HandshakeType {
        ClientHello => 0x01,
        ServerHello => 0x02,
        HelloRetryRequest => 0x06,
        EncryptedExtensions => 0x08,
    }
}

enum_builder! {
    /// The `ProtocolVersion` TLS protocol enum.
    #[repr(u16)]
    pub enum ProtocolVersion {
        SSLv2 => 0x0200,
        SSLv3 => 0x0300,
        TLSv1_0 => 0x0301,
        TLSv1_1 => 0x0302,
        TLSv1_2 => 0x0303,
        TLSv1_3 => 0x0304,
    }
}

impl TlsListElement for ProtocolVersion {
    const SIZE_LEN: ListLength = ListLength::U8;
}

enum_builder! {
    /// The `CipherSuite` TLS protocol enum, limited to the TLS1.3 suites.
    /// Unrecognised ordinals are carried through `Unknown`.
    #[repr(u16)]
    pub enum CipherSuite {
        TLS_NULL_WITH_NULL_NULL => 0x0000,
        TLS13_AES_128_GCM_SHA256 => 0x1301,
        TLS13_AES_256_GCM_SHA384 => 0x1302,
        TLS13_CHACHA20_POLY1305_SHA256 => 0x1303,
        TLS_EMPTY_RENEGOTIATION_INFO_SCSV => 0x00ff,
    }
}

impl TlsListElement for CipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}

enum_builder! {
    /// The `Compression` TLS protocol enum.
    #[repr(u8)]
    pub enum Compression {
        Null => 0x00,
        Deflate => 0x01,
        LSZ => 0x40,
    }
}

impl TlsListElement for Compression {
    const SIZE_LEN: ListLength = ListLength::U8;
}

enum_builder! {
    /// The `AlertDescription` TLS protocol enum.
    #[repr(u8)]
    pub enum AlertDescription {
        CloseNotify => 0x00,
        UnexpectedMessage => 0x0a,
        HandshakeFailure => 0x28,
        IllegalParameter => 0x2f,
        DecodeError => 0x32,
        DecryptError => 0x33,
        InternalError => 0x50,
        MissingExtension => 0x6d,
        EncryptedClientHelloRequired => 0x79,
    }
}

enum_builder! {
    /// The Key Encapsulation Mechanism (`Kem`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.1]
    ///
    /// [RFC 9180 Section 7.1]: <https://datatracker.ietf.org/doc/html/rfc9180#kemid-values>
    #[repr(u16)]
    pub enum HpkeKem {
        DHKEM_P256_HKDF_SHA256 => 0x0010,
        DHKEM_P384_HKDF_SHA384 => 0x0011,
        DHKEM_P521_HKDF_SHA512 => 0x0012,
        DHKEM_X25519_HKDF_SHA256 => 0x0020,
        DHKEM_X448_HKDF_SHA512 => 0x0021,
    }
}

impl HpkeKem {
    /// The length of an encoded public key (and so of an HPKE `enc` value)
    /// for this KEM.
    ///
    /// This is all a GREASE ECH extension uses a KEM for.
    pub fn public_key_len(&self) -> Option<usize> {
        match self {
            Self::DHKEM_P256_HKDF_SHA256 => Some(65),
            Self::DHKEM_P384_HKDF_SHA384 => Some(97),
            Self::DHKEM_P521_HKDF_SHA512 => Some(133),
            Self::DHKEM_X25519_HKDF_SHA256 => Some(32),
            Self::DHKEM_X448_HKDF_SHA512 => Some(56),
            Self::Unknown(_) => None,
        }
    }
}

enum_builder! {
    /// The Key Derivation Function (`Kdf`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.2]
    ///
    /// [RFC 9180 Section 7.2]: <https://datatracker.ietf.org/doc/html/rfc9180#name-key-derivation-functions-kd>
    #[repr(u16)]
    pub enum HpkeKdf {
        HKDF_SHA256 => 0x0001,
        HKDF_SHA384 => 0x0002,
        HKDF_SHA512 => 0x0003,
    }
}

enum_builder! {
    /// The Authenticated Encryption with Associated Data (`Aead`) type for HPKE operations.
    /// Listed by IANA, as specified in [RFC 9180 Section 7.3]
    ///
    /// [RFC 9180 Section 7.3]: <https://datatracker.ietf.org/doc/html/rfc9180#name-authenticated-encryption-wi>
    #[repr(u16)]
    pub enum HpkeAead {
        AES_128_GCM => 0x0001,
        AES_256_GCM => 0x0002,
        CHACHA20_POLY_1305 => 0x0003,
        EXPORT_ONLY => 0xFFFF,
    }
}

impl HpkeAead {
    /// The length of the tag for the AEAD algorithm, or None if the AEAD is EXPORT_ONLY.
    pub fn tag_len(&self) -> Option<usize> {
        match self {
            Self::AES_128_GCM | Self::AES_256_GCM | Self::CHACHA20_POLY_1305 => Some(16),
            _ => None,
        }
    }
}

/// The HPKE symmetric cipher suite: a key derivation function paired with
/// an AEAD algorithm, as carried in an `ECHConfig` and in the ECH extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HpkeSymmetricCipherSuite {
    pub kdf_id: HpkeKdf,
    pub aead_id: HpkeAead,
}

impl Default for HpkeSymmetricCipherSuite {
    fn default() -> Self {
        Self {
            kdf_id: HpkeKdf::HKDF_SHA256,
            aead_id: HpkeAead::AES_128_GCM,
        }
    }
}

impl Codec for HpkeSymmetricCipherSuite {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.kdf_id.encode(bytes);
        self.aead_id.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        Ok(Self {
            kdf_id: HpkeKdf::read(r)?,
            aead_id: HpkeAead::read(r)?,
        })
    }
}

impl TlsListElement for HpkeSymmetricCipherSuite {
    const SIZE_LEN: ListLength = ListLength::U16;
}
