use alloc::vec::Vec;
use core::ops::Deref;

use pki_types::DnsName;

use crate::error::{EncryptedClientHelloError, Error, InvalidMessage};
use crate::log::warn;
use crate::msgs::base::PayloadU16;
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength, Reader, TlsListElement};
use crate::msgs::enums::{EchVersion, HpkeKem, HpkeSymmetricCipherSuite};

/// The smallest `ECHConfigList` encoding we will accept: the version,
/// content length and key share framing must at least be present.
pub(crate) const MIN_CONFIG_LIST_LEN: usize = 10;

/// The largest `ECHConfigList` encoding we will accept.
pub(crate) const MAX_CONFIG_LIST_LEN: usize = 1500;

/// Individual `ECHConfig` extension values must be shorter than this.
const MAX_CONFIG_EXTENSION_LEN: usize = 1500;

const MAX_PUBLIC_NAME_LEN: usize = 255;

/// A single deployed ECH configuration, parsed from an `ECHConfigList`.
///
/// The verbatim on-the-wire encoding of the config is retained by the
/// enclosing [`EchConfigList`]; this struct records only the window into
/// those bytes.  The HPKE `info` input is built from that window, so the
/// raw bytes must outlive the config: that is why an `EchConfig` cannot
/// exist apart from its list.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfig {
    /// The draft version of this config.
    pub version: EchVersion,
    /// Single byte key-selection hint. Zero for draft-09 configs, which
    /// predate it.
    pub config_id: u8,
    /// The KEM the `public_key` belongs to.
    pub kem_id: HpkeKem,
    /// The HPKE public key clients encrypt to.
    pub public_key: PayloadU16,
    /// Acceptable (KDF, AEAD) pairings, in server preference order.
    pub cipher_suites: Vec<HpkeSymmetricCipherSuite>,
    /// Padding hint for the inner hello's SNI.
    pub maximum_name_length: u16,
    /// The cover name carried in the outer hello's SNI.
    pub public_name: DnsName<'static>,
    /// Config extensions. None are defined at these draft versions; we
    /// retain them undigested.
    pub extensions: Vec<EchConfigExtension>,
    /// Byte window of this config within the list encoding, covering the
    /// version and length header through the end of the contents.
    pub(crate) encoding_start: usize,
    pub(crate) encoding_length: usize,
}

/// An extension within an `ECHConfig`: a bare type and an undigested value.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigExtension {
    pub ext_type: u16,
    pub value: PayloadU16,
}

impl Codec for EchConfigExtension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.ext_type.encode(bytes);
        self.value.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let ext_type = u16::read(r)?;
        let len = u16::read(r)? as usize;
        if len >= MAX_CONFIG_EXTENSION_LEN {
            return Err(InvalidMessage::EchConfigExtensionTooLong);
        }
        let mut sub = r.sub(len)?;
        Ok(Self {
            ext_type,
            value: PayloadU16::new(sub.rest().to_vec()),
        })
    }
}

impl TlsListElement for EchConfigExtension {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// An ordered list of [`EchConfig`], plus the verbatim list encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct EchConfigList {
    configs: Vec<EchConfig>,
    encoded: Vec<u8>,
}

impl EchConfigList {
    /// Decode one `ECHConfigList` from the front of `input`.
    ///
    /// Returns the list and the number of bytes consumed.  `input` may be a
    /// catenation of several list encodings; the caller can continue with
    /// the leftover bytes.  Configs of unrecognised versions are skipped
    /// whole; trailing garbage inside the declared length is an error.
    pub fn from_binary(input: &[u8]) -> Result<(Self, usize), Error> {
        let mut r = Reader::init(input);
        let total_length = u16::read(&mut r).map_err(config_err)? as usize;
        if !(MIN_CONFIG_LIST_LEN..MAX_CONFIG_LIST_LEN).contains(&total_length)
            || total_length > r.left()
        {
            return Err(EncryptedClientHelloError::InvalidConfigList.into());
        }

        let consumed = 2 + total_length;
        let mut r = Reader::init(&input[2..consumed]);
        let mut configs = Vec::new();

        while r.any_left() {
            // The window includes the version and length header.
            let encoding_start = 2 + r.used();
            let version = u16::read(&mut r).map_err(config_err)?;
            let content_length = u16::read(&mut r).map_err(config_err)? as usize;
            let mut contents = r.sub(content_length).map_err(config_err)?;
            let encoding_length = content_length + 4;

            let version = match EchVersion::from(version) {
                EchVersion::Unknown(_other) => {
                    // Skip, in case we can handle a sibling config.
                    warn!("skipping ECHConfig with unsupported version {_other:#06x}");
                    continue;
                }
                known => known,
            };

            let mut config = match version {
                EchVersion::V10 => read_v10_contents(&mut contents),
                EchVersion::V9 => read_v9_contents(&mut contents),
                EchVersion::Unknown(_) => unreachable!(),
            }
            .map_err(config_err)?;
            contents
                .expect_empty("EchConfig")
                .map_err(config_err)?;

            config.encoding_start = encoding_start;
            config.encoding_length = encoding_length;
            configs.push(config);
        }

        Ok((
            Self {
                configs,
                encoded: input[..consumed].to_vec(),
            },
            consumed,
        ))
    }

    /// The verbatim encoding of the whole list.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// The verbatim encoding of one enclosed config, from its version
    /// field through the end of its contents.
    ///
    /// `config` must be one of this list's configs.
    pub fn config_encoding(&self, config: &EchConfig) -> &[u8] {
        &self.encoded[config.encoding_start..config.encoding_start + config.encoding_length]
    }

    /// Compute the HPKE `SetupBaseS`/`SetupBaseR` `info` parameter for one
    /// of this list's configs: `"tls ech" || 0x00 ||` the config's raw
    /// encoding.
    pub fn hpke_info(&self, config: &EchConfig) -> Vec<u8> {
        let mut info = Vec::with_capacity(8 + config.encoding_length);
        info.extend_from_slice(b"tls ech\0");
        info.extend_from_slice(self.config_encoding(config));
        info
    }
}

impl Deref for EchConfigList {
    type Target = [EchConfig];

    fn deref(&self) -> &Self::Target {
        &self.configs
    }
}

fn config_err(_: InvalidMessage) -> Error {
    EncryptedClientHelloError::InvalidConfigList.into()
}

/// Draft-10 contents order: config_id, kem, public key, suites, maximum
/// name length, public name, extensions.
fn read_v10_contents(r: &mut Reader<'_>) -> Result<EchConfig, InvalidMessage> {
    let config_id = u8::read(r)?;
    let kem_id = HpkeKem::read(r)?;
    let public_key = PayloadU16::read(r)?;
    let cipher_suites = read_cipher_suites(r)?;
    let maximum_name_length = u16::read(r)?;
    let public_name = read_public_name(r)?;
    let extensions = Vec::read(r)?;

    Ok(EchConfig {
        version: EchVersion::V10,
        config_id,
        kem_id,
        public_key,
        cipher_suites,
        maximum_name_length,
        public_name,
        extensions,
        encoding_start: 0,
        encoding_length: 0,
    })
}

/// Draft-09 contents order differs: public name, public key, kem, suites,
/// maximum name length, extensions.  There is no config_id.
fn read_v9_contents(r: &mut Reader<'_>) -> Result<EchConfig, InvalidMessage> {
    let public_name = read_public_name(r)?;
    let public_key = PayloadU16::read(r)?;
    let kem_id = HpkeKem::read(r)?;
    let cipher_suites = read_cipher_suites(r)?;
    let maximum_name_length = u16::read(r)?;
    let extensions = Vec::read(r)?;

    Ok(EchConfig {
        version: EchVersion::V9,
        config_id: 0,
        kem_id,
        public_key,
        cipher_suites,
        maximum_name_length,
        public_name,
        extensions,
        encoding_start: 0,
        encoding_length: 0,
    })
}

fn read_cipher_suites(r: &mut Reader<'_>) -> Result<Vec<HpkeSymmetricCipherSuite>, InvalidMessage> {
    let len = u16::read(r)? as usize;
    if len == 0 || len % 4 != 0 {
        return Err(InvalidMessage::InvalidEchCipherSuites);
    }
    let mut sub = r.sub(len)?;
    let mut suites = Vec::with_capacity(len / 4);
    while sub.any_left() {
        suites.push(HpkeSymmetricCipherSuite::read(&mut sub)?);
    }
    Ok(suites)
}

fn read_public_name(r: &mut Reader<'_>) -> Result<DnsName<'static>, InvalidMessage> {
    let len = u16::read(r)? as usize;
    if len <= 1 || len > MAX_PUBLIC_NAME_LEN {
        return Err(InvalidMessage::InvalidEchPublicName);
    }
    let mut sub = r.sub(len)?;
    DnsName::try_from(sub.rest())
        .map(|name| name.to_owned())
        .map_err(|_| InvalidMessage::InvalidServerName)
}

/// Everything needed to mint a fresh draft-10 `ECHConfigList` holding one
/// config, for server provisioning and tests.
#[derive(Clone, Debug)]
pub struct EchConfigBuilder {
    pub config_id: u8,
    pub kem_id: HpkeKem,
    pub public_key: Vec<u8>,
    pub cipher_suites: Vec<HpkeSymmetricCipherSuite>,
    pub maximum_name_length: u16,
    pub public_name: DnsName<'static>,
    pub extensions: Vec<EchConfigExtension>,
}

impl EchConfigBuilder {
    /// A config for `public_name` with the given id and key, offering the
    /// mandatory-to-implement HPKE symmetric suite.
    pub fn new(config_id: u8, kem_id: HpkeKem, public_key: Vec<u8>, public_name: DnsName<'static>) -> Self {
        Self {
            config_id,
            kem_id,
            public_key,
            cipher_suites: vec![HpkeSymmetricCipherSuite::default()],
            maximum_name_length: MAX_PUBLIC_NAME_LEN as u16,
            public_name,
            extensions: Vec::new(),
        }
    }

    /// The `ECHConfigList` wire encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(128);
        let list = LengthPrefixedBuffer::new(ListLength::U16, &mut bytes);
        EchVersion::V10.encode(list.buf);
        let contents = LengthPrefixedBuffer::new(ListLength::U16, list.buf);
        self.config_id.encode(contents.buf);
        self.kem_id.encode(contents.buf);
        PayloadU16::encode_slice(&self.public_key, contents.buf);
        self.cipher_suites.encode(contents.buf);
        self.maximum_name_length
            .encode(contents.buf);
        PayloadU16::encode_slice(self.public_name.as_ref().as_bytes(), contents.buf);
        self.extensions.encode(contents.buf);
        drop(contents);
        drop(list);
        bytes
    }

    /// Encode, then decode the result into a list.
    pub fn build(&self) -> Result<EchConfigList, Error> {
        let encoded = self.encode();
        let (list, consumed) = EchConfigList::from_binary(&encoded)?;
        debug_assert_eq!(consumed, encoded.len());
        Ok(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{HpkeAead, HpkeKdf};

    fn example_builder() -> EchConfigBuilder {
        EchConfigBuilder {
            config_id: 0x2a,
            kem_id: HpkeKem::DHKEM_X25519_HKDF_SHA256,
            public_key: vec![0xab; 32],
            cipher_suites: vec![HpkeSymmetricCipherSuite {
                kdf_id: HpkeKdf::HKDF_SHA256,
                aead_id: HpkeAead::AES_128_GCM,
            }],
            maximum_name_length: 64,
            public_name: DnsName::try_from("example.com").unwrap(),
            extensions: Vec::new(),
        }
    }

    #[test]
    fn round_trip_draft_10_config() {
        let encoded = example_builder().encode();
        let (list, consumed) = EchConfigList::from_binary(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(list.len(), 1);

        let config = &list[0];
        assert_eq!(config.version, EchVersion::V10);
        assert_eq!(config.config_id, 0x2a);
        assert_eq!(config.kem_id, HpkeKem::DHKEM_X25519_HKDF_SHA256);
        assert_eq!(config.public_key.0, vec![0xab; 32]);
        assert_eq!(
            config.cipher_suites,
            vec![HpkeSymmetricCipherSuite::default()]
        );
        assert_eq!(config.maximum_name_length, 64);
        assert_eq!(config.public_name.as_ref(), "example.com");
        assert!(config.extensions.is_empty());
    }

    #[test]
    fn raw_window_covers_version_through_contents() {
        let encoded = example_builder().encode();
        let (list, _) = EchConfigList::from_binary(&encoded).unwrap();
        let window = list.config_encoding(&list[0]);
        // The window is everything after the list length prefix.
        assert_eq!(window, &encoded[2..]);
        assert_eq!(&window[..2], &[0xfe, 0x0d]);
    }

    #[test]
    fn hpke_info_has_prefix_and_window() {
        let encoded = example_builder().encode();
        let (list, _) = EchConfigList::from_binary(&encoded).unwrap();
        let info = list.hpke_info(&list[0]);
        assert_eq!(&info[..8], b"tls ech\0");
        assert_eq!(&info[8..], list.config_encoding(&list[0]));
    }

    #[test]
    fn leftover_may_start_another_list() {
        let mut both = example_builder().encode();
        let second = {
            let mut b = example_builder();
            b.config_id = 0x2b;
            b.encode()
        };
        let first_len = both.len();
        both.extend_from_slice(&second);

        let (first, consumed) = EchConfigList::from_binary(&both).unwrap();
        assert_eq!(consumed, first_len);
        assert_eq!(first[0].config_id, 0x2a);

        let (rest, consumed) = EchConfigList::from_binary(&both[consumed..]).unwrap();
        assert_eq!(consumed, second.len());
        assert_eq!(rest[0].config_id, 0x2b);
    }

    #[test]
    fn unknown_version_is_skipped() {
        // Hand-build a list with an unknown-version config followed by a
        // v10 config.
        let inner = example_builder().encode();
        let v10_config = &inner[2..];
        let mut bytes = Vec::new();
        let unknown = [0xfeu8, 0x0a, 0x00, 0x02, 0xaa, 0xbb];
        let total = (unknown.len() + v10_config.len()) as u16;
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.extend_from_slice(&unknown);
        bytes.extend_from_slice(v10_config);

        let (list, _) = EchConfigList::from_binary(&bytes).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].config_id, 0x2a);
        // The skipped config does not disturb the survivor's raw window.
        assert_eq!(list.config_encoding(&list[0]), v10_config);
    }

    #[test]
    fn draft_9_field_order() {
        // public_name first, then key, kem, suites, max name length, exts.
        let mut contents = Vec::new();
        PayloadU16::encode_slice(b"example.com", &mut contents);
        PayloadU16::encode_slice(&[0xcd; 32], &mut contents);
        contents.extend_from_slice(&[0x00, 0x20]); // x25519
        contents.extend_from_slice(&[0x00, 0x04, 0x00, 0x01, 0x00, 0x01]);
        contents.extend_from_slice(&[0x00, 0x40]); // max name len
        contents.extend_from_slice(&[0x00, 0x00]); // no extensions

        let mut bytes = Vec::new();
        let total = (contents.len() + 4) as u16;
        bytes.extend_from_slice(&total.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0x09]);
        bytes.extend_from_slice(&(contents.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&contents);

        let (list, _) = EchConfigList::from_binary(&bytes).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].version, EchVersion::V9);
        assert_eq!(list[0].config_id, 0);
        assert_eq!(list[0].kem_id, HpkeKem::DHKEM_X25519_HKDF_SHA256);
        assert_eq!(list[0].public_name.as_ref(), "example.com");
    }

    #[test]
    fn empty_suites_rejected() {
        let mut b = example_builder();
        b.cipher_suites = Vec::new();
        let encoded = b.encode();
        assert!(EchConfigList::from_binary(&encoded).is_err());
    }

    #[test]
    fn one_byte_public_name_rejected() {
        let mut contents = Vec::new();
        contents.push(0x07); // config id
        contents.extend_from_slice(&[0x00, 0x20]);
        PayloadU16::encode_slice(&[0xab; 32], &mut contents);
        contents.extend_from_slice(&[0x00, 0x04, 0x00, 0x01, 0x00, 0x01]);
        contents.extend_from_slice(&[0x00, 0x40]);
        PayloadU16::encode_slice(b"x", &mut contents);
        contents.extend_from_slice(&[0x00, 0x00]);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&((contents.len() + 4) as u16).to_be_bytes());
        bytes.extend_from_slice(&[0xfe, 0x0d]);
        bytes.extend_from_slice(&(contents.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&contents);

        assert!(EchConfigList::from_binary(&bytes).is_err());
    }

    #[test]
    fn declared_length_bounds() {
        // Too short to hold anything.
        assert!(EchConfigList::from_binary(&[0x00, 0x04, 1, 2, 3, 4]).is_err());
        // Declared length exceeding the input.
        assert!(EchConfigList::from_binary(&[0x00, 0x40, 0xfe, 0x0d]).is_err());
    }

    #[test]
    fn config_with_extensions_round_trips() {
        let mut b = example_builder();
        b.extensions = vec![
            EchConfigExtension {
                ext_type: 0x4242,
                value: PayloadU16::new(vec![1, 2, 3]),
            },
            EchConfigExtension {
                ext_type: 0x4343,
                value: PayloadU16::empty(),
            },
        ];
        let list = b.build().unwrap();
        assert_eq!(list[0].extensions.len(), 2);
        assert_eq!(list[0].extensions[1].value, PayloadU16::empty());
    }
}
