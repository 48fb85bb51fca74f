use alloc::vec::Vec;

use pki_types::DnsName;

use crate::crypto::SecureRandom;
use crate::error::{Error, InvalidMessage};
use crate::msgs::base::{Payload, PayloadU16};
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength, Reader, TlsListElement, u24};
use crate::msgs::enums::{
    CipherSuite, Compression, ExtensionType, HandshakeType, ProtocolVersion,
};

/// Random material in ClientHello and ServerHello.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Random(pub [u8; 32]);

impl Random {
    pub fn new(secure_random: &dyn SecureRandom) -> Result<Self, Error> {
        let mut bytes = [0u8; 32];
        secure_random.fill(&mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Random {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Codec for Random {
    fn encode(&self, bytes: &mut Vec<u8>) {
        bytes.extend_from_slice(&self.0);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let Some(bytes) = r.take(32) else {
            return Err(InvalidMessage::MissingData("Random"));
        };
        let mut opaque = [0u8; 32];
        opaque.clone_from_slice(bytes);
        Ok(Self(opaque))
    }
}

/// A TLS legacy_session_id value: up to 32 opaque bytes.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct SessionId {
    len: usize,
    data: [u8; 32],
}

impl SessionId {
    pub fn empty() -> Self {
        Self {
            len: 0,
            data: [0u8; 32],
        }
    }

    pub fn random(secure_random: &dyn SecureRandom) -> Result<Self, Error> {
        let mut data = [0u8; 32];
        secure_random.fill(&mut data)?;
        Ok(Self { len: 32, data })
    }

    pub fn as_ref(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::empty()
    }
}

impl TryFrom<&[u8]> for SessionId {
    type Error = InvalidMessage;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() > 32 {
            return Err(InvalidMessage::TrailingData("SessionId"));
        }
        let mut data = [0u8; 32];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            len: bytes.len(),
            data,
        })
    }
}

impl Codec for SessionId {
    fn encode(&self, bytes: &mut Vec<u8>) {
        debug_assert!(self.len <= 32);
        bytes.push(self.len as u8);
        bytes.extend_from_slice(self.as_ref());
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let len = u8::read(r)? as usize;
        if len > 32 {
            return Err(InvalidMessage::TrailingData("SessionId"));
        }
        let Some(bytes) = r.take(len) else {
            return Err(InvalidMessage::MissingData("SessionId"));
        };
        let mut out = [0u8; 32];
        out[..len].clone_from_slice(&bytes[..len]);
        Ok(Self { data: out, len })
    }
}

impl core::fmt::Debug for SessionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        crate::msgs::base::hex(f, self.as_ref())
    }
}

/// A ClientHello extension, with its value left undigested.
///
/// The ECH engine treats every extension uniformly: only types matter for
/// compression and splicing, values are moved around verbatim.
#[derive(Clone, Debug, PartialEq)]
pub struct Extension {
    pub typ: ExtensionType,
    pub payload: Payload,
}

impl Extension {
    /// A `server_name` extension carrying one DNS hostname.
    pub fn sni(name: &DnsName<'_>) -> Self {
        let mut body = Vec::new();
        let list = LengthPrefixedBuffer::new(ListLength::U16, &mut body);
        0u8.encode(list.buf); // NameType: host_name
        PayloadU16::encode_slice(name.as_ref().as_bytes(), list.buf);
        drop(list);
        Self {
            typ: ExtensionType::ServerName,
            payload: Payload::new(body),
        }
    }

    /// An ALPN extension from a pre-encoded protocol list (a catenation of
    /// u8-length-prefixed protocol names).
    pub fn alpn(protocol_list: &[u8]) -> Self {
        let mut body = Vec::with_capacity(2 + protocol_list.len());
        PayloadU16::encode_slice(protocol_list, &mut body);
        Self {
            typ: ExtensionType::ALProtocolNegotiation,
            payload: Payload::new(body),
        }
    }

    /// The hostname in a `server_name` extension value, if well-formed.
    pub fn sni_value(&self) -> Option<DnsName<'static>> {
        let mut r = Reader::init(&self.payload.0);
        let list_len = u16::read(&mut r).ok()?;
        let mut list = r.sub(list_len as usize).ok()?;
        while list.any_left() {
            let name_type = u8::read(&mut list).ok()?;
            let name = PayloadU16::read(&mut list).ok()?;
            if name_type == 0 {
                return DnsName::try_from(name.0.as_slice())
                    .map(|n| n.to_owned())
                    .ok();
            }
        }
        None
    }
}

impl Codec for Extension {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.typ.encode(bytes);
        let nested = LengthPrefixedBuffer::new(ListLength::U16, bytes);
        self.payload.encode(nested.buf);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let typ = ExtensionType::read(r)?;
        let len = u16::read(r)? as usize;
        let mut sub = r.sub(len)?;
        Ok(Self {
            typ,
            payload: Payload::read(&mut sub)?,
        })
    }
}

impl TlsListElement for Extension {
    const SIZE_LEN: ListLength = ListLength::U16;
}

/// An in-memory ClientHello, as assembled by the normal client path.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientHelloPayload {
    pub client_version: ProtocolVersion,
    pub random: Random,
    pub session_id: SessionId,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<Compression>,
    pub extensions: Vec<Extension>,
}

impl Codec for ClientHelloPayload {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.client_version.encode(bytes);
        self.random.encode(bytes);
        self.session_id.encode(bytes);
        self.cipher_suites.encode(bytes);
        self.compression_methods.encode(bytes);
        self.extensions.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let ret = Self {
            client_version: ProtocolVersion::read(r)?,
            random: Random::read(r)?,
            session_id: SessionId::read(r)?,
            cipher_suites: Vec::read(r)?,
            compression_methods: Vec::read(r)?,
            extensions: Vec::read(r)?,
        };
        r.expect_empty("ClientHelloPayload")
            .map(|_| ret)
    }
}

impl ClientHelloPayload {
    pub fn find_extension(&self, typ: ExtensionType) -> Option<&Extension> {
        self.extensions
            .iter()
            .find(|ext| ext.typ == typ)
    }

    /// The `server_name` hostname, if one is present and well-formed.
    pub fn sni(&self) -> Option<DnsName<'static>> {
        self.find_extension(ExtensionType::ServerName)?
            .sni_value()
    }

    /// Encode as a full handshake message: type octet, u24 length, body.
    pub fn to_message(&self) -> Vec<u8> {
        handshake_message(HandshakeType::ClientHello, &self.get_encoding())
    }
}

/// Wrap a handshake body with its one-octet type and three-octet length.
pub fn handshake_message(typ: HandshakeType, body: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + body.len());
    typ.encode(&mut bytes);
    u24(body.len() as u32).encode(&mut bytes);
    bytes.extend_from_slice(body);
    bytes
}

/// Field offsets within a raw ClientHello body, found without a full parse.
///
/// Offsets point at the start of the element named (for extensions, at the
/// extension's type field).  `extensions` is the offset of the block's
/// length field.
#[derive(Clone, Copy, Debug, Default)]
pub struct HelloOffsets {
    pub session_id: usize,
    pub extensions: Option<usize>,
    pub ech: Option<usize>,
    pub sni: Option<usize>,
}

/// Scan a raw ClientHello body (legacy_version through end of extensions)
/// for the offsets the ECH engine needs, without digesting any values.
pub fn scan_hello_body(body: &[u8]) -> Result<HelloOffsets, InvalidMessage> {
    let mut r = Reader::init(body);
    if r.take(2 + 32).is_none() {
        return Err(InvalidMessage::MessageTooShort);
    }

    let mut offsets = HelloOffsets {
        session_id: r.used(),
        ..Default::default()
    };
    let sess_len = u8::read(&mut r)? as usize;
    if sess_len > 32 || r.take(sess_len).is_none() {
        return Err(InvalidMessage::MissingData("SessionId"));
    }

    let suites_len = u16::read(&mut r)? as usize;
    if r.take(suites_len).is_none() {
        return Err(InvalidMessage::MissingData("cipher suites"));
    }
    let compressions_len = u8::read(&mut r)? as usize;
    if r.take(compressions_len).is_none() {
        return Err(InvalidMessage::MissingData("compression methods"));
    }

    if !r.any_left() {
        // No extensions at all, which is theoretically ok.
        return Ok(offsets);
    }

    offsets.extensions = Some(r.used());
    let exts_len = u16::read(&mut r)? as usize;
    let base = r.used();
    let mut sub = r.sub(exts_len)?;
    while sub.any_left() {
        let off = base + sub.used();
        let typ = ExtensionType::read(&mut sub)?;
        let len = u16::read(&mut sub)? as usize;
        sub.sub(len)?;
        match typ {
            ExtensionType::EncryptedClientHello => offsets.ech = Some(off),
            ExtensionType::ServerName => offsets.sni = Some(off),
            _ => {}
        }
    }
    r.expect_empty("ClientHelloPayload")?;

    Ok(offsets)
}

/// One extension pulled out of a raw extensions block.
pub(crate) struct RawExtension<'a> {
    pub(crate) typ: ExtensionType,
    /// The whole extension: type, length and value.
    pub(crate) wire: &'a [u8],
}

/// Split the contents of an extensions block (after its length field) into
/// individual extensions, values undigested.
pub(crate) fn parse_raw_extensions(block: &[u8]) -> Result<Vec<RawExtension<'_>>, InvalidMessage> {
    let mut r = Reader::init(block);
    let mut out = Vec::new();
    while r.any_left() {
        let start = r.used();
        let typ = ExtensionType::read(&mut r)?;
        let len = u16::read(&mut r)? as usize;
        r.sub(len)?;
        out.push(RawExtension {
            typ,
            wire: &block[start..start + 4 + len],
        });
    }
    Ok(out)
}

/// Copy `body`, with the ECH extension removed and the extensions length
/// rewritten to match.  This is the outer ClientHello as covered by the
/// HPKE AAD.
pub(crate) fn body_without_ech(
    body: &[u8],
    offsets: &HelloOffsets,
) -> Result<Vec<u8>, InvalidMessage> {
    let (exts, ech) = match (offsets.extensions, offsets.ech) {
        (Some(exts), Some(ech)) => (exts, ech),
        _ => return Err(InvalidMessage::MissingData("ech extension")),
    };

    let ech_value_len =
        u16::from_be_bytes([body[ech + 2], body[ech + 3]]) as usize;
    let ech_total = 4 + ech_value_len;
    let old_exts_len = u16::from_be_bytes([body[exts], body[exts + 1]]) as usize;
    let new_exts_len = old_exts_len
        .checked_sub(ech_total)
        .ok_or(InvalidMessage::MessageTooShort)?;

    let mut out = Vec::with_capacity(body.len() - ech_total);
    out.extend_from_slice(&body[..exts]);
    out.extend_from_slice(&(new_exts_len as u16).to_be_bytes());
    out.extend_from_slice(&body[exts + 2..ech]);
    out.extend_from_slice(&body[ech + ech_total..]);
    Ok(out)
}

/// Append one encoded extension to a raw ClientHello body, rewriting the
/// extensions-length field to include it.
pub(crate) fn append_extension(
    body: &mut Vec<u8>,
    offsets: &HelloOffsets,
    ext: &[u8],
) -> Result<(), InvalidMessage> {
    let exts = offsets
        .extensions
        .ok_or(InvalidMessage::MissingData("extensions"))?;
    let old_len = u16::from_be_bytes([body[exts], body[exts + 1]]) as usize;
    let new_len = old_len + ext.len();
    if new_len > 0xffff {
        return Err(InvalidMessage::MessageTooLarge);
    }
    crate::msgs::codec::put_u16(new_len as u16, &mut body[exts..]);
    body.extend_from_slice(ext);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_hello() -> ClientHelloPayload {
        ClientHelloPayload {
            client_version: ProtocolVersion::TLSv1_2,
            random: Random::from([0x11; 32]),
            session_id: SessionId::try_from(&[0x22; 32][..]).unwrap(),
            cipher_suites: vec![
                CipherSuite::TLS13_AES_128_GCM_SHA256,
                CipherSuite::TLS13_AES_256_GCM_SHA384,
            ],
            compression_methods: vec![Compression::Null],
            extensions: vec![
                Extension::sni(&DnsName::try_from("inner.example.com").unwrap()),
                Extension {
                    typ: ExtensionType::EllipticCurves,
                    payload: Payload::new(vec![0x00, 0x02, 0x00, 0x1d]),
                },
                Extension {
                    typ: ExtensionType::KeyShare,
                    payload: Payload::new(vec![0x00, 0x00]),
                },
            ],
        }
    }

    #[test]
    fn hello_round_trip() {
        let hello = sample_hello();
        let enc = hello.get_encoding();
        assert_eq!(ClientHelloPayload::read_bytes(&enc).unwrap(), hello);
    }

    #[test]
    fn message_has_handshake_header() {
        let hello = sample_hello();
        let msg = hello.to_message();
        assert_eq!(msg[0], 0x01);
        let len = u32::from_be_bytes([0, msg[1], msg[2], msg[3]]) as usize;
        assert_eq!(len, msg.len() - 4);
    }

    #[test]
    fn sni_codec() {
        let name = DnsName::try_from("example.com").unwrap();
        let ext = Extension::sni(&name);
        assert_eq!(ext.sni_value().unwrap().as_ref(), "example.com");
        assert_eq!(sample_hello().sni().unwrap().as_ref(), "inner.example.com");
    }

    #[test]
    fn scan_finds_offsets() {
        let mut hello = sample_hello();
        hello.extensions.push(Extension {
            typ: ExtensionType::EncryptedClientHello,
            payload: Payload::new(vec![0xaa; 8]),
        });
        let body = hello.get_encoding();
        let offsets = scan_hello_body(&body).unwrap();

        assert_eq!(offsets.session_id, 34);
        let exts = offsets.extensions.unwrap();
        // The extension block length must cover exactly the rest of the body.
        let block_len = u16::from_be_bytes([body[exts], body[exts + 1]]) as usize;
        assert_eq!(exts + 2 + block_len, body.len());
        // SNI was the first extension.
        assert_eq!(offsets.sni, Some(exts + 2));
        // ECH was appended last.
        let ech = offsets.ech.unwrap();
        assert_eq!(&body[ech..ech + 4], &[0xfe, 0x0a, 0x00, 0x08]);
    }

    #[test]
    fn scan_rejects_truncation() {
        let body = sample_hello().get_encoding();
        assert!(scan_hello_body(&body[..20]).is_err());
        assert!(scan_hello_body(&body[..body.len() - 1]).is_err());
    }

    #[test]
    fn remove_then_append_is_identity() {
        let mut hello = sample_hello();
        hello.extensions.push(Extension {
            typ: ExtensionType::EncryptedClientHello,
            payload: Payload::new(vec![0xaa; 8]),
        });
        let body = hello.get_encoding();
        let offsets = scan_hello_body(&body).unwrap();

        let stripped = body_without_ech(&body, &offsets).unwrap();
        assert!(scan_hello_body(&stripped)
            .unwrap()
            .ech
            .is_none());

        let ech_off = offsets.ech.unwrap();
        let mut rebuilt = stripped.clone();
        let stripped_offsets = scan_hello_body(&stripped).unwrap();
        append_extension(&mut rebuilt, &stripped_offsets, &body[ech_off..]).unwrap();
        assert_eq!(rebuilt, body);
    }

    #[test]
    fn raw_extension_walk() {
        let hello = sample_hello();
        let body = hello.get_encoding();
        let offsets = scan_hello_body(&body).unwrap();
        let exts = offsets.extensions.unwrap();
        let raw = parse_raw_extensions(&body[exts + 2..]).unwrap();
        assert_eq!(raw.len(), 3);
        assert_eq!(raw[1].typ, ExtensionType::EllipticCurves);
        assert_eq!(&raw[1].wire[..4], &[0x00, 0x0a, 0x00, 0x04]);
    }
}
