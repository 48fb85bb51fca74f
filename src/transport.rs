//! Transport encodings for retrieved `ECHConfigList` values.
//!
//! DNS tooling hands over ECH configs in several shapes: raw binary,
//! ascii-hex, base64, or an HTTPS/SVCB resource record (wire RData or
//! presentation form with an `ech=` parameter).  This module classifies
//! and decodes them all down to binary, then hands off to
//! [`EchConfigList::from_binary`].

use alloc::vec::Vec;

use crate::error::{EncryptedClientHelloError, Error};
use crate::log::trace;
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::config::EchConfigList;

/// Upper bound on any retrieved RR value we will look at.
const MAX_RRVALUE_LEN: usize = 16 * 1024;

/// The SvcParamKey carrying an `ECHConfigList` in SVCB/HTTPS RRs.
const SVCB_ECH_PARAM: u16 = 0x0005;

/// The telltale marking a presentation-form HTTPS/SVCB record.
const HTTPSSVC_TELLTALE: &[u8] = b"ech=";

/// ascii-hex is easy: either case allowed, plus a semi-colon separator.
const ASCIIHEX_ALPHABET: &[u8] = b"0123456789ABCDEFabcdef;";

/// base64 plus a semi-colon: we accept multiple semi-colon separated values.
const BASE64_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/=;";

/// The transport encodings an `ECHConfigList` may arrive in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EchFormat {
    /// Raw `ECHConfigList` bytes.
    Binary,
    /// ascii-hex encoded, possibly several `;`-separated values.
    AsciiHex,
    /// base64 encoded, possibly several `;`-separated values.
    Base64,
    /// HTTPS/SVCB presentation form containing an `ech=` SvcParam.
    HttpsSvcb,
}

/// Classify `input` by its telltales, most restrictive first.
///
/// The wrong answer can be produced with low probability; callers that
/// cannot tolerate that should pin the format instead of guessing.
pub fn guess_format(input: &[u8]) -> EchFormat {
    if input
        .windows(HTTPSSVC_TELLTALE.len())
        .any(|w| w == HTTPSSVC_TELLTALE)
    {
        EchFormat::HttpsSvcb
    } else if input
        .iter()
        .all(|b| ASCIIHEX_ALPHABET.contains(b))
    {
        EchFormat::AsciiHex
    } else if input
        .iter()
        .all(|b| BASE64_ALPHABET.contains(b))
    {
        EchFormat::Base64
    } else {
        EchFormat::Binary
    }
}

/// Decode a retrieved value into its `ECHConfigList`s.
///
/// `format` pins the transport encoding; `None` guesses it.  The decoded
/// binary may be a catenation of several list encodings, each of which
/// becomes one element of the result.
pub fn read_config_lists(
    input: &[u8],
    format: Option<EchFormat>,
) -> Result<Vec<EchConfigList>, Error> {
    if input.is_empty() || input.len() >= MAX_RRVALUE_LEN {
        return Err(EncryptedClientHelloError::InvalidConfigList.into());
    }

    let format = format.unwrap_or_else(|| guess_format(input));
    trace!("decoding ECH configs as {format:?}");
    let binary = match format {
        EchFormat::Binary => input.to_vec(),
        EchFormat::AsciiHex => decode_fragments(input, decode_hex)?,
        EchFormat::Base64 => decode_fragments(input, decode_base64)?,
        EchFormat::HttpsSvcb => decode_presentation_ech(input)?,
    };

    lists_from_binary(&binary)
}

/// Walk an SVCB/HTTPS RR's wire RData for its `ech` SvcParam and decode it.
///
/// `format` pins how the RData bytes themselves are encoded (binary,
/// ascii-hex or base64); `None` guesses.  An RData without an `ech`
/// parameter is not an error: the result is simply empty.
pub fn read_svcb_config_lists(
    rdata: &[u8],
    format: Option<EchFormat>,
) -> Result<Vec<EchConfigList>, Error> {
    if rdata.is_empty() || rdata.len() >= MAX_RRVALUE_LEN {
        return Err(EncryptedClientHelloError::InvalidConfigList.into());
    }

    let format = format.unwrap_or_else(|| guess_format(rdata));
    let binary = match format {
        EchFormat::Binary => rdata.to_vec(),
        EchFormat::AsciiHex => decode_fragments(rdata, decode_hex)?,
        EchFormat::Base64 => decode_fragments(rdata, decode_base64)?,
        // Presentation form carries the configs directly in its `ech=`
        // parameter; there is no binary RData to walk.
        EchFormat::HttpsSvcb => return read_config_lists(rdata, Some(EchFormat::HttpsSvcb)),
    };

    let mut r = Reader::init(&binary);
    // Two-octet SvcPriority, then the TargetName.
    if r.take(2).is_none() {
        return Err(EncryptedClientHelloError::InvalidConfigList.into());
    }
    skip_rdata_name(&mut r)?;

    while r.left() >= 4 {
        let key = u16::read(&mut r).map_err(invalid)?;
        let len = u16::read(&mut r).map_err(invalid)? as usize;
        let mut value = r.sub(len).map_err(invalid)?;
        if key == SVCB_ECH_PARAM {
            return lists_from_binary(value.rest());
        }
    }

    trace!("SVCB RData carried no ech parameter");
    Ok(Vec::new())
}

fn lists_from_binary(mut binary: &[u8]) -> Result<Vec<EchConfigList>, Error> {
    let mut lists = Vec::new();
    while !binary.is_empty() {
        let (list, consumed) = EchConfigList::from_binary(binary)?;
        lists.push(list);
        binary = &binary[consumed..];
    }

    if lists.is_empty() {
        return Err(EncryptedClientHelloError::InvalidConfigList.into());
    }
    Ok(lists)
}

/// Decode `;`-separated fragments independently and concatenate the
/// binary results.
fn decode_fragments(
    input: &[u8],
    decode: fn(&[u8]) -> Result<Vec<u8>, Error>,
) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    for fragment in input.split(|&b| b == b';') {
        if fragment.is_empty() {
            continue;
        }
        out.extend_from_slice(&decode(fragment)?);
    }
    Ok(out)
}

fn decode_base64(fragment: &[u8]) -> Result<Vec<u8>, Error> {
    let text = core::str::from_utf8(fragment).map_err(|_| invalid_unit())?;
    base64::decode(text).map_err(|_| invalid_unit())
}

fn decode_hex(fragment: &[u8]) -> Result<Vec<u8>, Error> {
    if fragment.len() % 2 != 0 {
        return Err(invalid_unit());
    }
    fragment
        .chunks(2)
        .map(|pair| {
            let hi = hex_nibble(pair[0])?;
            let lo = hex_nibble(pair[1])?;
            Ok(hi << 4 | lo)
        })
        .collect()
}

fn hex_nibble(b: u8) -> Result<u8, Error> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(invalid_unit()),
    }
}

/// Pull the base64 value following the `ech=` telltale out of a
/// presentation-form HTTPS/SVCB record.
fn decode_presentation_ech(input: &[u8]) -> Result<Vec<u8>, Error> {
    let start = input
        .windows(HTTPSSVC_TELLTALE.len())
        .position(|w| w == HTTPSSVC_TELLTALE)
        .ok_or_else(invalid_unit)?
        + HTTPSSVC_TELLTALE.len();

    let value = &input[start..];
    let end = value
        .iter()
        .position(|b| !BASE64_ALPHABET.contains(b) || *b == b';')
        .unwrap_or(value.len());
    if end == 0 {
        return Err(invalid_unit());
    }
    decode_base64(&value[..end])
}

/// Skip a DNS-encoded name as defined in RFC 1035 section 3.1.
fn skip_rdata_name(r: &mut Reader<'_>) -> Result<(), Error> {
    loop {
        let len = u8::read(r).map_err(invalid)? as usize;
        if len == 0 {
            return Ok(());
        }
        if r.take(len).is_none() {
            return Err(invalid_unit());
        }
    }
}

fn invalid(_: crate::error::InvalidMessage) -> Error {
    invalid_unit()
}

fn invalid_unit() -> Error {
    EncryptedClientHelloError::InvalidConfigList.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::config::EchConfigBuilder;
    use crate::msgs::enums::HpkeKem;
    use pki_types::DnsName;

    fn sample_list_bytes() -> Vec<u8> {
        EchConfigBuilder::new(
            0x2a,
            HpkeKem::DHKEM_X25519_HKDF_SHA256,
            vec![0xab; 32],
            DnsName::try_from("example.com").unwrap(),
        )
        .encode()
    }

    #[test]
    fn guessing_prefers_most_restrictive() {
        assert_eq!(guess_format(b"3082aaff;00"), EchFormat::AsciiHex);
        assert_eq!(guess_format(b"AEP/CQBB=="), EchFormat::Base64);
        assert_eq!(guess_format(b"ech=AEP/CQBB"), EchFormat::HttpsSvcb);
        assert_eq!(guess_format(&[0x00, 0x43, 0xfe, 0x0d, 0x00]), EchFormat::Binary);
        // All-hex content is classified hex even though it is also
        // valid base64.
        assert_eq!(guess_format(b"abcdef"), EchFormat::AsciiHex);
    }

    #[test]
    fn binary_decodes() {
        let lists = read_config_lists(&sample_list_bytes(), None).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0][0].config_id, 0x2a);
    }

    #[test]
    fn base64_decodes() {
        let b64 = base64::encode(sample_list_bytes());
        let lists = read_config_lists(b64.as_bytes(), None).unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn ascii_hex_decodes() {
        let hex: String = sample_list_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let lists = read_config_lists(hex.as_bytes(), None).unwrap();
        assert_eq!(lists.len(), 1);
    }

    #[test]
    fn semi_colon_separated_values_concatenate() {
        let one = base64::encode(sample_list_bytes());
        let both = format!("{one};{one}");
        let lists = read_config_lists(both.as_bytes(), None).unwrap();
        assert_eq!(lists.len(), 2);
    }

    #[test]
    fn presentation_form_ech_param() {
        let b64 = base64::encode(sample_list_bytes());
        let rr = format!("1 . alpn=h2 ech={b64} ipv4hint=192.0.2.1");
        let lists = read_config_lists(rr.as_bytes(), None).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0][0].config_id, 0x2a);
    }

    fn svcb_rdata(params: &[(u16, &[u8])]) -> Vec<u8> {
        let mut rdata = vec![0x00, 0x01]; // SvcPriority
        rdata.extend_from_slice(&[0x03, b'f', b'o', b'o', 0x00]); // TargetName foo.
        for (key, value) in params {
            rdata.extend_from_slice(&key.to_be_bytes());
            rdata.extend_from_slice(&(value.len() as u16).to_be_bytes());
            rdata.extend_from_slice(value);
        }
        rdata
    }

    #[test]
    fn svcb_rdata_with_ech() {
        let config = sample_list_bytes();
        let rdata = svcb_rdata(&[(0x0001, &[0x02, b'h', b'2']), (0x0005, &config)]);
        let lists = read_svcb_config_lists(&rdata, Some(EchFormat::Binary)).unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].encoded(), &config[..]);
    }

    #[test]
    fn svcb_rdata_without_ech_is_empty_success() {
        let rdata = svcb_rdata(&[(0x0001, &[0x02, b'h', b'2'])]);
        let lists = read_svcb_config_lists(&rdata, Some(EchFormat::Binary)).unwrap();
        assert!(lists.is_empty());
    }

    #[test]
    fn trailing_garbage_after_list_fails() {
        let mut bytes = sample_list_bytes();
        bytes.push(0xff);
        assert!(read_config_lists(&bytes, None).is_err());
    }

    #[test]
    fn empty_input_rejected() {
        assert!(read_config_lists(b"", None).is_err());
    }
}
