//! Server-side ECH: finding and decrypting the offer in a received outer
//! ClientHello, reconstructing the inner hello, and signalling acceptance.

use alloc::vec::Vec;

use crate::confirm::{install_confirmation, ConfirmationSuite};
use crate::crypto::hpke::EncapsulatedSecret;
use crate::crypto::rust_hpke::suite_for;
use crate::error::{Error, InvalidMessage};
use crate::log::{debug, trace};
use crate::msgs::base::PayloadU24;
use crate::msgs::client_hello::{
    body_without_ech, handshake_message, parse_raw_extensions, scan_hello_body,
    ClientHelloPayload, Extension, HelloOffsets, SessionId,
};
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::ech::{ClientHelloOuterAad, EncryptedClientHelloOuter};
use crate::msgs::enums::{ExtensionType, HandshakeType};
use crate::session::EchSession;
use crate::store::EchKeyStore;

mod split;

pub use split::{raw_decrypt, RawDecrypt};

/// What the server decoder made of a received outer ClientHello.
pub enum ServerEchOutcome {
    /// No ECH extension was present; the session was left untouched.
    NotPresent,
    /// An ECH extension was present but no stored key opened it.  The
    /// handshake must continue normally to the outer name; this is
    /// deliberately indistinguishable from a client that sent GREASE.
    Grease,
    /// The inner hello was recovered.
    Accepted(AcceptedEch),
}

/// A successfully decrypted and reconstructed inner ClientHello.
pub struct AcceptedEch {
    /// The inner hello as a complete handshake message, ready for the
    /// transcript and the normal ClientHello processing path.
    pub inner_message: Vec<u8>,
    /// The same hello, parsed.
    pub inner_hello: ClientHelloPayload,
}

/// Scan `outer_body` for an ECH offer and try to decrypt it with the
/// stored keys.
///
/// The first key whose `config_id` matches the offer is tried first; the
/// remaining keys are tried only when `trial_decrypt` is set.  Decryption
/// failures are never surfaced as errors, only as
/// [`ServerEchOutcome::Grease`]: alerting on them would hand an attacker a
/// decryption oracle.  Structural errors in the hello or the extension are
/// real errors and warrant a `decode_error` alert.
pub fn decrypt_client_hello(
    store: &EchKeyStore,
    trial_decrypt: bool,
    outer_body: &[u8],
    session: &mut EchSession,
) -> Result<ServerEchOutcome, Error> {
    let offsets = scan_hello_body(outer_body)?;
    let Some(ech_offset) = offsets.ech else {
        trace!("no ECH extension in ClientHello");
        return Ok(ServerEchOutcome::NotPresent);
    };

    session.attempted = true;

    // The outer session id is needed later to reconstruct the inner hello.
    let sess_len = outer_body[offsets.session_id] as usize;
    let sess_start = offsets.session_id + 1;
    session.session_id = SessionId::try_from(&outer_body[sess_start..sess_start + sess_len])?;

    if let Some(sni_offset) = offsets.sni {
        let ext = Extension::read(&mut Reader::init(&outer_body[sni_offset..]))?;
        session.outer_name = Some(
            ext.sni_value()
                .ok_or(InvalidMessage::InvalidServerName)?,
        );
    }

    let ech_ext = read_ech_extension(outer_body, ech_offset)?;

    let aad = ClientHelloOuterAad {
        cipher_suite: ech_ext.cipher_suite,
        config_id: ech_ext.config_id,
        enc: ech_ext.enc.clone(),
        outer_hello: PayloadU24::new(body_without_ech(outer_body, &offsets)?),
    }
    .get_encoding();

    let enc = EncapsulatedSecret(ech_ext.enc.0.clone());
    let mut encoded_inner = None;
    for key in store.candidates(ech_ext.config_id, trial_decrypt) {
        let config = key.config();
        if !config
            .cipher_suites
            .contains(&ech_ext.cipher_suite)
        {
            continue;
        }
        let Some(hpke) = suite_for(config.kem_id, ech_ext.cipher_suite) else {
            continue;
        };

        let info = key.config_list().hpke_info(config);
        let opened = hpke
            .setup_opener(&enc, &info, key.private_key())
            .and_then(|mut opener| opener.open(&aad, &ech_ext.payload.0));
        match opened {
            Ok(plaintext) => {
                encoded_inner = Some(plaintext);
                break;
            }
            Err(_) => {
                trace!(
                    "ECH decrypt failed with key for config id {}",
                    config.config_id
                );
            }
        }
    }

    session.done = true;
    let Some(encoded_inner) = encoded_inner else {
        debug!("no stored key opened the ECH offer; continuing to the outer name");
        session.grease = true;
        return Ok(ServerEchOutcome::Grease);
    };

    let session_id = session.session_id;
    let (inner_message, outer_only) =
        decode_inner(&encoded_inner, &session_id, outer_body, &offsets)?;
    let inner_hello = ClientHelloPayload::read_bytes(&inner_message[4..])?;

    session.inner_name = inner_hello.sni();
    session.encoded_inner_ch = Some(encoded_inner);
    session.inner_ch = Some(inner_message.clone());
    session.outer_only = outer_only;
    session.success = true;
    session.grease = false;

    debug!("ECH decrypted; inner hello reconstructed");
    Ok(ServerEchOutcome::Accepted(AcceptedEch {
        inner_message,
        inner_hello,
    }))
}

/// Compute the accept confirmation over the inner hello and the
/// ServerHello being emitted, and write it into the last eight bytes of
/// the ServerHello's random.
pub fn install_accept_confirmation(
    suite: &ConfirmationSuite,
    handshake_secret: &[u8],
    inner_hello_message: &[u8],
    server_hello_message: &mut [u8],
) -> Result<(), Error> {
    let confirmation =
        suite.accept_confirmation(handshake_secret, inner_hello_message, server_hello_message)?;
    install_confirmation(server_hello_message, &confirmation);
    Ok(())
}

fn read_ech_extension(
    outer_body: &[u8],
    ech_offset: usize,
) -> Result<EncryptedClientHelloOuter, Error> {
    let value_len =
        u16::from_be_bytes([outer_body[ech_offset + 2], outer_body[ech_offset + 3]]) as usize;
    let value = &outer_body[ech_offset + 4..ech_offset + 4 + value_len];
    let mut r = Reader::init(value);
    let ext = EncryptedClientHelloOuter::read(&mut r)?;
    r.expect_empty("EncryptedClientHelloOuter")?;
    Ok(ext)
}

/// Reverse the inner hello encoding: splice the outer session id back in,
/// resolve the `outer_extensions` record against the outer hello, fix the
/// lengths, and re-prepend the handshake header.
fn decode_inner(
    encoded_inner: &[u8],
    session_id: &SessionId,
    outer_body: &[u8],
    outer_offsets: &HelloOffsets,
) -> Result<(Vec<u8>, Vec<ExtensionType>), Error> {
    // version (2) + random (32) + empty session id (1)
    if encoded_inner.len() < 35 {
        return Err(InvalidMessage::MessageTooShort.into());
    }
    if encoded_inner[34] != 0 {
        // The encoded inner's session id must be zero length.
        return Err(InvalidMessage::UnexpectedMessage("EncodedClientHelloInner").into());
    }

    let mut spliced =
        Vec::with_capacity(encoded_inner.len() + session_id.as_ref().len());
    spliced.extend_from_slice(&encoded_inner[..34]);
    session_id.encode(&mut spliced);
    spliced.extend_from_slice(&encoded_inner[35..]);

    let offsets = scan_hello_body(&spliced)?;
    let Some(exts_offset) = offsets.extensions else {
        return Ok((
            handshake_message(HandshakeType::ClientHello, &spliced),
            Vec::new(),
        ));
    };

    let inner_exts = parse_raw_extensions(&spliced[exts_offset + 2..])?;
    let Some(position) = inner_exts
        .iter()
        .position(|ext| ext.typ == ExtensionType::EchOuterExtensions)
    else {
        trace!("inner hello used no compression");
        return Ok((
            handshake_message(HandshakeType::ClientHello, &spliced),
            Vec::new(),
        ));
    };

    let referenced = referenced_types(inner_exts[position].wire)?;

    // Resolve the references against the outer hello with a forward-only
    // cursor: the compressed extensions must appear there in the same
    // relative order.
    let outer_exts_offset = outer_offsets
        .extensions
        .ok_or(InvalidMessage::InvalidEchOuterExtensions)?;
    let outer_exts = parse_raw_extensions(&outer_body[outer_exts_offset + 2..])?;
    let mut resolved = Vec::with_capacity(referenced.len());
    let mut cursor = 0;
    for typ in &referenced {
        while cursor < outer_exts.len() && outer_exts[cursor].typ != *typ {
            cursor += 1;
        }
        let Some(found) = outer_exts.get(cursor) else {
            return Err(InvalidMessage::InvalidEchOuterExtensions.into());
        };
        resolved.push(found.wire);
        cursor += 1;
    }

    let mut new_block = Vec::new();
    for ext in &inner_exts[..position] {
        new_block.extend_from_slice(ext.wire);
    }
    for wire in resolved {
        new_block.extend_from_slice(wire);
    }
    for ext in &inner_exts[position + 1..] {
        new_block.extend_from_slice(ext.wire);
    }
    if new_block.len() > 0xffff {
        return Err(InvalidMessage::MessageTooLarge.into());
    }

    let mut body = Vec::with_capacity(exts_offset + 2 + new_block.len());
    body.extend_from_slice(&spliced[..exts_offset]);
    (new_block.len() as u16).encode(&mut body);
    body.extend_from_slice(&new_block);

    Ok((
        handshake_message(HandshakeType::ClientHello, &body),
        referenced,
    ))
}

/// The types named by an `outer_extensions` record: a one-octet byte
/// count (twice the number of entries) followed by the types.
fn referenced_types(wire: &[u8]) -> Result<Vec<ExtensionType>, Error> {
    let value = &wire[4..];
    let count = match value.first() {
        Some(&count) => count as usize,
        None => return Err(InvalidMessage::InvalidEchOuterExtensions.into()),
    };
    if count == 0 || count % 2 != 0 || value.len() != 1 + count {
        return Err(InvalidMessage::InvalidEchOuterExtensions.into());
    }

    let mut referenced = Vec::with_capacity(count / 2);
    for pair in value[1..].chunks(2) {
        let typ = ExtensionType::from(u16::from_be_bytes([pair[0], pair[1]]));
        if typ == ExtensionType::EncryptedClientHello {
            // The compression reference must not name ECH itself.
            return Err(InvalidMessage::InvalidEchOuterExtensions.into());
        }
        referenced.push(typ);
    }
    Ok(referenced)
}
