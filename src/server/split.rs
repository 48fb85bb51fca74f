//! Raw one-shot decryption for split-mode front-ends.
//!
//! A front-end proxy that terminates ECH but not TLS hands over the whole
//! wire ClientHello record, learns whether it decrypted and which names
//! were involved, and forwards either the reconstructed inner record or
//! the original outer one to the backend.

use alloc::vec::Vec;

use pki_types::DnsName;

use crate::error::{Error, InvalidMessage};
use crate::msgs::codec::{u24, Codec, Reader};
use crate::msgs::enums::{HandshakeType, ProtocolVersion};
use crate::server::{decrypt_client_hello, ServerEchOutcome};
use crate::session::EchSession;
use crate::store::EchKeyStore;

const CONTENT_TYPE_HANDSHAKE: u8 = 0x16;

/// The result of a raw split-mode decryption attempt.
#[derive(Debug)]
pub struct RawDecrypt {
    /// True if a stored key decrypted the offer.  False also covers "no
    /// ECH extension present" and GREASE; the front-end forwards the
    /// outer record unchanged in all those cases.
    pub decrypted_ok: bool,
    /// The reconstructed inner ClientHello as a complete TLS record, when
    /// decryption worked.
    pub inner_record: Option<Vec<u8>>,
    /// The inner hello's SNI, when decryption worked and one was present.
    pub inner_sni: Option<DnsName<'static>>,
    /// The outer hello's SNI, if present.
    pub outer_sni: Option<DnsName<'static>>,
}

/// Attempt ECH decryption of a complete wire ClientHello record.
///
/// `outer_record` starts at the TLS record header (content type 0x16).
/// Decryption failure is success with `decrypted_ok` unset; only
/// structural errors are reported as errors.
pub fn raw_decrypt(
    store: &EchKeyStore,
    trial_decrypt: bool,
    outer_record: &[u8],
) -> Result<RawDecrypt, Error> {
    let body = unwrap_record(outer_record)?;

    let mut session = EchSession::new();
    session.backend = true;

    let outcome = decrypt_client_hello(store, trial_decrypt, body, &mut session)?;
    let accepted = match outcome {
        ServerEchOutcome::Accepted(accepted) => accepted,
        ServerEchOutcome::NotPresent | ServerEchOutcome::Grease => {
            return Ok(RawDecrypt {
                decrypted_ok: false,
                inner_record: None,
                inner_sni: None,
                outer_sni: session.outer_name.take(),
            });
        }
    };

    Ok(RawDecrypt {
        decrypted_ok: true,
        inner_record: Some(wrap_record(&accepted.inner_message)),
        inner_sni: accepted.inner_hello.sni(),
        outer_sni: session.outer_name.take(),
    })
}

/// Strip the record and handshake headers off a wire ClientHello,
/// returning the hello body.
fn unwrap_record(record: &[u8]) -> Result<&[u8], Error> {
    let mut r = Reader::init(record);

    let content_type = u8::read(&mut r)?;
    if content_type != CONTENT_TYPE_HANDSHAKE {
        return Err(InvalidMessage::UnexpectedMessage("not a handshake record").into());
    }
    ProtocolVersion::read(&mut r)?;
    let record_len = u16::read(&mut r)? as usize;
    if record_len != r.left() {
        return Err(InvalidMessage::MessageTooShort.into());
    }

    let typ = HandshakeType::read(&mut r)?;
    if typ != HandshakeType::ClientHello {
        return Err(InvalidMessage::UnexpectedMessage("not a ClientHello").into());
    }
    let body_len = usize::from(u24::read(&mut r)?);
    if body_len != r.left() {
        return Err(InvalidMessage::MessageTooShort.into());
    }

    Ok(r.rest())
}

/// Wrap a handshake message in a plaintext TLS record.
fn wrap_record(message: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(5 + message.len());
    record.push(CONTENT_TYPE_HANDSHAKE);
    ProtocolVersion::TLSv1_0.encode(&mut record);
    (message.len() as u16).encode(&mut record);
    record.extend_from_slice(message);
    record
}
