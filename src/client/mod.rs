//! Client-side ECH: config selection, inner hello encoding, sealing and
//! splicing the offer into the outer hello, and accept confirmation.

use alloc::vec::Vec;

use pki_types::DnsName;

use crate::confirm::ConfirmationSuite;
use crate::crypto::hpke::{Hpke, HpkePublicKey};
use crate::crypto::SecureRandom;
use crate::error::{EncryptedClientHelloError, Error};
use crate::log::{debug, trace};
use crate::msgs::base::{Payload, PayloadU16, PayloadU24};
use crate::msgs::client_hello::{
    append_extension, scan_hello_body, ClientHelloPayload, Extension, Random, SessionId,
};
use crate::msgs::codec::{Codec, LengthPrefixedBuffer, ListLength};
use crate::msgs::config::EchConfigList;
use crate::msgs::ech::{ClientHelloOuterAad, EncryptedClientHelloOuter};
use crate::msgs::enums::{EchVersion, ExtensionType, HpkeSymmetricCipherSuite};
use crate::session::{EchSession, EchStatus, OuterSni};

mod grease;

pub use grease::{add_grease, EchGreaseConfig};

/// Controls how Encrypted Client Hello (ECH) is used in a client handshake.
#[derive(Debug)]
pub enum EchMode {
    /// ECH is enabled and the ClientHello will be encrypted based on the
    /// selected configuration.
    Enable(EchConfig),

    /// No ECH configuration is available but the client should act as
    /// though it had one.
    ///
    /// This is an anti-ossification measure, sometimes referred to as
    /// "GREASE"[^0].
    ///
    /// [^0]: <https://www.rfc-editor.org/rfc/rfc8701>
    Grease(EchGreaseConfig),
}

impl From<EchConfig> for EchMode {
    fn from(config: EchConfig) -> Self {
        Self::Enable(config)
    }
}

impl From<EchGreaseConfig> for EchMode {
    fn from(config: EchGreaseConfig) -> Self {
        Self::Grease(config)
    }
}

/// A deployed ECH configuration selected for use by a client.
///
/// This deep-copies everything it needs out of the [`EchConfigList`] it was
/// selected from, including the raw config encoding the HPKE `info` input
/// is built over, so the list need not outlive it.
#[derive(Debug)]
pub struct EchConfig {
    pub(crate) config_id: u8,
    pub(crate) suite: HpkeSymmetricCipherSuite,
    pub(crate) public_key: HpkePublicKey,
    pub(crate) public_name: DnsName<'static>,
    pub(crate) encoding: Vec<u8>,
    pub(crate) hpke: &'static dyn Hpke,
}

impl EchConfig {
    /// Select a config compatible with one of `hpke_suites` from the given
    /// lists.
    ///
    /// Only draft-10 configs are ever selected: draft-09 is decoded for
    /// tolerance but never offered.  If `preferred_outer_name` is given,
    /// a compatible config whose `public_name` matches it wins over the
    /// first compatible config.
    pub fn select(
        lists: &[EchConfigList],
        hpke_suites: &[&'static dyn Hpke],
        preferred_outer_name: Option<&DnsName<'_>>,
    ) -> Result<Self, Error> {
        let mut saw_usable_version = false;
        let mut first_match = None;

        for list in lists {
            for config in list.iter() {
                match config.version {
                    EchVersion::V10 => saw_usable_version = true,
                    _ => continue,
                }

                for sym in &config.cipher_suites {
                    if sym.aead_id.tag_len().is_none() {
                        continue; // EXPORT_ONLY AEAD: unusable for ECH.
                    }
                    let Some(hpke) = hpke_suites
                        .iter()
                        .find(|hpke| {
                            let suite = hpke.suite();
                            suite.kem == config.kem_id && suite.sym == *sym
                        })
                        .copied()
                    else {
                        continue;
                    };

                    let candidate = Self {
                        config_id: config.config_id,
                        suite: *sym,
                        public_key: HpkePublicKey(config.public_key.0.clone()),
                        public_name: config.public_name.clone(),
                        encoding: list.config_encoding(config).to_vec(),
                        hpke,
                    };

                    let preferred = matches!(
                        preferred_outer_name,
                        Some(name) if name.as_ref().eq_ignore_ascii_case(config.public_name.as_ref())
                    );
                    if preferred {
                        debug!(
                            "selected ECH config id {} with preferred public_name",
                            candidate.config_id
                        );
                        return Ok(candidate);
                    }
                    if first_match.is_none() {
                        first_match = Some(candidate);
                    }
                    break;
                }
            }
        }

        match (first_match, saw_usable_version) {
            (Some(config), _) => {
                debug!("selected ECH config id {}", config.config_id);
                Ok(config)
            }
            (None, false) => Err(EncryptedClientHelloError::UnsupportedVersion.into()),
            (None, true) => Err(EncryptedClientHelloError::NoCompatibleConfig.into()),
        }
    }

    /// The cover name the outer hello will use unless overridden.
    pub fn public_name(&self) -> &DnsName<'static> {
        &self.public_name
    }

    fn hpke_info(&self) -> Vec<u8> {
        let mut info = Vec::with_capacity(8 + self.encoding.len());
        // "tls ech" || 0x00 || ECHConfig
        info.extend_from_slice(b"tls ech\0");
        info.extend_from_slice(&self.encoding);
        info
    }
}

/// What the outer hello builder does with one inner extension type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OuterAction {
    /// The outer hello reuses the exact inner bytes.
    Copy,
    /// The outer hello carries an independent value of its own.
    Replicate,
    /// The outer hello carries the inner bytes, and the encoded inner
    /// refers to them through `outer_extensions` instead of repeating
    /// them.
    Compress,
}

/// Per-extension-type policy for building the outer hello and compressing
/// the encoded inner one.
#[derive(Clone, Debug)]
pub struct OuterPolicy {
    /// Types referenced via `outer_extensions` rather than repeated.
    pub compress: Vec<ExtensionType>,
    /// Types given an independent value in the outer hello.
    pub replicate: Vec<ExtensionType>,
}

impl OuterPolicy {
    pub fn action(&self, typ: ExtensionType) -> OuterAction {
        if self.compress.contains(&typ) {
            OuterAction::Compress
        } else if self.replicate.contains(&typ) {
            OuterAction::Replicate
        } else {
            OuterAction::Copy
        }
    }
}

impl Default for OuterPolicy {
    fn default() -> Self {
        Self {
            compress: vec![
                ExtensionType::EllipticCurves,
                ExtensionType::ECPointFormats,
            ],
            replicate: vec![
                ExtensionType::ServerName,
                ExtensionType::ALProtocolNegotiation,
                ExtensionType::KeyShare,
            ],
        }
    }
}

/// Contextual data for a TLS client handshake that offers ECH.
pub struct EchState {
    config: EchConfig,
    inner_name: DnsName<'static>,
    outer_sni: OuterSni,
    outer_alpn: Option<Vec<u8>>,
    session: EchSession,
}

impl EchState {
    pub fn new(
        config: EchConfig,
        inner_name: DnsName<'static>,
        outer_sni: OuterSni,
        outer_alpn: Option<Vec<u8>>,
    ) -> Self {
        Self {
            config,
            inner_name,
            outer_sni,
            outer_alpn,
            session: EchSession::new(),
        }
    }

    pub fn status(&self) -> EchStatus {
        self.session.status()
    }

    pub fn session(&self) -> &EchSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut EchSession {
        &mut self.session
    }

    /// Build the outer ClientHello body carrying an ECH offer for `inner`.
    ///
    /// The inner hello is encoded with `policy`'s compression applied,
    /// sealed under the selected config's public key, and the resulting
    /// ECH extension is spliced into the outer body with the
    /// extensions-length field rewritten to include it.
    pub fn offer(
        &mut self,
        inner: &ClientHelloPayload,
        policy: &OuterPolicy,
        secure_random: &'static dyn SecureRandom,
    ) -> Result<Vec<u8>, Error> {
        trace!("preparing ECH offer");

        let (encoded_inner, outer_only) = encode_inner(inner, policy);
        let inner_message = inner.to_message();

        let outer = self.build_outer_hello(inner, policy, secure_random)?;
        let mut outer_body = outer.get_encoding();

        // Encapsulate to the recipient; the encapsulated share is part of
        // the AAD, so this happens before sealing.
        let (enc, mut sealer) = self
            .config
            .hpke
            .setup_sealer(&self.config.hpke_info(), &self.config.public_key)?;

        let aad = ClientHelloOuterAad {
            cipher_suite: self.config.suite,
            config_id: self.config.config_id,
            enc: PayloadU16::new(enc.0.clone()),
            outer_hello: PayloadU24::new(outer_body.clone()),
        };
        let payload = sealer.seal(&aad.get_encoding(), &encoded_inner)?;
        // The sealer, and with it the ephemeral KEM secret, dies here.
        drop(sealer);

        let ech = Extension {
            typ: ExtensionType::EncryptedClientHello,
            payload: Payload::new(
                EncryptedClientHelloOuter {
                    cipher_suite: self.config.suite,
                    config_id: self.config.config_id,
                    enc: PayloadU16::new(enc.0),
                    payload: PayloadU16::new(payload),
                }
                .get_encoding(),
            ),
        };
        let offsets = scan_hello_body(&outer_body)?;
        append_extension(&mut outer_body, &offsets, &ech.get_encoding())?;

        self.session.attempted = true;
        self.session.inner_name = Some(self.inner_name.clone());
        self.session.outer_name = match &self.outer_sni {
            OuterSni::UsePublicName => Some(self.config.public_name.clone()),
            OuterSni::Override(name) => Some(name.clone()),
            OuterSni::Suppress => None,
        };
        self.session.session_id = inner.session_id;
        self.session.encoded_inner_ch = Some(encoded_inner);
        self.session.inner_ch = Some(inner_message);
        self.session.outer_only = outer_only;

        Ok(outer_body)
    }

    /// Check the ServerHello for the accept-confirmation signal.
    ///
    /// `server_hello_message` is the received ServerHello as a complete
    /// handshake message.  On mismatch the handshake is ordinary TLS to
    /// the outer name, and the session reports [`EchStatus::Rejected`].
    pub fn confirm_acceptance(
        &mut self,
        suite: &ConfirmationSuite,
        handshake_secret: &[u8],
        server_hello_message: &[u8],
    ) -> Result<bool, Error> {
        let inner = self
            .session
            .inner_ch
            .as_deref()
            .ok_or_else(|| Error::General("no ECH offer to confirm".into()))?;

        let accepted =
            suite.confirms_acceptance(handshake_secret, inner, server_hello_message)?;
        self.session.done = true;
        self.session.success = accepted;
        if accepted {
            trace!("ECH accepted by server");
        } else {
            trace!("ECH rejected by server");
        }
        Ok(accepted)
    }

    fn build_outer_hello(
        &self,
        inner: &ClientHelloPayload,
        policy: &OuterPolicy,
        secure_random: &'static dyn SecureRandom,
    ) -> Result<ClientHelloPayload, Error> {
        let outer_name = match &self.outer_sni {
            OuterSni::UsePublicName => Some(&self.config.public_name),
            OuterSni::Override(name) => Some(name),
            OuterSni::Suppress => None,
        };

        let mut extensions = Vec::with_capacity(inner.extensions.len() + 1);
        let mut have_sni = false;
        for ext in &inner.extensions {
            match ext.typ {
                // The outer handshake must not try to resume, and must not
                // claim to be an inner hello.
                ExtensionType::PreSharedKey | ExtensionType::EchIsInner => continue,
                ExtensionType::ServerName => {
                    if let Some(name) = outer_name {
                        extensions.push(Extension::sni(name));
                        have_sni = true;
                    }
                    continue;
                }
                _ => {}
            }

            match policy.action(ext.typ) {
                // Compressed extensions still appear in the outer hello:
                // that is where the server copies them back from.
                OuterAction::Copy | OuterAction::Compress => extensions.push(ext.clone()),
                OuterAction::Replicate => extensions.push(self.replicated_value(ext)),
            }
        }

        if !have_sni {
            if let Some(name) = outer_name {
                extensions.insert(0, Extension::sni(name));
            }
        }

        Ok(ClientHelloPayload {
            client_version: inner.client_version,
            random: Random::new(secure_random)?,
            session_id: inner.session_id,
            cipher_suites: inner.cipher_suites.clone(),
            compression_methods: inner.compression_methods.clone(),
            extensions,
        })
    }

    /// The independent value an outer hello carries for a replicated
    /// extension.  Only ALPN has a configured replacement; anything else
    /// falls back to the inner value.
    fn replicated_value(&self, ext: &Extension) -> Extension {
        match (ext.typ, &self.outer_alpn) {
            (ExtensionType::ALProtocolNegotiation, Some(protocols)) => {
                Extension::alpn(protocols)
            }
            _ => ext.clone(),
        }
    }
}

/// Produce the EncodedClientHelloInner for `inner`: its body with a
/// zero-length session id, and with the first compressed extension
/// replaced by one `outer_extensions` record naming every compressed type
/// (subsequent compressed extensions are omitted).
///
/// Returns the encoding and the compressed types in inner order.
pub(crate) fn encode_inner(
    inner: &ClientHelloPayload,
    policy: &OuterPolicy,
) -> (Vec<u8>, Vec<ExtensionType>) {
    let outer_only: Vec<ExtensionType> = inner
        .extensions
        .iter()
        .filter(|ext| policy.action(ext.typ) == OuterAction::Compress)
        .map(|ext| ext.typ)
        .collect();

    let mut body = Vec::new();
    inner.client_version.encode(&mut body);
    inner.random.encode(&mut body);
    // The session id is always empty here; the server splices the outer
    // hello's value back in before parsing.
    SessionId::empty().encode(&mut body);
    inner.cipher_suites.encode(&mut body);
    inner
        .compression_methods
        .encode(&mut body);

    let exts = LengthPrefixedBuffer::new(ListLength::U16, &mut body);
    let mut compression_done = false;
    for ext in &inner.extensions {
        if outer_only.contains(&ext.typ) {
            if !compression_done {
                ExtensionType::EchOuterExtensions.encode(exts.buf);
                ((1 + 2 * outer_only.len()) as u16).encode(exts.buf);
                ((2 * outer_only.len()) as u8).encode(exts.buf);
                for typ in &outer_only {
                    typ.encode(exts.buf);
                }
                compression_done = true;
            }
            continue;
        }
        ext.encode(exts.buf);
    }
    drop(exts);

    (body, outer_only)
}
