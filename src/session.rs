//! Per-handshake ECH state.

use alloc::vec::Vec;

use pki_types::DnsName;

use crate::hash_hs::HandshakeHashBuffer;
use crate::msgs::client_hello::SessionId;
use crate::msgs::enums::ExtensionType;

/// What to put in the outer ClientHello's `server_name` extension.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OuterSni {
    /// Use the chosen ECHConfig's `public_name`.
    #[default]
    UsePublicName,
    /// Use this name instead of the `public_name`.
    Override(DnsName<'static>),
    /// Send no outer `server_name` extension at all.
    Suppress,
}

/// The ECH outcome for one handshake, as reported after it completes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EchStatus {
    /// ECH was not attempted: no configuration, or no ECH extension seen.
    NotTried,
    /// ECH is in progress and its outcome is not yet known.
    Attempted,
    /// This side sent, or received, a GREASE ECH extension; the handshake
    /// proceeds to the cover name as ordinary TLS.
    Grease,
    /// The inner ClientHello was recovered (server) or confirmed (client).
    Accepted,
    /// The client offered ECH but the server did not honor it.
    Rejected,
    /// ECH succeeded but certificate verification for the inner name failed.
    BadName,
}

/// State for one handshake's ECH processing, client or server side.
///
/// The inner and outer hellos are never held as a mutable dual view;
/// this records which of the two is currently canonical, along with the
/// material needed to move between them.
#[derive(Debug, Default)]
pub struct EchSession {
    pub(crate) attempted: bool,
    pub(crate) success: bool,
    pub(crate) done: bool,
    pub(crate) grease: bool,
    pub(crate) bad_name: bool,
    /// Set on sessions serving a split-mode front-end, which never own
    /// the handshake transcript.
    pub(crate) backend: bool,

    /// The protected name, once known.
    pub(crate) inner_name: Option<DnsName<'static>>,
    /// The cover name observed or emitted in the outer hello.
    pub(crate) outer_name: Option<DnsName<'static>>,

    /// The outer hello's legacy_session_id, reused when reconstructing
    /// the inner hello.
    pub(crate) session_id: SessionId,
    /// The EncodedClientHelloInner (compressed, no session id).
    pub(crate) encoded_inner_ch: Option<Vec<u8>>,
    /// The full reconstructed inner hello as a handshake message.
    pub(crate) inner_ch: Option<Vec<u8>>,
    /// Extension types compressed out of the inner hello.
    pub(crate) outer_only: Vec<ExtensionType>,
}

impl EchSession {
    pub fn new() -> Self {
        Self {
            session_id: SessionId::empty(),
            ..Self::default()
        }
    }

    /// The current position in the ECH state machine.
    pub fn status(&self) -> EchStatus {
        if self.bad_name {
            EchStatus::BadName
        } else if self.grease {
            EchStatus::Grease
        } else if self.success {
            EchStatus::Accepted
        } else if self.done {
            EchStatus::Rejected
        } else if self.attempted {
            EchStatus::Attempted
        } else {
            EchStatus::NotTried
        }
    }

    /// The protected inner name, if ECH progressed far enough to know it.
    pub fn inner_name(&self) -> Option<&DnsName<'static>> {
        self.inner_name.as_ref()
    }

    /// The cover name from the outer hello, if one was present.
    pub fn outer_name(&self) -> Option<&DnsName<'static>> {
        self.outer_name.as_ref()
    }

    /// The full reconstructed inner ClientHello message, after a
    /// successful server-side decrypt or a client offer.
    pub fn inner_client_hello(&self) -> Option<&[u8]> {
        self.inner_ch.as_deref()
    }

    /// The EncodedClientHelloInner that was sealed (client) or opened
    /// (server): the compressed inner hello body, session id elided.
    pub fn encoded_inner(&self) -> Option<&[u8]> {
        self.encoded_inner_ch.as_deref()
    }

    /// The extension types compressed out of the inner hello into its
    /// `outer_extensions` reference, in inner order.
    pub fn compressed_types(&self) -> &[ExtensionType] {
        &self.outer_only
    }

    /// Record the outcome of verifying the certificate presented for the
    /// inner name.  Only meaningful once ECH has succeeded.
    pub fn certificate_verified(&mut self, ok: bool) {
        if self.success && !ok {
            self.bad_name = true;
        }
    }

    /// Make the reconstructed inner hello the canonical ClientHello.
    ///
    /// The transcript buffer has its leading outer ClientHello replaced by
    /// the inner one, keeping any messages buffered after it.  Does
    /// nothing unless a decrypt already succeeded.
    pub fn swap_to_inner(&mut self, transcript: &mut HandshakeHashBuffer) {
        let Some(inner) = &self.inner_ch else {
            return;
        };
        if !self.backend {
            transcript.replace_client_hello(inner);
        }
        self.attempted = true;
        self.success = true;
        self.done = true;
        self.grease = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_is_not_tried() {
        assert_eq!(EchSession::new().status(), EchStatus::NotTried);
    }

    #[test]
    fn status_ordering() {
        let mut session = EchSession::new();
        session.attempted = true;
        assert_eq!(session.status(), EchStatus::Attempted);

        session.done = true;
        assert_eq!(session.status(), EchStatus::Rejected);

        session.success = true;
        assert_eq!(session.status(), EchStatus::Accepted);

        session.grease = true;
        assert_eq!(session.status(), EchStatus::Grease);
    }

    #[test]
    fn bad_name_only_after_success() {
        let mut session = EchSession::new();
        session.attempted = true;
        session.certificate_verified(false);
        assert_eq!(session.status(), EchStatus::Attempted);

        session.success = true;
        session.done = true;
        session.certificate_verified(true);
        assert_eq!(session.status(), EchStatus::Accepted);
        session.certificate_verified(false);
        assert_eq!(session.status(), EchStatus::BadName);
    }

    #[test]
    fn swap_replaces_transcript_and_settles_flags() {
        let mut session = EchSession::new();
        session.inner_ch = Some(vec![0x01, 0x00, 0x00, 0x01, 0xdd]);

        let mut transcript = HandshakeHashBuffer::new();
        transcript.add_raw(&[0x01, 0x00, 0x00, 0x02, 0xaa, 0xbb]);
        session.swap_to_inner(&mut transcript);

        assert_eq!(transcript.bytes(), &[0x01, 0x00, 0x00, 0x01, 0xdd]);
        assert_eq!(session.status(), EchStatus::Accepted);
    }

    #[test]
    fn backend_swap_leaves_transcript_alone() {
        let mut session = EchSession::new();
        session.backend = true;
        session.inner_ch = Some(vec![0x01, 0x00, 0x00, 0x01, 0xdd]);

        let mut transcript = HandshakeHashBuffer::new();
        transcript.add_raw(&[0x02, 0x00, 0x00, 0x01, 0xcc]);
        session.swap_to_inner(&mut transcript);
        assert_eq!(transcript.bytes(), &[0x02, 0x00, 0x00, 0x01, 0xcc]);
        assert_eq!(session.status(), EchStatus::Accepted);
    }
}
