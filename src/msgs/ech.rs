use alloc::vec::Vec;

use crate::error::InvalidMessage;
use crate::msgs::base::{PayloadU16, PayloadU24};
use crate::msgs::codec::{Codec, Reader};
use crate::msgs::enums::HpkeSymmetricCipherSuite;

/// The ECH extension's `enc` value (the client's encapsulated share) must
/// fit a KEM public key.
pub(crate) const MAX_ECH_ENC_LEN: usize = 1024;

/// The ECH extension's ciphertext payload limit.
pub(crate) const MAX_ECH_PAYLOAD_LEN: usize = 16 * 1024;

/// The body of the `encrypted_client_hello` extension carried in an outer
/// ClientHello.
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedClientHelloOuter {
    /// The cipher suite used to encrypt ClientHelloInner.
    pub cipher_suite: HpkeSymmetricCipherSuite,
    /// The config_id of the ECHConfig chosen by the client.
    pub config_id: u8,
    /// The HPKE encapsulated key, used by servers to decrypt the
    /// corresponding `payload` field.
    pub enc: PayloadU16,
    /// The serialized and encrypted ClientHelloInner structure.
    pub payload: PayloadU16,
}

impl Codec for EncryptedClientHelloOuter {
    fn encode(&self, bytes: &mut Vec<u8>) {
        self.cipher_suite.encode(bytes);
        self.config_id.encode(bytes);
        self.enc.encode(bytes);
        self.payload.encode(bytes);
    }

    fn read(r: &mut Reader<'_>) -> Result<Self, InvalidMessage> {
        let cipher_suite = HpkeSymmetricCipherSuite::read(r)?;
        let config_id = u8::read(r)?;
        let enc = PayloadU16::read(r)?;
        if enc.0.len() > MAX_ECH_ENC_LEN {
            return Err(InvalidMessage::EchEncTooLong);
        }
        let payload = PayloadU16::read(r)?;
        if payload.0.len() > MAX_ECH_PAYLOAD_LEN {
            return Err(InvalidMessage::EchPayloadTooLong);
        }
        Ok(Self {
            cipher_suite,
            config_id,
            enc,
            payload,
        })
    }
}

/// The `ClientHelloOuterAAD` value bound into the HPKE seal/open of an ECH
/// offer.
///
/// `outer_hello` is the outer ClientHello body (legacy_version through the
/// end of extensions) with the ECH extension removed and the extensions
/// length fixed up to match.  This struct only ever needs encoding: both
/// sides reconstruct it, neither receives it.
#[derive(Debug)]
pub(crate) struct ClientHelloOuterAad {
    pub(crate) cipher_suite: HpkeSymmetricCipherSuite,
    pub(crate) config_id: u8,
    pub(crate) enc: PayloadU16,
    pub(crate) outer_hello: PayloadU24,
}

impl ClientHelloOuterAad {
    pub(crate) fn encode(&self, bytes: &mut Vec<u8>) {
        self.cipher_suite.encode(bytes);
        self.config_id.encode(bytes);
        self.enc.encode(bytes);
        self.outer_hello.encode(bytes);
    }

    pub(crate) fn get_encoding(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msgs::enums::{HpkeAead, HpkeKdf};

    #[test]
    fn extension_round_trip() {
        let ext = EncryptedClientHelloOuter {
            cipher_suite: HpkeSymmetricCipherSuite {
                kdf_id: HpkeKdf::HKDF_SHA256,
                aead_id: HpkeAead::CHACHA20_POLY_1305,
            },
            config_id: 0x42,
            enc: PayloadU16::new(vec![0xaa; 32]),
            payload: PayloadU16::new(vec![0xbb; 100]),
        };
        let enc = ext.get_encoding();
        assert_eq!(&enc[..5], &[0x00, 0x01, 0x00, 0x03, 0x42]);
        assert_eq!(EncryptedClientHelloOuter::read_bytes(&enc).unwrap(), ext);
    }

    #[test]
    fn oversize_enc_rejected() {
        let ext = EncryptedClientHelloOuter {
            cipher_suite: HpkeSymmetricCipherSuite::default(),
            config_id: 0,
            enc: PayloadU16::new(vec![0; MAX_ECH_ENC_LEN + 1]),
            payload: PayloadU16::new(vec![0; 8]),
        };
        assert_eq!(
            EncryptedClientHelloOuter::read_bytes(&ext.get_encoding()),
            Err(InvalidMessage::EchEncTooLong)
        );
    }

    #[test]
    fn oversize_payload_rejected() {
        let ext = EncryptedClientHelloOuter {
            cipher_suite: HpkeSymmetricCipherSuite::default(),
            config_id: 0,
            enc: PayloadU16::new(vec![0; 32]),
            payload: PayloadU16::new(vec![0; MAX_ECH_PAYLOAD_LEN + 1]),
        };
        assert_eq!(
            EncryptedClientHelloOuter::read_bytes(&ext.get_encoding()),
            Err(InvalidMessage::EchPayloadTooLong)
        );
    }

    #[test]
    fn aad_layout() {
        let aad = ClientHelloOuterAad {
            cipher_suite: HpkeSymmetricCipherSuite::default(),
            config_id: 0x2a,
            enc: PayloadU16::new(vec![0x01, 0x02]),
            outer_hello: PayloadU24::new(vec![0x03, 0x04, 0x05]),
        };
        assert_eq!(
            aad.get_encoding(),
            vec![
                0x00, 0x01, 0x00, 0x01, // suite
                0x2a, // config id
                0x00, 0x02, 0x01, 0x02, // enc
                0x00, 0x00, 0x03, 0x03, 0x04, 0x05, // u24 outer hello
            ]
        );
    }
}
