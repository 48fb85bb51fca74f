//! End-to-end exercises of the ECH engine: a client assembles an offer,
//! a server decrypts it, both sides agree on the accept confirmation.

use pki_types::DnsName;

use tls_ech::client::{self, EchConfig, EchGreaseConfig, EchState, OuterPolicy};
use tls_ech::crypto::ring::SECURE_RANDOM;
use tls_ech::crypto::rust_hpke::{ALL_SUPPORTED_SUITES, DH_KEM_X25519_HKDF_SHA256_AES_128};
use tls_ech::msgs::base::Payload;
use tls_ech::msgs::client_hello::{
    handshake_message, ClientHelloPayload, Extension, Random, SessionId,
};
use tls_ech::msgs::codec::Codec;
use tls_ech::msgs::enums::{
    CipherSuite, Compression, ExtensionType, HandshakeType, ProtocolVersion,
};
use tls_ech::server::{
    decrypt_client_hello, install_accept_confirmation, raw_decrypt, ServerEchOutcome,
};
use tls_ech::{
    read_config_lists, ConfirmationSuite, EchKey, EchKeyStore, EchSession, EchStatus,
    HandshakeHashBuffer, OuterSni,
};

fn inner_hello() -> ClientHelloPayload {
    ClientHelloPayload {
        client_version: ProtocolVersion::TLSv1_2,
        random: Random::from([0x42; 32]),
        session_id: SessionId::try_from(&[0x17; 32][..]).unwrap(),
        cipher_suites: vec![
            CipherSuite::TLS13_AES_128_GCM_SHA256,
            CipherSuite::TLS13_CHACHA20_POLY1305_SHA256,
        ],
        compression_methods: vec![Compression::Null],
        extensions: vec![
            Extension::sni(&DnsName::try_from("inner.example.com").unwrap()),
            Extension {
                typ: ExtensionType::EllipticCurves,
                payload: Payload::new(vec![0x00, 0x04, 0x00, 0x1d, 0x00, 0x17]),
            },
            Extension {
                typ: ExtensionType::EchIsInner,
                payload: Payload::empty(),
            },
            Extension {
                typ: ExtensionType::SupportedVersions,
                payload: Payload::new(vec![0x02, 0x03, 0x04]),
            },
            Extension {
                typ: ExtensionType::KeyShare,
                payload: Payload::new(vec![0x00, 0x02, 0x00, 0x1d]),
            },
        ],
    }
}

fn provisioned_store(config_id: u8) -> (EchKeyStore, Vec<u8>) {
    let (key, published) = EchKey::generate(
        DH_KEM_X25519_HKDF_SHA256_AES_128,
        config_id,
        DnsName::try_from("cover.example.com").unwrap(),
    )
    .unwrap();
    let mut store = EchKeyStore::new();
    store.add(key);
    (store, published)
}

fn offer_for(published: &[u8]) -> (EchState, Vec<u8>) {
    let lists = read_config_lists(published, None).unwrap();
    let config = EchConfig::select(&lists, ALL_SUPPORTED_SUITES, None).unwrap();
    let mut state = EchState::new(
        config,
        DnsName::try_from("inner.example.com").unwrap(),
        OuterSni::UsePublicName,
        None,
    );
    let outer_body = state
        .offer(&inner_hello(), &OuterPolicy::default(), SECURE_RANDOM)
        .unwrap();
    (state, outer_body)
}

/// A minimal but plausible ServerHello handshake message.
fn server_hello_message() -> Vec<u8> {
    let mut body = Vec::new();
    ProtocolVersion::TLSv1_2.encode(&mut body);
    body.extend_from_slice(&[0xab; 32]); // random
    SessionId::try_from(&[0x17; 32][..])
        .unwrap()
        .encode(&mut body);
    CipherSuite::TLS13_AES_128_GCM_SHA256.encode(&mut body);
    Compression::Null.encode(&mut body);
    body.extend_from_slice(&[0x00, 0x00]); // no extensions
    handshake_message(HandshakeType::ServerHello, &body)
}

#[test]
fn server_recovers_inner_hello_bit_for_bit() {
    let (store, published) = provisioned_store(0x11);
    let (client_state, outer_body) = offer_for(&published);

    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, false, &outer_body, &mut session).unwrap();
    let accepted = match outcome {
        ServerEchOutcome::Accepted(accepted) => accepted,
        _ => panic!("expected ECH decryption to succeed"),
    };

    assert_eq!(accepted.inner_message, inner_hello().to_message());
    assert_eq!(accepted.inner_hello, inner_hello());
    assert_eq!(session.status(), EchStatus::Accepted);
    assert_eq!(session.inner_name().unwrap().as_ref(), "inner.example.com");
    assert_eq!(session.outer_name().unwrap().as_ref(), "cover.example.com");
    assert_eq!(
        client_state.session().inner_client_hello().unwrap(),
        &accepted.inner_message[..],
    );
}

#[test]
fn transcript_swap_replaces_outer_hello() {
    let (store, published) = provisioned_store(0x11);
    let (_, outer_body) = offer_for(&published);

    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, false, &outer_body, &mut session).unwrap();
    let ServerEchOutcome::Accepted(accepted) = outcome else {
        panic!("expected ECH decryption to succeed");
    };

    let mut transcript = HandshakeHashBuffer::new();
    transcript.add_raw(&handshake_message(HandshakeType::ClientHello, &outer_body));
    transcript.add_raw(&server_hello_message());

    session.swap_to_inner(&mut transcript);

    let mut expected = accepted.inner_message.clone();
    expected.extend_from_slice(&server_hello_message());
    assert_eq!(transcript.bytes(), &expected[..]);
    assert_eq!(session.status(), EchStatus::Accepted);
}

#[test]
fn accept_confirmation_round_trip() {
    let (store, published) = provisioned_store(0x11);
    let (mut client_state, outer_body) = offer_for(&published);

    let mut session = EchSession::new();
    let ServerEchOutcome::Accepted(accepted) =
        decrypt_client_hello(&store, false, &outer_body, &mut session).unwrap()
    else {
        panic!("expected ECH decryption to succeed");
    };

    let handshake_secret = [0x5a; 32];
    let suite = ConfirmationSuite::sha256();
    let mut server_hello = server_hello_message();
    install_accept_confirmation(
        &suite,
        &handshake_secret,
        &accepted.inner_message,
        &mut server_hello,
    )
    .unwrap();

    assert!(client_state
        .confirm_acceptance(&suite, &handshake_secret, &server_hello)
        .unwrap());
    assert_eq!(client_state.status(), EchStatus::Accepted);
}

#[test]
fn missing_confirmation_rejects_the_offer() {
    let (_, published) = provisioned_store(0x11);
    let (mut client_state, _) = offer_for(&published);

    // A ServerHello from a server that never decrypted the inner hello.
    let suite = ConfirmationSuite::sha256();
    assert!(!client_state
        .confirm_acceptance(&suite, &[0x5a; 32], &server_hello_message())
        .unwrap());
    assert_eq!(client_state.status(), EchStatus::Rejected);

    // The spurned client falls back to the outer name; a later
    // certificate check failure for it is not an ECH failure.
    let mut session_check = EchSession::new();
    session_check.certificate_verified(false);
    assert_ne!(session_check.status(), EchStatus::BadName);
}

#[test]
fn wrong_config_id_without_trial_decryption_is_grease() {
    // Server holds a key with config_id 0x11; the client offers against a
    // different deployment's config with id 0x22.
    let (store, _) = provisioned_store(0x11);
    let (_, other_published) = provisioned_store(0x22);
    let (_, outer_body) = offer_for(&other_published);

    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, false, &outer_body, &mut session).unwrap();
    assert!(matches!(outcome, ServerEchOutcome::Grease));
    assert_eq!(session.status(), EchStatus::Grease);
    // The handshake continues to the outer name.
    assert_eq!(session.outer_name().unwrap().as_ref(), "cover.example.com");
    assert!(session.inner_name().is_none());
    // The store is untouched by the failure.
    assert_eq!(store.len(), 1);
}

#[test]
fn trial_decryption_still_fails_for_foreign_keys() {
    let (store, _) = provisioned_store(0x11);
    let (_, other_published) = provisioned_store(0x22);
    let (_, outer_body) = offer_for(&other_published);

    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, true, &outer_body, &mut session).unwrap();
    assert!(matches!(outcome, ServerEchOutcome::Grease));
}

#[test]
fn config_id_collisions_resolved_by_decryption() {
    // Two keys share config_id 0x11; the offer is for the second one.
    let (mut store, _) = provisioned_store(0x11);
    let (second_key, second_published) = EchKey::generate(
        DH_KEM_X25519_HKDF_SHA256_AES_128,
        0x11,
        DnsName::try_from("cover.example.com").unwrap(),
    )
    .unwrap();
    store.add(second_key);

    let (_, outer_body) = offer_for(&second_published);
    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, false, &outer_body, &mut session).unwrap();
    assert!(matches!(outcome, ServerEchOutcome::Accepted(_)));
    assert_eq!(store.len(), 2);
}

#[test]
fn grease_offers_read_as_grease() {
    let (store, _) = provisioned_store(0x11);

    let mut outer_body = inner_hello().get_encoding();
    let mut client_session = EchSession::new();
    client::add_grease(
        &mut outer_body,
        &EchGreaseConfig::default(),
        SECURE_RANDOM,
        &mut client_session,
    )
    .unwrap();
    assert_eq!(client_session.status(), EchStatus::Grease);

    let mut session = EchSession::new();
    let outcome = decrypt_client_hello(&store, true, &outer_body, &mut session).unwrap();
    assert!(matches!(outcome, ServerEchOutcome::Grease));
    assert_eq!(session.status(), EchStatus::Grease);
}

#[test]
fn split_mode_raw_decrypt() {
    let (store, published) = provisioned_store(0x11);
    let (_, outer_body) = offer_for(&published);

    let record = {
        let message = handshake_message(HandshakeType::ClientHello, &outer_body);
        let mut record = vec![0x16, 0x03, 0x01];
        record.extend_from_slice(&(message.len() as u16).to_be_bytes());
        record.extend_from_slice(&message);
        record
    };

    let result = raw_decrypt(&store, false, &record).unwrap();
    assert!(result.decrypted_ok);
    assert_eq!(result.inner_sni.unwrap().as_ref(), "inner.example.com");
    assert_eq!(result.outer_sni.unwrap().as_ref(), "cover.example.com");

    let inner_record = result.inner_record.unwrap();
    assert_eq!(inner_record[0], 0x16);
    assert_eq!(&inner_record[5..], &inner_hello().to_message()[..]);
}

#[test]
fn split_mode_forwards_grease_untouched() {
    let (store, _) = provisioned_store(0x11);
    let (_, other_published) = provisioned_store(0x99);
    let (_, outer_body) = offer_for(&other_published);

    let record = {
        let message = handshake_message(HandshakeType::ClientHello, &outer_body);
        let mut record = vec![0x16, 0x03, 0x01];
        record.extend_from_slice(&(message.len() as u16).to_be_bytes());
        record.extend_from_slice(&message);
        record
    };

    let result = raw_decrypt(&store, true, &record).unwrap();
    assert!(!result.decrypted_ok);
    assert!(result.inner_record.is_none());
    assert_eq!(result.outer_sni.unwrap().as_ref(), "cover.example.com");
}
