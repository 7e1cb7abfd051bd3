use super::extension::*;
use super::random::HandshakeRandom;
use super::*;
use crate::cipher_suite::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256;
use crate::curve::NamedCurve;
use crate::SrtpProtectionProfile;

fn round_trip(msg: HandshakeMessage) {
    let typ = msg.typ();
    let body = msg.marshal_body();
    let parsed = HandshakeMessage::unmarshal_body(typ, &body).unwrap();
    assert_eq!(parsed, msg);
}

#[test]
fn test_client_hello_round_trip() {
    let mut hello = client_hello::ClientHello::new(
        HandshakeRandom::generate(),
        vec![TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256],
        vec![
            Extension::SupportedGroups(vec![0x0017]),
            Extension::EcPointFormats(vec![0]),
            Extension::SignatureAlgorithms(vec![(HASH_SHA256, SIGNATURE_ECDSA)]),
            Extension::UseSrtp(vec![
                SrtpProtectionProfile::AeadAes128Gcm,
                SrtpProtectionProfile::Aes128CmHmacSha1_80,
            ]),
        ],
    );
    hello.cookie = vec![9u8; 20];
    round_trip(HandshakeMessage::ClientHello(hello));
}

#[test]
fn test_server_hello_round_trip() {
    round_trip(HandshakeMessage::ServerHello(server_hello::ServerHello::new(
        HandshakeRandom::generate(),
        TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
        vec![Extension::UseSrtp(vec![SrtpProtectionProfile::AeadAes128Gcm])],
    )));
}

#[test]
fn test_hello_verify_request_round_trip() {
    round_trip(HandshakeMessage::HelloVerifyRequest(
        server_hello::HelloVerifyRequest::new(vec![1, 2, 3, 4, 5]),
    ));
}

#[test]
fn test_certificate_round_trip() {
    round_trip(HandshakeMessage::Certificate(certificate::CertificateMsg {
        certificates: vec![vec![0xde; 300], vec![0xad; 120]],
    }));
}

#[test]
fn test_server_key_exchange_round_trip() {
    round_trip(HandshakeMessage::ServerKeyExchange(
        key_exchange::ServerKeyExchange {
            named_curve: NamedCurve::P256,
            public_key: vec![4u8; 65],
            hash_algorithm: HASH_SHA256,
            signature_algorithm: SIGNATURE_ECDSA,
            signature: vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01],
        },
    ));
}

#[test]
fn test_certificate_request_round_trip() {
    round_trip(HandshakeMessage::CertificateRequest(
        certificate::CertificateRequest::default(),
    ));
}

#[test]
fn test_client_key_exchange_round_trip() {
    round_trip(HandshakeMessage::ClientKeyExchange(
        key_exchange::ClientKeyExchange {
            public_key: vec![4u8; 65],
        },
    ));
}

#[test]
fn test_certificate_verify_round_trip() {
    round_trip(HandshakeMessage::CertificateVerify(
        certificate::CertificateVerify {
            hash_algorithm: HASH_SHA256,
            signature_algorithm: SIGNATURE_ECDSA,
            signature: vec![1; 70],
        },
    ));
}

#[test]
fn test_finished_round_trip() {
    round_trip(HandshakeMessage::Finished(finished::Finished {
        verify_data: vec![7u8; 12],
    }));
}

#[test]
fn test_handshake_header_round_trip() {
    let header = HandshakeHeader {
        typ: HandshakeType::ClientHello as u8,
        length: 0x0102_03,
        message_seq: 7,
        fragment_offset: 0x04_0506,
        fragment_length: 0x07_0809,
    };
    let mut out = bytes::BytesMut::new();
    header.marshal_to(&mut out);
    assert_eq!(out.len(), HANDSHAKE_HEADER_SIZE);

    let mut buf = &out[..];
    assert_eq!(HandshakeHeader::unmarshal(&mut buf).unwrap(), header);
}

#[test]
fn test_marshal_with_header_is_unfragmented() {
    let msg = HandshakeMessage::Finished(finished::Finished {
        verify_data: vec![7u8; 12],
    });
    let raw = msg.marshal_with_header(3);
    let mut buf = &raw[..];
    let header = HandshakeHeader::unmarshal(&mut buf).unwrap();
    assert_eq!(header.message_seq, 3);
    assert_eq!(header.fragment_offset, 0);
    assert_eq!(header.fragment_length, header.length);
    assert_eq!(header.length as usize, raw.len() - HANDSHAKE_HEADER_SIZE);
}

#[test]
fn test_unknown_extension_is_preserved() {
    let ext = Extension::Unknown {
        typ: 0xff01,
        data: vec![1, 2, 3],
    };
    let mut out = bytes::BytesMut::new();
    marshal_extensions(&[ext.clone()], &mut out);
    let mut buf = &out[..];
    let parsed = unmarshal_extensions(&mut buf).unwrap();
    assert_eq!(parsed, vec![ext]);
}
