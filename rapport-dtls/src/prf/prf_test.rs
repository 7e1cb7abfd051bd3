use super::*;

#[test]
fn test_p_hash_is_deterministic_and_sized() {
    let secret = [0x0bu8; 22];
    let seed = b"test seed";
    for len in [1usize, 12, 32, 48, 60, 100] {
        let a = prf_p_hash(&secret, seed, len);
        let b = prf_p_hash(&secret, seed, len);
        assert_eq!(a.len(), len);
        assert_eq!(a, b);
    }
}

#[test]
fn test_p_hash_known_answer() {
    // Widely used P_SHA256 known-answer vector from the IETF TLS list.
    let secret = [
        0x9b, 0xbe, 0x43, 0x6b, 0xa9, 0x40, 0xf0, 0x17, 0xb1, 0x76, 0x52, 0x84, 0x9a, 0x71, 0xdb,
        0x35,
    ];
    let seed: Vec<u8> = {
        let mut s = b"test label".to_vec();
        s.extend_from_slice(&[
            0xa0, 0xba, 0x9f, 0x93, 0x6c, 0xda, 0x31, 0x18, 0x27, 0xa6, 0xf7, 0x96, 0xff, 0xd5,
            0x19, 0x8c,
        ]);
        s
    };
    let expected = [
        0xe3, 0xf2, 0x29, 0xba, 0x72, 0x7b, 0xe1, 0x7b, 0x8d, 0x12, 0x26, 0x20, 0x55, 0x7c, 0xd4,
        0x53, 0xc2, 0xaa, 0xb2, 0x1d, 0x07, 0xc3, 0xd4, 0x95, 0x32, 0x9b, 0x52, 0xd4, 0xe6, 0x1e,
        0xdb, 0x5a, 0x6b, 0x30, 0x17, 0x91, 0xe9, 0x0d, 0x35, 0xc9, 0xc9, 0xa4, 0x6b, 0x4e, 0x14,
        0xba, 0xf9, 0xaf, 0x0f, 0xa0, 0x22, 0xf7, 0x07, 0x7d, 0xef, 0x17, 0xab, 0xfd, 0x37, 0x97,
        0xc0, 0x56, 0x4b, 0xab, 0x4f, 0xbc, 0x91, 0x66, 0x6e, 0x9d, 0xef, 0x9b, 0x97, 0xfc, 0xe3,
        0x4f, 0x79, 0x67, 0x89, 0xba, 0xa4, 0x80, 0x82, 0xd1, 0x22, 0xee, 0x42, 0xc5, 0xa7, 0x2e,
        0x5a, 0x51, 0x10, 0xff, 0xf7, 0x01, 0x87, 0x34, 0x7b, 0x66,
    ];
    assert_eq!(prf_p_hash(&secret, &seed, 100), expected);
}

#[test]
fn test_master_secret_length() {
    let pre_master = [1u8; 32];
    let client_random = [2u8; 32];
    let server_random = [3u8; 32];
    let ms = prf_master_secret(&pre_master, &client_random, &server_random);
    assert_eq!(ms.len(), MASTER_SECRET_LENGTH);
    // Different randoms must change the secret.
    let other = prf_master_secret(&pre_master, &server_random, &client_random);
    assert_ne!(ms, other);
}

#[test]
fn test_encryption_keys_partition() {
    let keys = prf_encryption_keys(&[1u8; 48], &[2u8; 32], &[3u8; 32], 16, 4);
    assert_eq!(keys.client_write_key.len(), 16);
    assert_eq!(keys.server_write_key.len(), 16);
    assert_eq!(keys.client_write_iv.len(), 4);
    assert_eq!(keys.server_write_iv.len(), 4);
    assert_ne!(keys.client_write_key, keys.server_write_key);
}

#[test]
fn test_verify_data_length_and_role() {
    let master = [7u8; 48];
    let transcript = b"handshake messages in order";
    let client = prf_verify_data(&master, transcript, true).unwrap();
    let server = prf_verify_data(&master, transcript, false).unwrap();
    assert_eq!(client.len(), VERIFY_DATA_LENGTH);
    assert_ne!(client, server);
}

#[test]
fn test_srtp_exporter_is_60_bytes_for_gcm() {
    // AES-128-GCM SRTP: 2 * (16 key + 12 salt) = 56; AES-CM: 2 * (16 + 14) = 60.
    let master = [9u8; 48];
    let out = prf_export_keying_material(
        &master,
        crate::EXTRACTOR_DTLS_SRTP.as_bytes(),
        &[1u8; 32],
        &[2u8; 32],
        60,
    );
    assert_eq!(out.len(), 60);

    // Exporter is deterministic in its inputs and sensitive to random order.
    let again = prf_export_keying_material(
        &master,
        crate::EXTRACTOR_DTLS_SRTP.as_bytes(),
        &[1u8; 32],
        &[2u8; 32],
        60,
    );
    assert_eq!(out, again);
    let flipped = prf_export_keying_material(
        &master,
        crate::EXTRACTOR_DTLS_SRTP.as_bytes(),
        &[2u8; 32],
        &[1u8; 32],
        60,
    );
    assert_ne!(out, flipped);
}
