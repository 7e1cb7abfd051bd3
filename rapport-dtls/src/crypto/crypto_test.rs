use super::*;

#[test]
fn test_generate_self_signed_identity() {
    let identity = DtlsIdentity::generate_self_signed("rapport").unwrap();
    assert!(!identity.certificate_der.is_empty());

    // Fingerprint is colon-separated SHA-256: 32 bytes, 95 chars.
    let fp = identity.fingerprint();
    assert_eq!(fp.len(), 32 * 3 - 1);
    assert_eq!(fp.split(':').count(), 32);
    assert!(fp
        .split(':')
        .all(|pair| pair.len() == 2 && pair.chars().all(|c| c.is_ascii_hexdigit())));
}

#[test]
fn test_fingerprint_changes_with_certificate() {
    let a = DtlsIdentity::generate_self_signed("a").unwrap();
    let b = DtlsIdentity::generate_self_signed("b").unwrap();
    assert_ne!(a.fingerprint(), b.fingerprint());

    let mut tampered = a.certificate_der.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    assert_ne!(a.fingerprint(), fingerprint_of(&tampered));
}

#[test]
fn test_fingerprints_match_ignores_case() {
    let identity = DtlsIdentity::generate_self_signed("rapport").unwrap();
    let fp = identity.fingerprint();
    assert!(fingerprints_match(&fp, &fp.to_lowercase()));
    assert!(!fingerprints_match(&fp, "AA:BB"));
}

#[test]
fn test_sign_and_verify_with_certificate_spki() {
    let identity = DtlsIdentity::generate_self_signed("rapport").unwrap();
    let message = b"client_random server_random params";
    let signature = identity.sign(message);

    verify_signature(&identity.certificate_der, message, &signature).unwrap();
    assert!(verify_signature(&identity.certificate_der, b"other message", &signature).is_err());

    let other = DtlsIdentity::generate_self_signed("other").unwrap();
    assert!(verify_signature(&other.certificate_der, message, &signature).is_err());
}
