#[cfg(test)]
mod prf_test;

use ring::hmac;
use shared::error::Result;

pub const MASTER_SECRET_LENGTH: usize = 48;
pub const VERIFY_DATA_LENGTH: usize = 12;

const MASTER_SECRET_LABEL: &[u8] = b"master secret";
const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";
const CLIENT_FINISHED_LABEL: &[u8] = b"client finished";
const SERVER_FINISHED_LABEL: &[u8] = b"server finished";

/// TLS 1.2 PRF: P_SHA256(secret, label + seed) (RFC 5246 Section 5).
pub fn prf_p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);

    let mut out = Vec::with_capacity(requested_length);
    // A(0) = seed, A(i) = HMAC(secret, A(i-1)).
    let mut a = hmac::sign(&key, seed).as_ref().to_vec();
    while out.len() < requested_length {
        let mut ctx = hmac::Context::with_key(&key);
        ctx.update(&a);
        ctx.update(seed);
        out.extend_from_slice(ctx.sign().as_ref());
        a = hmac::sign(&key, &a).as_ref().to_vec();
    }
    out.truncate(requested_length);
    out
}

fn prf(secret: &[u8], label: &[u8], seed: &[u8], requested_length: usize) -> Vec<u8> {
    let mut label_seed = label.to_vec();
    label_seed.extend_from_slice(seed);
    prf_p_hash(secret, &label_seed, requested_length)
}

/// master_secret = PRF(pre_master, "master secret",
/// client_random + server_random)[0..48].
pub fn prf_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Vec<u8> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    prf(
        pre_master_secret,
        MASTER_SECRET_LABEL,
        &seed,
        MASTER_SECRET_LENGTH,
    )
}

/// Key material for both directions, carved out of
/// PRF(master, "key expansion", server_random + client_random).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKeys {
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

pub fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    key_len: usize,
    iv_len: usize,
) -> EncryptionKeys {
    let mut seed = server_random.to_vec();
    seed.extend_from_slice(client_random);
    let material = prf(
        master_secret,
        KEY_EXPANSION_LABEL,
        &seed,
        2 * key_len + 2 * iv_len,
    );

    let mut offset = 0;
    let client_write_key = material[offset..offset + key_len].to_vec();
    offset += key_len;
    let server_write_key = material[offset..offset + key_len].to_vec();
    offset += key_len;
    let client_write_iv = material[offset..offset + iv_len].to_vec();
    offset += iv_len;
    let server_write_iv = material[offset..offset + iv_len].to_vec();

    EncryptionKeys {
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    }
}

/// Finished verify_data = PRF(master, label, SHA256(transcript))[0..12].
pub fn prf_verify_data(
    master_secret: &[u8],
    handshake_transcript: &[u8],
    is_client: bool,
) -> Result<Vec<u8>> {
    let digest = ring::digest::digest(&ring::digest::SHA256, handshake_transcript);
    let label = if is_client {
        CLIENT_FINISHED_LABEL
    } else {
        SERVER_FINISHED_LABEL
    };
    Ok(prf(
        master_secret,
        label,
        digest.as_ref(),
        VERIFY_DATA_LENGTH,
    ))
}

/// RFC 5705 keying material exporter with an empty context.
pub fn prf_export_keying_material(
    master_secret: &[u8],
    label: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    length: usize,
) -> Vec<u8> {
    let mut seed = client_random.to_vec();
    seed.extend_from_slice(server_random);
    prf(master_secret, label, &seed, length)
}
