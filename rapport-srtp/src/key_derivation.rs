use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use shared::error::{Error, Result};

pub const LABEL_SRTP_ENCRYPTION: u8 = 0x00;
pub const LABEL_SRTP_AUTHENTICATION_TAG: u8 = 0x01;
pub const LABEL_SRTP_SALT: u8 = 0x02;
pub const LABEL_SRTCP_ENCRYPTION: u8 = 0x03;
pub const LABEL_SRTCP_AUTHENTICATION_TAG: u8 = 0x04;
pub const LABEL_SRTCP_SALT: u8 = 0x05;

/// AES-CM key derivation (RFC 3711 Section 4.3.1 and 4.3.3).
///
/// With a zero key derivation rate the index term vanishes, so the PRF
/// input is the master salt with the label XOR'd at byte 7, and the last
/// two bytes count AES-CM blocks.
pub fn aes_cm_key_derivation(
    label: u8,
    master_key: &[u8],
    master_salt: &[u8],
    out_len: usize,
) -> Result<Vec<u8>> {
    if master_key.len() != 16 {
        return Err(Error::ErrShortSrtpMasterKey);
    }
    if master_salt.len() > 14 {
        return Err(Error::ErrShortSrtpMasterSalt);
    }

    let mut prf_in = [0u8; 16];
    prf_in[..master_salt.len()].copy_from_slice(master_salt);
    prf_in[7] ^= label;

    let cipher = Aes128::new_from_slice(master_key).map_err(|_| Error::ErrShortSrtpMasterKey)?;

    let mut out = Vec::with_capacity((out_len + 15) / 16 * 16);
    let mut i: u16 = 0;
    while out.len() < out_len {
        prf_in[14..16].copy_from_slice(&i.to_be_bytes());
        let mut block = GenericArray::clone_from_slice(&prf_in);
        cipher.encrypt_block(&mut block);
        out.extend_from_slice(&block);
        i += 1;
    }
    out.truncate(out_len);
    Ok(out)
}

/// The full set of session keys one direction needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKeys {
    pub srtp_session_key: Vec<u8>,
    pub srtp_session_salt: Vec<u8>,
    pub srtp_session_auth_key: Vec<u8>,
    pub srtcp_session_key: Vec<u8>,
    pub srtcp_session_salt: Vec<u8>,
    pub srtcp_session_auth_key: Vec<u8>,
}

pub fn derive_session_keys(
    master_key: &[u8],
    master_salt: &[u8],
    key_len: usize,
    salt_len: usize,
    auth_key_len: usize,
) -> Result<SessionKeys> {
    Ok(SessionKeys {
        srtp_session_key: aes_cm_key_derivation(
            LABEL_SRTP_ENCRYPTION,
            master_key,
            master_salt,
            key_len,
        )?,
        srtp_session_salt: aes_cm_key_derivation(
            LABEL_SRTP_SALT,
            master_key,
            master_salt,
            salt_len,
        )?,
        srtp_session_auth_key: aes_cm_key_derivation(
            LABEL_SRTP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            auth_key_len,
        )?,
        srtcp_session_key: aes_cm_key_derivation(
            LABEL_SRTCP_ENCRYPTION,
            master_key,
            master_salt,
            key_len,
        )?,
        srtcp_session_salt: aes_cm_key_derivation(
            LABEL_SRTCP_SALT,
            master_key,
            master_salt,
            salt_len,
        )?,
        srtcp_session_auth_key: aes_cm_key_derivation(
            LABEL_SRTCP_AUTHENTICATION_TAG,
            master_key,
            master_salt,
            auth_key_len,
        )?,
    })
}
