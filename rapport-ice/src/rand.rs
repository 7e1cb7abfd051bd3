use shared::util::generate_rand_string;

/// RFC 8445 Section 5.3: the ufrag carries at least 24 bits of randomness,
/// the password at least 128 bits.
pub fn generate_ufrag() -> String {
    generate_rand_string(4)
}

pub fn generate_pwd() -> String {
    generate_rand_string(22)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_lengths() {
        assert_eq!(generate_ufrag().len(), 4);
        assert_eq!(generate_pwd().len(), 22);
    }

    #[test]
    fn test_credentials_are_random() {
        assert_ne!(generate_pwd(), generate_pwd());
    }
}
