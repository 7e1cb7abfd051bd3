use rand::{thread_rng, Rng};

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RUNES_CANDIDATE_ID: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890+/";

/// Generates a random alphanumeric string of length `n`.
pub fn generate_rand_string(n: usize) -> String {
    let mut rng = thread_rng();
    (0..n)
        .map(|_| RUNES_ALPHA[rng.gen_range(0..RUNES_ALPHA.len())] as char)
        .collect()
}

/// Generates a candidate id of the form "candidate:<base64ish>".
pub fn generate_cand_id() -> String {
    let mut rng = thread_rng();
    let s: String = (0..32)
        .map(|_| RUNES_CANDIDATE_ID[rng.gen_range(0..RUNES_CANDIDATE_ID.len())] as char)
        .collect();
    format!("candidate:{s}")
}

/// Generates a cryptographically random u64 tie-breaker.
pub fn generate_tie_breaker() -> u64 {
    thread_rng().gen::<u64>()
}
