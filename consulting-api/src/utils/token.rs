use rand::Rng;
use sha2::{Digest, Sha256};

/// 32 random bytes, hex encoded. Handed to the user once and never stored.
pub fn generate_random_token() -> String {
    let mut rng = rand::thread_rng();
    let token_bytes: [u8; 32] = rng.gen();
    hex::encode(token_bytes)
}

/// SHA-256 of a raw single-use token, hex encoded.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_are_unique_and_sized() {
        let a = generate_random_token();
        let b = generate_random_token();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_is_stable_and_not_the_raw_value() {
        let raw = "token_abc";
        assert_eq!(hash_token(raw), hash_token(raw));
        assert_ne!(hash_token(raw), raw);
        assert_ne!(hash_token(raw), hash_token("token_abd"));
    }
}
