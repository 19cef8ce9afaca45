//! Storage name generation.

use rand::Rng;

/// Random bytes per token (produces 24 hex characters).
pub const TOKEN_BYTES: usize = 12;

/// Generates a CSPRNG token as a 24-character lowercase hex string.
///
/// No collision check is made; 96 random bits are assumed sufficient.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_token_length() {
        assert_eq!(generate_token().len(), 2 * TOKEN_BYTES);
    }

    #[test]
    fn generated_token_is_lowercase_hex() {
        let token = generate_token();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }

    #[test]
    fn tokens_are_unique() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn tokens_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..100).map(|_| generate_token()).collect::<Vec<_>>()))
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(all.insert(token));
            }
        }
        assert_eq!(all.len(), 800);
    }
}
