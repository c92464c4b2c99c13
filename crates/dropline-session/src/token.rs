//! Capability token generation.

use rand::Rng;

/// Generates a random 32-character lowercase hex string (128 bits).
///
/// Hex only uses `[0-9a-f]`, so tokens can be dropped into invite URLs
/// without escaping. `rand::rng()` is a CSPRNG seeded from the OS.
pub(crate) fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_is_32_hex_chars() {
        let token = generate_token();
        assert_eq!(token.len(), 32);
        assert!(token.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(token, token.to_lowercase());
    }

    #[test]
    fn test_generate_token_differs_between_calls() {
        assert_ne!(generate_token(), generate_token());
    }
}
