//! Callback shared-secret check

/// Compare a presented secret with the configured one
///
/// Runs in time independent of where the first differing byte is, so response
/// timing does not reveal a prefix of the secret.
pub fn secret_matches(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}
