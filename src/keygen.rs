//! License key generation.
//!
//! Keys are the long-lived credential a customer types into the installer,
//! so they come from the OS CSPRNG with 96 bits of entropy, formatted as
//! transcribable uppercase hex groups: `CSPLINE-XXXXXXXX-XXXXXXXX-XXXXXXXX`.
//!
//! The store's UNIQUE constraint on `key_string` is the last line of defense
//! against collisions; an insert conflict is retryable (regenerate), not
//! fatal. See `db::queries::create_license_keys`.

use rand::rngs::OsRng;
use rand::RngCore;

/// Brand prefix carried by every license key.
pub const KEY_PREFIX: &str = "CSPLINE";

/// Number of random bytes per key (3 groups x 4 bytes = 96 bits).
const KEY_ENTROPY_BYTES: usize = 12;

/// Generate a new license key string.
pub fn generate_license_key() -> String {
    let mut bytes = [0u8; KEY_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);

    format!(
        "{}-{}-{}-{}",
        KEY_PREFIX,
        hex::encode_upper(&bytes[0..4]),
        hex::encode_upper(&bytes[4..8]),
        hex::encode_upper(&bytes[8..12]),
    )
}

/// Cheap format check to reject garbage before hitting the database.
///
/// Validates `CSPLINE-{8 hex}-{8 hex}-{8 hex}` with uppercase hex digits.
pub fn is_valid_key_format(s: &str) -> bool {
    let mut parts = s.split('-');

    if parts.next() != Some(KEY_PREFIX) {
        return false;
    }

    let groups: Vec<&str> = parts.collect();
    groups.len() == 3
        && groups.iter().all(|g| {
            g.len() == 8
                && g.chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        let key = generate_license_key();
        // CSPLINE- (8) + 3 groups of 8 + 2 inner dashes = 34 chars
        assert_eq!(key.len(), 34, "unexpected key length: {}", key);
        assert!(key.starts_with("CSPLINE-"), "key should carry the brand prefix");
        assert!(is_valid_key_format(&key), "generated key should pass format check");
    }

    #[test]
    fn test_keys_are_unique() {
        let a = generate_license_key();
        let b = generate_license_key();
        assert_ne!(a, b, "two generated keys should never collide in practice");
    }

    #[test]
    fn test_is_valid_key_format() {
        assert!(is_valid_key_format("CSPLINE-00000000-FFFFFFFF-A1B2C3D4"));

        assert!(!is_valid_key_format(""));
        assert!(!is_valid_key_format("CSPLINE-0000-FFFF-A1B2")); // groups too short
        assert!(!is_valid_key_format("CSPLINE-00000000-FFFFFFFF")); // missing group
        assert!(!is_valid_key_format("OTHER-00000000-FFFFFFFF-A1B2C3D4")); // wrong prefix
        assert!(!is_valid_key_format("CSPLINE-0000000g-FFFFFFFF-A1B2C3D4")); // non-hex
        assert!(!is_valid_key_format("CSPLINE-a1b2c3d4-FFFFFFFF-A1B2C3D4")); // lowercase
    }
}
