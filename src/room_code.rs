//! Room code helpers.
//!
//! Room codes are short uppercase alphanumeric strings such as `AB12CD`. The
//! server has the final say on which codes exist; these helpers only generate
//! proposals and clean up user input.

use rand::seq::SliceRandom;

/// Length of generated room codes.
pub const ROOM_CODE_LEN: usize = 6;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate a random room code to propose with `create-room`.
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .filter_map(|_| ALPHABET.choose(&mut rng))
        .map(|&b| char::from(b))
        .collect()
}

/// Trim and uppercase a user-entered room code. Blank input yields `None`.
pub fn normalize(code: &str) -> Option<String> {
    let code = code.trim();
    (!code.is_empty()).then(|| code.to_ascii_uppercase())
}

/// Returns `true` if two room codes name the same room.
pub fn same_room(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_uppercase_alphanumeric() {
        for _ in 0..100 {
            let code = generate();
            assert_eq!(code.len(), ROOM_CODE_LEN);
            assert!(code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn normalize_trims_and_uppercases() {
        assert_eq!(normalize("  ab12cd "), Some("AB12CD".to_string()));
        assert_eq!(normalize("   "), None);
        assert_eq!(normalize(""), None);
    }

    #[test]
    fn same_room_ignores_case_and_padding() {
        assert!(same_room("AB12CD", " ab12cd"));
        assert!(!same_room("AB12CD", "AB12CE"));
    }
}
