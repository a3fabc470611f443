// Human-facing booking references: short enough to read out at the counter,
// unambiguous enough to copy off a phone screen.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

pub const PREFIX: &str = "LDR-";

/// 32 characters, no 0/O or 1/I lookalikes; 32^8 keeps collisions over the
/// shop's lifetime vanishingly unlikely without a central counter
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_LEN: usize = 8;

static REFERENCE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^LDR-[A-HJ-NP-Z2-9]{8}$").unwrap());

/// New random reference, e.g. `LDR-7XKQ2MNP`
pub fn generate() -> String {
    let mut rng = rand::thread_rng();
    let mut out = String::with_capacity(PREFIX.len() + REFERENCE_LEN);
    out.push_str(PREFIX);
    for _ in 0..REFERENCE_LEN {
        let idx = rng.gen_range(0..ALPHABET.len());
        out.push(ALPHABET[idx] as char);
    }
    out
}

/// Fallback for sessions whose metadata predates the reference field: the
/// last 8 characters of the provider session id, uppercased. Stable for a
/// given session, so repeated webhook deliveries agree on the key.
pub fn from_session_id(session_id: &str) -> String {
    let chars: Vec<char> = session_id.chars().collect();
    let start = chars.len().saturating_sub(REFERENCE_LEN);
    chars[start..].iter().collect::<String>().to_uppercase()
}

/// Shape check only; a well-formed reference says nothing about whether a
/// booking exists
pub fn is_valid(reference: &str) -> bool {
    REFERENCE_SHAPE.is_match(reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_references_match_the_shape() {
        for _ in 0..100 {
            let reference = generate();
            assert!(is_valid(&reference), "bad reference: {reference}");
        }
    }

    #[test]
    fn generated_references_avoid_ambiguous_characters() {
        for _ in 0..100 {
            let reference = generate();
            let suffix = &reference[PREFIX.len()..];
            assert!(
                !suffix.contains(['0', 'O', '1', 'I']),
                "ambiguous character in {reference}"
            );
        }
    }

    #[test]
    fn consecutive_references_differ() {
        let a = generate();
        let b = generate();
        // 1 in 32^8 flake odds, acceptable
        assert_ne!(a, b);
    }

    #[test]
    fn session_id_fallback_takes_last_eight_uppercased() {
        assert_eq!(from_session_id("cs_test_abc123xyz789"), "23XYZ789");
        assert_eq!(from_session_id("short"), "SHORT");
        assert_eq!(from_session_id(""), "");
    }

    #[test]
    fn shape_check_rejects_lookalikes_and_wrong_prefix() {
        assert!(is_valid("LDR-7XKQ2MNP"));
        assert!(!is_valid("LDR-7XKQ2MN0"));
        assert!(!is_valid("LDR-7XKQ2MNI"));
        assert!(!is_valid("XYZ-7XKQ2MNP"));
        assert!(!is_valid("LDR-7XKQ2MN"));
        assert!(!is_valid("LDR-7XKQ2MNPH"));
        assert!(!is_valid("ldr-7xkq2mnp"));
    }
}
