//! Short, URL-safe identifiers.

use rand::Rng;

/// 57-character alphabet excluding visually ambiguous glyphs
/// (0/O, 1/l/I).
const SHORT_ID_CHARS: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random short id of the given length, drawn uniformly from
/// the alphabet. `thread_rng` is a CSPRNG, so ids are unguessable.
pub fn short_id(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| SHORT_ID_CHARS[rng.gen_range(0..SHORT_ID_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphabet_has_57_distinct_chars() {
        let mut chars: Vec<u8> = SHORT_ID_CHARS.to_vec();
        chars.sort_unstable();
        chars.dedup();
        assert_eq!(chars.len(), 57);
        for ambiguous in [b'0', b'O', b'1', b'l', b'I'] {
            assert!(!chars.contains(&ambiguous));
        }
    }

    #[test]
    fn generates_requested_length_from_alphabet() {
        for len in [6, 12] {
            let id = short_id(len);
            assert_eq!(id.len(), len);
            assert!(id.bytes().all(|b| SHORT_ID_CHARS.contains(&b)));
        }
    }

    #[test]
    fn consecutive_ids_differ() {
        // Collision probability at 12 chars is negligible; equal ids would
        // mean the RNG is broken.
        assert_ne!(short_id(12), short_id(12));
    }
}
