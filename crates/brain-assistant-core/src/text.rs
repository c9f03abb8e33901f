//! Note text cleaning and content fingerprinting.
//!
//! Two pure transforms are applied to every scanned note:
//!
//! - [`clean_text`] strips markup noise before the text is embedded, and is
//!   applied again when a note is loaded as answer context, so the provider
//!   always sees the same text that was embedded.
//! - [`content_hash`] fingerprints the **raw** bytes. Change detection never
//!   depends on the cleaning transform, so editing [`STRIPPED_CHARS`] cannot
//!   make every note look modified.
//!
//! # Cleaning
//!
//! 1. Every literal two-character escape `\n` (backslash, `n`) becomes a space.
//! 2. Every character in [`STRIPPED_CHARS`] is removed.
//!
//! ```rust
//! use brain_assistant_core::text::clean_text;
//!
//! assert_eq!(clean_text("Title\\nSee [[other]]."), "Title See other");
//! ```

use sha2::{Digest, Sha256};

/// Version of the cleaning transform. Bump when [`STRIPPED_CHARS`] changes.
pub const CLEAN_TRANSFORM_VERSION: u32 = 1;

/// Characters removed by [`clean_text`].
pub const STRIPPED_CHARS: &[char] = &[
    '*', '#', '$', '%', '^', '&', '(', ')', '_', '+', '=', '[', ']', '{', '}', ';', '\'', ':',
    '"', '\\', '|', ',', '.', '<', '>', '/',
];

/// Remove markup punctuation and literal newline escapes from note text.
pub fn clean_text(raw: &str) -> String {
    raw.replace("\\n", " ")
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect()
}

/// SHA-256 hex digest of the raw file bytes.
pub fn content_hash(raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_markup() {
        assert_eq!(clean_text("**bold** _it_ `code`"), "bold it `code`");
        assert_eq!(clean_text("a, b. c; d: e"), "a b c d e");
        assert_eq!(clean_text("<div>x</div>"), "divxdiv");
    }

    #[test]
    fn test_clean_replaces_escaped_newlines() {
        assert_eq!(clean_text("line one\\nline two"), "line one line two");
    }

    #[test]
    fn test_clean_keeps_real_newlines() {
        assert_eq!(clean_text("one\ntwo"), "one\ntwo");
    }

    #[test]
    fn test_clean_keeps_unicode() {
        assert_eq!(clean_text("Grüße, 世界!"), "Grüße 世界!");
    }

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(content_hash(b"note"), content_hash(b"note"));
        assert_eq!(content_hash(b"note").len(), 64);
    }

    #[test]
    fn test_hash_sees_stripped_characters() {
        // The cleaned text is identical, the fingerprint is not.
        assert_eq!(clean_text("a#"), clean_text("a"));
        assert_ne!(content_hash(b"a#"), content_hash(b"a"));
    }
}
