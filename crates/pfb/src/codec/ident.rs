//! Identifier codec for enum symbols.
//!
//! Avro restricts enum symbols (and named-type names) to `[A-Za-z_][A-Za-z0-9_]*`.
//! Dictionary enumerations routinely contain spaces, punctuation and non-ASCII
//! labels, so symbols are stored on disk in an escaped form:
//!
//! - a leading ASCII digit, and every character outside `[A-Za-z0-9]`, becomes
//!   `_` + lowercase hex code point + `_` (a space becomes `_20_`);
//! - the underscore itself is escaped (`_5f_`), which keeps `_` reserved as the
//!   delimiter and makes the mapping injective.
//!
//! Decoding replaces every `_<hex>_` run with its character and leaves anything
//! else untouched, so already-plain text decodes to itself.

use std::borrow::Cow;
use std::fmt::Write as _;

/// Escapes `text` into a symbol-safe token.
///
/// Returns the input unchanged (borrowed) when nothing needs escaping.
pub fn encode(text: &str) -> Cow<'_, str> {
    let needs_escape = text
        .chars()
        .enumerate()
        .any(|(i, c)| escapes(i, c));
    if !needs_escape {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 8);
    for (i, c) in text.chars().enumerate() {
        if escapes(i, c) {
            // Writing to a String cannot fail
            let _ = write!(out, "_{:x}_", c as u32);
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Reverses [`encode`].
///
/// Runs that are not valid hex code points are copied through verbatim.
pub fn decode(token: &str) -> Cow<'_, str> {
    if !token.contains('_') {
        return Cow::Borrowed(token);
    }

    let bytes = token.as_bytes();
    let mut out = String::with_capacity(token.len());
    let mut changed = false;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            if let Some((c, end)) = escaped_run(bytes, i) {
                out.push(c);
                changed = true;
                i = end;
                continue;
            }
        }
        // Copy one full character, which may span several bytes
        let c = token[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(c);
        i += c.len_utf8();
    }

    if changed { Cow::Owned(out) } else { Cow::Borrowed(token) }
}

fn escapes(position: usize, c: char) -> bool {
    !c.is_ascii_alphanumeric() || (position == 0 && c.is_ascii_digit())
}

/// Matches `_[a-z0-9]+_` starting at `start` and returns the decoded character
/// and the index just past the closing delimiter.
fn escaped_run(bytes: &[u8], start: usize) -> Option<(char, usize)> {
    let body_start = start + 1;
    let mut end = body_start;
    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end].is_ascii_lowercase()) {
        end += 1;
    }
    if end == body_start || end >= bytes.len() || bytes[end] != b'_' {
        return None;
    }
    let body = std::str::from_utf8(&bytes[body_start..end]).ok()?;
    if body.len() > 6 {
        return None;
    }
    let code = u32::from_str_radix(body, 16).ok()?;
    let c = char::from_u32(code)?;
    Some((c, end + 1))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_space_and_punctuation() {
        assert_eq!(encode("Not Reported"), "Not_20_Reported");
        assert_eq!(encode("a/b"), "a_2f_b");
        assert_eq!(encode("under_score"), "under_5f_score");
        assert_eq!(decode("Not_20_Reported"), "Not Reported");
        assert_eq!(decode("under_5f_score"), "under_score");
    }

    #[test]
    fn test_leading_digit() {
        assert_eq!(encode("1st"), "_31_st");
        assert_eq!(encode("a1"), "a1");
        assert_eq!(decode("_31_st"), "1st");
    }

    #[test]
    fn test_non_ascii() {
        assert_eq!(encode("é"), "_e9_");
        assert_eq!(encode("\u{1F600}"), "_1f600_");
        assert_eq!(decode("_1f600_"), "\u{1F600}");
    }

    #[test]
    fn test_empty() {
        assert_eq!(encode(""), "");
        assert_eq!(decode(""), "");
    }

    #[test]
    fn test_plain_text_borrows() {
        assert!(matches!(encode("Plain"), Cow::Borrowed(_)));
        assert!(matches!(decode("Plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_decode_leaves_non_runs() {
        assert_eq!(decode("a_b"), "a_b");
        assert_eq!(decode("a__b"), "a__b");
        assert_eq!(decode("_zz_"), "_zz_");
        assert_eq!(decode("_Ab_"), "_Ab_");
        // Surrogate code points are not characters
        assert_eq!(decode("_d800_"), "_d800_");
    }

    #[test]
    fn test_adjacent_runs() {
        assert_eq!(encode("  "), "_20__20_");
        assert_eq!(decode("_20__20_"), "  ");
    }

    proptest! {
        #[test]
        fn prop_roundtrip(s in "\\PC*") {
            let token = encode(&s);
            prop_assert_eq!(decode(&token), s.as_str());
        }

        #[test]
        fn prop_encoded_is_symbol_safe(s in "\\PC*") {
            let token = encode(&s);
            prop_assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            if let Some(first) = token.chars().next() {
                prop_assert!(!first.is_ascii_digit());
            }
        }

        #[test]
        fn prop_plain_decodes_to_itself(s in "[A-Za-z0-9]*") {
            prop_assert_eq!(decode(&s), s.as_str());
        }
    }
}
