//! Unicode whitespace classification for the query scanner.
//!
//! The grammar treats any Zs separator (plus U+00A0) as token whitespace.
//! The parser scans raw UTF-8 bytes, so the classifier matches the encoded
//! byte patterns of the 17 recognized code points directly instead of
//! decoding every character it walks over.

/// Length in bytes of the whitespace code point starting at `pos`, or 0
/// if the position does not start one.
///
/// Recognizes exactly U+0020, U+00A0, U+1680, U+2000..U+200A, U+202F,
/// U+205F and U+3000. Positions at or past the end of input return 0.
pub fn space_len_at(input: &[u8], pos: usize) -> usize {
    let Some(rest) = input.get(pos..) else {
        return 0;
    };

    match rest {
        [0x20, ..] => 1,
        [0xC2, 0xA0, ..] => 2,
        [0xE1, 0x9A, 0x80, ..] => 3,
        [0xE2, 0x80, 0x80..=0x8A, ..] => 3,
        [0xE2, 0x80, 0xAF, ..] => 3,
        [0xE2, 0x81, 0x9F, ..] => 3,
        [0xE3, 0x80, 0x80, ..] => 3,
        _ => 0,
    }
}

/// Decoded-code-point overload, used when classifying metatag values.
pub fn is_space(c: char) -> bool {
    matches!(
        c,
        '\u{0020}'
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}'
    )
}
