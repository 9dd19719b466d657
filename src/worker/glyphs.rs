//! Glyph coverage heuristic.
//!
//! The base font set covers Latin, Greek, Cyrillic and common punctuation.
//! Characters in the ranges below need the extended set.

use std::ops::RangeInclusive;

/// Code point ranges the base font set does not cover.
const EXTENDED_RANGES: &[RangeInclusive<u32>] = &[
    // Miscellaneous Symbols, Dingbats
    0x2600..=0x27BF,
    // Miscellaneous Symbols and Arrows
    0x2B00..=0x2BFF,
    // CJK radicals, punctuation, kana, unified ideographs
    0x2E80..=0x9FFF,
    // Hangul syllables
    0xAC00..=0xD7AF,
    // Variation selectors (emoji presentation)
    0xFE00..=0xFE0F,
    // CJK compatibility forms, fullwidth forms
    0xFE30..=0xFFEF,
    // Supplementary planes: emoji, historic scripts, math alphanumerics...
    0x1_0000..=0x10_FFFF,
];

/// Whether `text` contains a character outside base font coverage.
pub fn needs_extended_glyphs(text: &str) -> bool {
    text.chars().any(is_extended)
}

fn is_extended(c: char) -> bool {
    let cp = c as u32;
    // Fast path for the overwhelmingly common case.
    if cp < 0x2600 {
        return false;
    }
    EXTENDED_RANGES.iter().any(|range| range.contains(&cp))
}
