//! Deterministic text canonicalization.
//!
//! `normalize` produces the Layer 1 lookup key. `slugify` produces the
//! URL-safe slug stored on canonical tags.

use crate::error::{Result, TagError};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Maximum tag length in characters, after trimming.
pub const MAX_TAG_CHARS: usize = 100;

/// Slugs leave room for a collision suffix such as `-1234`.
pub const MAX_SLUG_CHARS: usize = 95;

const SLUG_FALLBACK: &str = "tag";

fn is_zero_width(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

/// Canonical lookup key for a tag text.
///
/// NFKC folds precomposed/decomposed diacritics and compatibility forms
/// (full-width letters, ligatures) into one representation. Diacritics are
/// kept: "tiền" and "tien" are different words.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfkc()
        .filter(|c| !is_zero_width(*c))
        .collect::<String>()
        .to_lowercase();

    folded
        .nfkc()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check a user-supplied tag text and return it trimmed.
pub fn validate_tag_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || normalize(trimmed).is_empty() {
        return Err(TagError::InvalidInput("tag text cannot be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_TAG_CHARS {
        return Err(TagError::InvalidInput(format!(
            "tag text exceeds {} characters",
            MAX_TAG_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// URL-safe slug: "Money & Finance" -> "money-finance", "Tiền tệ" -> "tien-te".
///
/// Scripts with no Latin decomposition (CJK, Thai, ...) fall back to "tag";
/// the store appends a numeric suffix on collision.
pub fn slugify(display_name: &str) -> String {
    let mut slug = String::with_capacity(display_name.len());
    let mut pending_dash = false;

    for c in display_name.nfkd().filter(|c| !is_combining_mark(*c)) {
        let c = match c {
            'đ' | 'Đ' => 'd',
            other => other,
        };
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.len() > MAX_SLUG_CHARS {
        slug.truncate(MAX_SLUG_CHARS);
        while slug.ends_with('-') {
            slug.pop();
        }
    }

    if slug.is_empty() {
        SLUG_FALLBACK.to_string()
    } else {
        slug
    }
}
