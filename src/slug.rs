//! Slug derivation for categories, tags and places.

use regex::Regex;

lazy_static::lazy_static! {
    /// Lowercase letters and digits, separated by single hyphens or underscores.
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:[-_][a-z0-9]+)*$").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
}

/// Leaves room for a `-N` suffix inside the 255-character slug columns.
const MAX_BASE_LEN: usize = 240;

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// Normalizes `name` into a URL-safe token: ASCII letters, digits, `_` and
/// `-` are kept (lowercased), everything else is dropped, whitespace and hyphen
/// runs collapse into one `-`. Falls back to `fallback` when nothing is left.
pub fn slugify(name: &str, fallback: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let slug = SEPARATORS.replace_all(kept.trim(), "-");
    let mut slug = slug.trim_matches(|c: char| c == '-' || c == '_');
    if slug.len() > MAX_BASE_LEN {
        slug = slug[..MAX_BASE_LEN].trim_end_matches(|c: char| c == '-' || c == '_');
    }
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug.to_string()
    }
}

/// First free candidate among `base`, `base-2`, `base-3`, ...
pub fn disambiguate(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (2u64..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
