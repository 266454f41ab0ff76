//! # Name Normalisation and Search Patterns
//!
//! Name lookups are case-insensitive and whitespace-tolerant:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  getByName("ParaCeTamoL")                                               │
//! │       │                                                                 │
//! │       ├── 1. exact match on normalize_upper → "PARACETAMOL"            │
//! │       │                                                                 │
//! │       └── 2. none? fall back to the compressed pattern                 │
//! │              "para cet" ──► "%p%a%r%a%c%e%t%"                           │
//! │              (any name containing those characters in order)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Patterns are meant for `LIKE ? ESCAPE '\'`; literal `%`, `_` and `\` in the
//! input are escaped.

/// Escape character paired with every pattern produced here.
pub const LIKE_ESCAPE: char = '\\';

/// Compresses a search string into a `%c%c%…%` LIKE pattern, skipping
/// whitespace.
///
/// ## Example
/// ```rust
/// use pharma_core::search::search_pattern;
///
/// assert_eq!(search_pattern("para cet"), "%p%a%r%a%c%e%t%");
/// assert_eq!(search_pattern("   "), "%");
/// assert_eq!(search_pattern("10%"), "%1%0%\\%%");
/// ```
pub fn search_pattern(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() * 2 + 1);
    pattern.push('%');
    for ch in input.chars().filter(|c| !c.is_whitespace()) {
        if matches!(ch, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(ch);
        pattern.push('%');
    }
    pattern
}

/// Trims and collapses runs of whitespace to a single space.
pub fn normalize_name(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalised upper-case form (medicine names, units, payment methods).
pub fn normalize_upper(input: &str) -> String {
    normalize_name(input).to_uppercase()
}

// =============================================================================
// Unit Tests
// =============================================================================
