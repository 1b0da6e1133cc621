//! Canonical form of SQL text for cache lookups.

/// Normalizes a statement into its cache key.
///
/// Each line is trimmed, every run of whitespace (newlines included) becomes a
/// single space, and the result is lower-cased. Statements that differ only in
/// indentation, trailing blank lines, or letter case share a key.
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Returns true if both statements normalize to the same key.
pub fn same_statement(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}
