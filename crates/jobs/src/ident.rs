//! Postgres identifier checks.
//!
//! Schema and table names come from the control-plane store and end up in
//! SQL text, so only plain lowercase identifiers are accepted.

const MAX_IDENTIFIER_LEN: usize = 63;

/// `[a-z_][a-z0-9_]*`, at most 63 bytes.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// `schema.table` or `table`, each part a plain identifier.
pub fn is_plain_qualified_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2 && parts.iter().all(|p| is_plain_identifier(p))
}
