//! Namespacing primitives shared by the isolation transforms.
//!
//! Two different rules are in play and both are load-bearing:
//!
//! - [`splice`] keeps the first character, then inserts `{id}-`, then the
//!   remainder starting at character 1. Stylesheet selectors and script query
//!   strings use it (`.box` + `ab` -> `.ab-box`), so a selector for a
//!   class lines up with the markup class [`prefix`] produces.
//! - [`prefix`] namespaces a whole token as `{id}-{token}`. Markup class and id
//!   attributes use it (`box` + `ab` -> `ab-box`).

/// Positional splice after the first character.
pub fn splice(target: &str, id: &str) -> String {
    let mut chars = target.chars();
    match chars.next() {
        Some(first) => format!("{}{}-{}", first, id, chars.as_str()),
        None => String::new(),
    }
}

/// Whole-token prefix.
pub fn prefix(token: &str, id: &str) -> String {
    format!("{}-{}", id, token)
}
