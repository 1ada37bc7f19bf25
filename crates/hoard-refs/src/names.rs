//! Ref name validation following git-style conventions.
//!
//! A short (branch) name must be non-empty, must not contain whitespace or
//! any of `~ ^ : ? * [ \`, must not contain `..` or `@{`, must not start or
//! end with `/` or `.`, must not end with `.lock`, and every `/`-separated
//! component must be non-empty and must not start with `.`.

use crate::error::{RefError, Result};

const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

const FORBIDDEN_SEQUENCES: &[(&str, &str)] = &[
    ("..", "must not contain '..'"),
    ("@{", "must not contain '@{'"),
    ("//", "must not contain consecutive slashes"),
];

fn invalid(name: &str, reason: impl Into<String>) -> RefError {
    RefError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a short branch name such as `main` or `hosts/laptop`.
///
/// ```
/// use hoard_refs::names::validate_branch_name;
///
/// assert!(validate_branch_name("main").is_ok());
/// assert!(validate_branch_name("hosts/laptop").is_ok());
/// assert!(validate_branch_name("").is_err());
/// assert!(validate_branch_name("bad..name").is_err());
/// ```
pub fn validate_branch_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "must not be empty"));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(invalid(name, format!("contains forbidden character {ch:?}")));
    }
    for (seq, reason) in FORBIDDEN_SEQUENCES {
        if name.contains(seq) {
            return Err(invalid(name, *reason));
        }
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Err(invalid(name, "must not start or end with '/'"));
    }
    if name.ends_with('.') {
        return Err(invalid(name, "must not end with '.'"));
    }
    if name.ends_with(".lock") {
        return Err(invalid(name, "must not end with '.lock'"));
    }
    if let Some(component) = name.split('/').find(|c| c.starts_with('.')) {
        return Err(invalid(
            name,
            format!("component must not start with '.': {component:?}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_and_nested_names() {
        for name in ["main", "laptop-home", "v1.0", "hosts/laptop", "a/b/c-1"] {
            assert!(validate_branch_name(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn rejects_empty() {
        assert!(validate_branch_name("").is_err());
    }

    #[test]
    fn rejects_forbidden_characters() {
        for name in ["has space", "tab\there", "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a\\b"] {
            assert!(validate_branch_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn rejects_forbidden_sequences() {
        assert!(validate_branch_name("bad..name").is_err());
        assert!(validate_branch_name("ref@{0}").is_err());
        assert!(validate_branch_name("a//b").is_err());
    }

    #[test]
    fn rejects_bad_boundaries() {
        for name in ["/leading", "trailing/", ".hidden", "trailing.", "main.lock", "x/.y"] {
            assert!(validate_branch_name(name).is_err(), "{name}");
        }
    }

    #[test]
    fn error_carries_reason() {
        let err = validate_branch_name("main.lock").unwrap_err();
        assert!(err.to_string().contains(".lock"));
    }
}
