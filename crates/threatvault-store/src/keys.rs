//! Storage key validation.
//!
//! Keys are `/`-separated relative paths such as
//! `<namespace>/<model>/history/<entry>`. Prefixes are either empty (the whole
//! store) or a key followed by a trailing `/`.

use crate::error::{Result, StoreError};

/// Separator between key components.
pub const SEPARATOR: char = '/';

/// Check a single key component.
fn validate_component(component: &str, whole: &str) -> Result<()> {
    let bad = component.is_empty()
        || component == "."
        || component == ".."
        || component.contains('\\')
        || component.chars().any(|c| c.is_control());
    if bad {
        return Err(StoreError::InvalidKey(whole.to_string()));
    }
    Ok(())
}

/// Validate a full key.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with(SEPARATOR) || key.ends_with(SEPARATOR) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    key.split(SEPARATOR)
        .try_for_each(|component| validate_component(component, key))
}

/// Validate a listing / deletion prefix.
pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Ok(());
    }
    match prefix.strip_suffix(SEPARATOR) {
        Some(stem) => validate_key(stem).map_err(|_| StoreError::InvalidKey(prefix.to_string())),
        None => Err(StoreError::InvalidKey(prefix.to_string())),
    }
}

/// Join key components with the separator.
pub fn join(components: &[&str]) -> String {
    components.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys() {
        assert!(validate_key("a").is_ok());
        assert!(validate_key("ns/model/document").is_ok());
        assert!(validate_key("ns/model/history/2024-01-01 10:00:00.000000 Model Import.backup").is_ok());
        assert!(validate_key("ns/.tenant").is_ok());
    }

    #[test]
    fn test_traversal_rejected() {
        assert!(validate_key("").is_err());
        assert!(validate_key("/abs").is_err());
        assert!(validate_key("trailing/").is_err());
        assert!(validate_key("a//b").is_err());
        assert!(validate_key("a/../b").is_err());
        assert!(validate_key("./a").is_err());
        assert!(validate_key("a\\b").is_err());
        assert!(validate_key("a/b\nc").is_err());
    }

    proptest::proptest! {
        #[test]
        fn test_joined_components_validate(
            parts in proptest::collection::vec("[a-zA-Z0-9 _-][a-zA-Z0-9 ._-]{0,15}", 1..5)
        ) {
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            let key = join(&refs);
            proptest::prop_assert!(validate_key(&key).is_ok());
            let prefix = format!("{}/", key);
            proptest::prop_assert!(validate_prefix(&prefix).is_ok());
        }
    }

    #[test]
    fn test_prefixes() {
        assert!(validate_prefix("").is_ok());
        assert!(validate_prefix("ns/").is_ok());
        assert!(validate_prefix("ns/model/history/").is_ok());
        assert!(validate_prefix("ns").is_err());
        assert!(validate_prefix("/").is_err());
        assert!(validate_prefix("../").is_err());
    }
}
