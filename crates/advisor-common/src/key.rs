//! Statistic key prefixing.
//!
//! Rule files name deployment-specific statistics with a `[]` placeholder
//! (e.g. `[]rocksdb.writes_per_sec`). The placeholder is replaced by the
//! caller-supplied prefix before any fetch or trigger check.

/// Placeholder marking a key that still needs the deployment prefix.
pub const KEY_PLACEHOLDER: &str = "[]";

/// Replaces a leading [`KEY_PLACEHOLDER`] with `prefix`.
///
/// Keys without the placeholder are returned unchanged, so applying the
/// substitution to an already prefixed key is a no-op.
///
/// # Examples
///
/// ```
/// use advisor_common::key::attach_prefix;
///
/// let once = attach_prefix("[]writes_per_sec", "svc.");
/// assert_eq!(once, "svc.writes_per_sec");
/// assert_eq!(attach_prefix(&once, "svc."), once);
/// ```
pub fn attach_prefix(key: &str, prefix: &str) -> String {
    match key.strip_prefix(KEY_PLACEHOLDER) {
        Some(rest) => format!("{prefix}{rest}"),
        None => key.to_string(),
    }
}

/// Applies [`attach_prefix`] to every key, keeping their order.
pub fn attach_prefix_all(keys: &[String], prefix: &str) -> Vec<String> {
    keys.iter().map(|k| attach_prefix(k, prefix)).collect()
}

pub fn has_placeholder(key: &str) -> bool {
    key.starts_with(KEY_PLACEHOLDER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_only_leading_placeholder() {
        assert_eq!(attach_prefix("[]a.b", "p:"), "p:a.b");
        assert_eq!(attach_prefix("a.[]b", "p:"), "a.[]b");
        assert_eq!(attach_prefix("plain", "p:"), "plain");
    }

    #[test]
    fn substitution_is_idempotent() {
        let keys = vec!["[]x".to_string(), "y".to_string()];
        let once = attach_prefix_all(&keys, "svc.");
        let twice = attach_prefix_all(&once, "svc.");
        assert_eq!(once, vec!["svc.x".to_string(), "y".to_string()]);
        assert_eq!(once, twice);
        assert!(!once.iter().any(|k| has_placeholder(k)));
    }
}
