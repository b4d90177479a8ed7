//! # Utilities
//!
//! JSON-Pointer helpers for building patch paths and reading resource identity.

use kube::ResourceExt;

/// Escape one JSON-Pointer reference token (RFC 6901)
///
/// `~` must be escaped before `/` so that a literal `~1` in the input is not
/// mistaken for an escaped slash.
#[must_use]
pub fn escape_json_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// JSON-Pointer path of one annotation
#[must_use]
pub fn annotation_path(key: &str) -> String {
    format!("/metadata/annotations/{}", escape_json_pointer(key))
}

/// `namespace/name` key used in logs and backoff bookkeeping
#[must_use]
pub fn resource_key<K: ResourceExt>(obj: &K) -> String {
    format!(
        "{}/{}",
        obj.namespace().unwrap_or_default(),
        obj.name_any()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_json_pointer() {
        assert_eq!(escape_json_pointer("plain"), "plain");
        assert_eq!(
            escape_json_pointer("dbaas.microscaler.io/state-tracker"),
            "dbaas.microscaler.io~1state-tracker"
        );
        assert_eq!(escape_json_pointer("a~b"), "a~0b");
        assert_eq!(escape_json_pointer("~1"), "~01");
        assert_eq!(escape_json_pointer("a/~/b"), "a~1~0~1b");
    }

    #[test]
    fn test_annotation_path() {
        assert_eq!(
            annotation_path("dbaas.microscaler.io/reapply-timestamp"),
            "/metadata/annotations/dbaas.microscaler.io~1reapply-timestamp"
        );
    }
}
