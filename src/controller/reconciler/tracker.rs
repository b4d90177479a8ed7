//! # State Tracker
//!
//! Fingerprints a resource's generation together with the identity and version
//! of every object it depends on. A changed fingerprint forces an update even
//! when the resource's own generation has not moved (for example a rotated
//! credentials secret).

use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Characters without vowels or look-alikes, as used for generated names
const SAFE_ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";

/// Dependency kinds whose versions feed the fingerprint
const TRACKED_KINDS: [&str; 2] = ["Secret", "ConfigMap"];

/// An object a resource depends on but does not own
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    pub uid: String,
    pub resource_version: String,
}

impl DependencyRef {
    /// Capture the identity and current version of a live object
    pub fn from_resource<R>(obj: &R) -> Self
    where
        R: Resource<DynamicType = ()>,
    {
        Self {
            kind: R::kind(&()).into_owned(),
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
            uid: obj.uid().unwrap_or_default(),
            resource_version: obj.resource_version().unwrap_or_default(),
        }
    }

    fn is_tracked(&self) -> bool {
        TRACKED_KINDS.contains(&self.kind.as_str())
    }
}

/// Compute the fingerprint of `obj` and its dependencies
///
/// Deterministic for the same generation and dependency set, independent of
/// dependency order.
#[must_use]
pub fn compute_fingerprint<K: ResourceExt>(obj: &K, dependencies: &[DependencyRef]) -> String {
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    values.insert(
        "generation".to_string(),
        obj.meta().generation.unwrap_or_default().to_string(),
    );
    for dependency in dependencies.iter().filter(|d| d.is_tracked()) {
        values.insert(
            format!("{}/{}/{}", dependency.kind, dependency.namespace, dependency.name),
            format!("{}.{}", dependency.uid, dependency.resource_version),
        );
    }

    let mut hash = FNV_OFFSET_BASIS;
    for (key, value) in &values {
        hash = fnv1a(hash, key.as_bytes());
        hash = fnv1a(hash, value.as_bytes());
    }

    safe_encode(&hash.to_string())
}

fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn safe_encode(s: &str) -> String {
    s.bytes()
        .map(|b| char::from(SAFE_ALPHABET[usize::from(b) % SAFE_ALPHABET.len()]))
        .collect()
}
