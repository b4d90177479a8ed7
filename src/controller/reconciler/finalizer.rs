//! # Finalizers
//!
//! Ensures and removes the deletion-blocking markers on a managed resource.
//!
//! Both operations send the complete finalizer list as a JSON patch rather than a
//! merge, so markers owned by other controllers are never merged away or
//! duplicated by list-merge semantics.

use super::client::ResourceClient;
use crate::crd::StateObject;
use kube::ResourceExt;
use serde_json::json;
use tracing::debug;

/// Add any missing markers; no API call when all are present
///
/// Returns the patched object when a patch was sent.
///
/// # Errors
///
/// Returns the API error when the patch is rejected.
pub async fn ensure_finalizers<K: StateObject>(
    client: &dyn ResourceClient<K>,
    obj: &K,
    markers: &[&str],
) -> Result<Option<K>, kube::Error> {
    let current = obj.finalizers();
    let missing: Vec<&str> = markers
        .iter()
        .copied()
        .filter(|m| !current.iter().any(|f| f == m))
        .collect();

    if missing.is_empty() {
        return Ok(None);
    }

    let mut finalizers = current.to_vec();
    finalizers.extend(missing.iter().map(|m| (*m).to_string()));

    debug!(
        resource.name = %obj.name_any(),
        finalizers = ?missing,
        "Adding finalizers"
    );
    patch_finalizers(client, obj, finalizers).await.map(Some)
}

/// Remove the markers and write back the remaining list
///
/// # Errors
///
/// Returns the API error when the patch is rejected.
pub async fn unset_finalizers<K: StateObject>(
    client: &dyn ResourceClient<K>,
    obj: &K,
    markers: &[&str],
) -> Result<(), kube::Error> {
    let finalizers: Vec<String> = obj
        .finalizers()
        .iter()
        .filter(|f| !markers.contains(&f.as_str()))
        .cloned()
        .collect();

    debug!(
        resource.name = %obj.name_any(),
        finalizers = ?markers,
        "Removing finalizers"
    );
    patch_finalizers(client, obj, finalizers).await.map(|_| ())
}

async fn patch_finalizers<K: StateObject>(
    client: &dyn ResourceClient<K>,
    obj: &K,
    finalizers: Vec<String>,
) -> Result<K, kube::Error> {
    let patch = finalizers_patch(obj.meta().finalizers.is_some(), finalizers)?;
    client
        .json_patch(
            &obj.namespace().unwrap_or_default(),
            &obj.name_any(),
            patch,
        )
        .await
}

/// `replace` requires the target to exist; `add` on an object member sets it
fn finalizers_patch(
    list_exists: bool,
    finalizers: Vec<String>,
) -> Result<json_patch::Patch, kube::Error> {
    let op = if list_exists { "replace" } else { "add" };
    serde_json::from_value(json!([{
        "op": op,
        "path": "/metadata/finalizers",
        "value": finalizers,
    }]))
    .map_err(kube::Error::SerdeError)
}
