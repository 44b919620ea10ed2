//! Dependency edges for targeted invalidation.
//!
//! An edge lives on the dependee's cache entry as the dependent's latest
//! request id. Invalidating the dependee marks those ids stale and consumes
//! them; removing an entry takes its edges with it.

use tracing::debug;

use crate::domain::RequestId;

use super::object_cache::ObjectCache;
use super::requests::RequestTable;

/// Record that `dependent` must be invalidated with `dependee`.
///
/// Only the dependent's most recent source request is recorded. Unknown
/// keys make this a no-op.
pub(crate) fn add(objects: &mut ObjectCache, dependent: &str, dependee: &str) -> bool {
    let Some(latest) = objects
        .entry(dependent)
        .and_then(|entry| entry.latest_request())
    else {
        debug!(dependent, dependee, "dependency ignored: dependent not cached");
        return false;
    };
    if objects.canonical_key(dependee).is_none() {
        debug!(dependent, dependee, "dependency ignored: dependee not cached");
        return false;
    }
    objects.add_dependent(dependee, latest);
    true
}

/// Mark the entry's source and dependent requests stale and consume its
/// edges. Returns the requests that went stale because of this call.
pub(crate) fn invalidate(
    objects: &mut ObjectCache,
    requests: &mut RequestTable,
    key: &str,
) -> Vec<RequestId> {
    objects
        .take_invalidation_targets(key)
        .unwrap_or_default()
        .into_iter()
        .filter(|id| requests.mark_stale(*id))
        .collect()
}

/// Drop the entry's dependent request ids without invalidating them.
pub(crate) fn remove_dependents(objects: &mut ObjectCache, key: &str) -> bool {
    objects.remove_dependents(key)
}
