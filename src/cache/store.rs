//! Single-writer cache store.
//!
//! Every mutation goes through [`CacheStore::dispatch`], which applies one
//! [`CacheAction`] under the write lock and then bumps a version counter that
//! subscribers watch. Reads take the read lock for the duration of a closure
//! and never wait on the network.

use std::sync::RwLock;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::{RequestId, Resource};

use super::actions::{CacheAction, DispatchOutcome};
use super::config::CacheConfig;
use super::deps;
use super::error::CacheError;
use super::lock;
use super::object_cache::ObjectCache;
use super::requests::{RequestRecord, RequestTable};

const SOURCE: &str = "cache::store";

/// Everything the store owns. Only reachable mutably through `dispatch`.
/// Dependency edges live on the object cache entries.
pub struct CacheState {
    pub objects: ObjectCache,
    pub requests: RequestTable,
}

impl CacheState {
    fn new(config: &CacheConfig) -> Self {
        Self {
            objects: ObjectCache::new(config.object_limit_non_zero()),
            requests: RequestTable::new(),
        }
    }

    /// Drop request records nothing can reach any more.
    fn prune_requests(&mut self) {
        let pinned = self.objects.pinned_requests();
        let dropped = self.requests.prune(&pinned);
        if !dropped.is_empty() {
            self.objects.forget_requests(&dropped);
            debug!(dropped = dropped.len(), kept = self.requests.len(), "request records pruned");
        }
    }

    fn apply(&mut self, action: CacheAction) -> DispatchOutcome {
        match action {
            CacheAction::Put {
                resource,
                request_id,
                time_to_live_ms,
                fetched_at,
                alternative_key,
            } => self
                .objects
                .put(
                    &resource,
                    request_id,
                    time_to_live_ms,
                    fetched_at,
                    alternative_key.as_deref(),
                )
                .is_some()
                .into(),
            CacheAction::Remove { key } => self.objects.remove(&key).is_some().into(),
            CacheAction::AddPatch { key, operations } => {
                match self.objects.add_patch(&key, operations) {
                    Some((key, seq)) => DispatchOutcome::Patched { key, seq },
                    None => DispatchOutcome::Ignored,
                }
            }
            CacheAction::ConfirmPatch { key, seq } => self.objects.confirm_patch(&key, seq).into(),
            CacheAction::AddDependency {
                dependent,
                dependee,
            } => deps::add(&mut self.objects, &dependent, &dependee).into(),
            CacheAction::RemoveDependents { key } => {
                deps::remove_dependents(&mut self.objects, &key).into()
            }
            CacheAction::Invalidate { key } => {
                let marked = deps::invalidate(&mut self.objects, &mut self.requests, &key);
                info!(key = %key, marked = marked.len(), "cache entry invalidated");
                if marked.is_empty() {
                    DispatchOutcome::Ignored
                } else {
                    DispatchOutcome::MarkedStale(marked)
                }
            }
            CacheAction::ConfigureRequest(record) => {
                self.requests.configure(record);
                self.prune_requests();
                DispatchOutcome::Applied
            }
            CacheAction::RequestDispatched { id, at } => self.requests.dispatched(id, at).into(),
            CacheAction::RequestSucceeded {
                id,
                payload,
                status_code,
                completed_at,
            } => self
                .requests
                .succeed(id, payload, status_code, completed_at)
                .into(),
            CacheAction::RequestFailed {
                id,
                status_code,
                message,
                completed_at,
            } => self
                .requests
                .fail(id, status_code, message, completed_at)
                .into(),
            CacheAction::MarkRequestStale { id } => {
                if self.requests.mark_stale(id) {
                    DispatchOutcome::MarkedStale(vec![id])
                } else {
                    DispatchOutcome::Ignored
                }
            }
            CacheAction::Batch(actions) => actions
                .into_iter()
                .fold(false, |changed, action| self.apply(action).changed() || changed)
                .into(),
        }
    }
}

pub struct CacheStore {
    state: RwLock<CacheState>,
    version: watch::Sender<u64>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(CacheState::new(config)),
            version,
        }
    }

    /// Apply one mutation. Subscribers are notified when something changed.
    pub fn dispatch(&self, action: CacheAction) -> DispatchOutcome {
        let name = action.name();
        let outcome = lock::write(&self.state, SOURCE, name).apply(action);
        debug!(action = name, outcome = ?outcome, "cache action dispatched");
        if outcome.changed() {
            self.version.send_modify(|version| *version += 1);
        }
        outcome
    }

    /// Run `f` against a consistent snapshot of the store.
    pub fn read<R>(&self, f: impl FnOnce(&CacheState) -> R) -> R {
        f(&lock::read(&self.state, SOURCE, "read"))
    }

    /// Receiver that fires after every state-changing dispatch.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Cached resource by canonical or alternative key, patches applied.
    pub fn get(&self, key: &str) -> Result<Option<Resource>, CacheError> {
        self.read(|state| state.objects.get(key))
    }

    pub fn exists(&self, key: &str, request_id: Option<RequestId>) -> bool {
        self.read(|state| state.objects.exists(key, request_id))
    }

    pub fn request(&self, id: RequestId) -> Option<RequestRecord> {
        self.read(|state| state.requests.get(id).cloned())
    }

    pub fn latest_request(&self, href: &str) -> Option<RequestRecord> {
        self.read(|state| state.requests.latest_for_href(href).cloned())
    }
}
