//! Object cache: resources by canonical self link, reachable through any
//! number of alternative keys.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroUsize;

use json_patch::PatchOperation;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{RequestId, Resource, ResourceType};

use super::error::CacheError;

pub(crate) const METRIC_OBJECT_HIT: &str = "hypercache_object_hit_total";
pub(crate) const METRIC_OBJECT_MISS: &str = "hypercache_object_miss_total";
pub(crate) const METRIC_OBJECT_EVICT: &str = "hypercache_object_evict_total";

/// Patch operations recorded by one `add_patch` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPatch {
    pub seq: u64,
    pub operations: Vec<PatchOperation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub canonical_key: String,
    pub resource_type: ResourceType,
    /// Last known server representation. Never carries resolved links.
    pub payload: Value,
    pub alternative_keys: BTreeSet<String>,
    pub fetched_at: u64,
    pub time_to_live_ms: u64,
    /// Most recent first.
    pub source_request_ids: Vec<RequestId>,
    pub dependent_request_ids: BTreeSet<RequestId>,
    pub pending_patches: Vec<PendingPatch>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: u64) -> bool {
        self.fetched_at.saturating_add(self.time_to_live_ms) < now
    }

    pub fn latest_request(&self) -> Option<RequestId> {
        self.source_request_ids.first().copied()
    }

    /// Payload with every pending patch applied in queue order.
    fn patched_payload(&self) -> Result<Value, CacheError> {
        let mut payload = self.payload.clone();
        for patch in &self.pending_patches {
            json_patch::patch(&mut payload, &patch.operations)
                .map_err(|err| CacheError::malformed_patch(&self.canonical_key, err))?;
        }
        Ok(payload)
    }
}

/// What a `put` did besides storing the entry.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub canonical_key: String,
    pub evicted: Option<String>,
}

pub struct ObjectCache {
    entries: LruCache<String, CacheEntry>,
    alternatives: HashMap<String, String>,
    next_patch_seq: u64,
}

impl ObjectCache {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(limit),
            alternatives: HashMap::new(),
            next_patch_seq: 1,
        }
    }

    /// Resolve a canonical or alternative key to the canonical key.
    pub fn canonical_key<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.entries.contains(key) {
            return Some(key);
        }
        self.alternatives.get(key).map(String::as_str)
    }

    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        let canonical = self.canonical_key(key)?;
        self.entries.peek(canonical)
    }

    fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        let canonical = self.canonical_key(key)?.to_string();
        self.entries.peek_mut(&canonical)
    }

    /// Upsert `resource` under its self link. Resources without a self link
    /// are not cacheable and are ignored.
    pub fn put(
        &mut self,
        resource: &Resource,
        request_id: RequestId,
        time_to_live_ms: u64,
        fetched_at: u64,
        alternative_key: Option<&str>,
    ) -> Option<PutOutcome> {
        let Some(canonical) = resource.self_link().map(str::to_string) else {
            warn!(
                resource_type = %resource.resource_type(),
                "resource without self link cannot be cached"
            );
            return None;
        };
        let payload = resource.without_resolved_links().into_body();

        // A canonical key always wins over an alternative mapping.
        if let Some(previous) = self.alternatives.remove(&canonical) {
            self.drop_alternative(&previous, &canonical);
        }

        let mut evicted = None;
        if let Some(entry) = self.entries.get_mut(&canonical) {
            entry.resource_type = resource.resource_type().clone();
            entry.payload = payload;
            entry.fetched_at = fetched_at;
            entry.time_to_live_ms = time_to_live_ms;
            entry.source_request_ids.retain(|id| *id != request_id);
            entry.source_request_ids.insert(0, request_id);
        } else {
            let entry = CacheEntry {
                canonical_key: canonical.clone(),
                resource_type: resource.resource_type().clone(),
                payload,
                alternative_keys: BTreeSet::new(),
                fetched_at,
                time_to_live_ms,
                source_request_ids: vec![request_id],
                dependent_request_ids: BTreeSet::new(),
                pending_patches: Vec::new(),
            };
            if let Some((old_key, old_entry)) = self.entries.push(canonical.clone(), entry) {
                self.forget_alternatives(&old_entry);
                counter!(METRIC_OBJECT_EVICT).increment(1);
                debug!(key = %old_key, "evicted least recently written cache entry");
                evicted = Some(old_key);
            }
        }

        if let Some(alternative) = alternative_key.filter(|alt| *alt != canonical) {
            self.claim_alternative(alternative, &canonical);
        }

        Some(PutOutcome {
            canonical_key: canonical,
            evicted,
        })
    }

    fn claim_alternative(&mut self, alternative: &str, canonical: &str) {
        if let Some(previous) = self
            .alternatives
            .insert(alternative.to_string(), canonical.to_string())
            && previous != canonical
        {
            self.drop_alternative(&previous, alternative);
        }
        if let Some(entry) = self.entries.peek_mut(canonical) {
            entry.alternative_keys.insert(alternative.to_string());
        }
    }

    fn drop_alternative(&mut self, owner: &str, alternative: &str) {
        if let Some(entry) = self.entries.peek_mut(owner) {
            entry.alternative_keys.remove(alternative);
        }
    }

    fn forget_alternatives(&mut self, entry: &CacheEntry) {
        for alternative in &entry.alternative_keys {
            if self.alternatives.get(alternative) == Some(&entry.canonical_key) {
                self.alternatives.remove(alternative);
            }
        }
    }

    /// Entry payload with pending patches applied, as a resource.
    ///
    /// Unknown keys are `Ok(None)`. A patch that fails to apply is an error
    /// for this read only; the stored entry is untouched.
    pub fn get(&self, key: &str) -> Result<Option<Resource>, CacheError> {
        let Some(entry) = self.entry(key) else {
            counter!(METRIC_OBJECT_MISS).increment(1);
            return Ok(None);
        };
        counter!(METRIC_OBJECT_HIT).increment(1);
        let payload = entry.patched_payload()?;
        Ok(Resource::from_json(payload))
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let canonical = self.canonical_key(key)?.to_string();
        let entry = self.entries.pop(&canonical)?;
        self.forget_alternatives(&entry);
        Some(entry)
    }

    /// True if `key` is cached, and when `request_id` is given, only if that
    /// request is one of the entry's sources.
    pub fn exists(&self, key: &str, request_id: Option<RequestId>) -> bool {
        match (self.entry(key), request_id) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(entry), Some(id)) => entry.source_request_ids.contains(&id),
        }
    }

    /// Queue patch operations on an entry. Returns the canonical key and the
    /// sequence number of the new batch, or `None` for unknown keys.
    pub fn add_patch(
        &mut self,
        key: &str,
        operations: Vec<PatchOperation>,
    ) -> Option<(String, u64)> {
        let seq = self.next_patch_seq;
        let entry = self.entry_mut(key)?;
        entry.pending_patches.push(PendingPatch { seq, operations });
        let canonical = entry.canonical_key.clone();
        self.next_patch_seq += 1;
        Some((canonical, seq))
    }

    /// Drop the pending patch with sequence number `seq` after the server
    /// accepted it. Earlier and later patches stay queued.
    pub fn confirm_patch(&mut self, key: &str, seq: u64) -> bool {
        let Some(entry) = self.entry_mut(key) else {
            return false;
        };
        let before = entry.pending_patches.len();
        entry.pending_patches.retain(|patch| patch.seq != seq);
        entry.pending_patches.len() < before
    }

    pub(crate) fn add_dependent(&mut self, key: &str, request_id: RequestId) -> bool {
        match self.entry_mut(key) {
            Some(entry) => entry.dependent_request_ids.insert(request_id),
            None => false,
        }
    }

    pub(crate) fn remove_dependents(&mut self, key: &str) -> bool {
        match self.entry_mut(key) {
            Some(entry) => {
                let had_any = !entry.dependent_request_ids.is_empty();
                entry.dependent_request_ids.clear();
                had_any
            }
            None => false,
        }
    }

    /// Source and dependent request ids of an entry, consuming the dependents.
    pub(crate) fn take_invalidation_targets(&mut self, key: &str) -> Option<Vec<RequestId>> {
        let entry = self.entry_mut(key)?;
        let mut targets = entry.source_request_ids.clone();
        for id in std::mem::take(&mut entry.dependent_request_ids) {
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        Some(targets)
    }

    /// Request ids an entry still answers for: each entry's latest source
    /// and every dependent.
    pub(crate) fn pinned_requests(&self) -> HashSet<RequestId> {
        let mut pinned = HashSet::new();
        for (_, entry) in self.entries.iter() {
            pinned.extend(entry.latest_request());
            pinned.extend(entry.dependent_request_ids.iter().copied());
        }
        pinned
    }

    /// Remove pruned request ids from every entry's sources.
    pub(crate) fn forget_requests(&mut self, ids: &HashSet<RequestId>) {
        for (_, entry) in self.entries.iter_mut() {
            entry.source_request_ids.retain(|id| !ids.contains(id));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
