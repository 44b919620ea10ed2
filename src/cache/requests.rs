//! Request table: one record per submitted request, plus the latest request
//! for every href.

use std::collections::{HashMap, HashSet};

use metrics::counter;
use serde_json::Value;

use crate::domain::{Method, RequestEntryState, RequestId};

pub(crate) const METRIC_REQUEST_STALE: &str = "hypercache_request_stale_total";

/// What a successful response left behind.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    /// No body (`204 No Content`), or the request has not completed.
    None,
    /// Self link of the object the response was normalized into.
    Link(String),
    /// A JSON body without a self link, kept as-is.
    Uncacheable(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub id: RequestId,
    pub href: String,
    pub method: Method,
    pub state: RequestEntryState,
    pub is_stale: bool,
    pub response_time_to_live_ms: u64,
    pub last_updated: u64,
    pub time_completed: Option<u64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub payload: ResponsePayload,
}

impl RequestRecord {
    pub fn new(
        id: RequestId,
        href: impl Into<String>,
        method: Method,
        response_time_to_live_ms: u64,
        now: u64,
    ) -> Self {
        Self {
            id,
            href: href.into(),
            method,
            state: RequestEntryState::RequestPending,
            is_stale: false,
            response_time_to_live_ms,
            last_updated: now,
            time_completed: None,
            status_code: None,
            error_message: None,
            payload: ResponsePayload::None,
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.time_completed
            .is_some_and(|completed| completed.saturating_add(self.response_time_to_live_ms) < now)
    }

    /// Stale by invalidation or by TTL at `now`.
    pub fn is_stale_at(&self, now: u64) -> bool {
        self.state.is_completed() && (self.is_stale || self.is_expired(now))
    }

    /// Successful, fresh and unexpired.
    pub fn is_reusable(&self, now: u64) -> bool {
        self.state == RequestEntryState::Success && !self.is_stale_at(now)
    }
}

#[derive(Debug, Default)]
pub struct RequestTable {
    records: HashMap<RequestId, RequestRecord>,
    latest_by_href: HashMap<String, RequestId>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only `GET` records become the latest for their href; write-backs
    /// never stand in for a read.
    pub fn configure(&mut self, record: RequestRecord) {
        if record.method == Method::Get {
            self.latest_by_href.insert(record.href.clone(), record.id);
        }
        self.records.insert(record.id, record);
    }

    pub fn get(&self, id: RequestId) -> Option<&RequestRecord> {
        self.records.get(&id)
    }

    pub fn latest_for_href(&self, href: &str) -> Option<&RequestRecord> {
        self.latest_by_href
            .get(href)
            .and_then(|id| self.records.get(id))
    }

    /// `RequestPending -> ResponsePending`, exactly once per id.
    pub fn dispatched(&mut self, id: RequestId, now: u64) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state == RequestEntryState::RequestPending => {
                record.state = RequestEntryState::ResponsePending;
                record.last_updated = now;
                true
            }
            _ => false,
        }
    }

    pub fn succeed(
        &mut self,
        id: RequestId,
        payload: ResponsePayload,
        status_code: u16,
        completed_at: u64,
    ) -> bool {
        let Some(record) = self.pending_mut(id) else {
            return false;
        };
        record.state = RequestEntryState::Success;
        record.payload = payload;
        record.status_code = Some(status_code);
        record.time_completed = Some(completed_at);
        record.last_updated = completed_at;
        true
    }

    pub fn fail(
        &mut self,
        id: RequestId,
        status_code: u16,
        message: String,
        completed_at: u64,
    ) -> bool {
        let Some(record) = self.pending_mut(id) else {
            return false;
        };
        record.state = RequestEntryState::Error;
        record.status_code = Some(status_code);
        record.error_message = Some(message);
        record.time_completed = Some(completed_at);
        record.last_updated = completed_at;
        true
    }

    fn pending_mut(&mut self, id: RequestId) -> Option<&mut RequestRecord> {
        self.records
            .get_mut(&id)
            .filter(|record| record.state.is_pending())
    }

    /// Mark a completed request stale. Pending and already stale requests
    /// are left alone.
    pub fn mark_stale(&mut self, id: RequestId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state.is_completed() && !record.is_stale => {
                record.is_stale = true;
                counter!(METRIC_REQUEST_STALE).increment(1);
                true
            }
            _ => false,
        }
    }

    /// Drop completed records that no longer answer for their href and that
    /// `pinned` does not hold on to. Returns the dropped ids.
    pub fn prune(&mut self, pinned: &HashSet<RequestId>) -> HashSet<RequestId> {
        let latest: HashSet<RequestId> = self.latest_by_href.values().copied().collect();
        let dropped: HashSet<RequestId> = self
            .records
            .values()
            .filter(|record| record.state.is_completed())
            .map(|record| record.id)
            .filter(|id| !latest.contains(id) && !pinned.contains(id))
            .collect();
        self.records.retain(|id, _| !dropped.contains(id));
        dropped
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
