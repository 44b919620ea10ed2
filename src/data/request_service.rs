//! Request submission, de-duplication and execution.
//!
//! A GET is served from the cache when a fresh successful request for the
//! same href exists, coalesced onto an identical in-flight request when one
//! is running, and otherwise configured in the store and executed on a
//! spawned task. The response is normalized into cache actions before the
//! request is marked complete, so a subscriber that sees `Success` also sees
//! the objects it points to.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, histogram};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::cache::{CacheAction, CacheState, CacheStore, RequestRecord, ResponsePayload};
use crate::domain::{Method, RequestId};
use crate::infra::{Clock, RawRequest, RequestIdGenerator, Transport};

use super::response::{ParsedResponse, parse_response};

pub const METRIC_REQUEST_SENT: &str = "hypercache_request_sent_total";
pub const METRIC_REQUEST_COALESCED: &str = "hypercache_request_coalesced_total";
pub const METRIC_FETCH_MS: &str = "hypercache_fetch_ms";

/// How a request ended, as seen by the task that ran it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Succeeded { status_code: u16 },
    Failed { status_code: u16, message: String },
}

impl Completion {
    pub fn is_success(&self) -> bool {
        matches!(self, Completion::Succeeded { .. })
    }
}

#[derive(Clone)]
pub struct RequestService {
    store: Arc<CacheStore>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn RequestIdGenerator>,
    in_flight: Arc<DashMap<String, RequestId>>,
}

impl RequestService {
    pub fn new(
        store: Arc<CacheStore>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn RequestIdGenerator>,
    ) -> Self {
        Self {
            store,
            transport,
            clock,
            ids,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    /// Submit a GET for `href` and return the id whose record will carry the
    /// result. `fallback` is a second key under which a cached object may
    /// satisfy the request (the href before embed arguments were added).
    ///
    /// Must be called inside a Tokio runtime.
    pub fn send_get(
        &self,
        href: &str,
        fallback: Option<&str>,
        use_cached_version_if_available: bool,
        time_to_live_ms: u64,
    ) -> RequestId {
        let now = self.clock.now_ms();
        if use_cached_version_if_available {
            let reusable = self
                .store
                .read(|state| reusable_request(state, href, fallback, now));
            if let Some(id) = reusable {
                debug!(href, request_id = %id, "served from cache");
                return id;
            }
        }

        let id = match self.in_flight.entry(href.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if self.is_pending(current) {
                    counter!(METRIC_REQUEST_COALESCED).increment(1);
                    debug!(href, request_id = %current, "joined in-flight request");
                    return current;
                }
                // Completed, but its task has not cleared the slot yet.
                let id = self.configure(href, time_to_live_ms, now);
                entry.insert(id);
                id
            }
            Entry::Vacant(entry) => {
                let id = self.configure(href, time_to_live_ms, now);
                entry.insert(id);
                id
            }
        };

        let service = self.clone();
        let request = RawRequest::get(href);
        let span = info_span!("request", request_id = %id, href);
        tokio::spawn(
            async move {
                service.execute(id, request, time_to_live_ms, Vec::new()).await;
            }
            .instrument(span),
        );
        id
    }

    /// Send a request outside the de-duplication path and wait for it.
    ///
    /// `on_success` is applied in the same dispatch that stores the response,
    /// so no reader sees one without the other.
    pub async fn send_and_wait(
        &self,
        request: RawRequest,
        time_to_live_ms: u64,
        on_success: Vec<CacheAction>,
    ) -> Completion {
        let id = self.ids.next_id();
        let now = self.clock.now_ms();
        self.store
            .dispatch(CacheAction::ConfigureRequest(RequestRecord::new(
                id,
                &request.url,
                request.method,
                time_to_live_ms,
                now,
            )));
        self.execute(id, request, time_to_live_ms, on_success).await
    }

    pub fn is_in_flight(&self, href: &str) -> bool {
        self.in_flight
            .get(href)
            .is_some_and(|id| self.is_pending(*id))
    }

    fn is_pending(&self, id: RequestId) -> bool {
        self.store
            .request(id)
            .is_some_and(|record| record.state.is_pending())
    }

    fn configure(&self, href: &str, time_to_live_ms: u64, now: u64) -> RequestId {
        let id = self.ids.next_id();
        self.store.dispatch(CacheAction::ConfigureRequest(RequestRecord::new(
            id,
            href,
            Method::Get,
            time_to_live_ms,
            now,
        )));
        id
    }

    async fn execute(
        &self,
        id: RequestId,
        request: RawRequest,
        time_to_live_ms: u64,
        on_success: Vec<CacheAction>,
    ) -> Completion {
        let href = request.url.clone();
        let method = request.method;
        self.store.dispatch(CacheAction::RequestDispatched {
            id,
            at: self.clock.now_ms(),
        });
        counter!(METRIC_REQUEST_SENT).increment(1);

        let started = Instant::now();
        let result = self.transport.send(request).await;
        histogram!(METRIC_FETCH_MS).record(started.elapsed().as_secs_f64() * 1_000.0);
        let completed_at = self.clock.now_ms();

        let parsed = match result {
            Ok(response) => parse_response(&href, &response),
            Err(err) => {
                warn!(method = %method, href = %href, error = %err, "transport failure");
                ParsedResponse::from_transport_error(&err)
            }
        };

        let completion = match parsed {
            ParsedResponse::Success {
                status_code,
                objects,
                payload,
            } => {
                info!(
                    method = %method,
                    href = %href,
                    status = status_code,
                    objects = objects.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "request succeeded"
                );
                let mut actions = on_success;
                actions.extend(objects.into_iter().map(|object| CacheAction::Put {
                    resource: object.resource,
                    request_id: id,
                    time_to_live_ms,
                    fetched_at: completed_at,
                    alternative_key: object.alternative_key,
                }));
                actions.push(CacheAction::RequestSucceeded {
                    id,
                    payload,
                    status_code,
                    completed_at,
                });
                self.store.dispatch(CacheAction::Batch(actions));
                Completion::Succeeded { status_code }
            }
            ParsedResponse::Failure {
                status_code,
                message,
            } => {
                info!(
                    method = %method,
                    href = %href,
                    status = status_code,
                    message = %message,
                    "request failed"
                );
                self.store.dispatch(CacheAction::RequestFailed {
                    id,
                    status_code,
                    message: message.clone(),
                    completed_at,
                });
                Completion::Failed {
                    status_code,
                    message,
                }
            }
        };

        self.in_flight.remove_if(&href, |_, current| *current == id);
        completion
    }
}

/// A completed, fresh, successful request whose result is still in the
/// object cache, found by href or through a cached object's key.
fn reusable_request(
    state: &CacheState,
    href: &str,
    fallback: Option<&str>,
    now: u64,
) -> Option<RequestId> {
    std::iter::once(href)
        .chain(fallback)
        .find_map(|key| reusable_for_key(state, key, now))
}

fn reusable_for_key(state: &CacheState, key: &str, now: u64) -> Option<RequestId> {
    if let Some(record) = state.requests.latest_for_href(key)
        && record.is_reusable(now)
    {
        let payload_present = match &record.payload {
            ResponsePayload::Link(link) => state.objects.exists(link, Some(record.id)),
            ResponsePayload::None | ResponsePayload::Uncacheable(_) => true,
        };
        if payload_present {
            return Some(record.id);
        }
    }

    let entry = state.objects.entry(key)?;
    if entry.is_expired(now) {
        return None;
    }
    let id = entry.latest_request()?;
    state
        .requests
        .get(id)
        .filter(|record| record.is_reusable(now))
        .map(|record| record.id)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::cache::CacheConfig;
    use crate::domain::RequestEntryState;
    use crate::infra::{ManualClock, RawResponse, SequentialGenerator, TransportError};

    use super::*;

    struct CountingTransport {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
            self.calls
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(request.url.clone());
            Ok(RawResponse::json(
                200,
                &json!({ "type": "item", "_links": { "self": { "href": request.url } } }),
            ))
        }
    }

    fn service() -> (RequestService, Arc<CountingTransport>) {
        let transport = Arc::new(CountingTransport {
            calls: Mutex::new(Vec::new()),
        });
        let service = RequestService::new(
            Arc::new(CacheStore::new(&CacheConfig::default())),
            transport.clone(),
            Arc::new(ManualClock::new(1_000)),
            Arc::new(SequentialGenerator::default()),
        );
        (service, transport)
    }

    async fn settle(service: &RequestService, id: RequestId) -> RequestRecord {
        let mut changes = service.store.subscribe();
        loop {
            if let Some(record) = service.store.request(id)
                && record.state.is_completed()
            {
                return record;
            }
            changes.changed().await.expect("store alive");
        }
    }

    #[tokio::test]
    async fn identical_gets_share_one_request() {
        let (service, transport) = service();
        let first = service.send_get("/items/1", None, true, 1_000);
        let second = service.send_get("/items/1", None, false, 1_000);
        assert_eq!(first, second);

        let record = settle(&service, first).await;
        assert_eq!(record.state, RequestEntryState::Success);
        assert_eq!(transport.calls.lock().expect("calls").len(), 1);
        assert!(!service.is_in_flight("/items/1"));
    }

    #[tokio::test]
    async fn fresh_results_are_reused_unless_bypassed() {
        let (service, transport) = service();
        let first = service.send_get("/items/1", None, true, 1_000);
        settle(&service, first).await;

        assert_eq!(service.send_get("/items/1", None, true, 1_000), first);

        let bypass = service.send_get("/items/1", None, false, 1_000);
        assert_ne!(bypass, first);
        settle(&service, bypass).await;
        assert_eq!(transport.calls.lock().expect("calls").len(), 2);
    }

    #[tokio::test]
    async fn cached_object_satisfies_fallback_key() {
        let (service, transport) = service();
        let first = service.send_get("/items/1", None, true, 1_000);
        settle(&service, first).await;

        let embedded = service.send_get("/items/1?embed=bundles", Some("/items/1"), true, 1_000);
        assert_eq!(embedded, first);
        assert_eq!(transport.calls.lock().expect("calls").len(), 1);
    }

    #[tokio::test]
    async fn send_and_wait_applies_follow_up_with_the_response() {
        let (service, _) = service();
        let first = service.send_get("/items/1", None, true, 1_000);
        settle(&service, first).await;
        let seq = match service.store.dispatch(CacheAction::AddPatch {
            key: "/items/1".to_string(),
            operations: Vec::new(),
        }) {
            crate::cache::DispatchOutcome::Patched { seq, .. } => seq,
            other => panic!("unexpected outcome: {other:?}"),
        };

        let completion = service
            .send_and_wait(
                RawRequest::new(Method::Patch, "/items/1", Some(json!([]))),
                1_000,
                vec![CacheAction::ConfirmPatch {
                    key: "/items/1".to_string(),
                    seq,
                }],
            )
            .await;

        assert_eq!(completion, Completion::Succeeded { status_code: 200 });
        let pending = service.store.read(|state| {
            state
                .objects
                .entry("/items/1")
                .map(|entry| entry.pending_patches.len())
        });
        assert_eq!(pending, Some(0));
    }
}
