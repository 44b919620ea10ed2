//! Data-Access Orchestrator.
//!
//! [`BaseDataService`] is the entry point for reads and cache maintenance:
//! it builds the final href, submits the request through the
//! [`RequestService`], and hands back a [`RemoteDataHandle`] that projects
//! the result out of the store. It is cheap to clone and shared by every
//! strategy in the registry.

use std::sync::Arc;

use json_patch::PatchOperation;
use tracing::{debug, info, instrument, warn};

use crate::cache::{CacheAction, CacheConfig, CacheStore, DispatchOutcome, PatchBuffer, Publish};
use crate::domain::{
    FindListOptions, FollowLinkConfig, Method, PaginatedList, PatchBatch, RemoteData, Resource,
};
use crate::infra::{
    Clock, RawRequest, RequestIdGenerator, SystemClock, Transport, UuidGenerator,
};
use crate::links::LinkService;
use crate::registry::TypeRegistry;

use super::handle::{FetchSpec, HandlePayload, RemoteDataHandle};
use super::href::build_href;
use super::request_service::{Completion, RequestService};
use super::strategy::FindQuery;

/// Result of one [`BaseDataService::flush_patches`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct BaseDataService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<CacheStore>,
    requests: RequestService,
    registry: Arc<TypeRegistry>,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    patches: PatchBuffer,
}

/// Wiring for a [`BaseDataService`]. Clock and id generator default to the
/// system clock and random UUIDs.
pub struct BaseDataServiceBuilder {
    registry: Arc<TypeRegistry>,
    transport: Arc<dyn Transport>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn RequestIdGenerator>,
}

impl BaseDataServiceBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ids(mut self, ids: Arc<dyn RequestIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn build(self) -> BaseDataService {
        let store = Arc::new(CacheStore::new(&self.config));
        let requests = RequestService::new(
            Arc::clone(&store),
            self.transport,
            Arc::clone(&self.clock),
            self.ids,
        );
        let patches = PatchBuffer::new(self.config.patch_buffer_limit_non_zero());
        BaseDataService {
            inner: Arc::new(ServiceInner {
                store,
                requests,
                registry: self.registry,
                clock: self.clock,
                config: self.config,
                patches,
            }),
        }
    }
}

impl BaseDataService {
    pub fn builder(registry: TypeRegistry, transport: Arc<dyn Transport>) -> BaseDataServiceBuilder {
        BaseDataServiceBuilder {
            registry: Arc::new(registry),
            transport,
            config: CacheConfig::default(),
            clock: Arc::new(SystemClock::new()),
            ids: Arc::new(UuidGenerator),
        }
    }

    pub fn new(registry: TypeRegistry, transport: Arc<dyn Transport>, config: CacheConfig) -> Self {
        Self::builder(registry, transport).config(config).build()
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn patch_buffer(&self) -> &PatchBuffer {
        &self.inner.patches
    }

    pub fn requests(&self) -> &RequestService {
        &self.inner.requests
    }

    pub fn links(&self) -> LinkService {
        LinkService::new(self.clone())
    }

    pub fn now(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Fetch one resource by href.
    ///
    /// With `use_cached_version_if_available` a fresh cached result is
    /// returned without a request. `links_to_follow` are resolved on every
    /// successful payload the handle reports.
    pub fn find_by_href(
        &self,
        href: &str,
        use_cached_version_if_available: bool,
        re_request_on_stale: bool,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataHandle<Resource> {
        let query = FindQuery::new(
            use_cached_version_if_available,
            re_request_on_stale,
            links_to_follow,
        );
        self.fetch_single(href, query, &[])
    }

    /// Fetch one page of a list. Links apply to every element.
    pub fn find_list_by_href(
        &self,
        href: &str,
        options: &FindListOptions,
        use_cached_version_if_available: bool,
        re_request_on_stale: bool,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataHandle<PaginatedList<Resource>> {
        let query = FindQuery::new(
            use_cached_version_if_available,
            re_request_on_stale,
            links_to_follow,
        )
        .with_options(options);
        self.fetch_list(href, query, &[])
    }

    pub fn fetch_single(
        &self,
        href: &str,
        query: FindQuery,
        extra_args: &[String],
    ) -> RemoteDataHandle<Resource> {
        self.fetch(href, query, extra_args)
    }

    pub fn fetch_list(
        &self,
        href: &str,
        query: FindQuery,
        extra_args: &[String],
    ) -> RemoteDataHandle<PaginatedList<Resource>> {
        self.fetch(href, query, extra_args)
    }

    fn fetch<T: HandlePayload>(
        &self,
        href: &str,
        query: FindQuery,
        extra_args: &[String],
    ) -> RemoteDataHandle<T> {
        let embeds: &[FollowLinkConfig] = if self.inner.config.embed_hints {
            &query.links_to_follow
        } else {
            &[]
        };
        let final_href = build_href(href, &query.options, extra_args, embeds);
        let fallback = (final_href != href && query.options.is_empty() && extra_args.is_empty())
            .then(|| href.to_string());
        let time_to_live_ms = query
            .time_to_live_ms
            .unwrap_or(self.inner.config.default_time_to_live_ms);

        let request_id = self.inner.requests.send_get(
            &final_href,
            fallback.as_deref(),
            query.use_cached_version_if_available,
            time_to_live_ms,
        );
        let spec = FetchSpec {
            href: final_href,
            fallback,
            use_cached_version_if_available: query.use_cached_version_if_available,
            re_request_on_stale: query.re_request_on_stale,
            time_to_live_ms,
            links_to_follow: query.links_to_follow,
        };
        let resolve_eagerly = !spec.links_to_follow.is_empty();
        let handle = RemoteDataHandle::live(self.clone(), spec, request_id);

        if resolve_eagerly {
            let watcher = handle.clone();
            tokio::spawn(async move {
                if let Err(err) = watcher.completed().await {
                    warn!(href = ?watcher.href(), error = %err, "link resolution failed");
                }
            });
        }
        handle
    }

    /// Mark every request behind `href` (and everything depending on it)
    /// stale. Returns the number of requests newly marked.
    #[instrument(skip(self))]
    pub fn invalidate_by_href(&self, href: &str) -> usize {
        match self.inner.store.dispatch(CacheAction::Invalidate {
            key: href.to_string(),
        }) {
            DispatchOutcome::MarkedStale(ids) => ids.len(),
            _ => 0,
        }
    }

    /// Invalidate `dependent` whenever `dependee` is invalidated. Both must
    /// be cached; otherwise nothing is recorded.
    pub fn add_dependency(&self, dependent: &str, dependee: &str) -> bool {
        self.inner
            .store
            .dispatch(CacheAction::AddDependency {
                dependent: dependent.to_string(),
                dependee: dependee.to_string(),
            })
            .changed()
    }

    /// [`add_dependency`](Self::add_dependency) for the payload of a result.
    /// Failed or empty results record nothing.
    pub fn add_dependency_on(&self, dependent: &RemoteData<Resource>, dependee: &str) -> bool {
        if !dependent.has_succeeded() {
            return false;
        }
        match dependent.payload().and_then(Resource::self_link) {
            Some(self_link) => self.add_dependency(self_link, dependee),
            None => false,
        }
    }

    pub fn remove_dependents(&self, key: &str) -> bool {
        self.inner
            .store
            .dispatch(CacheAction::RemoveDependents {
                key: key.to_string(),
            })
            .changed()
    }

    /// Drop an entry from the object cache.
    pub fn remove(&self, key: &str) -> bool {
        self.inner
            .store
            .dispatch(CacheAction::Remove {
                key: key.to_string(),
            })
            .changed()
    }

    /// Apply `operations` to the cached copy of `key` and queue them for
    /// write-back. Unknown keys are ignored, and nothing is recorded while
    /// the write-back buffer is full.
    pub fn add_patch(&self, key: &str, operations: Vec<PatchOperation>) -> bool {
        let queued_at = self.now();
        let store = &self.inner.store;
        let outcome = self.inner.patches.publish_with(|| {
            match store.dispatch(CacheAction::AddPatch {
                key: key.to_string(),
                operations: operations.clone(),
            }) {
                DispatchOutcome::Patched { key, seq } => Some(PatchBatch {
                    key,
                    seq,
                    operations,
                    queued_at,
                }),
                _ => None,
            }
        });
        match outcome {
            Publish::Queued { .. } => true,
            Publish::Skipped => {
                debug!(key, "patch ignored; key not cached");
                false
            }
            Publish::Full => {
                warn!(key, "patch refused; write-back buffer is full");
                false
            }
        }
    }

    /// Write up to `limit` buffered patch batches back with `PATCH`.
    ///
    /// A written batch is confirmed in the cache, together with the stored
    /// response, and its entry invalidated.
    /// A failed batch, and every later batch for the same key, is put back
    /// in the buffer in order.
    pub async fn flush_patches(&self, limit: usize) -> FlushReport {
        let batches = self.inner.patches.drain(limit);
        let mut report = FlushReport::default();
        let mut failed: Vec<PatchBatch> = Vec::new();

        for batch in batches {
            if failed.iter().any(|earlier| earlier.key == batch.key) {
                failed.push(batch);
                continue;
            }

            let body = match serde_json::to_value(&batch.operations) {
                Ok(body) => body,
                Err(err) => {
                    warn!(key = %batch.key, seq = batch.seq, error = %err, "unserializable patch");
                    failed.push(batch);
                    continue;
                }
            };
            let confirm = CacheAction::ConfirmPatch {
                key: batch.key.clone(),
                seq: batch.seq,
            };
            let completion = self
                .inner
                .requests
                .send_and_wait(
                    RawRequest::new(Method::Patch, batch.key.clone(), Some(body)),
                    self.inner.config.default_time_to_live_ms,
                    vec![confirm],
                )
                .await;

            match completion {
                Completion::Succeeded { .. } => {
                    self.invalidate_by_href(&batch.key);
                    report.written += 1;
                }
                Completion::Failed {
                    status_code,
                    message,
                } => {
                    warn!(
                        key = %batch.key,
                        seq = batch.seq,
                        status = status_code,
                        error = %message,
                        "patch write-back failed"
                    );
                    failed.push(batch);
                }
            }
        }

        report.failed = failed.len();
        if !failed.is_empty() {
            self.inner.patches.requeue(failed);
        }
        info!(written = report.written, failed = report.failed, "patch flush finished");
        report
    }
}
