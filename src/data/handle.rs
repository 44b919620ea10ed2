//! Live views over a fetch.
//!
//! A [`RemoteDataHandle`] remembers the request it was created for and
//! rebuilds its [`RemoteData`] from the store on demand. Reading a stale
//! completed result with `re_request_on_stale` set submits a fresh request;
//! until that request completes the handle keeps reporting the stale result
//! under the new request id.

use std::fmt;
use std::sync::{Arc, Mutex};

use async_stream::stream;
use futures::Stream;
use tokio::sync::watch;
use tracing::debug;

use crate::cache::lock;
use crate::domain::{
    FollowLinkConfig, PaginatedList, RemoteData, RequestEntryState, RequestId, Resource,
};
use crate::links::{LinkError, LinkService};

use super::builder::RemoteDataBuilder;
use super::service::BaseDataService;

const SOURCE: &str = "data::handle";

/// Everything needed to rebuild a result or re-submit its request.
#[derive(Debug, Clone)]
pub(crate) struct FetchSpec {
    /// Final href, arguments included.
    pub href: String,
    /// Href before embed arguments were added, when that differs.
    pub fallback: Option<String>,
    pub use_cached_version_if_available: bool,
    pub re_request_on_stale: bool,
    pub time_to_live_ms: u64,
    pub links_to_follow: Vec<FollowLinkConfig>,
}

/// Payload types a handle can project out of the store.
pub trait HandlePayload: Clone + PartialEq + Send + Sync + Sized + 'static {
    fn build(
        builder: &RemoteDataBuilder<'_>,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<RemoteData<Self>>;

    fn resolve_links(
        self,
        links: &LinkService,
        configs: &[FollowLinkConfig],
    ) -> Result<Self, LinkError>;
}

impl HandlePayload for Resource {
    fn build(
        builder: &RemoteDataBuilder<'_>,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<RemoteData<Self>> {
        builder.build_single(href, fallback, request_id)
    }

    fn resolve_links(
        self,
        links: &LinkService,
        configs: &[FollowLinkConfig],
    ) -> Result<Self, LinkError> {
        links.resolve_links(&self, configs)
    }
}

/// Links of a list apply to each of its elements.
impl HandlePayload for PaginatedList<Resource> {
    fn build(
        builder: &RemoteDataBuilder<'_>,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<RemoteData<Self>> {
        builder.build_list(href, fallback, request_id)
    }

    fn resolve_links(
        self,
        links: &LinkService,
        configs: &[FollowLinkConfig],
    ) -> Result<Self, LinkError> {
        let PaginatedList {
            self_link,
            page_info,
            page,
        } = self;
        let page = page
            .iter()
            .map(|element| links.resolve_links(element, configs))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PaginatedList::new(self_link, page_info, page))
    }
}

pub struct RemoteDataHandle<T> {
    inner: Arc<Inner<T>>,
}

enum Inner<T> {
    /// A result that never changes, for links with nothing to fetch.
    Fixed(RemoteData<T>),
    Live(Live<T>),
}

struct Live<T> {
    service: BaseDataService,
    spec: FetchSpec,
    state: Mutex<LiveState<T>>,
}

struct LiveState<T> {
    request_id: RequestId,
    last_completed: Option<RemoteData<T>>,
    /// Payload with links resolved, reused while the cached body is unchanged.
    resolved: Option<T>,
}

impl<T> Clone for RemoteDataHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for RemoteDataHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.inner {
            Inner::Fixed(_) => f.write_str("RemoteDataHandle(fixed)"),
            Inner::Live(live) => f
                .debug_struct("RemoteDataHandle")
                .field("href", &live.spec.href)
                .field("request_id", &lock::lock(&live.state, SOURCE, "debug").request_id)
                .finish(),
        }
    }
}

impl<T: HandlePayload> RemoteDataHandle<T> {
    pub(crate) fn live(service: BaseDataService, spec: FetchSpec, request_id: RequestId) -> Self {
        Self {
            inner: Arc::new(Inner::Live(Live {
                service,
                spec,
                state: Mutex::new(LiveState {
                    request_id,
                    last_completed: None,
                    resolved: None,
                }),
            })),
        }
    }

    pub fn fixed(data: RemoteData<T>) -> Self {
        Self {
            inner: Arc::new(Inner::Fixed(data)),
        }
    }

    /// Completed result with no payload and no request.
    pub fn empty() -> Self {
        Self::fixed(RemoteData::empty())
    }

    pub fn href(&self) -> Option<&str> {
        match &*self.inner {
            Inner::Fixed(_) => None,
            Inner::Live(live) => Some(&live.spec.href),
        }
    }

    /// Request currently backing this handle. Changes when a stale result is
    /// re-requested.
    pub fn request_id(&self) -> Option<RequestId> {
        match &*self.inner {
            Inner::Fixed(data) => data.request_id(),
            Inner::Live(live) => Some(lock::lock(&live.state, SOURCE, "request_id").request_id),
        }
    }

    /// Snapshot of the result right now. Never waits on the network.
    pub fn current(&self) -> Result<RemoteData<T>, LinkError> {
        match &*self.inner {
            Inner::Fixed(data) => Ok(data.clone()),
            Inner::Live(live) => live.snapshot().map(|(data, _)| data),
        }
    }

    /// Wait for a completed result that is not about to be replaced by a
    /// re-request.
    pub async fn completed(&self) -> Result<RemoteData<T>, LinkError> {
        let live = match &*self.inner {
            Inner::Fixed(data) => return Ok(data.clone()),
            Inner::Live(live) => live,
        };

        let mut changes = live.service.store().subscribe();
        let mut stale_seen: Vec<RequestId> = Vec::new();
        loop {
            let (data, settled) = live.snapshot()?;
            if settled {
                return Ok(data);
            }
            if data.has_completed() {
                match data.request_id() {
                    // A result newer than every stale one seen so far.
                    Some(id) if !stale_seen.is_empty() && !stale_seen.contains(&id) => {
                        return Ok(data);
                    }
                    Some(id) => stale_seen.push(id),
                    None => return Ok(data),
                }
            }
            if changes.changed().await.is_err() {
                return Ok(data);
            }
        }
    }

    /// Every distinct result, starting with the current one. Ends after a
    /// link-resolution error.
    pub fn stream(&self) -> impl Stream<Item = Result<RemoteData<T>, LinkError>> + Send + 'static {
        let handle = self.clone();
        stream! {
            let mut changes = handle.subscribe();
            let mut last: Option<RemoteData<T>> = None;
            loop {
                match handle.current() {
                    Ok(data) => {
                        if last.as_ref() != Some(&data) {
                            last = Some(data.clone());
                            yield Ok(data);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
                let Some(receiver) = changes.as_mut() else {
                    break;
                };
                if receiver.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        match &*self.inner {
            Inner::Fixed(_) => None,
            Inner::Live(live) => Some(live.service.store().subscribe()),
        }
    }
}

impl<T: HandlePayload> Live<T> {
    /// Current result and whether it is final for the request behind it.
    fn snapshot(&self) -> Result<(RemoteData<T>, bool), LinkError> {
        let now = self.service.now();
        let mut state = lock::lock(&self.state, SOURCE, "snapshot");
        let request_id = state.request_id;
        let built = self.service.store().read(|cache| {
            T::build(
                &RemoteDataBuilder::new(cache, now),
                &self.spec.href,
                self.spec.fallback.as_deref(),
                Some(request_id),
            )
        });
        let data = built.unwrap_or_else(|| {
            RemoteData::pending(Some(request_id), RequestEntryState::RequestPending, now)
        });
        if let Some(id) = data.request_id() {
            state.request_id = id;
        }

        if data.is_loading() {
            let shown = state.last_completed.clone().unwrap_or(data);
            return Ok((shown, false));
        }

        let stale = data.is_stale();
        let data = self.resolve(&mut state, data)?;
        state.last_completed = Some(data.clone());

        if stale && self.spec.re_request_on_stale {
            // Bypass reuse: a fresh record's payload may have been evicted.
            let id = self.service.requests().send_get(
                &self.spec.href,
                self.spec.fallback.as_deref(),
                false,
                self.spec.time_to_live_ms,
            );
            debug!(
                href = %self.spec.href,
                stale_request = ?data.request_id(),
                request_id = %id,
                "re-requesting stale result"
            );
            state.request_id = id;
            return Ok((data, false));
        }
        Ok((data, true))
    }

    fn resolve(
        &self,
        state: &mut LiveState<T>,
        data: RemoteData<T>,
    ) -> Result<RemoteData<T>, LinkError> {
        if self.spec.links_to_follow.is_empty() {
            return Ok(data);
        }
        let links = self.service.links();
        let mut memo = state.resolved.take();
        let data = data.try_map(|payload| match memo.take() {
            Some(resolved) if resolved == payload => Ok(resolved),
            _ => payload.resolve_links(&links, &self.spec.links_to_follow),
        })?;
        state.resolved = data.payload().cloned();
        Ok(data)
    }
}
