//! Projection of store state into [`RemoteData`].
//!
//! The builder is a pure function of one consistent [`CacheState`] snapshot
//! and a timestamp. It picks the request record that best describes an href,
//! then looks up the payload the record points to.

use hypercache_hal::{self as hal, PAGE_LINK};
use tracing::debug;

use crate::cache::{CacheError, CacheState, RequestRecord, ResponsePayload};
use crate::domain::{PaginatedList, RemoteData, RequestEntryState, RequestId, Resource};

use super::response::PAGINATED_LIST_TYPE;

enum Lookup<T> {
    Found(T),
    /// Found, but some referenced objects are gone from the cache.
    Incomplete(T),
    NoContent,
    Missing,
}

pub struct RemoteDataBuilder<'a> {
    state: &'a CacheState,
    now: u64,
}

impl<'a> RemoteDataBuilder<'a> {
    pub fn new(state: &'a CacheState, now: u64) -> Self {
        Self { state, now }
    }

    /// The record to report for `href`: the latest request for the href and
    /// the caller's own request are compared, a fresh one beats a stale one,
    /// and otherwise the most recently updated wins.
    ///
    /// Without a request for the href itself, the fallback href and then the
    /// latest source of an object cached under either key stand in, so a
    /// caller whose own record was pruned still finds a result.
    pub fn request_for(
        &self,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<&'a RequestRecord> {
        let requests = &self.state.requests;
        let by_href = requests
            .latest_for_href(href)
            .or_else(|| fallback.and_then(|key| requests.latest_for_href(key)))
            .or_else(|| {
                std::iter::once(href)
                    .chain(fallback)
                    .find_map(|key| self.state.objects.entry(key)?.latest_request())
                    .and_then(|id| requests.get(id))
            });
        let by_id = request_id.and_then(|id| requests.get(id));
        match (by_href, by_id) {
            (Some(latest), Some(own)) if latest.id != own.id => {
                match (latest.is_stale_at(self.now), own.is_stale_at(self.now)) {
                    (false, true) => Some(latest),
                    (true, false) => Some(own),
                    _ if own.last_updated > latest.last_updated => Some(own),
                    _ => Some(latest),
                }
            }
            (latest, own) => own.or(latest),
        }
    }

    pub fn build_single(
        &self,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<RemoteData<Resource>> {
        let record = self.request_for(href, fallback, request_id)?;
        Some(self.build(record, |record| self.resource(record, href, fallback)))
    }

    pub fn build_list(
        &self,
        href: &str,
        fallback: Option<&str>,
        request_id: Option<RequestId>,
    ) -> Option<RemoteData<PaginatedList<Resource>>> {
        let record = self.request_for(href, fallback, request_id)?;
        Some(self.build(record, |record| {
            Ok(match self.resource(record, href, fallback)? {
                Lookup::Found(list) => self.list(list)?,
                Lookup::Incomplete(list) => match self.list(list)? {
                    Lookup::Found(list) | Lookup::Incomplete(list) => Lookup::Incomplete(list),
                    other => other,
                },
                Lookup::NoContent => Lookup::NoContent,
                Lookup::Missing => Lookup::Missing,
            })
        }))
    }

    fn build<T>(
        &self,
        record: &RequestRecord,
        payload: impl FnOnce(&RequestRecord) -> Result<Lookup<T>, CacheError>,
    ) -> RemoteData<T> {
        let id = Some(record.id);
        let completed_at = record.time_completed.unwrap_or(record.last_updated);
        let status_code = record.status_code.unwrap_or_default();
        let ttl = record.response_time_to_live_ms;

        let data = match record.state {
            state @ (RequestEntryState::RequestPending | RequestEntryState::ResponsePending) => {
                return RemoteData::pending(id, state, record.last_updated);
            }
            RequestEntryState::Error => RemoteData::error(
                id,
                status_code,
                record.error_message.clone().unwrap_or_default(),
                completed_at,
                ttl,
            ),
            RequestEntryState::Success => match payload(record) {
                Ok(Lookup::Found(payload)) => {
                    RemoteData::success(id, Some(payload), status_code, completed_at, ttl)
                }
                Ok(Lookup::Incomplete(payload)) => {
                    RemoteData::success(id, Some(payload), status_code, completed_at, ttl)
                        .into_stale()
                }
                Ok(Lookup::NoContent) => {
                    RemoteData::success(id, None, status_code, completed_at, ttl)
                }
                Ok(Lookup::Missing) => {
                    debug!(href = %record.href, request_id = %record.id, "payload no longer cached");
                    RemoteData::success(id, None, status_code, completed_at, ttl).into_stale()
                }
                Err(err) => RemoteData::error(id, status_code, err.to_string(), completed_at, ttl),
            },
        };

        if record.is_stale_at(self.now) {
            data.into_stale()
        } else {
            data
        }
    }

    fn resource(
        &self,
        record: &RequestRecord,
        href: &str,
        fallback: Option<&str>,
    ) -> Result<Lookup<Resource>, CacheError> {
        let objects = &self.state.objects;
        let own_request = record.href == href || fallback == Some(record.href.as_str());
        if own_request {
            return Ok(match &record.payload {
                ResponsePayload::Link(link) => match objects.get(link)? {
                    Some(resource) => Lookup::Found(resource),
                    None => Lookup::Missing,
                },
                ResponsePayload::Uncacheable(body) => Lookup::Found(Resource::detached(body.clone())),
                ResponsePayload::None => Lookup::NoContent,
            });
        }

        // Served by an object another request brought in (an embed).
        for key in std::iter::once(href).chain(fallback) {
            if let Some(resource) = objects.get(key)? {
                return Ok(Lookup::Found(resource));
            }
        }
        Ok(Lookup::Missing)
    }

    fn list(&self, list: Resource) -> Result<Lookup<PaginatedList<Resource>>, CacheError> {
        if list.resource_type().as_str() != PAGINATED_LIST_TYPE {
            let self_link = list.self_link().map(str::to_string);
            return Ok(Lookup::Found(PaginatedList::new(
                self_link,
                Default::default(),
                vec![list],
            )));
        }

        let hrefs: Vec<String> = hal::links_of(list.body())
            .get(PAGE_LINK)
            .map(|page| page.hrefs().into_iter().map(str::to_string).collect())
            .unwrap_or_default();
        let mut page = Vec::with_capacity(hrefs.len());
        let mut complete = true;
        for href in &hrefs {
            match self.state.objects.get(href)? {
                Some(element) => page.push(element),
                None => complete = false,
            }
        }

        let list = PaginatedList::new(
            list.self_link().map(str::to_string),
            hal::page_info(list.body()).unwrap_or_default(),
            page,
        );
        Ok(if complete {
            Lookup::Found(list)
        } else {
            Lookup::Incomplete(list)
        })
    }
}
