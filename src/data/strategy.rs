//! Per-type data-access strategies.

use crate::domain::{FindListOptions, FollowLinkConfig, PaginatedList, Resource};

use super::handle::RemoteDataHandle;
use super::service::BaseDataService;

/// Arguments of one find call, kept so a stale result can be re-requested
/// with exactly the same inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindQuery {
    pub options: FindListOptions,
    pub use_cached_version_if_available: bool,
    pub re_request_on_stale: bool,
    pub links_to_follow: Vec<FollowLinkConfig>,
    /// `None` falls back to the cache's default lifetime.
    pub time_to_live_ms: Option<u64>,
}

impl FindQuery {
    pub fn new(
        use_cached_version_if_available: bool,
        re_request_on_stale: bool,
        links_to_follow: &[FollowLinkConfig],
    ) -> Self {
        Self {
            options: FindListOptions::default(),
            use_cached_version_if_available,
            re_request_on_stale,
            links_to_follow: links_to_follow.to_vec(),
            time_to_live_ms: None,
        }
    }

    pub fn with_options(mut self, options: &FindListOptions) -> Self {
        self.options = options.clone();
        self
    }

    pub fn with_time_to_live(mut self, time_to_live_ms: Option<u64>) -> Self {
        self.time_to_live_ms = time_to_live_ms;
        self
    }
}

impl Default for FindQuery {
    fn default() -> Self {
        Self::new(true, true, &[])
    }
}

/// Fetches resources of one type. Registered in the
/// [`TypeRegistry`](crate::registry::TypeRegistry); the link resolver reaches
/// every type through this trait, never through a type switch.
///
/// The provided methods delegate to the generic orchestrator; override them
/// to add type-specific arguments or lifetimes.
pub trait DataAccessStrategy: Send + Sync {
    /// Lifetime of responses fetched for this type.
    fn time_to_live_ms(&self) -> Option<u64> {
        None
    }

    /// Extra href arguments added to every request for this type.
    fn extra_args(&self) -> Vec<String> {
        Vec::new()
    }

    fn find_by_href(
        &self,
        service: &BaseDataService,
        href: &str,
        use_cached_version_if_available: bool,
        re_request_on_stale: bool,
        links_to_follow: &[FollowLinkConfig],
    ) -> RemoteDataHandle<Resource> {
        let query = FindQuery::new(
            use_cached_version_if_available,
            re_request_on_stale,
            links_to_follow,
        )
        .with_time_to_live(self.time_to_live_ms());
        service.fetch_single(href, query, &self.extra_args())
    }

    fn find_list_by_href(
        &self,
        service: &BaseDataService,
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
        .with_options(options)
        .with_time_to_live(self.time_to_live_ms());
        service.fetch_list(href, query, &self.extra_args())
    }
}

/// Strategy with no type-specific behavior beyond an optional lifetime.
#[derive(Debug, Clone, Default)]
pub struct GenericStrategy {
    time_to_live_ms: Option<u64>,
}

impl GenericStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_to_live(time_to_live_ms: u64) -> Self {
        Self {
            time_to_live_ms: Some(time_to_live_ms),
        }
    }
}

impl DataAccessStrategy for GenericStrategy {
    fn time_to_live_ms(&self) -> Option<u64> {
        self.time_to_live_ms
    }
}
