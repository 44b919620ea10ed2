//! Data-Access Orchestrator: href construction, request de-duplication,
//! response normalization and live [`RemoteData`](crate::domain::RemoteData)
//! handles.

mod builder;
mod handle;
mod href;
mod request_service;
mod response;
mod service;
mod strategy;

pub use builder::RemoteDataBuilder;
pub use handle::{HandlePayload, RemoteDataHandle};
pub use href::build_href;
pub use request_service::{
    Completion, METRIC_FETCH_MS, METRIC_REQUEST_COALESCED, METRIC_REQUEST_SENT, RequestService,
};
pub use response::PAGINATED_LIST_TYPE;
pub use service::{BaseDataService, BaseDataServiceBuilder, FlushReport};
pub use strategy::{DataAccessStrategy, FindQuery, GenericStrategy};
