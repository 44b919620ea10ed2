//! Cache Store and Dependency Graph.
//!
//! - [`ObjectCache`]: resources by canonical self link, alternative-key
//!   index, per-entry pending patches, LRU bound.
//! - [`RequestTable`]: lifecycle of every submitted request.
//! - `deps`: "invalidate A when B is invalidated" edges, stored on entries.
//! - [`CacheStore`]: owns the object cache and request table; the only way
//!   to mutate them is [`CacheStore::dispatch`].
//! - [`PatchBuffer`]: patch batches waiting to be written back.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! default_time_to_live_ms = 900000
//! object_limit = 5000
//! patch_buffer_limit = 1000
//! embed_hints = true
//! ```

mod actions;
mod config;
mod deps;
mod error;
pub(crate) mod lock;
mod object_cache;
mod patch_buffer;
mod requests;
mod store;

pub use actions::{CacheAction, DispatchOutcome};
pub use config::CacheConfig;
pub use error::CacheError;
pub use object_cache::{CacheEntry, ObjectCache, PendingPatch, PutOutcome};
pub use patch_buffer::{PatchBuffer, Publish};
pub use requests::{RequestRecord, RequestTable, ResponsePayload};
pub use store::{CacheState, CacheStore};

pub(crate) use object_cache::{METRIC_OBJECT_EVICT, METRIC_OBJECT_HIT, METRIC_OBJECT_MISS};
pub(crate) use patch_buffer::METRIC_PATCH_BUFFER_LEN;
pub(crate) use requests::METRIC_REQUEST_STALE;
