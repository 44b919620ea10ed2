//! Cache configuration.
//!
//! Loaded from the `[cache]` table of `hypercache.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

/// Fifteen minutes, the default lifetime of a successful response.
const DEFAULT_TIME_TO_LIVE_MS: u64 = 15 * 60 * 1000;
const DEFAULT_OBJECT_LIMIT: usize = 5000;
const DEFAULT_PATCH_BUFFER_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a completed request when its strategy sets none.
    pub default_time_to_live_ms: u64,
    /// Maximum number of entries in the object cache (LRU beyond that).
    pub object_limit: usize,
    /// Maximum number of patch batches waiting to be written back. Further
    /// patches are refused until a flush makes room.
    pub patch_buffer_limit: usize,
    /// Add `embed=` hints for followed links to outgoing hrefs.
    pub embed_hints: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_time_to_live_ms: DEFAULT_TIME_TO_LIVE_MS,
            object_limit: DEFAULT_OBJECT_LIMIT,
            patch_buffer_limit: DEFAULT_PATCH_BUFFER_LIMIT,
            embed_hints: true,
        }
    }
}

impl CacheConfig {
    /// Object limit as NonZeroUsize, clamped to 1.
    pub fn object_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.object_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Patch buffer limit as NonZeroUsize, clamped to 1.
    pub fn patch_buffer_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.patch_buffer_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
