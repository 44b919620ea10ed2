use json_patch::PatchOperation;

/// Ordered patch operations recorded against one cache key, waiting to be
/// written back to the server. `seq` orders batches across the whole cache.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchBatch {
    pub key: String,
    pub seq: u64,
    pub operations: Vec<PatchOperation>,
    pub queued_at: u64,
}
