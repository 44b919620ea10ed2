use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("pending patch for `{key}` could not be applied: {reason}")]
    MalformedPatch { key: String, reason: String },
}

impl CacheError {
    pub fn malformed_patch(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedPatch {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}
