//! Mutations accepted by [`CacheStore::dispatch`](super::CacheStore::dispatch).

use json_patch::PatchOperation;

use crate::domain::{RequestId, Resource};

use super::requests::{RequestRecord, ResponsePayload};

#[derive(Debug, Clone)]
pub enum CacheAction {
    /// Store a resource under its self link.
    Put {
        resource: Resource,
        request_id: RequestId,
        time_to_live_ms: u64,
        fetched_at: u64,
        alternative_key: Option<String>,
    },
    /// Drop an entry and every index pointing at it.
    Remove { key: String },
    AddPatch {
        key: String,
        operations: Vec<PatchOperation>,
    },
    /// The server accepted the patch batch `seq`.
    ConfirmPatch { key: String, seq: u64 },
    AddDependency { dependent: String, dependee: String },
    RemoveDependents { key: String },
    Invalidate { key: String },
    ConfigureRequest(RequestRecord),
    RequestDispatched { id: RequestId, at: u64 },
    RequestSucceeded {
        id: RequestId,
        payload: ResponsePayload,
        status_code: u16,
        completed_at: u64,
    },
    RequestFailed {
        id: RequestId,
        status_code: u16,
        message: String,
        completed_at: u64,
    },
    MarkRequestStale { id: RequestId },
    /// Apply every action under one write lock, notifying once.
    Batch(Vec<CacheAction>),
}

impl CacheAction {
    pub fn name(&self) -> &'static str {
        match self {
            CacheAction::Put { .. } => "put",
            CacheAction::Remove { .. } => "remove",
            CacheAction::AddPatch { .. } => "add_patch",
            CacheAction::ConfirmPatch { .. } => "confirm_patch",
            CacheAction::AddDependency { .. } => "add_dependency",
            CacheAction::RemoveDependents { .. } => "remove_dependents",
            CacheAction::Invalidate { .. } => "invalidate",
            CacheAction::ConfigureRequest(_) => "configure_request",
            CacheAction::RequestDispatched { .. } => "request_dispatched",
            CacheAction::RequestSucceeded { .. } => "request_succeeded",
            CacheAction::RequestFailed { .. } => "request_failed",
            CacheAction::MarkRequestStale { .. } => "mark_request_stale",
            CacheAction::Batch(_) => "batch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Applied,
    /// Nothing changed: unknown key, or a transition that is not allowed.
    Ignored,
    /// A patch batch was recorded on the entry at `key`.
    Patched { key: String, seq: u64 },
    /// These requests went stale.
    MarkedStale(Vec<RequestId>),
}

impl DispatchOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, DispatchOutcome::Ignored)
    }

    fn from_flag(changed: bool) -> Self {
        if changed {
            DispatchOutcome::Applied
        } else {
            DispatchOutcome::Ignored
        }
    }
}

impl From<bool> for DispatchOutcome {
    fn from(changed: bool) -> Self {
        Self::from_flag(changed)
    }
}
