//! Observable result of a remote fetch.

use serde::Serialize;

use super::types::RequestId;

/// Lifecycle of a request record.
///
/// Staleness is tracked separately (see [`RemoteData::is_stale`]) and only
/// applies to the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RequestEntryState {
    RequestPending,
    ResponsePending,
    Success,
    Error,
}

impl RequestEntryState {
    pub fn is_pending(self) -> bool {
        matches!(self, Self::RequestPending | Self::ResponsePending)
    }

    pub fn is_completed(self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteData<T> {
    request_id: Option<RequestId>,
    state: RequestEntryState,
    is_stale: bool,
    last_updated: u64,
    time_completed: Option<u64>,
    time_to_live_ms: Option<u64>,
    status_code: Option<u16>,
    error_message: Option<String>,
    payload: Option<T>,
}

impl<T> RemoteData<T> {
    /// A request that exists but has not produced a response yet.
    pub fn pending(
        request_id: Option<RequestId>,
        state: RequestEntryState,
        last_updated: u64,
    ) -> Self {
        debug_assert!(state.is_pending());
        Self {
            request_id,
            state,
            is_stale: false,
            last_updated,
            time_completed: None,
            time_to_live_ms: None,
            status_code: None,
            error_message: None,
            payload: None,
        }
    }

    pub fn success(
        request_id: Option<RequestId>,
        payload: Option<T>,
        status_code: u16,
        completed_at: u64,
        time_to_live_ms: u64,
    ) -> Self {
        Self {
            request_id,
            state: RequestEntryState::Success,
            is_stale: false,
            last_updated: completed_at,
            time_completed: Some(completed_at),
            time_to_live_ms: Some(time_to_live_ms),
            status_code: Some(status_code),
            error_message: None,
            payload,
        }
    }

    pub fn error(
        request_id: Option<RequestId>,
        status_code: u16,
        message: impl Into<String>,
        completed_at: u64,
        time_to_live_ms: u64,
    ) -> Self {
        Self {
            request_id,
            state: RequestEntryState::Error,
            is_stale: false,
            last_updated: completed_at,
            time_completed: Some(completed_at),
            time_to_live_ms: Some(time_to_live_ms),
            status_code: Some(status_code),
            error_message: Some(message.into()),
            payload: None,
        }
    }

    /// Completed result with no payload and no backing request.
    ///
    /// Produced for optional links that are not declared and for links whose
    /// href is missing on the resource.
    pub fn empty() -> Self {
        Self {
            request_id: None,
            state: RequestEntryState::Success,
            is_stale: false,
            last_updated: 0,
            time_completed: Some(0),
            time_to_live_ms: None,
            status_code: None,
            error_message: None,
            payload: None,
        }
    }

    /// Marks a terminal result stale. Pending results are returned unchanged.
    pub fn into_stale(mut self) -> Self {
        if self.state.is_completed() {
            self.is_stale = true;
        }
        self
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn state(&self) -> RequestEntryState {
        self.state
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub fn is_request_pending(&self) -> bool {
        self.state == RequestEntryState::RequestPending
    }

    pub fn is_response_pending(&self) -> bool {
        self.state == RequestEntryState::ResponsePending
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_pending()
    }

    pub fn has_completed(&self) -> bool {
        self.state.is_completed()
    }

    pub fn has_succeeded(&self) -> bool {
        self.state == RequestEntryState::Success
    }

    pub fn has_failed(&self) -> bool {
        self.state == RequestEntryState::Error
    }

    pub fn is_success_stale(&self) -> bool {
        self.has_succeeded() && self.is_stale
    }

    pub fn is_error_stale(&self) -> bool {
        self.has_failed() && self.is_stale
    }

    /// Success without a payload (a `204` or an absent optional link).
    pub fn has_no_content(&self) -> bool {
        self.has_succeeded() && self.payload.is_none()
    }

    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    pub fn time_completed(&self) -> Option<u64> {
        self.time_completed
    }

    pub fn time_to_live_ms(&self) -> Option<u64> {
        self.time_to_live_ms
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn payload(&self) -> Option<&T> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// True once `time_completed + time_to_live_ms` lies strictly in the past.
    pub fn is_expired(&self, now: u64) -> bool {
        match (self.time_completed, self.time_to_live_ms) {
            (Some(completed), Some(ttl)) => completed.saturating_add(ttl) < now,
            _ => false,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RemoteData<U> {
        RemoteData {
            request_id: self.request_id,
            state: self.state,
            is_stale: self.is_stale,
            last_updated: self.last_updated,
            time_completed: self.time_completed,
            time_to_live_ms: self.time_to_live_ms,
            status_code: self.status_code,
            error_message: self.error_message,
            payload: self.payload.map(f),
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<RemoteData<U>, E> {
        let payload = self.payload.map(f).transpose()?;
        Ok(RemoteData {
            request_id: self.request_id,
            state: self.state,
            is_stale: self.is_stale,
            last_updated: self.last_updated,
            time_completed: self.time_completed,
            time_to_live_ms: self.time_to_live_ms,
            status_code: self.status_code,
            error_message: self.error_message,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_results_cannot_be_stale() {
        let rd = RemoteData::<()>::pending(None, RequestEntryState::ResponsePending, 5);
        let rd = rd.into_stale();
        assert!(!rd.is_stale());
        assert!(rd.is_loading());
        assert!(rd.is_response_pending());
    }

    #[test]
    fn stale_helpers_follow_terminal_state() {
        let ok = RemoteData::success(None, Some(1), 200, 10, 100).into_stale();
        assert!(ok.is_success_stale());
        assert!(!ok.is_error_stale());

        let failed = RemoteData::<u8>::error(None, 404, "Not Found", 10, 100).into_stale();
        assert!(failed.is_error_stale());
        assert_eq!(failed.status_code(), Some(404));
        assert_eq!(failed.error_message(), Some("Not Found"));
    }

    #[test]
    fn expiry_is_strict() {
        let rd = RemoteData::success(None, Some("x"), 200, 1_000, 500);
        assert!(!rd.is_expired(1_500));
        assert!(rd.is_expired(1_501));
    }

    #[test]
    fn empty_is_success_without_content() {
        let rd = RemoteData::<String>::empty();
        assert!(rd.has_completed());
        assert!(rd.has_no_content());
        assert!(rd.request_id().is_none());
        assert!(!rd.is_expired(u64::MAX));
    }

    #[test]
    fn map_keeps_metadata() {
        let rd = RemoteData::success(None, Some(2), 201, 7, 9).map(|n| n * 10);
        assert_eq!(rd.payload(), Some(&20));
        assert_eq!(rd.status_code(), Some(201));
        assert_eq!(rd.time_completed(), Some(7));
    }
}
