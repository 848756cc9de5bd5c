//! Session capture and restore.
//!
//! The reader's position, mute state and zoom are written to the key-value
//! store after every successful render and every mute toggle, as a small
//! JSON document:
//!
//! ```json
//! {"currentPage": 4, "muted": true, "scale": 1.5, "timestamp": 1760000000000}
//! ```
//!
//! On startup the saved state is applied only if it is recent and fits the
//! document; anything else is treated as if nothing had been saved.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use storybook_provider::StoreHandle;
use time::UtcDateTime;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub current_page: u32,
    pub muted: bool,
    pub scale: f32,
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

fn unix_millis(at: UtcDateTime) -> i64 {
    i64::try_from(at.unix_timestamp_nanos() / 1_000_000).unwrap_or(i64::MAX)
}

impl SessionState {
    /// Snapshot stamped with the current time.
    pub fn capture(current_page: u32, muted: bool, scale: f32) -> Self {
        Self::capture_at(current_page, muted, scale, UtcDateTime::now())
    }

    pub fn capture_at(current_page: u32, muted: bool, scale: f32, at: UtcDateTime) -> Self {
        Self { current_page, muted, scale, timestamp: unix_millis(at) }
    }

    pub fn captured_at(&self) -> Option<UtcDateTime> {
        UtcDateTime::from_unix_timestamp_nanos(i128::from(self.timestamp) * 1_000_000).ok()
    }

    /// Check this state can be applied to a document of `total_pages` at `now`.
    ///
    /// # Errors
    /// [`PersistedStateInvalid`](ErrorKind::PersistedStateInvalid) when the
    /// state is at least `max_age` old, points outside the document or
    /// carries an unusable scale.
    pub fn validate(&self, total_pages: u32, max_age: Duration, now: UtcDateTime) -> Result<()> {
        let age = i128::from(unix_millis(now)) - i128::from(self.timestamp);
        if age >= i128::try_from(max_age.as_millis()).unwrap_or(i128::MAX) {
            exn::bail!(ErrorKind::PersistedStateInvalid);
        }
        if self.current_page == 0 || self.current_page > total_pages {
            exn::bail!(ErrorKind::PersistedStateInvalid);
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            exn::bail!(ErrorKind::PersistedStateInvalid);
        }
        Ok(())
    }
}

/// Reads and writes [`SessionState`] under a single store key.
pub struct SessionTracker {
    store: StoreHandle,
    key: String,
    max_age: Duration,
}

impl SessionTracker {
    pub fn new(store: StoreHandle, key: impl Into<String>, max_age: Duration) -> Self {
        Self { store, key: key.into(), max_age }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Write `state`. Failures are logged; persistence never interrupts reading.
    pub fn persist(&self, state: &SessionState) {
        let result = serde_json::to_string(state)
            .or_raise(|| ErrorKind::PersistedStateInvalid)
            .and_then(|json| self.store.set(&self.key, &json).or_raise(|| ErrorKind::PersistedStateInvalid));
        match result {
            Ok(()) => tracing::trace!(key = %self.key, page = state.current_page, "Session persisted"),
            Err(err) => tracing::warn!(key = %self.key, error = ?err, "Failed to persist session"),
        }
    }

    /// The saved state as stored, without any freshness checks.
    pub fn load(&self) -> Result<Option<SessionState>> {
        let Some(raw) = self.store.get(&self.key).or_raise(|| ErrorKind::PersistedStateInvalid)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).or_raise(|| ErrorKind::PersistedStateInvalid)
    }

    /// The saved state, if it is usable for a document of `total_pages` now.
    pub fn restore(&self, total_pages: u32) -> Option<SessionState> {
        self.restore_at(total_pages, UtcDateTime::now())
    }

    pub fn restore_at(&self, total_pages: u32, now: UtcDateTime) -> Option<SessionState> {
        let state = self.load().and_then(|state| match state {
            Some(state) => state.validate(total_pages, self.max_age, now).map(|()| Some(state)),
            None => Ok(None),
        });
        match state {
            Ok(state) => state,
            Err(err) => {
                tracing::debug!(key = %self.key, error = ?err, "Discarding saved session");
                None
            },
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.key).or_raise(|| ErrorKind::PersistedStateInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use storybook_provider::{KeyValueStore, MemoryStore};

    const WEEK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

    fn tracker() -> (Arc<MemoryStore>, SessionTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker = SessionTracker::new(store.clone(), "pdf-storybook-state", WEEK);
        (store, tracker)
    }

    #[test]
    fn test_wire_format() {
        let at = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let state = SessionState::capture_at(4, true, 1.5, at);
        assert_eq!(
            serde_json::to_string(&state).unwrap(),
            r#"{"currentPage":4,"muted":true,"scale":1.5,"timestamp":1700000000000}"#
        );
        assert_eq!(state.captured_at(), Some(at));
    }

    #[rstest]
    #[case::one_day(1, true)]
    #[case::six_days(6, true)]
    #[case::eight_days(8, false)]
    fn test_restore_respects_age(#[case] days_ago: i64, #[case] restored: bool) {
        let (_, tracker) = tracker();
        let now = UtcDateTime::now();
        let saved = SessionState::capture_at(4, true, 1.5, now - time::Duration::days(days_ago));
        tracker.persist(&saved);
        let state = tracker.restore_at(10, now);
        assert_eq!(state.is_some(), restored);
        if let Some(state) = state {
            assert_eq!(state.current_page, 4);
            assert!(state.muted);
        }
    }

    #[rstest]
    #[case::past_end(11, 1.5)]
    #[case::page_zero(0, 1.5)]
    #[case::zero_scale(4, 0.0)]
    fn test_restore_rejects_unusable_state(#[case] page: u32, #[case] scale: f32) {
        let (_, tracker) = tracker();
        tracker.persist(&SessionState::capture(page, false, scale));
        assert_eq!(tracker.restore(10), None);
    }

    #[test]
    fn test_restore_ignores_malformed_payload() {
        let (store, tracker) = tracker();
        store.set("pdf-storybook-state", "{\"currentPage\":").unwrap();
        assert!(matches!(&*tracker.load().unwrap_err(), ErrorKind::PersistedStateInvalid));
        assert_eq!(tracker.restore(10), None);
    }

    #[test]
    fn test_absent_and_clear() {
        let (_, tracker) = tracker();
        assert_eq!(tracker.load().unwrap(), None);
        tracker.persist(&SessionState::capture(2, false, 1.5));
        assert!(tracker.load().unwrap().is_some());
        tracker.clear().unwrap();
        assert_eq!(tracker.restore(10), None);
    }
}
