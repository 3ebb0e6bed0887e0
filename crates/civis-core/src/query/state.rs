//! Public view of a cache entry.

use crate::error::CivisError;
use crate::config::CacheDefaults;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Fetch lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Never fetched.
    Idle,
    /// First fetch in flight, no data yet.
    Loading,
    /// Last applied fetch succeeded.
    Success,
    /// Last applied fetch failed; earlier data may still be present.
    Error,
}

/// Snapshot of a query as seen by a subscriber.
#[derive(Debug, Clone)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub error: Option<CivisError>,
    pub status: FetchStatus,
    /// A request for this key is in flight.
    pub is_fetching: bool,
    /// Data is older than `stale_time` or was invalidated.
    pub is_stale: bool,
    /// `data` belongs to the previous page, shown while the current one loads.
    pub is_placeholder: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl<T> QueryState<T> {
    pub(crate) fn idle() -> Self {
        Self {
            data: None,
            error: None,
            status: FetchStatus::Idle,
            is_fetching: false,
            is_stale: true,
            is_placeholder: false,
            updated_at: None,
        }
    }

    /// Nothing to show yet and a request is running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    pub fn is_success(&self) -> bool {
        self.status == FetchStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == FetchStatus::Error
    }
}

/// Per-subscription cache behavior.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// How long fetched data counts as fresh.
    pub stale_time: Duration,
    /// How long an entry without subscribers is kept.
    pub gc_time: Duration,
    /// Keep showing the previous page while the next one loads.
    pub keep_previous_data: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: CacheDefaults::STALE_TIME,
            gc_time: CacheDefaults::GC_TIME,
            keep_previous_data: false,
        }
    }
}

impl QueryOptions {
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn gc_time(mut self, gc_time: Duration) -> Self {
        self.gc_time = gc_time;
        self
    }

    pub fn keep_previous_data(mut self, keep: bool) -> Self {
        self.keep_previous_data = keep;
        self
    }

    /// Options used by paginated lists.
    pub fn paginated() -> Self {
        Self::default().keep_previous_data(true)
    }
}
