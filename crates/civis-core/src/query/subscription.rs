//! A live view onto one cache key.

use crate::error::Result;
use crate::query::cache::{erase_fetcher, CacheInner, Fetcher};
use crate::query::key::QueryKey;
use crate::query::state::{QueryOptions, QueryState};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Keeps a cache entry alive and observes it.
///
/// Dropping the subscription starts the entry's garbage-collection grace
/// period. Any request it started keeps running and its result is stored.
pub struct Subscription<T> {
    inner: Arc<CacheInner>,
    key: QueryKey,
    entry_id: u64,
    fetcher: Fetcher,
    options: QueryOptions,
    changes: watch::Receiver<u64>,
    seen: Option<(u64, u64)>,
    /// Data of the key this subscription watched before the last `set_key`.
    placeholder: Option<(QueryKey, Arc<T>)>,
}

impl<T: Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(inner: Arc<CacheInner>, key: QueryKey, fetcher: Fetcher, options: QueryOptions) -> Self {
        let changes = inner.watch_changes();
        let entry_id = inner.attach(&key, Arc::clone(&fetcher), &options);
        let seen = inner.entry_version(&key);
        Self {
            inner,
            key,
            entry_id,
            fetcher,
            options,
            changes,
            seen,
            placeholder: None,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Current state of the watched key.
    pub fn state(&self) -> QueryState<T> {
        let mut state = self
            .inner
            .snapshot::<T>(&self.key)
            .map(|(_, state)| state)
            .unwrap_or_else(QueryState::idle);

        if state.data.is_none() && self.options.keep_previous_data {
            if let Some((previous_key, data)) = &self.placeholder {
                if previous_key.differs_only_in_page(&self.key) {
                    state.data = Some(Arc::clone(data));
                    state.is_placeholder = true;
                }
            }
        }
        state
    }

    /// Wait until the watched entry changes.
    pub async fn changed(&mut self) {
        loop {
            self.changes.borrow_and_update();
            let current = self.inner.entry_version(&self.key);
            if current != self.seen {
                self.seen = current;
                return;
            }
            if self.changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until no request for the key is in flight and return the state.
    pub async fn settled(&mut self) -> QueryState<T> {
        loop {
            let state = self.state();
            if !state.is_fetching {
                return state;
            }
            self.changed().await;
        }
    }

    /// Issue a new request, superseding any in-flight one, and wait for it.
    pub async fn refetch(&mut self) -> QueryState<T> {
        let task = match self.inner.entry_version(&self.key) {
            Some((id, _)) if id == self.entry_id => Some(self.inner.force_fetch(&self.key, Arc::clone(&self.fetcher))),
            _ => {
                // Entry was removed; register again, which fetches.
                self.entry_id = self.inner.attach(&self.key, Arc::clone(&self.fetcher), &self.options);
                self.inner.in_flight(&self.key)
            }
        };
        if let Some(task) = task {
            let _ = task.await;
        }
        self.state()
    }

    /// Switch to another key, e.g. the next page of a list.
    ///
    /// With `keep_previous_data`, the old key's data is reported as a
    /// placeholder until the new key has data of its own.
    pub fn set_key<F, Fut>(&mut self, key: QueryKey, fetch: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if key == self.key {
            return;
        }
        if let Some(data) = self.state().data {
            self.placeholder = Some((self.key.clone(), data));
        }

        let fetcher = erase_fetcher(fetch);
        let entry_id = self.inner.attach(&key, Arc::clone(&fetcher), &self.options);
        self.inner.detach(&self.key, self.entry_id);

        self.seen = self.inner.entry_version(&key);
        self.key = key;
        self.entry_id = entry_id;
        self.fetcher = fetcher;
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.inner.detach(&self.key, self.entry_id);
    }
}
