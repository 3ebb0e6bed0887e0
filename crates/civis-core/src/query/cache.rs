//! Keyed cache of remote resources.
//!
//! Guarantees:
//! - at most one request per key is in flight unless an invalidation or an
//!   explicit refetch supersedes it
//! - the result of the most recently issued request wins; a response that
//!   arrives after a newer one has been applied is discarded
//! - a failed fetch records the error and keeps earlier data
//! - responses for keys nobody watches anymore are stored for reuse
//!
//! All bookkeeping happens under one mutex that is never held across an
//! await. Fetches are spawned onto the Tokio runtime so they run to
//! completion even when every caller stops waiting.

use crate::error::{CivisError, Result};
use crate::query::key::QueryKey;
use crate::query::state::{FetchStatus, QueryOptions, QueryState};
use crate::query::subscription::Subscription;
use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

pub(crate) type AnyValue = Arc<dyn Any + Send + Sync>;
pub(crate) type FetchFuture = BoxFuture<'static, Result<AnyValue>>;
pub(crate) type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;
pub(crate) type SharedFetch = Shared<FetchFuture>;

/// Type-erase a typed fetch function.
pub(crate) fn erase_fetcher<T, F, Fut>(fetch: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetch();
        async move { fut.await.map(|value| Arc::new(value) as AnyValue) }.boxed()
    })
}

pub(crate) fn downcast<T: Send + Sync + 'static>(value: AnyValue, key: &QueryKey) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| CivisError::TypeMismatch { key: key.to_string() })
}

struct InFlight {
    seq: u64,
    task: SharedFetch,
}

struct Entry {
    /// Distinguishes a re-created entry from one that was removed.
    id: u64,
    data: Option<AnyValue>,
    error: Option<CivisError>,
    status: FetchStatus,
    updated_at: Option<DateTime<Utc>>,
    fetched_at: Option<Instant>,
    invalidated: bool,
    in_flight: Option<InFlight>,
    applied_seq: u64,
    fetcher: Option<Fetcher>,
    subscribers: usize,
    unsubscribed_since: Option<Instant>,
    stale_time: Duration,
    gc_time: Duration,
    /// Bumped on every observable change.
    version: u64,
}

impl Entry {
    fn new(id: u64, options: &QueryOptions) -> Self {
        Self {
            id,
            data: None,
            error: None,
            status: FetchStatus::Idle,
            updated_at: None,
            fetched_at: None,
            invalidated: false,
            in_flight: None,
            applied_seq: 0,
            fetcher: None,
            subscribers: 0,
            unsubscribed_since: Some(Instant::now()),
            stale_time: options.stale_time,
            gc_time: options.gc_time,
            version: 0,
        }
    }

    fn is_stale(&self, stale_time: Duration, now: Instant) -> bool {
        self.invalidated
            || self
                .fetched_at
                .map(|at| now.duration_since(at) >= stale_time)
                .unwrap_or(true)
    }

    fn needs_fetch(&self, stale_time: Duration, now: Instant) -> bool {
        if self.in_flight.is_some() {
            return false;
        }
        match self.status {
            FetchStatus::Idle | FetchStatus::Error => true,
            FetchStatus::Loading | FetchStatus::Success => self.is_stale(stale_time, now),
        }
    }

    fn state<T: Send + Sync + 'static>(&self, key: &QueryKey, now: Instant) -> QueryState<T> {
        let (data, error) = match self.data.clone().map(|d| downcast::<T>(d, key)) {
            Some(Ok(data)) => (Some(data), self.error.clone()),
            Some(Err(mismatch)) => (None, Some(mismatch)),
            None => (None, self.error.clone()),
        };
        QueryState {
            data,
            error,
            status: self.status,
            is_fetching: self.in_flight.is_some(),
            is_stale: self.is_stale(self.stale_time, now),
            is_placeholder: false,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, Entry>,
    next_entry_id: u64,
    next_seq: u64,
}

impl CacheState {
    fn entry_mut(&mut self, key: &QueryKey, options: &QueryOptions) -> &mut Entry {
        let next_id = &mut self.next_entry_id;
        self.entries.entry(key.clone()).or_insert_with(|| {
            *next_id += 1;
            Entry::new(*next_id, options)
        })
    }
}

pub(crate) struct CacheInner {
    state: Mutex<CacheState>,
    changes: watch::Sender<u64>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.changes.send_modify(|v| *v = v.wrapping_add(1));
    }

    pub(crate) fn watch_changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Issue a new request for `key`, superseding any in-flight one.
    fn start_fetch(self: &Arc<Self>, state: &mut CacheState, key: &QueryKey, fetcher: Fetcher) -> SharedFetch {
        state.next_seq += 1;
        let seq = state.next_seq;
        let entry = state.entry_mut(key, &QueryOptions::default());
        let entry_id = entry.id;

        let fut = fetcher();
        let weak = Arc::downgrade(self);
        let task_key = key.clone();
        let task: SharedFetch = async move {
            let result = fut.await;
            if let Some(inner) = weak.upgrade() {
                inner.apply_result(&task_key, entry_id, seq, &result);
            }
            result
        }
        .boxed()
        .shared();

        if entry.in_flight.is_some() {
            debug!("Superseding in-flight fetch for {}", key);
        }
        entry.in_flight = Some(InFlight {
            seq,
            task: task.clone(),
        });
        entry.fetcher = Some(fetcher);
        if entry.data.is_none() {
            entry.status = FetchStatus::Loading;
        }
        entry.version += 1;
        debug!("Fetching {} (seq {})", key, seq);

        tokio::spawn(task.clone());
        task
    }

    fn apply_result(&self, key: &QueryKey, entry_id: u64, seq: u64, result: &Result<AnyValue>) {
        {
            let mut state = self.lock();
            let Some(entry) = state.entries.get_mut(key).filter(|e| e.id == entry_id) else {
                debug!("Dropping response for removed entry {}", key);
                return;
            };

            if entry.in_flight.as_ref().map(|f| f.seq) == Some(seq) {
                entry.in_flight = None;
            }

            if seq <= entry.applied_seq {
                debug!("Discarding out-of-order response for {} (seq {} <= {})", key, seq, entry.applied_seq);
                entry.version += 1;
            } else {
                entry.applied_seq = seq;
                match result {
                    Ok(value) => {
                        entry.data = Some(Arc::clone(value));
                        entry.error = None;
                        entry.status = FetchStatus::Success;
                        entry.updated_at = Some(Utc::now());
                        entry.fetched_at = Some(Instant::now());
                        entry.invalidated = false;
                    }
                    Err(err) => {
                        debug!("Fetch for {} failed: {}", key, err);
                        entry.error = Some(err.clone());
                        entry.status = FetchStatus::Error;
                    }
                }
                entry.version += 1;
            }
        }
        self.notify();
    }

    /// Register a subscriber and fetch if needed.
    pub(crate) fn attach(self: &Arc<Self>, key: &QueryKey, fetcher: Fetcher, options: &QueryOptions) -> u64 {
        let entry_id = {
            let mut state = self.lock();
            let now = Instant::now();
            let entry = state.entry_mut(key, options);
            entry.subscribers += 1;
            entry.unsubscribed_since = None;
            entry.stale_time = options.stale_time;
            entry.gc_time = options.gc_time;
            entry.fetcher = Some(Arc::clone(&fetcher));
            let entry_id = entry.id;

            if entry.needs_fetch(options.stale_time, now) {
                self.start_fetch(&mut state, key, fetcher);
            }
            entry_id
        };
        self.notify();
        entry_id
    }

    pub(crate) fn detach(&self, key: &QueryKey, entry_id: u64) {
        let mut state = self.lock();
        if let Some(entry) = state.entries.get_mut(key).filter(|e| e.id == entry_id) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.unsubscribed_since = Some(Instant::now());
            }
        }
    }

    /// Force a new request with `fetcher`.
    pub(crate) fn force_fetch(self: &Arc<Self>, key: &QueryKey, fetcher: Fetcher) -> SharedFetch {
        let task = {
            let mut state = self.lock();
            self.start_fetch(&mut state, key, fetcher)
        };
        self.notify();
        task
    }

    /// In-flight request for `key`, if any.
    pub(crate) fn in_flight(&self, key: &QueryKey) -> Option<SharedFetch> {
        self.lock()
            .entries
            .get(key)
            .and_then(|e| e.in_flight.as_ref().map(|f| f.task.clone()))
    }

    /// `(entry id, version)` of the entry currently stored under `key`.
    pub(crate) fn entry_version(&self, key: &QueryKey) -> Option<(u64, u64)> {
        self.lock().entries.get(key).map(|e| (e.id, e.version))
    }

    pub(crate) fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<(u64, QueryState<T>)> {
        let now = Instant::now();
        self.lock()
            .entries
            .get(key)
            .map(|e| (e.id, e.state::<T>(key, now)))
    }
}

/// Deduplicating cache of read operations.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                changes,
            }),
        }
    }

    /// Subscribe to `key`, fetching when there is no fresh data.
    ///
    /// Subscribers of the same key share one in-flight request. Must be
    /// called from within a Tokio runtime.
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> Subscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Subscription::new(Arc::clone(&self.inner), key, erase_fetcher(fetch), options)
    }

    /// Resolve `key` to data, reusing fresh data or an in-flight request.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetch: F, options: QueryOptions) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = {
            let mut state = self.inner.lock();
            let now = Instant::now();
            let entry = state.entry_mut(&key, &options);

            if !entry.is_stale(options.stale_time, now) && entry.status == FetchStatus::Success {
                if let Some(data) = entry.data.clone() {
                    return downcast(data, &key);
                }
            }

            if let Some(task) = entry.in_flight.as_ref().map(|f| f.task.clone()) {
                task
            } else {
                let task = self.inner.start_fetch(&mut state, &key, erase_fetcher(fetch));
                drop(state);
                self.inner.notify();
                task
            }
        };

        downcast(task.await?, &key)
    }

    /// Issue a new request for `key` even if one is in flight.
    pub async fn refetch<T, F, Fut>(&self, key: QueryKey, fetch: F) -> Result<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = self.inner.force_fetch(&key, erase_fetcher(fetch));
        downcast(task.await?, &key)
    }

    /// Mark every entry under `prefix` stale.
    ///
    /// Entries with subscribers are refetched immediately and this call
    /// waits for those requests, so the next read sees post-invalidation
    /// state. Entries without subscribers refetch when next subscribed.
    /// Returns the number of entries marked.
    pub async fn invalidate(&self, prefix: &QueryKey) -> usize {
        let (marked, pending) = {
            let mut state = self.inner.lock();
            let mut refetch: Vec<(QueryKey, Fetcher)> = Vec::new();
            let mut marked = 0;

            for (key, entry) in state.entries.iter_mut().filter(|(k, _)| k.starts_with(prefix)) {
                entry.invalidated = true;
                entry.version += 1;
                marked += 1;
                if entry.subscribers > 0 {
                    if let Some(fetcher) = &entry.fetcher {
                        refetch.push((key.clone(), Arc::clone(fetcher)));
                    }
                }
            }

            let pending: Vec<SharedFetch> = refetch
                .into_iter()
                .map(|(key, fetcher)| self.inner.start_fetch(&mut state, &key, fetcher))
                .collect();
            (marked, pending)
        };
        self.inner.notify();

        debug!("Invalidated {} entries under {}, refetching {}", marked, prefix, pending.len());
        join_all(pending).await;
        marked
    }

    /// Remove every entry under `prefix`.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let removed = {
            let mut state = self.inner.lock();
            let before = state.entries.len();
            state.entries.retain(|key, _| !key.starts_with(prefix));
            before - state.entries.len()
        };
        if removed > 0 {
            self.inner.notify();
        }
        removed
    }

    /// Drop every entry. Late responses for dropped entries are discarded.
    pub fn clear(&self) {
        let removed = {
            let mut state = self.inner.lock();
            let count = state.entries.len();
            state.entries.clear();
            count
        };
        info!("Query cache cleared ({} entries)", removed);
        self.inner.notify();
    }

    /// Current state of `key`, if it has an entry.
    pub fn get_state<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryState<T>> {
        self.inner.snapshot::<T>(key).map(|(_, state)| state)
    }

    pub fn get_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        self.get_state::<T>(key).and_then(|s| s.data)
    }

    /// Seed or overwrite the data of `key`.
    ///
    /// Responses to requests issued before this call are discarded.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        {
            let mut state = self.inner.lock();
            let seq = state.next_seq;
            let entry = state.entry_mut(&key, &QueryOptions::default());
            entry.data = Some(Arc::new(value) as AnyValue);
            entry.error = None;
            entry.status = FetchStatus::Success;
            entry.updated_at = Some(Utc::now());
            entry.fetched_at = Some(Instant::now());
            entry.invalidated = false;
            entry.applied_seq = entry.applied_seq.max(seq);
            entry.version += 1;
        }
        self.inner.notify();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Remove entries that have had no subscriber for their `gc_time`.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut state = self.inner.lock();
            let before = state.entries.len();
            state.entries.retain(|_, entry| {
                let expired = entry.subscribers == 0
                    && entry.in_flight.is_none()
                    && entry
                        .unsubscribed_since
                        .map(|since| now.duration_since(since) >= entry.gc_time)
                        .unwrap_or(false);
                !expired
            });
            before - state.entries.len()
        };
        if removed > 0 {
            debug!("Garbage-collected {} cache entries", removed);
        }
        removed
    }

    /// Run [`collect_garbage`](Self::collect_garbage) every `interval`
    /// until the cache is dropped.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                QueryCache { inner }.collect_garbage();
            }
        })
    }
}
