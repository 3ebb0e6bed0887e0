//! Builder for configuring AdminConsole initialization.

use crate::api::AdminApi;
use crate::AdminConsole;
use civis_core::config::CacheDefaults;
use civis_core::session::{FileSessionStorage, SessionOptions, SessionStorage};
use civis_core::{ApiClient, ClientConfig, MutationDispatcher, QueryCache, Result, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Builder for [`AdminConsole`].
///
/// # Example
///
/// ```rust,ignore
/// use civis_admin::AdminConsole;
/// use civis_core::ClientConfig;
///
/// let console = AdminConsole::builder(ClientConfig::from_env()?)
///     .gc_interval(None)
///     .build()?;
/// ```
pub struct AdminConsoleBuilder {
    config: ClientConfig,
    storage: Option<Arc<dyn SessionStorage>>,
    decode_token_fallback: bool,
    gc_interval: Option<Duration>,
}

impl AdminConsoleBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            storage: None,
            decode_token_fallback: true,
            gc_interval: Some(CacheDefaults::GC_INTERVAL),
        }
    }

    /// Persist the session somewhere other than the session directory.
    ///
    /// Default: [`FileSessionStorage`] in `ClientConfig::resolved_session_dir`.
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Recover the identity from the stored token when the identity record
    /// is missing.
    ///
    /// Default: `true`
    pub fn decode_token_fallback(mut self, enable: bool) -> Self {
        self.decode_token_fallback = enable;
        self
    }

    /// How often unused cache entries are swept. `None` disables the
    /// background sweep; `QueryCache::collect_garbage` can still be called.
    pub fn gc_interval(mut self, interval: Option<Duration>) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Build the console and restore any persisted session.
    pub fn build(self) -> Result<AdminConsole> {
        self.config.validate()?;

        let client = Arc::new(ApiClient::new(&self.config)?);
        let storage = match self.storage {
            Some(storage) => storage,
            None => {
                let dir = self.config.resolved_session_dir()?;
                debug!("Session directory: {}", dir.display());
                Arc::new(FileSessionStorage::new(dir)) as Arc<dyn SessionStorage>
            }
        };

        let session = SessionStore::new(
            Arc::clone(&client),
            storage,
            SessionOptions {
                production: self.config.production,
                decode_token_fallback: self.decode_token_fallback,
            },
        );

        let cache = QueryCache::new();
        let dispatcher = MutationDispatcher::new(cache.clone(), Some(Arc::clone(&session)));

        // No cached data outlives the session that fetched it.
        let on_logout = cache.clone();
        session.on_logout(move |reason| {
            debug!("Clearing query cache after logout ({:?})", reason);
            on_logout.clear();
        });

        let gc_task = match (self.gc_interval, tokio::runtime::Handle::try_current()) {
            (Some(interval), Ok(_)) => Some(cache.spawn_gc(interval)),
            (Some(_), Err(_)) => {
                warn!("No Tokio runtime at build time, cache garbage collection disabled");
                None
            }
            (None, _) => None,
        };

        let state = session.restore();
        info!(
            "Admin console ready at {} (session: {})",
            client.base_url(),
            if state.is_authenticated() { "restored" } else { "anonymous" }
        );

        Ok(AdminConsole {
            config: self.config,
            api: AdminApi::new(Arc::clone(&client)),
            client,
            session,
            cache,
            dispatcher,
            gc_task,
        })
    }
}
