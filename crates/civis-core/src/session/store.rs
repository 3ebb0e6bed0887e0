//! Single source of truth for "who is logged in".
//!
//! The store owns the in-memory session, both persistence mirrors and the
//! transport token. Every transition runs under one lock and completes
//! without suspending, so observers only ever see `Anonymous` or a complete
//! `Authenticated` session.

use crate::error::Result;
use crate::events::{EventBus, ListenerId};
use crate::session::identity::{AdminIdentity, AdminPatch};
use crate::session::storage::{SessionStorage, TokenCookie};
use crate::session::token::decode_token;
use crate::transport::{ApiClient, UnauthorizedEvent};
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// An authenticated session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub admin: AdminIdentity,
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(Session),
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn admin(&self) -> Option<&AdminIdentity> {
        match self {
            SessionState::Authenticated(session) => Some(&session.admin),
            SessionState::Anonymous => None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            SessionState::Authenticated(session) => Some(&session.token),
            SessionState::Anonymous => None,
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    Explicit,
    Unauthorized,
}

/// Session store behavior switches.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Mark the token cookie `Secure`.
    pub production: bool,
    /// Recover the identity from the token's claims when the durable record
    /// is missing.
    pub decode_token_fallback: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            production: false,
            decode_token_fallback: true,
        }
    }
}

pub struct SessionStore {
    client: Arc<ApiClient>,
    storage: Arc<dyn SessionStorage>,
    options: SessionOptions,
    state: watch::Sender<SessionState>,
    /// Serializes transitions; never held across an await.
    transition: Mutex<()>,
    logout_events: EventBus<LogoutReason>,
    unauthorized_listener: Mutex<Option<ListenerId>>,
}

impl SessionStore {
    /// Create a store and subscribe it to the client's 401 events.
    pub fn new(client: Arc<ApiClient>, storage: Arc<dyn SessionStorage>, options: SessionOptions) -> Arc<Self> {
        let (state, _) = watch::channel(SessionState::Anonymous);
        let store = Arc::new(Self {
            client: Arc::clone(&client),
            storage,
            options,
            state,
            transition: Mutex::new(()),
            logout_events: EventBus::new(),
            unauthorized_listener: Mutex::new(None),
        });

        let weak: Weak<Self> = Arc::downgrade(&store);
        let id = client.on_unauthorized(move |event| {
            if let Some(store) = weak.upgrade() {
                store.handle_unauthorized(event);
            }
        });
        *store
            .unauthorized_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);

        store
    }

    /// Current state snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn admin(&self) -> Option<AdminIdentity> {
        self.state.borrow().admin().cloned()
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().token().map(str::to_string)
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Run `listener` synchronously whenever a session ends.
    pub fn on_logout<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&LogoutReason) + Send + Sync + 'static,
    {
        self.logout_events.subscribe(listener)
    }

    /// Rebuild the session from the persistence mirrors at startup.
    pub fn restore(&self) -> SessionState {
        let _guard = self.lock_transition();
        let now = Utc::now();

        let cookie = self.storage.load_cookie().unwrap_or_else(|e| {
            warn!("Failed to read token cookie: {}", e);
            None
        });

        let Some(cookie) = cookie else {
            // A record without its token is the tail of an interrupted logout.
            self.clear_mirrors();
            return self.state();
        };

        if cookie.is_expired(now) {
            info!("Stored session cookie expired, starting anonymous");
            self.clear_mirrors();
            return self.state();
        }

        let record = self.storage.load_identity().unwrap_or_else(|e| {
            warn!("Failed to read identity record: {}", e);
            None
        });

        let admin = match record {
            Some(admin) => Some(admin),
            None if self.options.decode_token_fallback => match decode_token(&cookie.value) {
                Ok(decoded) if !decoded.is_expired(now) => {
                    debug!("Recovered identity for {} from token claims", decoded.admin.user_id);
                    if let Err(e) = self.storage.save_identity(&decoded.admin) {
                        warn!("Failed to re-persist recovered identity: {}", e);
                    }
                    Some(decoded.admin)
                }
                Ok(_) => {
                    info!("Stored token expired, starting anonymous");
                    None
                }
                Err(e) => {
                    warn!("Discarding undecodable stored token: {}", e);
                    None
                }
            },
            None => None,
        };

        match admin {
            Some(admin) => {
                self.client.set_token(Some(cookie.value.clone()));
                self.state.send_replace(SessionState::Authenticated(Session {
                    token: cookie.value,
                    admin,
                }));
                info!("Session restored");
            }
            None => self.clear_mirrors(),
        }
        self.state()
    }

    /// Start a session.
    ///
    /// The cookie is written before the identity record. If either write
    /// fails the store tears down to `Anonymous` and returns the error, so
    /// a token is never left without its identity.
    pub fn login(&self, token: &str, admin: AdminIdentity, remember: bool) -> Result<()> {
        let _guard = self.lock_transition();
        let cookie = TokenCookie::for_login(token, remember, self.options.production, Utc::now());

        let written = self
            .storage
            .save_cookie(&cookie)
            .and_then(|()| self.storage.save_identity(&admin));

        if let Err(e) = written {
            warn!("Login persistence failed, rolling back: {}", e);
            self.end_session(LogoutReason::Explicit);
            return Err(e);
        }

        self.client.set_token(Some(token.to_string()));
        let user_id = admin.user_id.clone();
        self.state.send_replace(SessionState::Authenticated(Session {
            token: token.to_string(),
            admin,
        }));
        info!("Admin {} logged in (remember: {})", user_id, remember);
        Ok(())
    }

    /// End the session. Safe to call repeatedly.
    ///
    /// Returns true if a session was actually ended.
    pub fn logout(&self) -> bool {
        let _guard = self.lock_transition();
        self.end_session(LogoutReason::Explicit)
    }

    /// Merge `patch` into the current identity and re-persist it.
    ///
    /// Returns `Ok(false)` when there is no session.
    pub fn update_admin(&self, patch: &AdminPatch) -> Result<bool> {
        let _guard = self.lock_transition();

        let Some(mut admin) = self.admin() else {
            debug!("update_admin ignored: no active session");
            return Ok(false);
        };
        admin.apply(patch);
        self.storage.save_identity(&admin)?;

        self.state.send_if_modified(|state| match state {
            SessionState::Authenticated(session) if session.admin != admin => {
                session.admin = admin;
                true
            }
            _ => false,
        });
        Ok(true)
    }

    fn handle_unauthorized(&self, event: &UnauthorizedEvent) {
        let _guard = self.lock_transition();
        let current = self.token();
        match (&event.token, current) {
            (Some(sent), Some(current)) if *sent == current => {
                info!("Session rejected by {} {}, logging out", event.method, event.path);
                self.end_session(LogoutReason::Unauthorized);
            }
            _ => debug!("Ignoring 401 from {} for a token that is no longer active", event.path),
        }
    }

    /// Tear everything down. Caller holds the transition lock.
    fn end_session(&self, reason: LogoutReason) -> bool {
        let was_authenticated = self.is_authenticated();

        self.client.set_token(None);
        self.clear_mirrors();

        if was_authenticated {
            self.state.send_replace(SessionState::Anonymous);
            info!("Session ended ({:?})", reason);
            self.logout_events.emit(&reason);
        }
        was_authenticated
    }

    fn clear_mirrors(&self) {
        if let Err(e) = self.storage.clear_cookie() {
            warn!("Failed to clear token cookie: {}", e);
        }
        if let Err(e) = self.storage.clear_identity() {
            warn!("Failed to clear identity record: {}", e);
        }
    }

    fn lock_transition(&self) -> std::sync::MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        if let Some(id) = self
            .unauthorized_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            self.client.remove_unauthorized_listener(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::error::CivisError;
    use crate::session::storage::{FileSessionStorage, MemorySessionStorage};
    use crate::session::token::encode_test_token;
    use crate::transport::Method;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn client() -> Arc<ApiClient> {
        Arc::new(ApiClient::new(&ClientConfig::new("http://localhost:3333")).unwrap())
    }

    fn admin() -> AdminIdentity {
        serde_json::from_value(json!({
            "userId": "u1",
            "name": "A",
            "allowedCities": ["x"],
            "isSuperAdmin": false
        }))
        .unwrap()
    }

    fn store_with(storage: Arc<dyn SessionStorage>) -> (Arc<ApiClient>, Arc<SessionStore>) {
        let client = client();
        let store = SessionStore::new(Arc::clone(&client), storage, SessionOptions::default());
        (client, store)
    }

    /// Storage whose identity writes always fail.
    #[derive(Default)]
    struct FailingIdentityStorage {
        inner: MemorySessionStorage,
    }

    impl SessionStorage for FailingIdentityStorage {
        fn load_cookie(&self) -> Result<Option<TokenCookie>> {
            self.inner.load_cookie()
        }
        fn save_cookie(&self, cookie: &TokenCookie) -> Result<()> {
            self.inner.save_cookie(cookie)
        }
        fn clear_cookie(&self) -> Result<()> {
            self.inner.clear_cookie()
        }
        fn load_identity(&self) -> Result<Option<AdminIdentity>> {
            self.inner.load_identity()
        }
        fn save_identity(&self, _admin: &AdminIdentity) -> Result<()> {
            Err(CivisError::Storage {
                message: "disk full".into(),
                path: None,
            })
        }
        fn clear_identity(&self) -> Result<()> {
            self.inner.clear_identity()
        }
    }

    #[test]
    fn test_login_populates_both_mirrors_and_transport() {
        let storage = Arc::new(MemorySessionStorage::new());
        let (client, store) = store_with(storage.clone());

        store.login("tok123", admin(), true).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.admin().unwrap().name, "A");
        assert_eq!(client.token().as_deref(), Some("tok123"));
        let cookie = storage.load_cookie().unwrap().unwrap();
        assert_eq!(cookie.value, "tok123");
        assert!(!cookie.is_session_only());
        assert!(storage.load_identity().unwrap().is_some());
    }

    #[test]
    fn test_logout_clears_everything_and_is_idempotent() {
        let storage = Arc::new(MemorySessionStorage::new());
        let (client, store) = store_with(storage.clone());
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        store.on_logout(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.login("tok123", admin(), false).unwrap();
        assert!(store.logout());
        assert!(!store.logout());

        assert_eq!(store.state(), SessionState::Anonymous);
        assert_eq!(client.token(), None);
        assert!(storage.load_cookie().unwrap().is_none());
        assert!(storage.load_identity().unwrap().is_none());
        assert_eq!(ended.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_identity_write_leaves_no_token_behind() {
        let storage = Arc::new(FailingIdentityStorage::default());
        let (client, store) = store_with(storage.clone());

        let err = store.login("tok123", admin(), true).unwrap_err();
        assert!(matches!(err, CivisError::Storage { .. }));
        assert!(!store.is_authenticated());
        assert_eq!(client.token(), None);
        assert!(storage.load_cookie().unwrap().is_none());
    }

    #[test]
    fn test_update_admin_merges_and_persists() {
        let storage = Arc::new(MemorySessionStorage::new());
        let (_client, store) = store_with(storage.clone());

        let patch = AdminPatch {
            phone: Some("+55 11 90000-0000".into()),
            ..AdminPatch::default()
        };
        assert!(!store.update_admin(&patch).unwrap());

        store.login("tok123", admin(), true).unwrap();
        assert!(store.update_admin(&patch).unwrap());
        assert_eq!(store.admin().unwrap().phone.as_deref(), Some("+55 11 90000-0000"));
        assert_eq!(
            storage.load_identity().unwrap().unwrap().phone.as_deref(),
            Some("+55 11 90000-0000")
        );
        assert_eq!(store.token().as_deref(), Some("tok123"));
    }

    #[test]
    fn test_repeated_unauthorized_ends_session_once() {
        let (client, store) = store_with(Arc::new(MemorySessionStorage::new()));
        let ended = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ended);
        store.on_logout(move |reason| {
            assert_eq!(*reason, LogoutReason::Unauthorized);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let mut changes = store.subscribe();
        changes.mark_unchanged();

        store.login("tok123", admin(), true).unwrap();
        changes.mark_unchanged();

        // Two parallel requests carrying the same token both come back 401.
        client.handle_unauthorized(&Method::GET, "/api/dashboard/overview", Some("tok123".into()));
        client.handle_unauthorized(&Method::GET, "/api/dashboard/summary", Some("tok123".into()));

        assert_eq!(store.state(), SessionState::Anonymous);
        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert!(changes.has_changed().unwrap());
    }

    #[test]
    fn test_unauthorized_for_previous_token_keeps_new_session() {
        let (client, store) = store_with(Arc::new(MemorySessionStorage::new()));
        store.login("new-token", admin(), true).unwrap();

        client.handle_unauthorized(&Method::GET, "/api/admin/users", Some("old-token".into()));

        assert!(store.is_authenticated());
        assert_eq!(client.token().as_deref(), Some("new-token"));
    }

    #[test]
    fn test_restore_from_identity_record() {
        let temp = TempDir::new().unwrap();
        {
            let (_c, store) = store_with(Arc::new(FileSessionStorage::new(temp.path())));
            store.login("opaque", admin(), true).unwrap();
        }

        let (client, store) = store_with(Arc::new(FileSessionStorage::new(temp.path())));
        let state = store.restore();
        assert_eq!(state.admin().unwrap().user_id, "u1");
        assert_eq!(client.token().as_deref(), Some("opaque"));
    }

    #[test]
    fn test_restore_decodes_token_when_record_missing() {
        let storage = Arc::new(MemorySessionStorage::new());
        let token = encode_test_token(&json!({
            "userId": "u9",
            "name": "Prefeita",
            "isMayor": true,
            "exp": Utc::now().timestamp() + 3600
        }));
        storage
            .save_cookie(&TokenCookie::for_login(&token, true, false, Utc::now()))
            .unwrap();

        let (_client, store) = store_with(storage.clone());
        let state = store.restore();

        assert!(state.admin().unwrap().is_mayor);
        assert_eq!(storage.load_identity().unwrap().unwrap().user_id, "u9");
    }

    #[test]
    fn test_restore_rejects_undecodable_token() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage
            .save_cookie(&TokenCookie::for_login("opaque", true, false, Utc::now()))
            .unwrap();

        let (client, store) = store_with(storage.clone());
        assert_eq!(store.restore(), SessionState::Anonymous);
        assert_eq!(client.token(), None);
        assert!(storage.load_cookie().unwrap().is_none());
    }

    #[test]
    fn test_restore_without_fallback_ignores_token_claims() {
        let storage = Arc::new(MemorySessionStorage::new());
        let token = encode_test_token(&json!({ "userId": "u9", "name": "P" }));
        storage
            .save_cookie(&TokenCookie::for_login(&token, true, false, Utc::now()))
            .unwrap();

        let store = SessionStore::new(
            client(),
            storage,
            SessionOptions {
                production: false,
                decode_token_fallback: false,
            },
        );
        assert_eq!(store.restore(), SessionState::Anonymous);
    }

    #[test]
    fn test_restore_drops_record_without_cookie() {
        let storage = Arc::new(MemorySessionStorage::new());
        storage.save_identity(&admin()).unwrap();

        let (_client, store) = store_with(storage.clone());
        assert_eq!(store.restore(), SessionState::Anonymous);
        assert!(storage.load_identity().unwrap().is_none());
    }

    #[test]
    fn test_production_marks_cookie_secure() {
        let storage = Arc::new(MemorySessionStorage::new());
        let store = SessionStore::new(
            client(),
            storage.clone(),
            SessionOptions {
                production: true,
                ..SessionOptions::default()
            },
        );
        store.login("tok", admin(), false).unwrap();
        assert!(storage.load_cookie().unwrap().unwrap().secure);
    }

    #[test]
    fn test_dropping_store_unregisters_listener() {
        let client = client();
        let store = SessionStore::new(
            Arc::clone(&client),
            Arc::new(MemorySessionStorage::new()),
            SessionOptions::default(),
        );
        drop(store);
        client.handle_unauthorized(&Method::GET, "/x", Some("t".into()));
    }
}
