//! Persistence mirrors for the session.
//!
//! A session is mirrored in two places: a token cookie and a durable
//! identity record. Only [`SessionStore`](super::SessionStore) writes either
//! of them, always as a pair.

use crate::config::SessionConfig;
use crate::error::{CivisError, Result};
use crate::session::identity::AdminIdentity;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
}

/// Cookie holding the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCookie {
    pub name: String,
    pub value: String,
    /// `None` for a session-only cookie.
    pub expires_at: Option<DateTime<Utc>>,
    pub secure: bool,
    pub same_site: SameSite,
}

impl TokenCookie {
    /// Build the cookie for a login. `remember` keeps it for seven days.
    pub fn for_login(token: &str, remember: bool, secure: bool, now: DateTime<Utc>) -> Self {
        Self {
            name: SessionConfig::COOKIE_NAME.to_string(),
            value: token.to_string(),
            expires_at: remember.then(|| now + ChronoDuration::days(SessionConfig::REMEMBER_ME_DAYS)),
            secure,
            same_site: SameSite::Strict,
        }
    }

    pub fn is_session_only(&self) -> bool {
        self.expires_at.is_none()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }

    /// Render as a `Set-Cookie` header value.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}; Path=/", self.name, self.value);
        if let Some(exp) = self.expires_at {
            out.push_str(&format!("; Expires={}", exp.format("%a, %d %b %Y %H:%M:%S GMT")));
        }
        out.push_str(match self.same_site {
            SameSite::Strict => "; SameSite=Strict",
            SameSite::Lax => "; SameSite=Lax",
        });
        if self.secure {
            out.push_str("; Secure");
        }
        out
    }
}

/// Backing store for the two session mirrors.
pub trait SessionStorage: Send + Sync {
    fn load_cookie(&self) -> Result<Option<TokenCookie>>;
    fn save_cookie(&self, cookie: &TokenCookie) -> Result<()>;
    fn clear_cookie(&self) -> Result<()>;

    fn load_identity(&self) -> Result<Option<AdminIdentity>>;
    fn save_identity(&self, admin: &AdminIdentity) -> Result<()>;
    fn clear_identity(&self) -> Result<()>;
}

/// In-process storage; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    cookie: Mutex<Option<TokenCookie>>,
    identity: Mutex<Option<AdminIdentity>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load_cookie(&self) -> Result<Option<TokenCookie>> {
        Ok(self.cookie.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save_cookie(&self, cookie: &TokenCookie) -> Result<()> {
        *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = Some(cookie.clone());
        Ok(())
    }

    fn clear_cookie(&self) -> Result<()> {
        *self.cookie.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn load_identity(&self) -> Result<Option<AdminIdentity>> {
        Ok(self.identity.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save_identity(&self, admin: &AdminIdentity) -> Result<()> {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = Some(admin.clone());
        Ok(())
    }

    fn clear_identity(&self) -> Result<()> {
        *self.identity.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

/// File-backed storage under a session directory.
///
/// Layout:
/// - `token.cookie.json`: persistent (remember-me) cookie
/// - `admin.json`: identity record
///
/// Session-only cookies are held in memory and never touch the disk, so
/// they end with the process just like a browser session cookie. While one
/// is active the identity record stays in memory as well.
pub struct FileSessionStorage {
    dir: PathBuf,
    session_cookie: Mutex<Option<TokenCookie>>,
    session_identity: Mutex<Option<AdminIdentity>>,
}

impl FileSessionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            session_cookie: Mutex::new(None),
            session_identity: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cookie_path(&self) -> PathBuf {
        self.dir.join(SessionConfig::COOKIE_FILENAME)
    }

    fn identity_path(&self) -> PathBuf {
        self.dir.join(SessionConfig::IDENTITY_FILENAME)
    }

    fn has_session_cookie(&self) -> bool {
        self.session_cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl SessionStorage for FileSessionStorage {
    fn load_cookie(&self) -> Result<Option<TokenCookie>> {
        if let Some(cookie) = self
            .session_cookie
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Ok(Some(cookie));
        }
        read_json(&self.cookie_path())
    }

    fn save_cookie(&self, cookie: &TokenCookie) -> Result<()> {
        if cookie.is_session_only() {
            remove_if_exists(&self.cookie_path())?;
            *self.session_cookie.lock().unwrap_or_else(PoisonError::into_inner) = Some(cookie.clone());
            return Ok(());
        }
        write_json_atomic(&self.cookie_path(), cookie)?;
        #[cfg(unix)]
        restrict_permissions(&self.cookie_path())?;
        *self.session_cookie.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn clear_cookie(&self) -> Result<()> {
        *self.session_cookie.lock().unwrap_or_else(PoisonError::into_inner) = None;
        remove_if_exists(&self.cookie_path())
    }

    fn load_identity(&self) -> Result<Option<AdminIdentity>> {
        if let Some(admin) = self
            .session_identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Ok(Some(admin));
        }
        read_json(&self.identity_path())
    }

    fn save_identity(&self, admin: &AdminIdentity) -> Result<()> {
        if self.has_session_cookie() {
            remove_if_exists(&self.identity_path())?;
            *self.session_identity.lock().unwrap_or_else(PoisonError::into_inner) = Some(admin.clone());
            return Ok(());
        }
        write_json_atomic(&self.identity_path(), admin)?;
        *self.session_identity.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    fn clear_identity(&self) -> Result<()> {
        *self.session_identity.lock().unwrap_or_else(PoisonError::into_inner) = None;
        remove_if_exists(&self.identity_path())
    }
}

/// Read a JSON file. A missing file is `None`; a corrupt one is reported
/// and treated as missing so a damaged record cannot wedge startup.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CivisError::storage(e, path)),
    };

    match serde_json::from_str(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring unreadable session file {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Write JSON through a temp file and rename it into place.
fn write_json_atomic<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| CivisError::storage(e, parent))?;
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", std::process::id()));
    let serialized = serde_json::to_string_pretty(data)?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| CivisError::storage(e, &temp_path))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| CivisError::storage(e, &temp_path))?;
        file.sync_all().map_err(|e| CivisError::storage(e, &temp_path))?;
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CivisError::storage(e, path)
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CivisError::storage(e, path)),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| CivisError::storage(e, path))
}
