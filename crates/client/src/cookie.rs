//! Persisted session cookie.
//!
//! The session survives reloads as a single cookie holding the raw token.
//! Its max-age is fixed when written and is *not* derived from the token's
//! own `exp`: the two clocks are independent.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use sessiongate_core::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "strict",
            SameSite::Lax => "lax",
            SameSite::None => "none",
        }
    }
}

/// How the session cookie is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookiePolicy {
    pub name: String,
    pub path: String,
    pub same_site: SameSite,
    pub max_age_secs: i64,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            name: "jwt-token".to_string(),
            path: "/".to_string(),
            same_site: SameSite::Strict,
            max_age_secs: 86_400,
        }
    }
}

impl CookiePolicy {
    /// Cookie carrying `value`, expiring `max_age_secs` after `now`.
    pub fn issue(&self, value: &str, now: DateTime<Utc>) -> StoredCookie {
        StoredCookie {
            name: self.name.clone(),
            value: value.to_string(),
            path: self.path.clone(),
            same_site: self.same_site,
            expires_at: now + Duration::seconds(self.max_age_secs),
        }
    }

    /// `Set-Cookie` style attribute string for `value`.
    pub fn render(&self, value: &str) -> String {
        format!(
            "{}={}; path={}; samesite={}; max-age={}",
            self.name,
            value,
            self.path,
            self.same_site.as_str(),
            self.max_age_secs
        )
    }

    /// Attribute string that deletes the cookie.
    pub fn render_removal(&self) -> String {
        format!(
            "{}=; path={}; samesite={}; max-age=0",
            self.name,
            self.path,
            self.same_site.as_str()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub path: String,
    pub same_site: SameSite,
    pub expires_at: DateTime<Utc>,
}

impl StoredCookie {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CookieError {
    #[error("cookie storage IO failed: {0}")]
    Io(String),

    #[error("cookie storage is corrupt: {0}")]
    Corrupt(String),
}

/// Storage for the persisted session cookie.
///
/// Implementations must forget cookies whose max-age has elapsed.
#[async_trait]
pub trait CookieStore: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<String>, CookieError>;

    async fn set(&self, cookie: StoredCookie) -> Result<(), CookieError>;

    async fn remove(&self, name: &str) -> Result<(), CookieError>;
}

/// In-process cookie jar (tests, embedded hosts).
pub struct MemoryCookieStore {
    cookies: Mutex<HashMap<String, StoredCookie>>,
    clock: Arc<dyn Clock>,
}

impl MemoryCookieStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            cookies: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Raw stored entry, including attributes.
    pub async fn entry(&self, name: &str) -> Option<StoredCookie> {
        self.cookies.lock().await.get(name).cloned()
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get(&self, name: &str) -> Result<Option<String>, CookieError> {
        let now = self.clock.now();
        let mut cookies = self.cookies.lock().await;
        match cookies.get(name) {
            Some(c) if c.is_live(now) => Ok(Some(c.value.clone())),
            Some(_) => {
                cookies.remove(name);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, cookie: StoredCookie) -> Result<(), CookieError> {
        self.cookies.lock().await.insert(cookie.name.clone(), cookie);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), CookieError> {
        self.cookies.lock().await.remove(name);
        Ok(())
    }
}

/// Cookie jar persisted as a JSON file (used by the CLI between runs).
pub struct FileCookieStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    lock: Mutex<()>,
}

impl FileCookieStore {
    pub fn new(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            path: path.into(),
            clock,
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<HashMap<String, StoredCookie>, CookieError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| CookieError::Corrupt(format!("{}: {}", self.path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(CookieError::Io(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn write_all(&self, cookies: &HashMap<String, StoredCookie>) -> Result<(), CookieError> {
        let bytes = serde_json::to_vec_pretty(cookies)
            .map_err(|e| CookieError::Corrupt(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CookieError::Io(format!("{}: {}", parent.display(), e)))?;
            }
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| CookieError::Io(format!("{}: {}", self.path.display(), e)))
    }
}

#[async_trait]
impl CookieStore for FileCookieStore {
    async fn get(&self, name: &str) -> Result<Option<String>, CookieError> {
        let _guard = self.lock.lock().await;
        let now = self.clock.now();
        Ok(self
            .read_all()
            .await?
            .get(name)
            .filter(|c| c.is_live(now))
            .map(|c| c.value.clone()))
    }

    async fn set(&self, cookie: StoredCookie) -> Result<(), CookieError> {
        let _guard = self.lock.lock().await;
        let mut cookies = self.read_all().await?;
        cookies.insert(cookie.name.clone(), cookie);
        self.write_all(&cookies).await
    }

    async fn remove(&self, name: &str) -> Result<(), CookieError> {
        let _guard = self.lock.lock().await;
        let mut cookies = self.read_all().await?;
        if cookies.remove(name).is_some() {
            self.write_all(&cookies).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessiongate_core::ManualClock;

    #[test]
    fn renders_session_cookie_attributes() {
        let policy = CookiePolicy::default();
        assert_eq!(
            policy.render("abc.def.ghi"),
            "jwt-token=abc.def.ghi; path=/; samesite=strict; max-age=86400"
        );
        assert_eq!(
            policy.render_removal(),
            "jwt-token=; path=/; samesite=strict; max-age=0"
        );
    }

    #[tokio::test]
    async fn memory_cookie_expires_after_max_age() {
        let clock = Arc::new(ManualClock::from_timestamp(1_000));
        let store = MemoryCookieStore::new(clock.clone());
        let policy = CookiePolicy::default();

        store.set(policy.issue("tok", clock.now())).await.unwrap();
        clock.advance(Duration::seconds(86_399));
        assert_eq!(store.get("jwt-token").await.unwrap().as_deref(), Some("tok"));

        clock.advance(Duration::seconds(1));
        assert_eq!(store.get("jwt-token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_survives_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cookies.json");
        let clock = Arc::new(ManualClock::from_timestamp(1_000));
        let policy = CookiePolicy::default();

        let first = FileCookieStore::new(&path, clock.clone());
        first.set(policy.issue("persisted", clock.now())).await.unwrap();

        let second = FileCookieStore::new(&path, clock.clone());
        assert_eq!(second.get("jwt-token").await.unwrap().as_deref(), Some("persisted"));

        second.remove("jwt-token").await.unwrap();
        assert_eq!(first.get("jwt-token").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, b"{not json").unwrap();
        let store = FileCookieStore::new(&path, Arc::new(ManualClock::from_timestamp(0)));
        assert!(matches!(store.get("jwt-token").await, Err(CookieError::Corrupt(_))));
    }
}
