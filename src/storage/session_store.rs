use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// The raw `session` cookie as the backend set it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub value: String,
    /// Unix epoch seconds; `None` for a session cookie
    pub expires: Option<i64>,
}

impl Cookie {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires: None,
        }
    }

    /// Empty value with an expiry in the past
    pub fn cleared() -> Self {
        Self {
            value: String::new(),
            expires: Some(0),
        }
    }

    pub fn is_live_at(&self, now: i64) -> bool {
        !self.value.is_empty() && self.expires.map_or(true, |exp| exp > now)
    }
}

/// Holder of the session cookie. May change underneath the caller at any
/// time (callback in another window, logout elsewhere), so read it fresh.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Cookie>;

    fn save(&self, cookie: Cookie);
}

#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    cookie: Arc<RwLock<Option<Cookie>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cookie(cookie: Cookie) -> Self {
        Self {
            cookie: Arc::new(RwLock::new(Some(cookie))),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Cookie> {
        match self.cookie.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, cookie: Cookie) {
        match self.cookie.write() {
            Ok(mut guard) => *guard = Some(cookie),
            Err(poisoned) => *poisoned.into_inner() = Some(cookie),
        }
    }
}

/// Cookie persisted as JSON, shared by every process using the same data dir
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Cookie> {
        if !self.path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to read session file {:?}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(cookie) => Some(cookie),
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                None
            }
        }
    }

    fn save(&self, cookie: Cookie) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::error!("Failed to create session directory {:?}: {}", parent, e);
                return;
            }
        }

        let json = match serde_json::to_string_pretty(&cookie) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("Failed to serialize session cookie: {}", e);
                return;
            }
        };

        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::error!("Failed to write session file {:?}: {}", self.path, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_liveness() {
        assert!(Cookie::new("abc").is_live_at(1_000));
        assert!(!Cookie::cleared().is_live_at(1_000));
        assert!(!Cookie { value: "abc".to_string(), expires: Some(1_000) }.is_live_at(1_000));
    }

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));
        assert!(store.load().is_none());

        store.save(Cookie::new("abc"));
        assert_eq!(store.load(), Some(Cookie::new("abc")));

        store.save(Cookie::cleared());
        assert_eq!(store.load(), Some(Cookie::cleared()));
    }

    #[test]
    fn test_file_store_ignores_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(FileSessionStore::new(path).load().is_none());
    }
}
