//! Login session: token and user profile behind an injectable key/value store.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SessionStoreError;

const TOKEN_KEY: &str = "authToken";
const USER_KEY: &str = "user";

/// Persistent key/value storage for session data.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError>;
    fn remove(&self, key: &str) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// In-process store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        self.entries.lock().clear();
        Ok(())
    }
}

/// JSON file store. The whole map is rewritten on every mutation.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileSessionStore {
    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        let entries = if path.exists() {
            let json = std::fs::read_to_string(path)?;
            serde_json::from_str(&json)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), SessionStoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    // Mutations land in memory only once the file write succeeded.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.lock();
        if entries.contains_key(key) {
            let mut next = entries.clone();
            next.remove(key);
            self.persist(&next)?;
            *entries = next;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        let mut entries = self.entries.lock();
        self.persist(&BTreeMap::new())?;
        entries.clear();
        Ok(())
    }
}

/// Signed-in user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub group_name: Option<String>,
}

/// User profile as shown to the view, with the derived admin flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub is_admin: bool,
}

impl UserProfile {
    pub fn new(user: User) -> Self {
        let is_admin = is_admin_name(&user.username);
        Self { user, is_admin }
    }
}

fn is_admin_name(username: &str) -> bool {
    username.eq_ignore_ascii_case("admin")
}

/// Session context handed to everything that needs authentication.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn SessionStore>,
}

impl Session {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessionStore::new()))
    }

    pub fn get_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    /// A profile that fails to parse counts as signed out.
    pub fn get_user(&self) -> Option<User> {
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                log::warn!("[session] discarding unreadable user profile: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.get_token().is_some()
    }

    /// The signed-in profile, `None` when signed out.
    pub fn profile(&self) -> Option<UserProfile> {
        if !self.is_authenticated() {
            return None;
        }
        self.get_user().map(UserProfile::new)
    }

    pub fn store_login(&self, token: &str, user: &User) -> Result<(), SessionStoreError> {
        let json = serde_json::to_string(user)?;
        self.store.set(TOKEN_KEY, token)?;
        self.store.set(USER_KEY, &json)?;
        log::info!("[session] signed in as {}", user.username);
        Ok(())
    }

    pub fn logout(&self) -> Result<(), SessionStoreError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        log::info!("[session] signed out");
        Ok(())
    }

    /// Value for the `Authorization` header, if signed in.
    pub fn auth_header(&self) -> Option<String> {
        self.get_token().map(|t| format!("Bearer {}", t))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            id: "7".into(),
            username: name.into(),
            role: "member".into(),
            group_name: Some("dev".into()),
        }
    }

    #[test]
    fn login_then_logout() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());
        assert_eq!(session.auth_header(), None);

        session.store_login("tok-1", &user("alice")).unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.get_user().unwrap().username, "alice");
        assert_eq!(session.auth_header().as_deref(), Some("Bearer tok-1"));

        session.logout().unwrap();
        assert!(!session.is_authenticated());
        assert!(session.get_user().is_none());
    }

    #[test]
    fn admin_is_case_insensitive() {
        let session = Session::in_memory();
        session.store_login("t", &user("Admin")).unwrap();
        assert!(session.profile().unwrap().is_admin);
        session.store_login("t", &user("engineer404")).unwrap();
        assert!(!session.profile().unwrap().is_admin);
    }

    #[test]
    fn profile_carries_the_admin_flag() {
        let session = Session::in_memory();
        assert!(session.profile().is_none());

        session.store_login("t", &user("ADMIN")).unwrap();
        let profile = session.profile().unwrap();
        assert!(profile.is_admin);
        assert_eq!(profile.user.username, "ADMIN");

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["username"], "ADMIN");
        assert_eq!(json["is_admin"], true);
        assert_eq!(json["group_name"], "dev");

        session.logout().unwrap();
        assert!(session.profile().is_none());
    }

    #[test]
    fn corrupt_profile_reads_as_none() {
        let store = Arc::new(MemorySessionStore::new());
        store.set(USER_KEY, "{broken").unwrap();
        let session = Session::new(store);
        assert!(session.get_user().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        {
            let session = Session::new(Arc::new(FileSessionStore::open(&path).unwrap()));
            session.store_login("persisted", &user("bob")).unwrap();
        }
        let reopened = Session::new(Arc::new(FileSessionStore::open(&path).unwrap()));
        assert_eq!(reopened.get_token().as_deref(), Some("persisted"));
        assert_eq!(reopened.get_user().unwrap().username, "bob");

        reopened.logout().unwrap();
        let again = FileSessionStore::open(&path).unwrap();
        assert!(again.get(TOKEN_KEY).is_none());
    }

    #[test]
    fn file_store_clear_empties_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::open(&path).unwrap();
        store.set("a", "1").unwrap();
        store.clear().unwrap();
        assert!(FileSessionStore::open(&path).unwrap().get("a").is_none());
    }
}
