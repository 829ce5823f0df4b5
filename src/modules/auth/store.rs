use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

use super::error::AuthError;
use crate::modules::utils::logging::log_store_operation;
use crate::modules::utils::time::get_current_timestamp;

/// Failures reported by a user store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("username '{0}' already exists")]
    Conflict(String),
    #[error("user '{0}' does not exist")]
    Missing(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt user file: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => AuthError::Conflict,
            StoreError::Missing(_) => AuthError::NotFound,
            other => AuthError::Storage(other.to_string()),
        }
    }
}

/// A registered principal as the store keeps it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub verified: bool,
    pub created_at: u64,
}

impl User {
    pub fn set_verified(&mut self, verified: bool) {
        self.verified = verified;
    }

    pub fn set_password_hash(&mut self, password_hash: String) {
        self.password_hash = password_hash;
    }

    /// The representation that may leave the service
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            username: self.username.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            verified: self.verified,
            created_at: self.created_at,
        }
    }
}

/// User without its password hash
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub verified: bool,
    pub created_at: u64,
}

/// Fields needed to create a user; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

impl NewUser {
    fn into_user(self) -> User {
        User {
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            password_hash: self.password_hash,
            verified: false,
            created_at: get_current_timestamp(),
        }
    }
}

/// Persistent user storage the account core runs against
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Create an unverified user; fails with `Conflict` on a taken username
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Persist every field of an existing user
    async fn save(&self, user: &User) -> Result<(), StoreError>;
}

/// Users held in process memory
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().unwrap_or_else(|p| p.into_inner());
        Ok(users.get(username).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        if users.contains_key(&new_user.username) {
            return Err(StoreError::Conflict(new_user.username));
        }
        let user = new_user.into_user();
        users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        match users.get_mut(&user.username) {
            Some(existing) => {
                *existing = user.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(user.username.clone())),
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct UserFile {
    users: HashMap<String, User>,
}

/// Users kept in a pretty-printed JSON file, rewritten on every change.
///
/// The whole file is loaded at open; writes go to a sibling temp file that
/// is renamed over the original.
pub struct JsonFileUserStore {
    path: PathBuf,
    users: RwLock<HashMap<String, User>>,
}

impl JsonFileUserStore {
    /// Open `path`, starting empty if it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let users = match fs::read_to_string(&path) {
            Ok(data) if data.trim().is_empty() => HashMap::new(),
            Ok(data) => serde_json::from_str::<UserFile>(&data)?.users,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::info!("Loaded {} users from {}", users.len(), path.display());

        Ok(Self {
            path,
            users: RwLock::new(users),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, users: &HashMap<String, User>) -> Result<(), StoreError> {
        let file = UserFile {
            users: users.clone(),
        };
        let data = serde_json::to_string_pretty(&file)?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(data.as_bytes())?;
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().unwrap_or_else(|p| p.into_inner());
        Ok(users.get(username).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        if users.contains_key(&new_user.username) {
            return Err(StoreError::Conflict(new_user.username));
        }

        let user = new_user.into_user();
        users.insert(user.username.clone(), user.clone());
        if let Err(e) = self.persist(&users) {
            users.remove(&user.username);
            log_store_operation("create", &user.username, "user_file", false, Some(&e.to_string()));
            return Err(e);
        }

        log_store_operation("create", &user.username, "user_file", true, None);
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());
        let previous = match users.get_mut(&user.username) {
            Some(existing) => std::mem::replace(existing, user.clone()),
            None => return Err(StoreError::Missing(user.username.clone())),
        };

        if let Err(e) = self.persist(&users) {
            users.insert(user.username.clone(), previous);
            log_store_operation("save", &user.username, "user_file", false, Some(&e.to_string()));
            return Err(e);
        }

        log_store_operation("save", &user.username, "user_file", true, None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            full_name: "Test User".to_string(),
            email: format!("{}@example.com", username),
            password_hash: "pbkdf2-sha256$1$00$00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_in_memory_create_and_find() {
        let store = InMemoryUserStore::new();
        let user = store.create(new_user("alice")).await.unwrap();

        assert!(!user.verified);
        assert_eq!(store.len(), 1);
        assert_eq!(store.find_by_username("alice").await.unwrap(), Some(user));
        assert_eq!(store.find_by_username("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_duplicate_is_conflict() {
        let store = InMemoryUserStore::new();
        store.create(new_user("alice")).await.unwrap();

        let err = store.create(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref name) if name == "alice"));
        assert!(matches!(AuthError::from(err), AuthError::Conflict));
    }

    #[tokio::test]
    async fn test_in_memory_save_updates_fields() {
        let store = InMemoryUserStore::new();
        let mut user = store.create(new_user("alice")).await.unwrap();

        user.set_verified(true);
        store.save(&user).await.unwrap();

        let stored = store.find_by_username("alice").await.unwrap().unwrap();
        assert!(stored.verified);
    }

    #[tokio::test]
    async fn test_save_of_unknown_user_fails() {
        let store = InMemoryUserStore::new();
        let user = new_user("ghost").into_user();

        assert!(matches!(store.save(&user).await, Err(StoreError::Missing(_))));
    }

    #[test]
    fn test_public_user_has_no_password_hash() {
        let user = new_user("alice").into_user();
        let json = serde_json::to_value(user.to_public()).unwrap();

        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "Test User");
        assert_eq!(json["verified"], false);
    }

    #[tokio::test]
    async fn test_json_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");

        {
            let store = JsonFileUserStore::open(&path).unwrap();
            let mut user = store.create(new_user("alice")).await.unwrap();
            user.set_verified(true);
            store.save(&user).await.unwrap();
        }

        let reopened = JsonFileUserStore::open(&path).unwrap();
        let user = reopened.find_by_username("alice").await.unwrap().unwrap();
        assert!(user.verified);
        assert!(matches!(
            reopened.create(new_user("alice")).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_json_file_store_rejects_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("users.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonFileUserStore::open(&path),
            Err(StoreError::Corrupt(_))
        ));
    }
}
