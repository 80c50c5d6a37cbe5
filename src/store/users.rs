//! Registered users with salted password digests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::core::error::CoreError;

pub const USERS_FILE: &str = "users.json";

pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub hashed_password: String,
    pub salt: String,
    pub registered_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn verify_password(&self, password: &str) -> bool {
        hash_password(password, &self.salt) == self.hashed_password
    }
}

pub struct UserStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl UserStore {
    pub fn new(data_dir: &Path) -> Self {
        UserStore {
            path: data_dir.join(USERS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn all(&self) -> Vec<UserRecord> {
        let _guard = self.lock.lock().unwrap();
        super::read_json_or(&self.path, Vec::new)
    }

    /// Usernames are stored trimmed, so lookup trims too.
    pub fn find_by_username(&self, username: &str) -> Option<UserRecord> {
        let username = username.trim();
        self.all().into_iter().find(|u| u.username == username)
    }

    /// Creates a user with the next sequential id. Fails on an empty
    /// username or a duplicate.
    pub fn create(&self, username: &str, password: &str) -> Result<UserRecord, CoreError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CoreError::InvalidUsername);
        }

        let _guard = self.lock.lock().unwrap();
        let mut users: Vec<UserRecord> = super::read_json_or(&self.path, Vec::new);
        if users.iter().any(|u| u.username == username) {
            return Err(CoreError::DuplicateUsername(username.to_string()));
        }

        let user_id = users.iter().map(|u| u.user_id).max().unwrap_or(0) + 1;
        let salt = Uuid::new_v4().simple().to_string();
        let user = UserRecord {
            user_id,
            username: username.to_string(),
            hashed_password: hash_password(password, &salt),
            salt,
            registered_at: Utc::now(),
        };
        users.push(user.clone());
        super::write_json_atomic(&self.path, &users)?;
        info!(user_id, username, "user created");
        Ok(user)
    }
}
