// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Client-side session state.
//!
//! The bearer credential lives in a [`CredentialStore`] under [`TOKEN_KEY`].
//! [`Session`] is the context object handed to guards and the request
//! authenticator; it never caches the token, so a logout is visible to the
//! very next read.

use crate::error::{ClientError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use taskboard_common::{Claims, token};
use tracing::{debug, warn};

/// Fixed key of the bearer credential.
pub const TOKEN_KEY: &str = "access_token";

/// Client-local key/value storage.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    values: RwLock<HashMap<String, String>>,
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}

/// A JSON object on disk. Every read goes back to the file.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::storage(format!("{}: {}", self.path.display(), e)))?;
        if data.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&data)
            .map_err(|e| ClientError::storage(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::storage(format!("{}: {}", parent.display(), e)))?;
        }
        let data = serde_json::to_string_pretty(values)
            .map_err(|e| ClientError::storage(e.to_string()))?;

        // Write to a sibling file, then rename over the original.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .map_err(|e| ClientError::storage(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::storage(format!("{}: {}", self.path.display(), e)))
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.save(&values)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock();
        let mut values = self.load()?;
        if values.remove(key).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AuthenticatedNonAdmin,
    AuthenticatedAdmin,
}

#[derive(Clone)]
pub struct Session {
    store: Arc<dyn CredentialStore>,
}

impl Session {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCredentialStore::default()))
    }

    /// The stored credential, if there is a non-empty one. Storage failures
    /// read as "no credential".
    pub fn token(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.trim().is_empty()),
            Err(e) => {
                warn!("Could not read the stored credential: {}", e);
                None
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Identity decoded from the credential. The signature is not checked here;
    /// the server does that on every request.
    pub fn claims(&self) -> Option<Claims> {
        let token = self.token()?;
        match token::decode_unverified(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                debug!("Stored credential carries no readable identity: {}", e);
                None
            }
        }
    }

    pub fn state(&self) -> SessionState {
        if !self.is_authenticated() {
            SessionState::Unauthenticated
        } else if self.claims().is_some_and(|c| c.has_admin_role()) {
            SessionState::AuthenticatedAdmin
        } else {
            SessionState::AuthenticatedNonAdmin
        }
    }

    pub fn store_token(&self, token: &str) -> Result<()> {
        self.store.set(TOKEN_KEY, token)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)
    }
}
