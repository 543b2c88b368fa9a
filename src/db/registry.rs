//! Named connection profiles
//!
//! A [`ConnectionRegistry`] maps an alias to the parameters of a secondary
//! database. The import pipeline registers its MySQL source here for the
//! duration of one run. Registration hands back a [`ProfileGuard`]; the
//! profile stays registered exactly as long as the guard lives.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::MysqlSourceConfig;

/// Error returned when an alias is already taken
#[derive(Debug, thiserror::Error)]
#[error("Connection profile '{0}' is already registered")]
pub struct AliasInUse(pub String);

/// Registry of temporary connection profiles, keyed by alias.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    profiles: Mutex<HashMap<String, MysqlSourceConfig>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, MysqlSourceConfig>> {
        self.profiles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `profile` under `alias`.
    ///
    /// Fails if the alias is already registered, leaving the existing entry
    /// untouched.
    pub fn register(
        self: &Arc<Self>,
        alias: &str,
        profile: MysqlSourceConfig,
    ) -> Result<ProfileGuard, AliasInUse> {
        let mut profiles = self.lock();
        if profiles.contains_key(alias) {
            return Err(AliasInUse(alias.to_string()));
        }
        profiles.insert(alias.to_string(), profile);
        tracing::debug!("Registered connection profile '{}'", alias);

        Ok(ProfileGuard {
            registry: Arc::clone(self),
            alias: alias.to_string(),
            released: false,
        })
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.lock().contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn remove(&self, alias: &str) {
        if self.lock().remove(alias).is_some() {
            tracing::debug!("Deregistered connection profile '{}'", alias);
        }
    }
}

/// Keeps a profile registered; deregisters it on [`ProfileGuard::release`]
/// or on drop, whichever comes first.
#[derive(Debug)]
pub struct ProfileGuard {
    registry: Arc<ConnectionRegistry>,
    alias: String,
    released: bool,
}

impl ProfileGuard {
    pub fn release(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        if !self.released {
            self.registry.remove(&self.alias);
            self.released = true;
        }
    }
}

impl Drop for ProfileGuard {
    fn drop(&mut self) {
        self.deregister();
    }
}
