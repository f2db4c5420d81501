//! Two-tier key-value persistence for session credentials.
//!
//! Writes go to the tier selected by the remember-me flag: the durable
//! tier is a JSON file under the user data directory, the session tier is
//! an in-process map that dies with the process. Reads check the durable
//! tier first and fall back to the session tier. Only one tier ever holds
//! the live copy of a key — writing to one removes the key from the other.
//!
//! Storage failures are never surfaced to callers: malformed JSON reads as
//! absence, and a `None` value passed to a store operation is a logged
//! no-op so a transient null can't clobber valid stored data.

use std::collections::HashMap;
use std::path::PathBuf;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::models::auth::{ActivityConfig, User};

/// Access token string.
pub const TOKEN_KEY: &str = "auth_token";
/// Refresh token string.
pub const REFRESH_TOKEN_KEY: &str = "auth_refresh_token";
/// JSON-serialized user record.
pub const USER_KEY: &str = "auth_user";
/// JSON-serialized activity config.
pub const ACTIVITY_CONFIG_KEY: &str = "auth_activity_config";
/// `"true"`/`"false"` — always in the durable tier regardless of value.
pub const REMEMBER_ME_KEY: &str = "auth_remember_me";

const SESSION_KEYS: [&str; 4] = [TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY, ACTIVITY_CONFIG_KEY];

/// Two-tier credential store.
pub struct TokenStore {
    session: DashMap<String, String>,
    durable_path: PathBuf,
}

impl TokenStore {
    /// Store backed by the default durable file under the user data dir.
    pub fn new() -> Self {
        Self::with_path(default_durable_path())
    }

    /// Store backed by an explicit durable file path.
    pub fn with_path(durable_path: PathBuf) -> Self {
        Self {
            session: DashMap::new(),
            durable_path,
        }
    }

    /// Current remember-me preference. Missing flag reads as `false`.
    pub fn remember_me(&self) -> bool {
        self.read_durable()
            .get(REMEMBER_ME_KEY)
            .is_some_and(|v| v == "true")
    }

    /// Persist the remember-me preference (always durable).
    pub fn set_remember_me(&self, remember: bool) {
        let mut map = self.read_durable();
        map.insert(REMEMBER_ME_KEY.to_string(), remember.to_string());
        self.write_durable(&map);
    }

    pub fn store_token(&self, token: Option<&str>) {
        self.store_raw(TOKEN_KEY, token);
    }

    pub fn stored_token(&self) -> Option<String> {
        self.read_raw(TOKEN_KEY)
    }

    pub fn store_refresh_token(&self, refresh_token: Option<&str>) {
        self.store_raw(REFRESH_TOKEN_KEY, refresh_token);
    }

    pub fn stored_refresh_token(&self) -> Option<String> {
        self.read_raw(REFRESH_TOKEN_KEY)
    }

    pub fn store_user(&self, user: Option<&User>) {
        let Some(user) = user else {
            warn!(key = USER_KEY, "null value, skipping store");
            return;
        };
        match serde_json::to_string(user) {
            Ok(json) => self.write_value(USER_KEY, &json),
            Err(e) => warn!(error = %e, "failed to serialize user"),
        }
    }

    /// Stored user record; malformed JSON reads as absence.
    pub fn stored_user(&self) -> Option<User> {
        self.read_raw(USER_KEY)
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    pub fn store_activity_config(&self, config: Option<&ActivityConfig>) {
        let Some(config) = config else {
            warn!(key = ACTIVITY_CONFIG_KEY, "null value, skipping store");
            return;
        };
        match serde_json::to_string(config) {
            Ok(json) => self.write_value(ACTIVITY_CONFIG_KEY, &json),
            Err(e) => warn!(error = %e, "failed to serialize activity config"),
        }
    }

    /// Stored activity config; malformed JSON reads as absence.
    pub fn stored_activity_config(&self) -> Option<ActivityConfig> {
        self.read_raw(ACTIVITY_CONFIG_KEY)
            .and_then(|json| serde_json::from_str(&json).ok())
    }

    /// Remove every session key from both tiers, plus the remember-me
    /// flag. Idempotent.
    pub fn clear(&self) {
        for key in SESSION_KEYS {
            self.session.remove(key);
        }
        let mut map = self.read_durable();
        for key in SESSION_KEYS {
            map.remove(key);
        }
        map.remove(REMEMBER_ME_KEY);
        self.write_durable(&map);
        debug!("stored session data cleared");
    }

    fn store_raw(&self, key: &'static str, value: Option<&str>) {
        let Some(value) = value else {
            warn!(key, "null value, skipping store");
            return;
        };
        self.write_value(key, value);
    }

    fn write_value(&self, key: &str, value: &str) {
        if self.remember_me() {
            let mut map = self.read_durable();
            map.insert(key.to_string(), value.to_string());
            self.write_durable(&map);
            self.session.remove(key);
        } else {
            self.session.insert(key.to_string(), value.to_string());
            let mut map = self.read_durable();
            if map.remove(key).is_some() {
                self.write_durable(&map);
            }
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        // durable tier wins, session tier is the fallback
        self.read_durable()
            .get(key)
            .cloned()
            .or_else(|| self.session.get(key).map(|v| v.value().clone()))
    }

    fn read_durable(&self) -> HashMap<String, String> {
        match std::fs::read_to_string(&self.durable_path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                debug!(error = %e, "malformed durable store, treating as empty");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        }
    }

    fn write_durable(&self, map: &HashMap<String, String>) {
        if let Some(parent) = self.durable_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string(map) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.durable_path, raw) {
                    warn!(path = %self.durable_path.display(), error = %e, "failed to write durable store");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize durable store"),
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Default durable file path: `<data_dir>/skylark/session.json`.
fn default_durable_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skylark")
        .join("session.json")
}
