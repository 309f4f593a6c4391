//! Session state for web (non-API) requests.
//!
//! A session is a small key/value map with an absolute expiry. It travels
//! with the client (the HTTP layer keeps it in an encrypted cookie), so the
//! server holds nothing per visitor and an abandoned session simply lapses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// How long a session lives after its last change
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    values: BTreeMap<String, String>,
    /// Unix seconds after which the session is discarded
    expires_at: i64,
    #[serde(skip)]
    changed: bool,
}

impl SessionData {
    /// Empty session expiring `ttl` from `now`
    pub fn new(ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            values: BTreeMap::new(),
            expires_at: expiry(ttl, now),
            changed: true,
        }
    }

    /// Decode a stored session; expired or unreadable state yields `None`
    pub fn decode(raw: &str, now: DateTime<Utc>) -> Option<Self> {
        let session: SessionData = serde_json::from_str(raw).ok()?;
        (session.expires_at > now.timestamp()).then_some(session)
    }

    pub fn encode(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Set `key`, extending the expiry when the value actually changes
    pub fn insert(&mut self, key: &str, value: &str, ttl: Duration, now: DateTime<Utc>) {
        if self.get(key) == Some(value) {
            return;
        }
        self.values.insert(key.to_string(), value.to_string());
        self.expires_at = expiry(ttl, now);
        self.changed = true;
    }

    /// Whether the session must be written back to the client
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

fn expiry(ttl: Duration, now: DateTime<Utc>) -> i64 {
    let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_add(ttl)
}
