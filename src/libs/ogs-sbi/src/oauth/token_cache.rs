//! Issued token reuse cache.
//!
//! Entries are keyed by a caller supplied string (the authority uses
//! `"{nfType}-{targetNfType}"`, the proxy prefixes the consumer instance id).
//! A token is handed out again only while at least `min_life_time` seconds of
//! its validity remain. Expired entries are swept lazily on lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::oauth::clock::{Clock, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    /// Expiry, seconds since the Unix epoch
    pub expire_time: i64,
    pub token: String,
}

pub struct TokenCache {
    tokens: Mutex<HashMap<String, CachedToken>>,
    min_life_time: i64,
    clock: Arc<dyn Clock>,
}

impl TokenCache {
    pub fn new(min_life_time: i64) -> Self {
        Self::with_clock(min_life_time, Arc::new(SystemClock))
    }

    pub fn with_clock(min_life_time: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            min_life_time,
            clock,
        }
    }

    pub fn min_life_time(&self) -> i64 {
        self.min_life_time
    }

    /// Insert or replace the token stored under `key`
    pub fn store(&self, key: impl Into<String>, expire_time: i64, token: impl Into<String>) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(
            key.into(),
            CachedToken {
                expire_time,
                token: token.into(),
            },
        );
    }

    /// Token stored under `key` that stays valid for at least the minimum
    /// life time from now
    pub fn lookup(&self, key: &str) -> Option<CachedToken> {
        let now = self.clock.now();
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());

        tokens.retain(|_, cached| cached.expire_time >= now);

        tokens
            .get(key)
            .filter(|cached| cached.expire_time > now.saturating_add(self.min_life_time))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
