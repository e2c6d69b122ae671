//! Memo of tokens that already passed verification, keyed by the raw token
//! bytes. A record lives until the token's own expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::oauth::clock::{Clock, SystemClock};

pub struct TokenVerifyCache {
    tokens: Mutex<HashMap<Vec<u8>, i64>>,
    clock: Arc<dyn Clock>,
}

impl Default for TokenVerifyCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenVerifyCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tokens: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Remember `token` as verified until `expire_time`. Tokens that are
    /// already expired are not recorded.
    pub fn mark_verified(&self, token: &[u8], expire_time: i64) {
        if expire_time <= self.clock.now() {
            return;
        }
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(token.to_vec(), expire_time);
    }

    /// True if `token` was verified and has not expired yet. An expired
    /// record is dropped.
    pub fn is_verified(&self, token: &[u8]) -> bool {
        let now = self.clock.now();
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());

        let Some(&expire_time) = tokens.get(token) else {
            return false;
        };
        if expire_time > now {
            return true;
        }
        tokens.remove(token);
        false
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth::clock::ManualClock;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_verified_until_expiry() {
        let clock = Arc::new(ManualClock::new(NOW));
        let cache = TokenVerifyCache::with_clock(clock.clone());

        cache.mark_verified(b"token", NOW + 10);
        assert!(cache.is_verified(b"token"));
        assert!(!cache.is_verified(b"other"));

        clock.advance(10);
        assert!(!cache.is_verified(b"token"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_concurrent_mark_and_check() {
        let cache = Arc::new(TokenVerifyCache::with_clock(Arc::new(ManualClock::new(NOW))));

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let token = format!("token-{}", i % 10);
                        cache.mark_verified(token.as_bytes(), NOW + 60);
                        assert!(cache.is_verified(token.as_bytes()));
                        // expired tokens never enter the memo
                        cache.mark_verified(format!("stale-{t}-{i}").as_bytes(), NOW);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_expired_token_not_recorded() {
        let clock = Arc::new(ManualClock::new(NOW));
        let cache = TokenVerifyCache::with_clock(clock);

        cache.mark_verified(b"stale", NOW);
        cache.mark_verified(b"older", NOW - 1);
        assert!(cache.is_empty());
        assert!(!cache.is_verified(b"stale"));
    }
}
