//! Access token verification on the producer side.
//!
//! A token is accepted when its signature checks out with the configured
//! key, its claims decode and it has not expired. Accepted tokens are
//! memoized so repeated presentations skip the signature check.

use std::str::Utf8Error;
use std::sync::Arc;

use thiserror::Error;

use crate::oauth::claims::{AccessTokenClaims, ClaimsError};
use crate::oauth::clock::{Clock, SystemClock};
use crate::oauth::keys::VerificationKey;
use crate::oauth::verify_cache::TokenVerifyCache;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("no verification key configured")]
    MissingKey,

    #[error("token is not valid UTF-8: {0}")]
    Encoding(#[from] Utf8Error),

    #[error("token signature verification failed: {0}")]
    Signature(#[source] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] ClaimsError),

    #[error("expiration time {exp} is less than current time {now}")]
    Expired { exp: i64, now: i64 },
}

pub struct AccessTokenVerifier {
    key: Option<VerificationKey>,
    cache: TokenVerifyCache,
    clock: Arc<dyn Clock>,
}

impl AccessTokenVerifier {
    pub fn new(key: Option<VerificationKey>) -> Self {
        Self::with_clock(key, Arc::new(SystemClock))
    }

    pub fn with_clock(key: Option<VerificationKey>, clock: Arc<dyn Clock>) -> Self {
        match &key {
            Some(key) => log::info!("Token verifier using {:?}", key.algorithm()),
            None => log::warn!("Token verifier created without a key"),
        }
        Self {
            key,
            cache: TokenVerifyCache::with_clock(clock.clone()),
            clock,
        }
    }

    /// Replace the verification key. Already memoized tokens stay accepted
    /// until they expire.
    pub fn set_key(&mut self, key: Option<VerificationKey>) {
        self.key = key;
    }

    /// Memo of tokens that passed verification
    pub fn cache(&self) -> &TokenVerifyCache {
        &self.cache
    }

    /// Verify a raw token as received in a request body
    pub fn verify(&self, token: &[u8]) -> Result<(), VerifyError> {
        if self.cache.is_verified(token) {
            return Ok(());
        }

        let key = self.key.as_ref().ok_or(VerifyError::MissingKey)?;
        let claim_set = key
            .verify(std::str::from_utf8(token)?)
            .map_err(VerifyError::Signature)?;
        let claims = AccessTokenClaims::from_claim_set(&claim_set)?;

        let now = self.clock.now();
        if claims.exp < now {
            return Err(VerifyError::Expired { exp: claims.exp, now });
        }

        self.cache.mark_verified(token, claims.exp);
        Ok(())
    }
}
