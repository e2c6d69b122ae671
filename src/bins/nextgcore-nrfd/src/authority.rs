//! NRF Token Authority
//!
//! Issues signed access tokens for valid client credentials requests
//! (TS 29.510 clause 5.4.2.2). Tokens for requests addressed by NF type are
//! reused while at least half of their lifetime remains.

use std::sync::Arc;

use ogs_sbi::oauth::{
    AccessTokenClaims, AccessTokenError, AccessTokenErrorCode, AccessTokenRequest, AccessTokenResponse,
    ClaimsError, Clock, RequestError, SigningKey, SystemClock, TokenCache,
};
use thiserror::Error;

/// Token issuing errors
#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),

    #[error("claims can only be created for requests by nfType and targetNfType")]
    ClaimsByTypeOnly,

    #[error(transparent)]
    Claims(#[from] ClaimsError),

    #[error("token lifetime {0}s overflows the expiry time")]
    ExpiryOverflow(i64),

    #[error("failed to sign access token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl IssueError {
    /// Body of the 400 reply. Signing details stay in the log.
    pub fn to_access_token_error(&self) -> AccessTokenError {
        match self {
            Self::InvalidRequest(e) => e.to_access_token_error(),
            Self::ClaimsByTypeOnly => AccessTokenError::new(AccessTokenErrorCode::InvalidRequest)
                .with_description("nfType and targetNfType are required"),
            Self::Claims(_) | Self::ExpiryOverflow(_) | Self::Signing(_) => AccessTokenError::new(AccessTokenErrorCode::InvalidRequest)
                .with_description("failed to create access token"),
        }
    }
}

/// Reuse cache key of a request by type
fn cache_key(request: &AccessTokenRequest) -> String {
    format!("{}-{}", request.nf_type, request.target_nf_type)
}

pub struct TokenAuthority {
    instance_id: String,
    /// Token lifetime in seconds
    token_lifetime: i64,
    signing_key: SigningKey,
    token_cache: TokenCache,
    clock: Arc<dyn Clock>,
}

impl TokenAuthority {
    pub fn new(instance_id: impl Into<String>, token_lifetime: i64, signing_key: SigningKey) -> Self {
        Self::with_clock(instance_id, token_lifetime, signing_key, Arc::new(SystemClock))
    }

    pub fn with_clock(
        instance_id: impl Into<String>,
        token_lifetime: i64,
        signing_key: SigningKey,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let instance_id = instance_id.into();
        log::info!(
            "Token authority {} signing with {:?}, token lifetime {}s",
            instance_id,
            signing_key.algorithm(),
            token_lifetime
        );
        Self {
            instance_id,
            token_lifetime,
            signing_key,
            token_cache: TokenCache::with_clock(token_lifetime / 2, clock.clone()),
            clock,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn token_lifetime(&self) -> i64 {
        self.token_lifetime
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    /// Validate the request and hand out a cached or freshly signed token.
    /// `expires_in` of the response is the absolute expiry of the token.
    pub fn issue_token(&self, request: &AccessTokenRequest) -> Result<AccessTokenResponse, IssueError> {
        if log::log_enabled!(log::Level::Info) {
            let json = request.to_json().unwrap_or_default();
            log::info!("Create token from AccessTokenRequest: {}", String::from_utf8_lossy(&json));
        }

        request.validate().map_err(|e| {
            log::error!("Not a valid token request: {e}");
            e
        })?;

        let key = request.is_request_by_type().then(|| cache_key(request));

        if let Some(cached) = key.as_deref().and_then(|key| self.token_cache.lookup(key)) {
            log::debug!("Reuse cached token for {}", cache_key(request));
            return Ok(AccessTokenResponse::bearer(
                cached.token,
                cached.expire_time,
                request.scope.clone(),
            ));
        }

        let claims = self.build_claims(request)?;
        let claim_set = claims.to_claim_set()?;
        let token = self.signing_key.sign(&claim_set).map_err(|e| {
            log::error!("Fail to create JWT token with error: {e}");
            IssueError::Signing(e)
        })?;

        if let Some(key) = key {
            self.token_cache.store(key, claims.exp, token.clone());
        }

        Ok(AccessTokenResponse::bearer(token, claims.exp, request.scope.clone()))
    }

    /// Claims of a new token. Only requests by NF type are supported.
    pub fn build_claims(&self, request: &AccessTokenRequest) -> Result<AccessTokenClaims, IssueError> {
        if !request.is_request_by_type() {
            log::error!("Create token only with nfType and targetNfType");
            return Err(IssueError::ClaimsByTypeOnly);
        }

        let aud = if request.target_nf_instance_id.is_empty() {
            request.target_nf_type.clone()
        } else {
            request.target_nf_instance_id.clone()
        };
        let producer_nf_set_id = if request.target_nf_set_id.is_empty() {
            request.target_nf_service_set_id.clone()
        } else {
            request.target_nf_set_id.clone()
        };

        let exp = self.clock.now().checked_add(self.token_lifetime).ok_or_else(|| {
            log::error!("Token lifetime {}s overflows the expiry time", self.token_lifetime);
            IssueError::ExpiryOverflow(self.token_lifetime)
        })?;

        Ok(AccessTokenClaims {
            iss: self.instance_id.clone(),
            sub: request.nf_instance_id.clone(),
            aud: vec![aud],
            scope: request.scope.clone(),
            exp,
            consumer_plmn_id: request.requester_plmn.clone(),
            producer_plmn_id: request.target_plmn.clone(),
            producer_snssai_list: request.target_snssai_list.clone(),
            producer_nsi_list: request.target_nsi_list.clone(),
            producer_nf_set_id,
        })
    }
}
