//! OAuth2 intercepting proxy
//!
//! Fronts a remote authorization server for NFs in a local segment. Token
//! requests are forwarded upstream, with replies cached per consumer and NF
//! type pair. Tokens presented by producers are verified locally.

use std::sync::Arc;

use bytes::Bytes;
use ogs_sbi::oauth::{
    AccessTokenError, AccessTokenRequest, AccessTokenResponse, AccessTokenVerifier, Clock,
    OAuth2Client, RequestError, SystemClock, TokenCache, TokenTransport, VerifyError,
};
use ogs_sbi::{send_status, SbiError, SbiRequest, SbiResponse};
use thiserror::Error;

use crate::nnrf_handler::{send_token_error, send_token_response};

/// Cached upstream tokens are reused while this many seconds remain
pub const PROXY_TOKEN_MIN_LIFE_TIME: i64 = 5 * 60;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("upstream token request failed: {0}")]
    Upstream(#[from] SbiError),

    #[error("invalid upstream token response: {0}")]
    UpstreamResponse(#[source] serde_json::Error),
}

impl ProxyError {
    /// Structured body for failures detected by the proxy itself. Upstream
    /// failures are answered with a bare status.
    pub fn to_access_token_error(&self) -> Option<AccessTokenError> {
        match self {
            Self::Request(e) => Some(e.to_access_token_error()),
            Self::Upstream(_) | Self::UpstreamResponse(_) => None,
        }
    }
}

fn cache_key(request: &AccessTokenRequest) -> String {
    format!(
        "{}@{}-{}",
        request.nf_instance_id, request.nf_type, request.target_nf_type
    )
}

pub struct Proxy<T: TokenTransport = OAuth2Client> {
    transport: T,
    verifier: AccessTokenVerifier,
    token_cache: TokenCache,
}

impl<T: TokenTransport> Proxy<T> {
    pub fn new(transport: T, verifier: AccessTokenVerifier) -> Self {
        Self::with_clock(transport, verifier, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: T, verifier: AccessTokenVerifier, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            verifier,
            token_cache: TokenCache::with_clock(PROXY_TOKEN_MIN_LIFE_TIME, clock),
        }
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.token_cache
    }

    /// Obtain a token for a request body of the given content type. The
    /// returned bytes are the upstream reply as received.
    pub async fn request_token(&self, content_type: Option<&str>, body: &[u8]) -> Result<Bytes, ProxyError> {
        let request = AccessTokenRequest::decode(content_type, body)?;

        let key = request.is_request_by_type().then(|| cache_key(&request));
        if let Some(key) = key.as_deref() {
            log::debug!("Try to get token by {key}");
            if let Some(cached) = self.token_cache.lookup(key) {
                log::info!("Succeed to get the token for {key} from local cache");
                return Ok(Bytes::from(cached.token));
            }
        }

        let reply = self.transport.request_token(request.to_form()).await?;
        let response = AccessTokenResponse::from_json(&reply).map_err(ProxyError::UpstreamResponse)?;
        log::info!("Succeed to get the token from remote server, expires at {}", response.expires_in);

        if let Some(key) = key {
            log::debug!("Cache the token for {key} until {}", response.expires_in);
            self.token_cache
                .store(key, response.expires_in, String::from_utf8_lossy(&reply).into_owned());
        }

        Ok(reply)
    }

    pub fn verify_token(&self, token: &[u8]) -> Result<(), VerifyError> {
        self.verifier.verify(token)
    }

    /// Handle POST on the proxy's token endpoint
    pub async fn handle_token_request(&self, request: &SbiRequest) -> SbiResponse {
        match self.request_token(request.http.content_type(), request.http.body()).await {
            Ok(body) => send_token_response(body),
            Err(e) => {
                match &e {
                    ProxyError::Upstream(sbi) if sbi.is_transport_error() => {
                        log::error!("Fail to get the token from remote server: {e}")
                    }
                    _ => log::error!("Fail to get the token with error: {e}"),
                }
                match e.to_access_token_error() {
                    Some(error) => send_token_error(&error),
                    None => send_status(400),
                }
            }
        }
    }

    /// Handle POST on the proxy's verification endpoint. The body is the raw
    /// token; the reply carries no body.
    pub fn handle_token_verify(&self, request: &SbiRequest) -> SbiResponse {
        match self.verify_token(request.http.body()) {
            Ok(()) => send_status(200),
            Err(e) => {
                log::error!("Fail to verify token with error: {e}");
                send_status(400)
            }
        }
    }
}
