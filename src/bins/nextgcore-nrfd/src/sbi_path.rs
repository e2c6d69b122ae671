//! NRF SBI Path Implementation
//!
//! Builds the token authority and the proxies from their configuration,
//! opens their SBI servers and routes incoming requests.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use ogs_sbi::oauth::keys::parse_algorithm;
use ogs_sbi::oauth::{AccessTokenVerifier, KeyError, OAuth2Client, SigningKey, TokenTransport, VerificationKey};
use ogs_sbi::tls::build_client_config;
use ogs_sbi::{
    send_method_not_allowed, send_not_found, SbiClientConfig, SbiError, SbiRequest, SbiResponse, SbiServer,
    SbiServerConfig,
};
use thiserror::Error;

use crate::authority::TokenAuthority;
use crate::config::{AuthServerConfig, ProxyConfig};
use crate::nnrf_handler::nrf_nnrf_handle_access_token_request;
use crate::proxy::Proxy;

#[derive(Debug, Error)]
pub enum SbiPathError {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Sbi(#[from] SbiError),
}

pub type SbiPathResult<T> = Result<T, SbiPathError>;

/// A started SBI server and the address it is bound to
pub struct NrfSbiServer {
    server: SbiServer,
    local_addr: SocketAddr,
}

impl fmt::Debug for NrfSbiServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NrfSbiServer")
            .field("config", self.server.config())
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl NrfSbiServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URI of the server, e.g. `http://127.0.0.1:9090`
    pub fn uri(&self) -> String {
        format!("{}://{}", self.server.config().scheme(), self.local_addr)
    }

    pub async fn stop(&self) -> SbiPathResult<()> {
        self.server.stop().await?;
        Ok(())
    }
}

/// Token authority with the configured instance id, lifetime and signing key
pub fn nrf_authority_build(config: &AuthServerConfig) -> SbiPathResult<TokenAuthority> {
    let algorithm = parse_algorithm(&config.signature.algorithm)?;
    let key = SigningKey::from_file(algorithm, &config.signature.key_file)?;
    Ok(TokenAuthority::new(config.instance_id.clone(), config.token_expire, key))
}

fn authority_server_config(config: &AuthServerConfig) -> SbiPathResult<SbiServerConfig> {
    let mut server_config = SbiServerConfig::from_listen_addr(&config.listen_addr)?.with_http2(config.http2);
    if let (Some(cert), Some(key)) = (&config.tls_cert_file, &config.tls_key_file) {
        server_config = server_config.with_tls(cert.clone(), key.clone());
    }
    Ok(server_config)
}

/// Route a request received by the authority
pub fn nrf_authority_route(authority: &TokenAuthority, token_req_path: &str, request: &SbiRequest) -> SbiResponse {
    let path = request.header.path();
    log::debug!("Authority SBI request: {} {}", request.header.method, path);

    if path != token_req_path {
        return send_not_found(path);
    }
    if request.header.method != "POST" {
        return send_method_not_allowed(&request.header.method, path);
    }
    nrf_nnrf_handle_access_token_request(authority, request)
}

/// Start the SBI server of a token authority
pub async fn nrf_authority_open(config: &AuthServerConfig, authority: TokenAuthority) -> SbiPathResult<NrfSbiServer> {
    let server = SbiServer::new(authority_server_config(config)?);
    let authority = Arc::new(authority);
    let token_req_path: Arc<str> = Arc::from(config.token_req_path.as_str());

    let local_addr = server
        .start(move |request: SbiRequest| {
            let authority = authority.clone();
            let token_req_path = token_req_path.clone();
            async move { nrf_authority_route(&authority, &token_req_path, &request) }
        })
        .await?;

    log::info!(
        "Token authority listening on {}://{}{}",
        server.config().scheme(),
        local_addr,
        config.token_req_path
    );
    Ok(NrfSbiServer { server, local_addr })
}

/// Verifier of a proxy. Without a configured key every token is rejected.
fn proxy_verifier(config: &ProxyConfig) -> SbiPathResult<AccessTokenVerifier> {
    let key = match (&config.token_verify_algorithm, &config.token_verify_key_file) {
        (Some(algorithm), Some(key_file)) => {
            let algorithm = parse_algorithm(algorithm)?;
            Some(VerificationKey::from_file(algorithm, key_file).map_err(|e| {
                log::error!("Fail to load key file {key_file} with error: {e}");
                e
            })?)
        }
        _ => None,
    };
    Ok(AccessTokenVerifier::new(key))
}

/// Client for the proxy's upstream authorization server
fn proxy_upstream(config: &ProxyConfig) -> SbiPathResult<OAuth2Client> {
    let upstream = &config.auth_server;
    let mut client_config = SbiClientConfig::default().with_http2(upstream.http2);

    if upstream.is_https() {
        let tls = build_client_config(&upstream.tls_files(), upstream.http2).map_err(|e| {
            log::error!("Fail to load the certificate files of {}: {e}", upstream.url);
            e
        })?;
        client_config = client_config.with_tls(Arc::new(tls));
    }
    if let Some(fqdn) = upstream.fqdn.as_deref().filter(|fqdn| !fqdn.is_empty()) {
        log::info!("Upstream {} server name is {fqdn}", upstream.url);
        client_config = client_config.with_server_name(fqdn);
    }

    Ok(OAuth2Client::new(&upstream.url, client_config)?)
}

pub fn nrf_proxy_build(config: &ProxyConfig) -> SbiPathResult<Proxy> {
    Ok(Proxy::new(proxy_upstream(config)?, proxy_verifier(config)?))
}

/// Endpoint paths served by a proxy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPaths {
    pub token_req_path: String,
    pub token_verify_path: String,
}

impl From<&ProxyConfig> for ProxyPaths {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            token_req_path: config.token_req_path.clone(),
            token_verify_path: config.token_verify_path.clone(),
        }
    }
}

/// Route a request received by a proxy
pub async fn nrf_proxy_route<T: TokenTransport>(
    proxy: &Proxy<T>,
    paths: &ProxyPaths,
    request: &SbiRequest,
) -> SbiResponse {
    let path = request.header.path();
    log::debug!("Proxy SBI request: {} {}", request.header.method, path);

    let is_token = path == paths.token_req_path;
    let is_verify = path == paths.token_verify_path;
    if !is_token && !is_verify {
        return send_not_found(path);
    }
    if request.header.method != "POST" {
        return send_method_not_allowed(&request.header.method, path);
    }

    if is_token {
        proxy.handle_token_request(request).await
    } else {
        proxy.handle_token_verify(request)
    }
}

/// Start the SBI server of one proxy
pub async fn nrf_proxy_open<T: TokenTransport>(config: &ProxyConfig, proxy: Proxy<T>) -> SbiPathResult<NrfSbiServer> {
    let server = SbiServer::new(SbiServerConfig::from_listen_addr(&config.listen_addr)?);
    let proxy = Arc::new(proxy);
    let paths = Arc::new(ProxyPaths::from(config));

    let local_addr = server
        .start(move |request: SbiRequest| {
            let proxy = proxy.clone();
            let paths = paths.clone();
            async move { nrf_proxy_route(&proxy, &paths, &request).await }
        })
        .await?;

    log::info!(
        "Token proxy listening on http://{} forwarding to {}",
        local_addr,
        config.auth_server.url
    );
    Ok(NrfSbiServer { server, local_addr })
}

/// Stop every server, logging failures
pub async fn nrf_sbi_close(servers: &[NrfSbiServer]) {
    for server in servers {
        if let Err(e) = server.stop().await {
            log::error!("Fail to stop SBI server on {}: {e}", server.local_addr());
        }
    }
}
