//! NextGCore NRF (Network Repository Function) Library
//!
//! The access token service of the NRF (TS 29.510 clause 5.4):
//! - Token authority issuing signed OAuth2 access tokens
//! - Intercepting proxy forwarding token requests to a remote authority
//!   and verifying tokens presented by producers
//! - YAML configuration of both

pub mod authority;
pub mod config;
pub mod nnrf_handler;
pub mod proxy;
pub mod sbi_path;

// Re-export commonly used types
pub use authority::{IssueError, TokenAuthority};
pub use config::{AuthProxyConfig, AuthServerConfig, ConfigError, ProxyConfig, UpstreamAuthServer};
pub use proxy::{Proxy, ProxyError, PROXY_TOKEN_MIN_LIFE_TIME};

// Re-export handler functions
pub use nnrf_handler::{nrf_nnrf_handle_access_token_request, send_token_error, send_token_response};

// Re-export SBI path functions
pub use sbi_path::{
    nrf_authority_build, nrf_authority_open, nrf_authority_route, nrf_proxy_build, nrf_proxy_open,
    nrf_proxy_route, nrf_sbi_close, NrfSbiServer, ProxyPaths, SbiPathError,
};
