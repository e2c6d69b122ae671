//! NextGCore SBI (Service Based Interface) Library
//!
//! HTTP transport for 5G core network functions plus the NRF OAuth2 access
//! token core (3GPP TS 29.510 clause 5.4, TS 33.501 clause 13.4.1).
//!
//! # Example
//!
//! ```rust,no_run
//! use ogs_sbi::oauth::{AccessTokenRequest, OAuth2Client};
//! use ogs_sbi::SbiClientConfig;
//!
//! async fn example() -> ogs_sbi::SbiResult<()> {
//!     let client = OAuth2Client::new("http://127.0.0.10:7777/oauth2/token", SbiClientConfig::default())?;
//!     let request = AccessTokenRequest::by_type("9d1e4b2a", "AMF", "SMF", "nsmf-pdusession");
//!     let token = client.request_access_token(&request).await?;
//!     println!("expires at {}", token.expires_in);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`types`] - NF types, service names, PLMN and slice identifiers
//! - [`message`] - SBI request and response structures
//! - [`client`] - HTTP/1.1 and HTTP/2 client
//! - [`server`] - HTTP/1.1 and HTTP/2 server
//! - [`tls`] - TLS configuration and certificate loading
//! - [`oauth`] - OAuth2 access token issuing and verification
//! - [`error`] - Error types

pub mod client;
pub mod error;
pub mod message;
pub mod oauth;
pub mod server;
pub mod tls;
pub mod types;

pub use client::{SbiClient, SbiClientConfig};
pub use error::{SbiError, SbiResult};
pub use message::{SbiHeader, SbiHttpMessage, SbiRequest, SbiResponse};
pub use server::{send_method_not_allowed, send_not_found, send_status, SbiRequestHandler, SbiServer, SbiServerConfig};
pub use types::{is_valid_nf_type, is_valid_service_name, PlmnId, PlmnIdNid, Snssai, UriScheme};
