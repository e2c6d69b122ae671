//! OAuth2 Access Tokens for 5G SBA
//!
//! Implements the NRF access token service of 3GPP TS 29.510 clause 5.4
//! (OAuth2 client credentials grant, RFC 6749 Section 4.4): token request
//! validation, the JWT claims carried by a token, signing keys, the token
//! reuse and verification caches, the token verifier, and the client used to
//! forward requests to a remote authorization server.

pub mod claims;
pub mod client;
pub mod clock;
pub mod error;
pub mod keys;
pub mod request;
pub mod response;
pub mod token_cache;
pub mod verifier;
pub mod verify_cache;

pub use claims::{AccessTokenClaims, ClaimSet, ClaimsError};
pub use client::{OAuth2Client, TokenTransport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{AccessTokenError, AccessTokenErrorCode};
pub use keys::{KeyError, SigningKey, VerificationKey};
pub use request::{AccessTokenRequest, RequestError, GRANT_TYPE_CLIENT_CREDENTIALS};
pub use response::{AccessTokenResponse, TOKEN_TYPE_BEARER};
pub use token_cache::{CachedToken, TokenCache};
pub use verifier::{AccessTokenVerifier, VerifyError};
pub use verify_cache::TokenVerifyCache;

/// Response headers required on every token endpoint reply (RFC 6749 5.1)
pub const NO_STORE_HEADERS: [(&str, &str); 2] = [("cache-control", "no-store"), ("pragma", "no-cache")];
