//! Token signing and verification keys.
//!
//! Algorithms are named by their JWA identifier (`RS256`, `ES256`, `HS256`,
//! `EdDSA`, ...). Asymmetric keys are read from PEM files; HMAC algorithms
//! take the file contents as the raw shared secret.

use std::path::Path;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::Serialize;
use thiserror::Error;

use crate::oauth::claims::ClaimSet;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("unsupported signature algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("failed to read key file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key file {0} is not a .pem file")]
    NotPem(String),

    #[error("invalid {algorithm:?} key: {source}")]
    InvalidKey {
        algorithm: Algorithm,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Parse a JWA algorithm name
pub fn parse_algorithm(name: &str) -> KeyResult<Algorithm> {
    Algorithm::from_str(name).map_err(|_| KeyError::UnsupportedAlgorithm(name.to_string()))
}

fn is_hmac(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn read_key_file(algorithm: Algorithm, path: &Path) -> KeyResult<Vec<u8>> {
    let display = path.display().to_string();
    if !is_hmac(algorithm) && path.extension().and_then(|e| e.to_str()) != Some("pem") {
        return Err(KeyError::NotPem(display));
    }
    std::fs::read(path).map_err(|source| KeyError::Io { path: display, source })
}

/// Private key (or shared secret) used to sign tokens
#[derive(Clone)]
pub struct SigningKey {
    algorithm: Algorithm,
    key: EncodingKey,
}

impl SigningKey {
    pub fn from_pem(algorithm: Algorithm, pem: &[u8]) -> KeyResult<Self> {
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(EncodingKey::from_secret(pem)),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => EncodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => EncodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => EncodingKey::from_ed_pem(pem),
        }
        .map_err(|source| KeyError::InvalidKey { algorithm, source })?;

        Ok(Self { algorithm, key })
    }

    pub fn from_secret(algorithm: Algorithm, secret: &[u8]) -> KeyResult<Self> {
        if !is_hmac(algorithm) {
            return Err(KeyError::UnsupportedAlgorithm(format!(
                "{algorithm:?} with a shared secret"
            )));
        }
        Ok(Self {
            algorithm,
            key: EncodingKey::from_secret(secret),
        })
    }

    pub fn from_file(algorithm: Algorithm, path: impl AsRef<Path>) -> KeyResult<Self> {
        let bytes = read_key_file(algorithm, path.as_ref())?;
        Self::from_pem(algorithm, &bytes)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Sign `claims` as a compact JWS
    pub fn sign<T: Serialize>(&self, claims: &T) -> jsonwebtoken::errors::Result<String> {
        jsonwebtoken::encode(&Header::new(self.algorithm), claims, &self.key)
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Public key (or shared secret) used to check token signatures
#[derive(Clone)]
pub struct VerificationKey {
    algorithm: Algorithm,
    key: DecodingKey,
}

impl VerificationKey {
    pub fn from_pem(algorithm: Algorithm, pem: &[u8]) -> KeyResult<Self> {
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(DecodingKey::from_secret(pem)),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
        }
        .map_err(|source| KeyError::InvalidKey { algorithm, source })?;

        Ok(Self { algorithm, key })
    }

    pub fn from_secret(algorithm: Algorithm, secret: &[u8]) -> KeyResult<Self> {
        if !is_hmac(algorithm) {
            return Err(KeyError::UnsupportedAlgorithm(format!(
                "{algorithm:?} with a shared secret"
            )));
        }
        Ok(Self {
            algorithm,
            key: DecodingKey::from_secret(secret),
        })
    }

    pub fn from_file(algorithm: Algorithm, path: impl AsRef<Path>) -> KeyResult<Self> {
        let bytes = read_key_file(algorithm, path.as_ref())?;
        Self::from_pem(algorithm, &bytes)
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Check the signature of `token` and return its claims. Only the
    /// signature and the algorithm are checked here; expiry and audience are
    /// left to the caller.
    pub fn verify(&self, token: &str) -> jsonwebtoken::errors::Result<ClaimSet> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        jsonwebtoken::decode::<ClaimSet>(token, &self.key, &validation).map(|data| data.claims)
    }
}

impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
