//! NRF daemon configuration
//!
//! Two YAML documents are understood: the authorization server file used by
//! `nextgcore-nrfd server` and the proxy file used by `nextgcore-nrfd proxy`.

use std::path::Path;

use ogs_sbi::tls::ClientTlsFiles;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default token endpoint path (TS 29.510 clause 6.3.5)
pub const DEFAULT_TOKEN_REQ_PATH: &str = "/oauth2/token";
/// Default token verification path of a proxy
pub const DEFAULT_TOKEN_VERIFY_PATH: &str = "/oauth2/verify";
/// Default token lifetime in seconds
pub const DEFAULT_TOKEN_EXPIRE: i64 = 3600;
/// Longest accepted token lifetime in seconds (one year)
pub const MAX_TOKEN_EXPIRE: i64 = 365 * 24 * 3600;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn read_yaml<T: for<'de> Deserialize<'de>>(path: &Path) -> ConfigResult<T> {
    let display = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse { path: display, source })
}

fn default_token_req_path() -> String {
    DEFAULT_TOKEN_REQ_PATH.to_string()
}

fn default_token_verify_path() -> String {
    DEFAULT_TOKEN_VERIFY_PATH.to_string()
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_token_expire() -> i64 {
    DEFAULT_TOKEN_EXPIRE
}

/// Signing algorithm and key of the authorization server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureConfig {
    /// JWA name, e.g. RS256 or HS256
    pub algorithm: String,
    pub key_file: String,
}

/// Authorization server (`server` subcommand)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthServerConfig {
    pub listen_addr: String,
    #[serde(default = "default_token_req_path")]
    pub token_req_path: String,
    #[serde(default)]
    pub http2: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_key_file: Option<String>,
    /// Issuer of the tokens; a random UUID when not configured
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// Token lifetime in seconds
    #[serde(default = "default_token_expire")]
    pub token_expire: i64,
    pub signature: SignatureConfig,
}

impl AuthServerConfig {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.token_expire <= 0 || self.token_expire > MAX_TOKEN_EXPIRE {
            return Err(ConfigError::Invalid(format!(
                "tokenExpire must be within 1..={MAX_TOKEN_EXPIRE}, got {}",
                self.token_expire
            )));
        }
        if self.tls_cert_file.is_some() != self.tls_key_file.is_some() {
            return Err(ConfigError::Invalid(
                "tlsCertFile and tlsKeyFile must be set together".to_string(),
            ));
        }
        if self.token_req_path.is_empty() {
            return Err(ConfigError::Invalid("tokenReqPath is empty".to_string()));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        serde_yaml::to_string(self).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })
    }
}

/// Upstream authorization server of a proxy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamAuthServer {
    /// Name presented as TLS SNI and Host; the URL host when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub http2: bool,
    /// Absolute URL of the upstream token endpoint
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
}

impl UpstreamAuthServer {
    pub fn tls_files(&self) -> ClientTlsFiles {
        ClientTlsFiles {
            ca_cert: self.ca_cert_file.clone(),
            client_cert: self.cert_file.clone(),
            client_key: self.key_file.clone(),
        }
    }

    pub fn is_https(&self) -> bool {
        self.url.starts_with("https://")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    pub listen_addr: String,
    pub auth_server: UpstreamAuthServer,
    #[serde(default = "default_token_req_path")]
    pub token_req_path: String,
    #[serde(default = "default_token_verify_path")]
    pub token_verify_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_verify_algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_verify_key_file: Option<String>,
}

/// Proxy file (`proxy` subcommand)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthProxyConfig {
    #[serde(default)]
    pub proxies: Vec<ProxyConfig>,
}

impl AuthProxyConfig {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let config: Self = read_yaml(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: "<string>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.proxies.is_empty() {
            return Err(ConfigError::Invalid("no proxies configured".to_string()));
        }
        for proxy in &self.proxies {
            if proxy.auth_server.url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "proxy {} has no authServer.url",
                    proxy.listen_addr
                )));
            }
            if proxy.token_req_path == proxy.token_verify_path {
                return Err(ConfigError::Invalid(format!(
                    "proxy {} uses {} for both token request and verification",
                    proxy.listen_addr, proxy.token_req_path
                )));
            }
            if proxy.token_verify_algorithm.is_some() != proxy.token_verify_key_file.is_some() {
                return Err(ConfigError::Invalid(format!(
                    "proxy {} needs both tokenVerifyAlgorithm and tokenVerifyKeyFile",
                    proxy.listen_addr
                )));
            }
        }
        Ok(())
    }
}
