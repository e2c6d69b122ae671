//! TLS utilities for SBI client and server
//!
//! Certificate and key loading plus rustls configuration builders for the
//! token endpoints (server side) and the upstream authority connection
//! (client side, optionally mutual TLS).

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::error::{SbiError, SbiResult};

const ALPN_H2: &[u8] = b"h2";
const ALPN_HTTP11: &[u8] = b"http/1.1";

/// Get the ring crypto provider.
fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// ALPN protocol list advertised for the selected HTTP version.
fn alpn_protocols(http2: bool) -> Vec<Vec<u8>> {
    if http2 {
        vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()]
    } else {
        vec![ALPN_HTTP11.to_vec()]
    }
}

/// Load PEM-encoded certificates from a file path.
pub fn load_certs(path: &str) -> SbiResult<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .map_err(|e| SbiError::TlsError(format!("Failed to open cert file {path}: {e}")))?;
    let mut reader = BufReader::new(file);

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SbiError::TlsError(format!("Failed to parse certs from {path}: {e}")))?;

    if certs.is_empty() {
        return Err(SbiError::TlsError(format!(
            "No certificates found in {path}"
        )));
    }

    Ok(certs)
}

/// Load a PEM-encoded private key from a file path.
pub fn load_private_key(path: &str) -> SbiResult<PrivateKeyDer<'static>> {
    let file = File::open(path)
        .map_err(|e| SbiError::TlsError(format!("Failed to open key file {path}: {e}")))?;
    let mut reader = BufReader::new(file);

    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| SbiError::TlsError(format!("Failed to parse key from {path}: {e}")))?
        .ok_or_else(|| SbiError::TlsError(format!("No private key found in {path}")))?;

    Ok(key)
}

/// Web PKI roots, extended with the certificates of `ca_path` when given.
fn load_root_store(ca_path: Option<&str>) -> SbiResult<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(ca) = ca_path {
        for cert in load_certs(ca)? {
            root_store
                .add(cert)
                .map_err(|e| SbiError::TlsError(format!("Failed to add CA cert: {e}")))?;
        }
    }
    Ok(root_store)
}

/// Build a server-side TLS config from certificate and key files.
pub fn build_server_config(cert_path: &str, key_path: &str, http2: bool) -> SbiResult<ServerConfig> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let mut config = ServerConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| SbiError::TlsError(format!("Failed to set protocol versions: {e}")))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| SbiError::TlsError(format!("Failed to build server TLS config: {e}")))?;

    config.alpn_protocols = alpn_protocols(http2);
    Ok(config)
}

/// Client side TLS settings for one upstream peer.
#[derive(Debug, Clone, Default)]
pub struct ClientTlsFiles {
    /// Extra CA certificate trusted on top of the web PKI roots
    pub ca_cert: Option<String>,
    /// Client certificate for mutual TLS
    pub client_cert: Option<String>,
    /// Client private key for mutual TLS
    pub client_key: Option<String>,
}

/// Build a client-side TLS config. A client certificate is presented only
/// when both certificate and key are configured.
pub fn build_client_config(files: &ClientTlsFiles, http2: bool) -> SbiResult<ClientConfig> {
    let root_store = load_root_store(files.ca_cert.as_deref())?;

    let builder = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| SbiError::TlsError(format!("Failed to set protocol versions: {e}")))?
        .with_root_certificates(root_store);

    let mut config = match (&files.client_cert, &files.client_key) {
        (Some(cert_path), Some(key_path)) => {
            let certs = load_certs(cert_path)?;
            let key = load_private_key(key_path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| SbiError::TlsError(format!("Failed to set client cert: {e}")))?
        }
        _ => builder.with_no_client_auth(),
    };

    config.alpn_protocols = alpn_protocols(http2);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_certs_nonexistent_file() {
        let result = load_certs("/nonexistent/path.pem");
        assert!(matches!(result, Err(SbiError::TlsError(_))));
    }

    #[test]
    fn test_load_key_nonexistent_file() {
        assert!(load_private_key("/nonexistent/path.pem").is_err());
    }

    #[test]
    fn test_load_certs_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();
        let err = load_certs(path).unwrap_err();
        assert!(err.to_string().contains("No certificates found"));
    }

    #[test]
    fn test_build_client_config_alpn() {
        let h2 = build_client_config(&ClientTlsFiles::default(), true).unwrap();
        assert_eq!(h2.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);

        let h1 = build_client_config(&ClientTlsFiles::default(), false).unwrap();
        assert_eq!(h1.alpn_protocols, vec![b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_build_client_config_missing_ca() {
        let files = ClientTlsFiles {
            ca_cert: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        assert!(build_client_config(&files, false).is_err());
    }
}
