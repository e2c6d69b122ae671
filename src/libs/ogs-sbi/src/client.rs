//! SBI HTTP Client
//!
//! hyper based client used to reach a remote token authority. Speaks
//! HTTP/1.1 or HTTP/2 over plain TCP or TLS. HTTP/2 connections are kept and
//! multiplexed; HTTP/1.1 opens a connection per request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper::header::HOST;
use hyper::{Method, Request, Uri};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;

use crate::error::{SbiError, SbiResult};
use crate::message::{SbiRequest, SbiResponse};
use crate::types::UriScheme;

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT: u64 = 5;
/// Default request timeout in seconds
const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// SBI Client configuration
#[derive(Debug, Clone)]
pub struct SbiClientConfig {
    /// URI scheme (http or https)
    pub scheme: UriScheme,
    /// Target host (FQDN or IP)
    pub host: String,
    /// Target port
    pub port: u16,
    /// Use HTTP/2 (prior knowledge on plain TCP)
    pub http2: bool,
    /// Name sent as TLS SNI and Host header instead of `host`
    pub server_name: Option<String>,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Request timeout
    pub request_timeout: Duration,
    /// TLS settings, required for https
    pub tls: Option<Arc<rustls::ClientConfig>>,
}

impl Default for SbiClientConfig {
    fn default() -> Self {
        Self {
            scheme: UriScheme::Http,
            host: "localhost".to_string(),
            port: 80,
            http2: false,
            server_name: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            tls: None,
        }
    }
}

impl SbiClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Build a configuration from an absolute `http(s)://host[:port]/...` URL.
    /// The path of the URL is not part of the configuration.
    pub fn from_url(url: &str) -> SbiResult<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| SbiError::InvalidUri(format!("{url}: {e}")))?;
        let scheme: UriScheme = uri
            .scheme_str()
            .ok_or_else(|| SbiError::InvalidUri(format!("{url}: missing scheme")))?
            .parse()
            .map_err(SbiError::InvalidUri)?;
        let host = uri
            .host()
            .ok_or_else(|| SbiError::InvalidUri(format!("{url}: missing host")))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = uri.port_u16().unwrap_or_else(|| scheme.default_port());

        Ok(Self {
            scheme,
            host,
            port,
            ..Default::default()
        })
    }

    pub fn with_http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    pub fn with_tls(mut self, tls: Arc<rustls::ClientConfig>) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Authority announced to the peer, `server_name` when configured
    pub fn authority(&self) -> String {
        let name = self.server_name.as_deref().unwrap_or(&self.host);
        if name.contains(':') && !name.starts_with('[') {
            format!("[{}]:{}", name, self.port)
        } else {
            format!("{}:{}", name, self.port)
        }
    }

    /// Build the base URI
    pub fn base_uri(&self) -> String {
        format!("{}://{}", self.scheme, self.authority())
    }
}

/// Request sender for an established connection
enum Sender {
    Http1(http1::SendRequest<Full<Bytes>>),
    Http2(http2::SendRequest<Full<Bytes>>),
}

/// SBI Client
/// Matches ogs_sbi_client_t
pub struct SbiClient {
    config: SbiClientConfig,
    /// Cached HTTP/2 connection
    connection: Mutex<Option<http2::SendRequest<Full<Bytes>>>>,
}

impl SbiClient {
    pub fn new(config: SbiClientConfig) -> SbiResult<Self> {
        if config.scheme == UriScheme::Https && config.tls.is_none() {
            return Err(SbiError::TlsError(format!(
                "https peer {} configured without TLS settings",
                config.host
            )));
        }
        Ok(Self {
            config,
            connection: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &SbiClientConfig {
        &self.config
    }

    /// Open a TCP connection, wrapped in TLS for https, and run the HTTP
    /// handshake on it.
    async fn connect(&self) -> SbiResult<Sender> {
        let addr = format!("{}:{}", self.config.host, self.config.port);

        let stream = tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| SbiError::Timeout)?
            .map_err(|e| SbiError::ConnectionError(format!("{addr}: {e}")))?;

        match (&self.config.scheme, &self.config.tls) {
            (UriScheme::Https, Some(tls_config)) => {
                let connector = TlsConnector::from(tls_config.clone());
                let name = self
                    .config
                    .server_name
                    .clone()
                    .unwrap_or_else(|| self.config.host.clone());
                let server_name = ServerName::try_from(name)
                    .map_err(|e| SbiError::TlsError(format!("Invalid server name: {e}")))?;

                let tls_stream = tokio::time::timeout(
                    self.config.connect_timeout,
                    connector.connect(server_name, stream),
                )
                .await
                .map_err(|_| SbiError::Timeout)?
                .map_err(|e| SbiError::TlsError(format!("TLS handshake failed: {e}")))?;

                self.handshake(tls_stream).await
            }
            (UriScheme::Https, None) => Err(SbiError::TlsError("missing TLS settings".to_string())),
            (UriScheme::Http, _) => self.handshake(stream).await,
        }
    }

    async fn handshake<I>(&self, io: I) -> SbiResult<Sender>
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let io = TokioIo::new(io);

        if self.config.http2 {
            let (sender, conn) = http2::handshake(TokioExecutor::new(), io)
                .await
                .map_err(|e| SbiError::ConnectionError(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    log::debug!("HTTP/2 client connection error: {e}");
                }
            });
            Ok(Sender::Http2(sender))
        } else {
            let (sender, conn) = http1::handshake(io)
                .await
                .map_err(|e| SbiError::ConnectionError(e.to_string()))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    log::debug!("HTTP/1.1 client connection error: {e}");
                }
            });
            Ok(Sender::Http1(sender))
        }
    }

    /// Reuse the cached HTTP/2 connection or open a new one
    async fn get_connection(&self) -> SbiResult<Sender> {
        if !self.config.http2 {
            return self.connect().await;
        }

        let mut conn_guard = self.connection.lock().await;
        if let Some(sender) = conn_guard.as_ref() {
            if sender.is_ready() {
                return Ok(Sender::Http2(sender.clone()));
            }
        }

        let sender = self.connect().await?;
        if let Sender::Http2(h2) = &sender {
            *conn_guard = Some(h2.clone());
        }
        Ok(sender)
    }

    /// Send an SBI request and receive a response
    pub async fn send_request(&self, request: SbiRequest) -> SbiResult<SbiResponse> {
        let sender = self.get_connection().await?;

        let path = if request.header.uri.starts_with('/') {
            request.header.uri.clone()
        } else {
            format!("/{}", request.header.uri)
        };

        let method = match request.header.method.to_uppercase().as_str() {
            "GET" => Method::GET,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            other => return Err(SbiError::InvalidMethod(other.to_string())),
        };

        // HTTP/2 carries scheme and authority as pseudo headers taken from an
        // absolute URI; HTTP/1.1 uses origin form plus a Host header.
        let uri_str = match sender {
            Sender::Http2(_) => format!("{}{}", self.config.base_uri(), path),
            Sender::Http1(_) => path,
        };
        let uri: Uri = uri_str
            .parse()
            .map_err(|e| SbiError::InvalidUri(format!("{uri_str}: {e}")))?;

        let mut req_builder = Request::builder().method(method).uri(uri);
        if let Sender::Http1(_) = sender {
            req_builder = req_builder.header(HOST, self.config.authority());
        }
        for (key, value) in &request.http.headers {
            req_builder = req_builder.header(key.as_str(), value.as_str());
        }

        let body = Full::new(request.http.content.unwrap_or_default());
        let http_request = req_builder
            .body(body)
            .map_err(|e| SbiError::InvalidRequest(e.to_string()))?;

        let response = tokio::time::timeout(self.config.request_timeout, async move {
            match sender {
                Sender::Http1(mut h1) => {
                    h1.ready()
                        .await
                        .map_err(|e| SbiError::ConnectionError(e.to_string()))?;
                    h1.send_request(http_request)
                        .await
                        .map_err(|e| SbiError::ConnectionError(e.to_string()))
                }
                Sender::Http2(mut h2) => h2
                    .send_request(http_request)
                    .await
                    .map_err(|e| SbiError::ConnectionError(e.to_string())),
            }
        })
        .await
        .map_err(|_| SbiError::Timeout)??;

        convert_response(response).await
    }

    /// Drop the cached connection
    pub async fn close(&self) {
        let mut conn_guard = self.connection.lock().await;
        *conn_guard = None;
    }
}

/// Convert hyper response to SbiResponse
async fn convert_response(response: hyper::Response<Incoming>) -> SbiResult<SbiResponse> {
    let status = response.status().as_u16();

    let mut headers = HashMap::new();
    for (key, value) in response.headers() {
        if let Ok(v) = value.to_str() {
            headers.insert(key.to_string(), v.to_string());
        }
    }

    let body_bytes = response
        .into_body()
        .collect()
        .await
        .map_err(|e| SbiError::InvalidResponse(e.to_string()))?
        .to_bytes();

    let mut sbi_response = SbiResponse::with_status(status);
    sbi_response.http.headers = headers;
    if !body_bytes.is_empty() {
        sbi_response.http.content = Some(body_bytes);
    }

    Ok(sbi_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_url() {
        let config = SbiClientConfig::from_url("http://127.0.0.1:9090/oauth2/token").unwrap();
        assert_eq!(config.scheme, UriScheme::Http);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9090);
        assert_eq!(config.base_uri(), "http://127.0.0.1:9090");

        let config = SbiClientConfig::from_url("https://nrf.5gc.mnc001.mcc001.3gppnetwork.org/oauth2/token").unwrap();
        assert_eq!(config.scheme, UriScheme::Https);
        assert_eq!(config.port, 443);

        let config = SbiClientConfig::from_url("http://[::1]:8000/token").unwrap();
        assert_eq!(config.host, "::1");
        assert_eq!(config.authority(), "[::1]:8000");
    }

    #[test]
    fn test_config_from_bad_url() {
        assert!(SbiClientConfig::from_url("/oauth2/token").is_err());
        assert!(SbiClientConfig::from_url("ftp://host/token").is_err());
    }

    #[test]
    fn test_server_name_overrides_authority() {
        let config = SbiClientConfig::new("10.0.0.1", 443).with_server_name("nrf.example.org");
        assert_eq!(config.authority(), "nrf.example.org:443");
        assert_eq!(config.host, "10.0.0.1");
    }

    #[test]
    fn test_https_requires_tls_settings() {
        let config = SbiClientConfig::from_url("https://nrf.example.org/oauth2/token").unwrap();
        assert!(matches!(SbiClient::new(config), Err(SbiError::TlsError(_))));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = SbiClient::new(SbiClientConfig::new("127.0.0.1", port)).unwrap();
        let result = client.send_request(SbiRequest::get("/")).await;
        assert!(matches!(result, Err(SbiError::ConnectionError(_))));
    }
}
