//! SBI HTTP Server
//!
//! hyper based server for the token endpoints. Serves HTTP/1.1 or HTTP/2
//! (prior knowledge on plain TCP, ALPN negotiated over TLS) and hands every
//! request to an [`SbiRequestHandler`] as an [`SbiRequest`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Incoming};
use hyper::server::conn::{http1, http2};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tokio_rustls::TlsAcceptor;

use crate::error::{SbiError, SbiResult};
use crate::message::{SbiHeader, SbiHttpMessage, SbiRequest, SbiResponse};
use crate::tls;
use crate::types::UriScheme;

/// Default cap on request body size in bytes
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct SbiServerConfig {
    /// Bind address
    pub addr: SocketAddr,
    /// Serve HTTP/2 instead of HTTP/1.1
    pub http2: bool,
    /// TLS certificate path
    pub cert: Option<String>,
    /// TLS private key path
    pub private_key: Option<String>,
    /// Largest request body accepted, in bytes
    pub max_body_size: usize,
}

impl Default for SbiServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 7777)),
            http2: false,
            cert: None,
            private_key: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl SbiServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    /// Parse a `host:port` listen address
    pub fn from_listen_addr(listen_addr: &str) -> SbiResult<Self> {
        let addr: SocketAddr = listen_addr
            .parse()
            .map_err(|e| SbiError::InvalidUri(format!("Invalid listen address {listen_addr}: {e}")))?;
        Ok(Self::new(addr))
    }

    pub fn with_http2(mut self, http2: bool) -> Self {
        self.http2 = http2;
        self
    }

    /// Enable HTTPS with certificates
    pub fn with_tls(mut self, cert: impl Into<String>, private_key: impl Into<String>) -> Self {
        self.cert = Some(cert.into());
        self.private_key = Some(private_key.into());
        self
    }

    pub fn with_max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn scheme(&self) -> UriScheme {
        if self.cert.is_some() && self.private_key.is_some() {
            UriScheme::Https
        } else {
            UriScheme::Http
        }
    }
}

/// Request handler trait
pub trait SbiRequestHandler: Send + Sync + 'static {
    /// Handle an incoming SBI request
    fn handle(&self, request: SbiRequest) -> Pin<Box<dyn Future<Output = SbiResponse> + Send>>;
}

/// Function-based request handler
impl<F, Fut> SbiRequestHandler for F
where
    F: Fn(SbiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SbiResponse> + Send + 'static,
{
    fn handle(&self, request: SbiRequest) -> Pin<Box<dyn Future<Output = SbiResponse> + Send>> {
        Box::pin(self(request))
    }
}

/// Hyper service wrapper
struct SbiService<H: SbiRequestHandler> {
    handler: Arc<H>,
    max_body_size: usize,
}

impl<H: SbiRequestHandler> Clone for SbiService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            max_body_size: self.max_body_size,
        }
    }
}

impl<H: SbiRequestHandler> Service<Request<Incoming>> for SbiService<H> {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let handler = self.handler.clone();
        let max_body_size = self.max_body_size;

        Box::pin(async move {
            let sbi_response = match convert_request(req, max_body_size).await {
                Ok(sbi_request) => handler.handle(sbi_request).await,
                Err(rejected) => rejected,
            };
            Ok(convert_response(sbi_response))
        })
    }
}

/// Convert hyper request to SbiRequest. A body that cannot be read or is
/// larger than `max_body_size` is answered right away with 400 or 413.
async fn convert_request<B>(req: Request<B>, max_body_size: usize) -> Result<SbiRequest, SbiResponse>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().to_string();
    let uri = req.uri().to_string();

    let mut http = SbiHttpMessage::new();
    for (key, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            http.set_header(key.as_str(), v);
        }
    }

    if let Some(query) = req.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            http.set_param(key, value);
        }
    }

    match Limited::new(req.into_body(), max_body_size).collect().await {
        Ok(body) => {
            let bytes = body.to_bytes();
            if !bytes.is_empty() {
                http.set_content(bytes);
            }
        }
        Err(e) if e.is::<LengthLimitError>() => {
            log::warn!("Request body of {method} {uri} exceeds {max_body_size} bytes");
            return Err(send_status(413));
        }
        Err(e) => {
            log::warn!("Failed to read request body of {method} {uri}: {e}");
            return Err(send_status(400));
        }
    }

    Ok(SbiRequest {
        header: SbiHeader::with_method_uri(method, uri),
        http,
    })
}

/// Convert SbiResponse to hyper response
fn convert_response(sbi_response: SbiResponse) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(sbi_response.status);

    for (key, value) in &sbi_response.http.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    let body = Full::new(sbi_response.http.content.unwrap_or_default());

    builder.body(body).unwrap_or_else(|e| {
        log::error!("Failed to build response: {e}");
        let mut response = Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Serve one accepted connection until the peer closes it.
async fn serve_connection<I, H>(io: I, http2: bool, service: SbiService<H>)
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: SbiRequestHandler,
{
    let io = TokioIo::new(io);
    let result = if http2 {
        http2::Builder::new(TokioExecutor::new())
            .serve_connection(io, service)
            .await
    } else {
        http1::Builder::new().serve_connection(io, service).await
    };

    if let Err(e) = result {
        log::debug!("Connection closed with error: {e}");
    }
}

/// Server state
enum ServerState {
    Stopped,
    Running(oneshot::Sender<()>),
}

/// SBI Server
/// Matches ogs_sbi_server_t
pub struct SbiServer {
    config: SbiServerConfig,
    state: Arc<Mutex<ServerState>>,
}

impl SbiServer {
    pub fn new(config: SbiServerConfig) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(ServerState::Stopped)),
        }
    }

    pub fn config(&self) -> &SbiServerConfig {
        &self.config
    }

    /// Start the server with a request handler.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    pub async fn start<H: SbiRequestHandler>(&self, handler: H) -> SbiResult<SocketAddr> {
        let mut state = self.state.lock().await;

        if matches!(*state, ServerState::Running(_)) {
            return Err(SbiError::ServerError("Server already running".to_string()));
        }

        let acceptor = match (&self.config.cert, &self.config.private_key) {
            (Some(cert), Some(key)) => {
                let tls_config = tls::build_server_config(cert, key, self.config.http2)?;
                Some(TlsAcceptor::from(Arc::new(tls_config)))
            }
            _ => None,
        };

        let listener = TcpListener::bind(self.config.addr)
            .await
            .map_err(|e| SbiError::ServerError(format!("Failed to bind {}: {e}", self.config.addr)))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        *state = ServerState::Running(shutdown_tx);
        drop(state);

        let service = SbiService {
            handler: Arc::new(handler),
            max_body_size: self.config.max_body_size,
        };
        let http2 = self.config.http2;

        log::info!(
            "SBI server listening on {}://{} ({})",
            self.config.scheme(),
            local_addr,
            if http2 { "HTTP/2" } else { "HTTP/1.1" }
        );

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        let (stream, peer) = match result {
                            Ok(accepted) => accepted,
                            Err(e) => {
                                log::error!("Accept error: {e}");
                                continue;
                            }
                        };
                        let service = service.clone();
                        let acceptor = acceptor.clone();

                        tokio::spawn(async move {
                            match acceptor {
                                Some(acceptor) => match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        let negotiated_h2 = tls_stream.get_ref().1.alpn_protocol()
                                            == Some(b"h2".as_slice());
                                        serve_connection(tls_stream, negotiated_h2, service).await;
                                    }
                                    Err(e) => log::warn!("TLS handshake with {peer} failed: {e}"),
                                },
                                None => serve_connection(stream, http2, service).await,
                            }
                        });
                    }
                    _ = &mut shutdown_rx => {
                        log::info!("SBI server on {local_addr} stopped");
                        break;
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Stop the server
    pub async fn stop(&self) -> SbiResult<()> {
        let mut state = self.state.lock().await;

        if let ServerState::Running(shutdown_tx) = std::mem::replace(&mut *state, ServerState::Stopped) {
            let _ = shutdown_tx.send(());
        }

        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        let state = self.state.lock().await;
        matches!(*state, ServerState::Running(_))
    }
}

/// Bare status response with no body
pub fn send_status(status: u16) -> SbiResponse {
    SbiResponse::with_status(status)
}

/// Send a 404 Not Found response
pub fn send_not_found(path: &str) -> SbiResponse {
    log::debug!("No route for {path}");
    send_status(404)
}

/// Send a 405 Method Not Allowed response
pub fn send_method_not_allowed(method: &str, resource: &str) -> SbiResponse {
    log::debug!("Method {method} not allowed for resource {resource}");
    send_status(405).with_header("allow", "POST")
}
