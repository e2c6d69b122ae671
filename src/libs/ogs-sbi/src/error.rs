//! SBI Error Types
//!
//! Errors of the SBI client and server. `ConnectionError`, `Timeout`,
//! `HttpError` and `InvalidResponse` make up the transport failures of an
//! upstream token exchange; the proxy answers those with a bare 400.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SbiError {
    /// Upstream unreachable, or the connection dropped mid exchange
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("request timeout")]
    Timeout,

    /// Upstream answered with a non-2xx status
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Upstream reply that could not be read
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("invalid URI: {0}")]
    InvalidUri(String),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// Outgoing request that could not be built
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("TLS error: {0}")]
    TlsError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SbiError {
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpError {
            status,
            message: message.into(),
        }
    }

    /// Status code of an HTTP error, 408 for a timeout
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            Self::Timeout => Some(408),
            _ => None,
        }
    }

    /// True for failures of the exchange with the peer, false for local
    /// setup errors (URI, TLS material, request building).
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_) | Self::Timeout | Self::HttpError { .. } | Self::InvalidResponse(_)
        )
    }
}

pub type SbiResult<T> = Result<T, SbiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_code() {
        let err = SbiError::from_status(503, "authority unavailable");
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.to_string(), "HTTP error: 503 - authority unavailable");

        assert_eq!(SbiError::Timeout.status_code(), Some(408));
        assert_eq!(SbiError::ConnectionError("refused".into()).status_code(), None);
    }

    #[test]
    fn test_transport_errors() {
        assert!(SbiError::ConnectionError("refused".into()).is_transport_error());
        assert!(SbiError::Timeout.is_transport_error());
        assert!(SbiError::from_status(500, "").is_transport_error());
        assert!(SbiError::InvalidResponse("truncated".into()).is_transport_error());

        assert!(!SbiError::TlsError("no CA".into()).is_transport_error());
        assert!(!SbiError::InvalidUri("nrf:".into()).is_transport_error());
        assert!(!SbiError::InvalidRequest("bad header".into()).is_transport_error());
    }

    #[test]
    fn test_from_serde_error() {
        let err: SbiError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, SbiError::SerializationError(_)));
        assert!(!err.is_transport_error());
    }
}
