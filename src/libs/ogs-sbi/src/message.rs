//! SBI Message Structures
//!
//! Request and response values exchanged between the hyper transport and the
//! token endpoints. Bodies are kept as raw bytes; header names are stored in
//! lowercase so lookups are case-insensitive.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CONTENT_TYPE: &str = "content-type";
pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// SBI Header - matches ogs_sbi_header_t
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SbiHeader {
    /// HTTP method (GET, POST, PUT, DELETE, PATCH, OPTIONS)
    pub method: String,
    /// Request target, path and optional query
    pub uri: String,
}

impl SbiHeader {
    pub fn with_method_uri(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
        }
    }

    /// Path component of the URI, without query string
    pub fn path(&self) -> &str {
        let without_query = self.uri.split('?').next().unwrap_or_default();
        match without_query.find("://") {
            // absolute form, as sent on HTTP/2
            Some(pos) => {
                let rest = &without_query[pos + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => without_query,
        }
    }
}

/// SBI HTTP message - headers, query parameters and body
#[derive(Debug, Clone, Default)]
pub struct SbiHttpMessage {
    /// Query parameters
    pub params: HashMap<String, String>,
    /// HTTP headers, lowercase names
    pub headers: HashMap<String, String>,
    /// Body content
    pub content: Option<Bytes>,
}

impl SbiHttpMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    pub fn get_param(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }

    pub fn set_header(&mut self, key: impl AsRef<str>, value: impl Into<String>) {
        self.headers
            .insert(key.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get_header(&self, key: &str) -> Option<&String> {
        self.headers.get(&key.to_ascii_lowercase())
    }

    pub fn set_content(&mut self, content: impl Into<Bytes>) {
        self.content = Some(content.into());
    }

    /// Body bytes, empty when no body was sent
    pub fn body(&self) -> &[u8] {
        self.content.as_deref().unwrap_or_default()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get_header(CONTENT_TYPE).map(String::as_str)
    }
}

/// SBI Request - matches ogs_sbi_request_t
#[derive(Debug, Clone, Default)]
pub struct SbiRequest {
    pub header: SbiHeader,
    pub http: SbiHttpMessage,
}

impl SbiRequest {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            header: SbiHeader::with_method_uri(method, uri),
            http: SbiHttpMessage::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new("POST", uri)
    }

    pub fn with_json_body<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(body)?;
        self.http.set_content(json);
        self.http.set_header(CONTENT_TYPE, APPLICATION_JSON);
        Ok(self)
    }

    pub fn with_body(mut self, content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.http.set_content(content);
        self.http.set_header(CONTENT_TYPE, content_type);
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.http.set_header(key, value);
        self
    }
}

/// SBI Response - matches ogs_sbi_response_t
#[derive(Debug, Clone, Default)]
pub struct SbiResponse {
    pub http: SbiHttpMessage,
    pub status: u16,
}

impl SbiResponse {
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn ok() -> Self {
        Self::with_status(200)
    }

    pub fn bad_request() -> Self {
        Self::with_status(400)
    }

    pub fn not_found() -> Self {
        Self::with_status(404)
    }

    pub fn with_json_body<T: Serialize>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_vec(body)?;
        self.http.set_content(json);
        self.http.set_header(CONTENT_TYPE, APPLICATION_JSON);
        Ok(self)
    }

    pub fn with_body(mut self, content: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        self.http.set_content(content);
        self.http.set_header(CONTENT_TYPE, content_type);
        self
    }

    pub fn with_header(mut self, key: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.http.set_header(key, value);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json_body<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(self.http.body())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let request = SbiRequest::post("/oauth2/token")
            .with_header("Content-Type", APPLICATION_FORM_URLENCODED);
        assert_eq!(
            request.http.content_type(),
            Some(APPLICATION_FORM_URLENCODED)
        );
        assert_eq!(
            request.http.get_header("CONTENT-TYPE").map(String::as_str),
            Some(APPLICATION_FORM_URLENCODED)
        );
    }

    #[test]
    fn test_path_strips_query_and_authority() {
        assert_eq!(
            SbiHeader::with_method_uri("POST", "/oauth2/token?x=1").path(),
            "/oauth2/token"
        );
        assert_eq!(
            SbiHeader::with_method_uri("POST", "http://127.0.0.1:8080/oauth2/verify").path(),
            "/oauth2/verify"
        );
        assert_eq!(
            SbiHeader::with_method_uri("GET", "https://nrf.example.org").path(),
            "/"
        );
    }

    #[test]
    fn test_response_builders() {
        let response = SbiResponse::ok()
            .with_json_body(&serde_json::json!({"access_token": "abc"}))
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.http.content_type(), Some(APPLICATION_JSON));

        let value: serde_json::Value = response.json_body().unwrap();
        assert_eq!(value["access_token"], "abc");

        let empty = SbiResponse::bad_request();
        assert!(!empty.is_success());
        assert!(empty.http.body().is_empty());
    }
}
