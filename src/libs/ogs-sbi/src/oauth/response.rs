//! OAuth2 access token response per RFC 6749 Section 4.4.3 and 3GPP TS 29.510.

use serde::{Deserialize, Serialize};

use crate::error::{SbiError, SbiResult};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    /// The signed JWT
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Expiry of the token as seconds since the Unix epoch
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl AccessTokenResponse {
    pub fn bearer(access_token: impl Into<String>, expires_in: i64, scope: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in,
            refresh_token: None,
            scope: Some(scope.into()),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Validate that an access token response looks well-formed.
pub fn validate_token_response(response: &AccessTokenResponse) -> SbiResult<()> {
    if response.access_token.is_empty() {
        return Err(SbiError::InvalidResponse(
            "Empty access token in response".into(),
        ));
    }
    if !response.token_type.eq_ignore_ascii_case(TOKEN_TYPE_BEARER) {
        return Err(SbiError::InvalidResponse(format!(
            "Unsupported token type: {}",
            response.token_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_token_response_serialization() {
        let response = AccessTokenResponse::bearer("eyJhbGciOi.eyJpc3Mi.c2ln", 1_700_003_600, "nsmf-pdusession");

        let json = String::from_utf8(response.to_json().unwrap()).unwrap();
        assert!(json.contains(r#""token_type":"Bearer""#));
        assert!(json.contains(r#""expires_in":1700003600"#));
        assert!(!json.contains("refresh_token"));

        let parsed = AccessTokenResponse::from_json(json.as_bytes()).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_absent_optionals_decode_as_none() {
        let parsed = AccessTokenResponse::from_json(
            br#"{"access_token":"t","token_type":"Bearer","expires_in":10}"#,
        )
        .unwrap();
        assert_eq!(parsed.scope, None);
        assert_eq!(parsed.refresh_token, None);
    }

    #[test]
    fn test_validate_token_response() {
        assert!(validate_token_response(&AccessTokenResponse::bearer("t", 1, "nudm-sdm")).is_ok());

        let empty = AccessTokenResponse::bearer("", 1, "nudm-sdm");
        assert!(validate_token_response(&empty).is_err());

        let mut mac = AccessTokenResponse::bearer("t", 1, "nudm-sdm");
        mac.token_type = "mac".into();
        assert!(validate_token_response(&mac).is_err());
    }
}
