//! OAuth2 client for a remote authorization server.
//!
//! Posts form encoded token requests to the authority's token endpoint and
//! returns the raw response body of any 2xx reply.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::client::{SbiClient, SbiClientConfig};
use crate::error::{SbiError, SbiResult};
use crate::message::{SbiRequest, APPLICATION_FORM_URLENCODED};
use crate::oauth::request::AccessTokenRequest;
use crate::oauth::response::{validate_token_response, AccessTokenResponse};

/// Sends a form encoded token request upstream and yields the body of a
/// successful reply
pub trait TokenTransport: Send + Sync + 'static {
    fn request_token<'a>(
        &'a self,
        form_body: String,
    ) -> Pin<Box<dyn Future<Output = SbiResult<Bytes>> + Send + 'a>>;
}

pub struct OAuth2Client {
    /// Path and query of the token endpoint
    token_path: String,
    client: SbiClient,
}

impl OAuth2Client {
    /// `token_url` is the absolute URL of the token endpoint. Scheme, host and
    /// port in `config` are taken from it; the remaining settings are kept.
    pub fn new(token_url: &str, config: SbiClientConfig) -> SbiResult<Self> {
        let target = SbiClientConfig::from_url(token_url)?;
        let token_path = token_url
            .parse::<hyper::Uri>()
            .ok()
            .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_string()))
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| "/".to_string());

        let client = SbiClient::new(SbiClientConfig {
            scheme: target.scheme,
            host: target.host,
            port: target.port,
            ..config
        })?;

        Ok(Self { token_path, client })
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.client.config().base_uri(), self.token_path)
    }

    /// POST a form encoded body to the token endpoint
    pub async fn post_form(&self, form_body: String) -> SbiResult<Bytes> {
        let request = SbiRequest::post(self.token_path.as_str())
            .with_body(form_body, APPLICATION_FORM_URLENCODED);

        let response = self.client.send_request(request).await.map_err(|e| {
            log::error!("Fail to request token from {} with error: {e}", self.token_url());
            e
        })?;

        if !response.is_success() {
            log::error!(
                "Fail to get token from {} with status code: {}",
                self.token_url(),
                response.status
            );
            return Err(SbiError::from_status(
                response.status,
                String::from_utf8_lossy(response.http.body()).into_owned(),
            ));
        }

        Ok(response.http.content.unwrap_or_default())
    }

    /// Request a token and decode the reply
    pub async fn request_access_token(&self, request: &AccessTokenRequest) -> SbiResult<AccessTokenResponse> {
        let body = self.post_form(request.to_form()).await?;
        let response = AccessTokenResponse::from_json(&body)?;
        validate_token_response(&response)?;
        Ok(response)
    }
}

impl TokenTransport for OAuth2Client {
    fn request_token<'a>(
        &'a self,
        form_body: String,
    ) -> Pin<Box<dyn Future<Output = SbiResult<Bytes>> + Send + 'a>> {
        Box::pin(self.post_form(form_body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SbiResponse;
    use crate::server::{SbiServer, SbiServerConfig};
    use crate::types::UriScheme;
    use std::time::Duration;

    #[test]
    fn test_token_url() {
        let client = OAuth2Client::new("http://127.0.0.1:9090/oauth2/token", SbiClientConfig::default()).unwrap();
        assert_eq!(client.token_url(), "http://127.0.0.1:9090/oauth2/token");

        let client = OAuth2Client::new("http://127.0.0.1:9090", SbiClientConfig::default()).unwrap();
        assert_eq!(client.token_url(), "http://127.0.0.1:9090/");
    }

    #[test]
    fn test_keeps_transport_settings() {
        let config = SbiClientConfig::default()
            .with_http2(true)
            .with_connect_timeout(Duration::from_secs(1));
        let client = OAuth2Client::new("http://10.0.0.1:80/token", config).unwrap();

        assert!(client.client.config().http2);
        assert_eq!(client.client.config().scheme, UriScheme::Http);
        assert_eq!(client.client.config().connect_timeout, Duration::from_secs(1));
    }

    async fn authority_stub(status: u16, http2: bool) -> (SbiServer, String) {
        let server = SbiServer::new(
            SbiServerConfig::from_listen_addr("127.0.0.1:0")
                .unwrap()
                .with_http2(http2),
        );
        let addr = server
            .start(move |req: SbiRequest| async move {
                let ok = req.header.method == "POST"
                    && req.header.path() == "/oauth2/token"
                    && req.http.content_type() == Some(APPLICATION_FORM_URLENCODED);
                if !ok {
                    return SbiResponse::bad_request();
                }
                let form = AccessTokenRequest::from_form(req.http.body()).unwrap_or_default();
                let body = AccessTokenResponse::bearer("signed.jwt.token", 1_700_003_600, form.scope);
                SbiResponse::with_status(status).with_json_body(&body).unwrap_or_default()
            })
            .await
            .unwrap();
        (server, format!("http://{addr}/oauth2/token"))
    }

    #[tokio::test]
    async fn test_request_access_token_http1_and_http2() {
        for http2 in [false, true] {
            let (server, url) = authority_stub(200, http2).await;
            let client = OAuth2Client::new(&url, SbiClientConfig::default().with_http2(http2)).unwrap();

            let request = AccessTokenRequest::by_type("12345", "LMF", "AMF", "namf-comm");
            let response = client.request_access_token(&request).await.unwrap();
            assert_eq!(response.access_token, "signed.jwt.token");
            assert_eq!(response.scope.as_deref(), Some("namf-comm"));

            server.stop().await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_error() {
        let (server, url) = authority_stub(503, false).await;
        let client = OAuth2Client::new(&url, SbiClientConfig::default()).unwrap();

        let err = client.request_token("grant_type=client_credentials".into()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(503));

        server.stop().await.unwrap();
    }
}
