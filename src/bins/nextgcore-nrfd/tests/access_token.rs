//! Access token service over real sockets: authority, proxy and verification
//! on ephemeral ports, over HTTP/1.1, HTTP/2 and TLS.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use nextgcore_nrfd::{
    nrf_authority_build, nrf_authority_open, nrf_proxy_build, nrf_proxy_open, nrf_sbi_close, AuthServerConfig,
    NrfSbiServer, ProxyConfig, UpstreamAuthServer,
};
use ogs_sbi::message::{APPLICATION_FORM_URLENCODED, APPLICATION_JSON};
use ogs_sbi::oauth::keys::parse_algorithm;
use ogs_sbi::oauth::{
    AccessTokenClaims, AccessTokenError, AccessTokenErrorCode, AccessTokenRequest, AccessTokenResponse,
    VerificationKey,
};
use ogs_sbi::tls::{build_client_config, ClientTlsFiles};
use ogs_sbi::{SbiClient, SbiClientConfig, SbiRequest, SbiResponse};

fn testdata(name: &str) -> String {
    format!("{}/../../libs/ogs-sbi/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

async fn start_authority(extra_yaml: &str) -> NrfSbiServer {
    let yaml = format!(
        "listenAddr: 127.0.0.1:0\ninstanceId: instance-1\ntokenExpire: 3600\nsignature:\n  algorithm: RS256\n  keyFile: {}\n{}",
        testdata("rsa_private.pem"),
        extra_yaml
    );
    let config = AuthServerConfig::from_yaml_str(&yaml).unwrap();
    let authority = nrf_authority_build(&config).unwrap();
    nrf_authority_open(&config, authority).await.unwrap()
}

async fn start_proxy(auth_server: UpstreamAuthServer) -> NrfSbiServer {
    let config = ProxyConfig {
        listen_addr: "127.0.0.1:0".into(),
        auth_server,
        token_req_path: "/oauth2/token".into(),
        token_verify_path: "/oauth2/verify".into(),
        token_verify_algorithm: Some("RS256".into()),
        token_verify_key_file: Some(testdata("rsa_public.pem")),
    };
    let proxy = nrf_proxy_build(&config).unwrap();
    nrf_proxy_open(&config, proxy).await.unwrap()
}

fn upstream(authority: &NrfSbiServer) -> UpstreamAuthServer {
    UpstreamAuthServer {
        url: format!("{}/oauth2/token", authority.uri()),
        ..Default::default()
    }
}

fn client(addr: SocketAddr) -> SbiClient {
    SbiClient::new(SbiClientConfig::new("127.0.0.1", addr.port())).unwrap()
}

fn token_request() -> AccessTokenRequest {
    AccessTokenRequest::by_type("12345", "LMF", "AMF", "namf-comm")
}

async fn post(client: &SbiClient, path: &str, body: impl Into<bytes::Bytes>, content_type: &str) -> SbiResponse {
    client
        .send_request(SbiRequest::post(path).with_body(body, content_type))
        .await
        .unwrap()
}

fn decode_claims(token: &str) -> AccessTokenClaims {
    let key = VerificationKey::from_file(parse_algorithm("RS256").unwrap(), testdata("rsa_public.pem")).unwrap();
    AccessTokenClaims::from_claim_set(&key.verify(token).unwrap()).unwrap()
}

fn assert_token_response(response: &SbiResponse) -> AccessTokenResponse {
    assert_eq!(response.status, 200);
    assert_eq!(response.http.get_header("cache-control").map(String::as_str), Some("no-store"));
    assert_eq!(response.http.get_header("pragma").map(String::as_str), Some("no-cache"));

    let token: AccessTokenResponse = response.json_body().unwrap();
    assert_eq!(token.token_type, "Bearer");
    assert_eq!(token.scope.as_deref(), Some("namf-comm"));
    token
}

#[tokio::test]
async fn test_token_through_proxy_and_verify() {
    let authority = start_authority("").await;
    let proxy = start_proxy(upstream(&authority)).await;
    let client = client(proxy.local_addr());

    let before = now();
    let response = post(&client, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    let token = assert_token_response(&response);

    // expires_in carries the absolute expiry
    assert!(token.expires_in >= before + 3600 && token.expires_in <= now() + 3600);

    let claims = decode_claims(&token.access_token);
    assert_eq!(claims.iss, "instance-1");
    assert_eq!(claims.sub, "12345");
    assert_eq!(claims.aud, vec!["AMF".to_string()]);
    assert_eq!(claims.scope, "namf-comm");
    assert_eq!(claims.exp, token.expires_in);

    // served from the proxy cache
    let again = post(&client, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_eq!(again.http.body(), response.http.body());

    let verified = post(&client, "/oauth2/verify", token.access_token.clone(), "text/plain").await;
    assert_eq!(verified.status, 200);
    assert!(verified.http.body().is_empty());

    let rejected = post(&client, "/oauth2/verify", "not.a.token", "text/plain").await;
    assert_eq!(rejected.status, 400);
    assert!(rejected.http.body().is_empty());

    nrf_sbi_close(&[proxy, authority]).await;
}

#[tokio::test]
async fn test_json_request_through_proxy() {
    let authority = start_authority("").await;
    let proxy = start_proxy(upstream(&authority)).await;
    let client = client(proxy.local_addr());

    let body = token_request().to_json().unwrap();
    let response = post(&client, "/oauth2/token", body, APPLICATION_JSON).await;
    let token = assert_token_response(&response);
    assert_eq!(decode_claims(&token.access_token).sub, "12345");

    nrf_sbi_close(&[proxy, authority]).await;
}

#[tokio::test]
async fn test_authority_endpoint() {
    let authority = start_authority("tokenReqPath: /nnrf-oauth2/v1/token\n").await;
    let client = client(authority.local_addr());

    let first = post(&client, "/nnrf-oauth2/v1/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    let first = assert_token_response(&first);

    // another consumer asking for the same NF type pair shares the token
    let other = AccessTokenRequest::by_type("67890", "LMF", "AMF", "namf-comm");
    let second = post(&client, "/nnrf-oauth2/v1/token", other.to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_eq!(assert_token_response(&second).access_token, first.access_token);

    let mut bad_scope = token_request();
    bad_scope.scope = "bogus".into();
    let response = post(&client, "/nnrf-oauth2/v1/token", bad_scope.to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_eq!(response.status, 400);
    assert_eq!(response.http.get_header("cache-control").map(String::as_str), Some("no-store"));
    let error = AccessTokenError::from_json(response.http.body()).unwrap();
    assert_eq!(error.error, AccessTokenErrorCode::InvalidScope);

    let get = client.send_request(SbiRequest::get("/nnrf-oauth2/v1/token")).await.unwrap();
    assert_eq!(get.status, 405);

    let unknown = post(&client, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_eq!(unknown.status, 404);

    nrf_sbi_close(&[authority]).await;
}

#[tokio::test]
async fn test_http2_upstream() {
    let authority = start_authority("http2: true\n").await;
    let proxy = start_proxy(UpstreamAuthServer {
        http2: true,
        ..upstream(&authority)
    })
    .await;
    let client = client(proxy.local_addr());

    let response = post(&client, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_token_response(&response);

    nrf_sbi_close(&[proxy, authority]).await;
}

#[tokio::test]
async fn test_tls_upstream() {
    let tls = format!(
        "http2: true\ntlsCertFile: {}\ntlsKeyFile: {}\n",
        testdata("server.crt"),
        testdata("server.key")
    );
    let authority = start_authority(&tls).await;
    assert!(authority.uri().starts_with("https://"));

    let proxy = start_proxy(UpstreamAuthServer {
        fqdn: Some("localhost".into()),
        http2: true,
        url: format!("https://127.0.0.1:{}/oauth2/token", authority.local_addr().port()),
        ca_cert_file: Some(testdata("ca.crt")),
        ..Default::default()
    })
    .await;

    let response = post(
        &client(proxy.local_addr()),
        "/oauth2/token",
        token_request().to_form(),
        APPLICATION_FORM_URLENCODED,
    )
    .await;
    assert_token_response(&response);

    // direct HTTP/1.1 over TLS to the authority
    let files = ClientTlsFiles {
        ca_cert: Some(testdata("ca.crt")),
        ..Default::default()
    };
    let direct = SbiClient::new(
        SbiClientConfig::from_url(&authority.uri())
            .unwrap()
            .with_server_name("localhost")
            .with_tls(Arc::new(build_client_config(&files, false).unwrap())),
    )
    .unwrap();
    let response = post(&direct, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_token_response(&response);

    nrf_sbi_close(&[proxy, authority]).await;
}

#[tokio::test]
async fn test_upstream_unreachable() {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let proxy = start_proxy(UpstreamAuthServer {
        url: format!("http://127.0.0.1:{port}/oauth2/token"),
        ..Default::default()
    })
    .await;
    let client = client(proxy.local_addr());

    let response = post(&client, "/oauth2/token", token_request().to_form(), APPLICATION_FORM_URLENCODED).await;
    assert_eq!(response.status, 400);
    assert!(response.http.body().is_empty());

    nrf_sbi_close(&[proxy]).await;
}
