//! NRF Handler Implementation
//!
//! Access token endpoint of the Nnrf_AccessToken service
//! (TS 29.510 clause 5.4.2.2).

use bytes::Bytes;
use ogs_sbi::message::APPLICATION_JSON;
use ogs_sbi::oauth::{AccessTokenError, AccessTokenRequest, AccessTokenResponse, NO_STORE_HEADERS};
use ogs_sbi::{SbiRequest, SbiResponse};

use crate::authority::TokenAuthority;

fn with_no_store(mut response: SbiResponse) -> SbiResponse {
    for (name, value) in NO_STORE_HEADERS {
        response = response.with_header(name, value);
    }
    response
}

/// 200 reply carrying an encoded AccessTokenResponse
pub fn send_token_response(body: impl Into<Bytes>) -> SbiResponse {
    with_no_store(SbiResponse::ok().with_body(body, APPLICATION_JSON))
}

/// 400 reply carrying an AccessTokenError
pub fn send_token_error(error: &AccessTokenError) -> SbiResponse {
    let response = match error.to_json() {
        Ok(body) => SbiResponse::bad_request().with_body(body, APPLICATION_JSON),
        Err(e) => {
            log::error!("Fail to encode AccessTokenError: {e}");
            SbiResponse::bad_request()
        }
    };
    with_no_store(response)
}

fn encode_token_response(response: &AccessTokenResponse) -> SbiResponse {
    match response.to_json() {
        Ok(body) => send_token_response(body),
        Err(e) => {
            log::error!("Fail to encode AccessTokenResponse: {e}");
            SbiResponse::with_status(500)
        }
    }
}

/// Handle POST on the authority's token endpoint
pub fn nrf_nnrf_handle_access_token_request(authority: &TokenAuthority, request: &SbiRequest) -> SbiResponse {
    let token_request = match AccessTokenRequest::decode(request.http.content_type(), request.http.body()) {
        Ok(token_request) => token_request,
        Err(e) => {
            log::error!("Fail to decode request with error: {e}");
            return send_token_error(&e.to_access_token_error());
        }
    };

    match authority.issue_token(&token_request) {
        Ok(response) => encode_token_response(&response),
        Err(e) => {
            log::error!("Fail to issue token: {e}");
            send_token_error(&e.to_access_token_error())
        }
    }
}
