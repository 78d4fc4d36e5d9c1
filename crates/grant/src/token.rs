//! Password and refresh_token grant requests
//!
//! Both grants POST a form-encoded body to the deployment's token endpoint.
//! The endpoint URL is configuration (origin + auth path), not a constant,
//! so it is passed in by the caller.
//!
//! `expires_in` is a delta in seconds from the response time. The caller
//! converts this to an absolute unix millisecond timestamp when storing
//! the credential.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Response from the token endpoint for both grant types.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
}

/// Exchange a username and password for tokens (password grant).
///
/// A 401 from the endpoint means the credentials were rejected and maps to
/// `Error::Rejected`; any other non-success status maps to `Error::Endpoint`.
pub async fn password_grant(
    client: &reqwest::Client,
    token_url: &str,
    username: &str,
    password: &str,
) -> Result<TokenResponse> {
    debug!(token_url, username, "sending password grant");
    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("password grant request failed: {e}")))?;

    decode_grant_response(response).await
}

/// Obtain a fresh access token using the current credential (refresh grant).
///
/// The current access token is sent alongside the refresh token per the wire
/// contract. A 401 means the refresh token itself is no longer valid.
pub async fn refresh_grant(
    client: &reqwest::Client,
    token_url: &str,
    refresh_token: &str,
    access_token: &str,
) -> Result<TokenResponse> {
    debug!(token_url, "sending refresh_token grant");
    let response = client
        .post(token_url)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("access_token", access_token),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("refresh grant request failed: {e}")))?;

    decode_grant_response(response).await
}

/// Map a token endpoint response to a `TokenResponse` or the error taxonomy.
async fn decode_grant_response(response: reqwest::Response) -> Result<TokenResponse> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 {
            return Err(Error::Rejected(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        return Err(Error::Endpoint(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::Decode(e.to_string()))
}
