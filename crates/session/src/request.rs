//! Authenticated request facade
//!
//! Convenience layer over [`Session`]: obtains a valid token, injects the
//! Bearer header, issues the request against `origin + api_path + path`, and
//! treats a 401 from a protected resource as "session no longer valid". The
//! response is always returned to the caller, 401 included, so the caller
//! can inspect it.

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::session::Session;

/// Options for an authorized request. The default is a GET with no body and
/// no extra headers.
#[derive(Debug, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Session {
    /// Issue an authenticated request against the API.
    ///
    /// `Bearer <token>` is injected unless the caller already set an
    /// Authorization header; Accept and Content-Type default to
    /// `application/json` when unset. A missing token does not short-circuit
    /// the call — the request is sent anyway and the server rejects it. A
    /// 401 response signs the session out before being returned.
    pub async fn authorized_request(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<reqwest::Response> {
        let token = self.token().await;
        let url = self.shared.config.api_url(path);

        let mut headers = options.headers;
        if !headers.contains_key(AUTHORIZATION) {
            if let Some(token) = &token {
                match HeaderValue::from_str(&format!("Bearer {token}")) {
                    Ok(value) => {
                        headers.insert(AUTHORIZATION, value);
                    }
                    Err(e) => warn!(error = %e, "access token is not a valid header value"),
                }
            }
        }
        if !headers.contains_key(ACCEPT) {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let mut request = self
            .shared
            .client
            .request(options.method, &url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("request to {url} failed: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!(
                path,
                token_present = token.is_some(),
                "received 401 from API call, signing out"
            );
            self.signout().await;
        }

        Ok(response)
    }

    /// POST a JSON body to an API path.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::Http(format!("serializing request body: {e}")))?;
        self.authorized_request(
            path,
            RequestOptions {
                method: Method::POST,
                headers: HeaderMap::new(),
                body: Some(body),
            },
        )
        .await
    }

    /// GET an API path through the bounded response cache.
    ///
    /// A cached body is returned without any network call unless `refresh`
    /// is set, which bypasses the cache and repopulates it. Only successful
    /// response bodies are cached; a non-success status is an error. The
    /// cache is cleared on sign-out.
    pub async fn cached_get(&self, path: &str, refresh: bool) -> Result<String> {
        if !refresh {
            if let Some(body) = self.lock_cache().get(path) {
                debug!(path, "serving cached response");
                return Ok(body);
            }
        }

        let response = self
            .authorized_request(path, RequestOptions::default())
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("GET {path} returned {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading body of {path}: {e}")))?;
        self.lock_cache().insert(path, body.clone());
        Ok(body)
    }
}
