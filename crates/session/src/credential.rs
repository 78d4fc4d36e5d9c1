//! Credential model and in-memory store
//!
//! A `Credential` is immutable once constructed; replacement is total. Its
//! `expires_at` is always derived locally from `expires_in` at the moment the
//! credential is received — the server's clock is never trusted for the
//! absolute timestamp, and a persisted credential gets a fresh derivation
//! when it is re-adopted at initialization.
//!
//! `CredentialStore` is the single source of truth for the process's one
//! session while it runs. It holds at most one credential and knows nothing
//! about persistence or refresh; the session drives both.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use oauth_grant::TokenResponse;

/// The stored credential: token pair plus derived absolute expiry.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta),
/// computed as `now + expires_in * 1000` at receipt.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds of validity reported by the server at receipt
    pub expires_in: u64,
    /// Derived expiry as unix timestamp in milliseconds
    pub expires_at: u64,
}

impl Credential {
    /// Build a credential from a token endpoint response, deriving the
    /// absolute expiry from the current time.
    pub fn from_response(response: TokenResponse, now_millis: u64) -> Self {
        Self {
            expires_at: now_millis.saturating_add(response.expires_in.saturating_mul(1000)),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
        }
    }

    /// Re-derive the expiry of a persisted credential at adoption time.
    ///
    /// The persisted `expires_at` was computed by a previous process and is
    /// deliberately not reused; staleness is caught by the first refresh or
    /// by the API rejecting the token.
    pub fn restored(self, now_millis: u64) -> Self {
        Self {
            expires_at: now_millis.saturating_add(self.expires_in.saturating_mul(1000)),
            ..self
        }
    }

    /// Whether the credential is inside the skew window of its expiry.
    ///
    /// Saturating arithmetic throughout: `expires_in` comes off the wire (or
    /// a persisted blob), so an absurd value pins the expiry at the far
    /// future instead of wrapping into the past.
    pub fn expires_within(&self, now_millis: u64, skew: Duration) -> bool {
        now_millis.saturating_add(skew.as_millis() as u64) > self.expires_at
    }
}

// Token values never appear in Debug output or logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// In-memory holder of the current credential.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<Credential>,
}

impl CredentialStore {
    /// Replace the current credential wholesale.
    pub fn adopt(&mut self, credential: Credential) {
        self.current = Some(credential);
    }

    /// Drop the current credential.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// The current credential, if any.
    pub fn get(&self) -> Option<&Credential> {
        self.current.as_ref()
    }

    /// The current access token, if a session exists.
    pub fn access_token(&self) -> Option<String> {
        self.current.as_ref().map(|c| c.access_token.clone())
    }

    /// Whether a credential with a non-empty access token is held.
    pub fn is_authenticated(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|c| !c.access_token.is_empty())
    }
}

/// Current unix time in milliseconds.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
