//! OAuth2 token endpoint client for password-credential deployments
//!
//! Speaks the two grants of the wire contract:
//! 1. `password` — initial login with username and password
//! 2. `refresh_token` — exchange the current credential for a fresh one
//!
//! Both POST a form-encoded body to the deployment's token endpoint and
//! expect a JSON body with `access_token`, `refresh_token`, and `expires_in`
//! (seconds). A 401 from the endpoint maps to `Error::Rejected` so callers
//! can distinguish "bad credentials" from endpoint outages.
//!
//! This crate is a standalone wire client with no session state — the
//! lifecycle logic (when to refresh, what to persist) lives in the session
//! crate built on top of it.

pub mod error;
pub mod token;

pub use error::{Error, Result};
pub use token::{TokenResponse, password_grant, refresh_grant};
