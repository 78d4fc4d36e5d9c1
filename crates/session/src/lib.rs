//! Client-side OAuth2 password + refresh_token session manager
//!
//! Owns one authenticated session per [`Session`]: logs in against a token
//! endpoint, persists the credential through an injected adapter, refreshes
//! it transparently before expiry, and hands callers an always-valid-or-null
//! access token.
//!
//! Session flow:
//! 1. `Session::new(config, persistence)` builds the context object
//! 2. `initialize()` restores a persisted credential, if any
//! 3. `authenticate(username, password)` runs the password grant
//! 4. `token()` serves the access token, refreshing inside the skew window;
//!    concurrent callers during a refresh queue and share the one round trip
//! 5. `authorized_request()` / `post_json()` / `cached_get()` call the API
//!    with the token injected, signing out on a 401
//! 6. `on_auth_state_change()` observes authenticated/unauthenticated
//!    transitions, with the current state replayed on subscribe
//!
//! All state is owned by the `Session` context object — there are no
//! process-wide globals, so independent sessions (and tests) cannot
//! cross-contaminate.

mod cache;

pub mod config;
pub mod credential;
pub mod error;
pub mod persist;
pub mod request;
pub mod session;
pub mod subscribe;

pub use config::SessionConfig;
pub use credential::{Credential, CredentialStore};
pub use error::{Error, Result};
pub use persist::{FilePersistence, MemoryPersistence, NoopPersistence, Persistence};
pub use request::RequestOptions;
pub use session::{AuthAttempt, STORAGE_KEY, Session, Subscription};
pub use subscribe::AuthCallback;
