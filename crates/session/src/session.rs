//! Session lifecycle manager
//!
//! The core state machine. One `Session` owns the credential store, the busy
//! flag, the waiter queue, and the subscriber registry for exactly one
//! authenticated session; it is a cheap clone over `Arc`-shared state so the
//! application can hand it to every component that needs tokens.
//!
//! Concurrency model: shared state lives behind a `std::sync::Mutex` whose
//! critical sections never span an await. The busy flag plus FIFO waiter
//! queue is the sole serialization mechanism — N concurrent `token()` calls
//! during an in-flight refresh become one network round trip and N deferred
//! results, each resolved with a fresh read of the store when the flag
//! clears. The HTTP client carries a timeout so a hung request cannot hold
//! the flag (and every queued caller) forever.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use oauth_grant as grant;

use crate::cache::ResponseCache;
use crate::config::SessionConfig;
use crate::credential::{Credential, CredentialStore, now_millis};
use crate::error::{Error, Result};
use crate::persist::{NoopPersistence, Persistence};
use crate::subscribe::{AuthCallback, SubscriberRegistry};

/// Storage key under which the serialized credential blob is persisted.
pub const STORAGE_KEY: &str = "oauth_session";

/// Outcome of a login attempt. Rejections are values, not errors; `Err` is
/// reserved for transport and adapter faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAttempt {
    Granted,
    Denied { reason: String },
}

impl AuthAttempt {
    pub fn ok(&self) -> bool {
        matches!(self, AuthAttempt::Granted)
    }

    fn denied(reason: &str) -> Self {
        AuthAttempt::Denied {
            reason: reason.to_string(),
        }
    }
}

#[derive(Default)]
pub(crate) struct State {
    initialized: bool,
    busy: bool,
    store: CredentialStore,
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
    subscribers: SubscriberRegistry,
}

pub(crate) struct Shared {
    pub(crate) config: SessionConfig,
    pub(crate) client: reqwest::Client,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) cache: Mutex<ResponseCache>,
    pub(crate) state: Mutex<State>,
}

/// Handle over one authenticated session.
#[derive(Clone)]
pub struct Session {
    pub(crate) shared: Arc<Shared>,
}

/// What a `token()` call decided to do under the state lock.
enum TokenPlan {
    Wait(oneshot::Receiver<Option<String>>),
    Refresh {
        refresh_token: String,
        access_token: String,
    },
    Read(Option<String>),
}

impl Session {
    /// Create a session.
    ///
    /// Passing `None` for the persistence adapter degrades to a volatile
    /// session: logins will not survive restarts and signout has no storage
    /// to clear. This is warned, not fatal.
    pub fn new(config: SessionConfig, persistence: Option<Arc<dyn Persistence>>) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Client(e.to_string()))?;

        let persistence = persistence.unwrap_or_else(|| {
            warn!(
                "no persistence adapter configured; logins will not survive restarts \
                 and signout cannot clear storage"
            );
            Arc::new(NoopPersistence)
        });

        Ok(Self {
            shared: Arc::new(Shared {
                cache: Mutex::new(ResponseCache::new(config.cache_capacity)),
                config,
                client,
                persistence,
                state: Mutex::new(State::default()),
            }),
        })
    }

    /// Load the persisted credential and settle into an initial state.
    ///
    /// Runs at most once per session; repeat calls log and return. Every path
    /// ends with the waiter queue drained, the busy flag clear, and exactly
    /// one state-change notification. Never errors: an unreadable or unusable
    /// blob means "no session" and takes the sign-out path without network
    /// I/O.
    pub async fn initialize(&self) {
        {
            let mut state = self.lock_state();
            if state.initialized {
                debug!("session already initialized");
                return;
            }
            state.initialized = true;
            state.busy = true;
        }
        debug!("initializing session from persisted state");

        let raw = match self.shared.persistence.get(STORAGE_KEY).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                None
            }
        };

        let adopted = raw.and_then(|blob| match serde_json::from_str::<Credential>(&blob) {
            Ok(credential) if !credential.refresh_token.is_empty() => Some(credential),
            Ok(_) => {
                info!("persisted credential has no refresh token, signing out");
                None
            }
            Err(e) => {
                info!(error = %e, "persisted credential is malformed, signing out");
                None
            }
        });

        match adopted {
            Some(credential) => {
                // Expiry is re-derived at adoption; staleness is caught by the
                // first refresh or by the API rejecting the token.
                let credential = credential.restored(now_millis());
                self.lock_state().store.adopt(credential);
                info!("session restored from persisted credential");
                self.finish(Some(true));
            }
            None => self.signout().await,
        }
    }

    /// Log in with the password grant.
    ///
    /// Endpoint rejections come back as `AuthAttempt::Denied`; only transport,
    /// decode, and persistence faults are `Err`. Does not touch the busy flag
    /// or the waiter queue — serializing concurrent `authenticate` calls is
    /// the caller's responsibility.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AuthAttempt> {
        let url = self.shared.config.token_url();
        match grant::password_grant(&self.shared.client, &url, username, password).await {
            Ok(response) => {
                let credential = Credential::from_response(response, now_millis());
                // Persist before declaring success so the caller never sees a
                // Granted session that would vanish on restart.
                self.adopt_and_persist(credential).await?;
                info!(username, "authenticated");
                self.notify(true);
                Ok(AuthAttempt::Granted)
            }
            Err(grant::Error::Rejected(_)) => {
                info!(username, "login attempt rejected");
                Ok(AuthAttempt::denied("Wrong username or password"))
            }
            Err(grant::Error::Endpoint(msg)) => {
                warn!(error = %msg, "token endpoint error during login");
                Ok(AuthAttempt::denied("Something went wrong"))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// End the session. Idempotent.
    ///
    /// The in-memory credential is cleared synchronously, so any `token()`
    /// issued after this returns sees the cleared state; the persistence
    /// clear is scheduled (not awaited) before subscribers are notified.
    pub async fn signout(&self) {
        self.lock_state().store.clear();
        self.lock_cache().clear();

        let persistence = self.shared.persistence.clone();
        tokio::spawn(async move {
            if let Err(e) = persistence.clear(STORAGE_KEY).await {
                warn!(error = %e, "failed to clear persisted session");
            }
        });

        info!("signed out");
        self.finish(Some(false));
    }

    /// The current valid access token, or `None` if no session exists.
    ///
    /// If an init/refresh operation is in flight, the call queues behind it
    /// and resolves when the operation settles. Otherwise a credential inside
    /// the skew window triggers the refresh protocol first; the busy flag is
    /// checked and set under the same lock acquisition, so two
    /// near-simultaneous callers cannot both start a refresh.
    pub async fn token(&self) -> Option<String> {
        let plan = {
            let mut state = self.lock_state();
            let state = &mut *state;
            if state.busy {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                debug!(
                    queued = state.waiters.len(),
                    "token request queued behind in-flight operation"
                );
                TokenPlan::Wait(rx)
            } else {
                match state.store.get() {
                    Some(c)
                        if !c.refresh_token.is_empty()
                            && c.expires_within(now_millis(), self.shared.config.refresh_skew) =>
                    {
                        state.busy = true;
                        TokenPlan::Refresh {
                            refresh_token: c.refresh_token.clone(),
                            access_token: c.access_token.clone(),
                        }
                    }
                    _ => TokenPlan::Read(state.store.access_token()),
                }
            }
        };

        match plan {
            TokenPlan::Wait(rx) => rx.await.unwrap_or(None),
            TokenPlan::Read(token) => token,
            TokenPlan::Refresh {
                refresh_token,
                access_token,
            } => {
                self.run_refresh(&refresh_token, &access_token).await;
                self.lock_state().store.access_token()
            }
        }
    }

    /// Whether the store holds a credential with a non-empty access token.
    pub fn is_authenticated(&self) -> bool {
        self.lock_state().store.is_authenticated()
    }

    /// Register an auth-state observer.
    ///
    /// The callback is immediately replayed the current authenticated boolean
    /// and then invoked on every transition, in registration order, until the
    /// returned handle is unsubscribed. Dropping the handle does not
    /// unsubscribe.
    pub fn on_auth_state_change(
        &self,
        callback: impl Fn(bool) + Send + Sync + 'static,
    ) -> Subscription {
        let callback: AuthCallback = Arc::new(callback);
        let (id, status) = {
            let mut state = self.lock_state();
            let id = state.subscribers.add(callback.clone());
            (id, state.store.is_authenticated())
        };
        callback(status);
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Refresh protocol: already marked busy by the caller, always concludes
    /// by draining the waiter queue.
    async fn run_refresh(&self, refresh_token: &str, access_token: &str) {
        let url = self.shared.config.token_url();
        info!("refreshing access token");

        match grant::refresh_grant(&self.shared.client, &url, refresh_token, access_token).await {
            Ok(response) => {
                let credential = Credential::from_response(response, now_millis());
                if let Err(e) = self.adopt_and_persist(credential).await {
                    // The in-memory session is valid; only durability degraded.
                    warn!(error = %e, "refreshed credential could not be persisted");
                }
                info!("access token refreshed");
                self.finish(Some(true));
            }
            Err(grant::Error::Rejected(msg)) => {
                warn!(error = %msg, "refresh token rejected, signing out");
                self.signout().await;
            }
            Err(e) => {
                // Best-effort degrade: hand back the existing token and let
                // the caller react to a 401 from the protected API.
                warn!(error = %e, "token refresh failed, keeping current credential");
                self.finish(None);
            }
        }
    }

    /// Replace the credential in the store and persist the serialized record.
    async fn adopt_and_persist(&self, credential: Credential) -> Result<()> {
        let blob = serde_json::to_string(&credential)
            .map_err(|e| Error::Persistence(format!("serializing credential: {e}")))?;
        self.lock_state().store.adopt(credential);
        self.shared.persistence.set(STORAGE_KEY, blob).await
    }

    /// Settle an in-flight operation: clear busy, notify subscribers of a
    /// transition if one happened, and drain the waiter queue in FIFO order.
    /// Each waiter gets a per-waiter read of the store taken at drain time,
    /// not one broadcast value.
    fn finish(&self, transition: Option<bool>) {
        let (notification, waiters) = {
            let mut state = self.lock_state();
            state.busy = false;
            let notification = transition.map(|status| (state.subscribers.snapshot(), status));
            let mut waiters = Vec::with_capacity(state.waiters.len());
            while let Some(tx) = state.waiters.pop_front() {
                waiters.push((tx, state.store.access_token()));
            }
            (notification, waiters)
        };

        if let Some((callbacks, status)) = notification {
            debug!(status, subscribers = callbacks.len(), "auth state changed");
            for callback in &callbacks {
                callback(status);
            }
        }

        if !waiters.is_empty() {
            debug!(drained = waiters.len(), "draining token waiter queue");
        }
        for (tx, token) in waiters {
            // A dropped receiver just means the caller went away
            let _ = tx.send(token);
        }
    }

    /// Notify subscribers without touching busy or the waiter queue
    /// (authenticate's success path).
    fn notify(&self, status: bool) {
        let callbacks = self.lock_state().subscribers.snapshot();
        debug!(status, subscribers = callbacks.len(), "auth state changed");
        for callback in &callbacks {
            callback(status);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn lock_cache(&self) -> MutexGuard<'_, ResponseCache> {
        self.shared.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle for one subscriber registration.
pub struct Subscription {
    id: u64,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Remove this registration. Other subscribers, including other
    /// registrations of the same callback, are unaffected.
    pub fn unsubscribe(self) {
        if let Some(shared) = self.shared.upgrade() {
            let mut state = shared.state.lock().unwrap_or_else(|e| e.into_inner());
            state.subscribers.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::MemoryPersistence;
    use std::io::Write;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    const TOKEN_BODY: &str =
        r#"{"access_token":"at_new","refresh_token":"rt_new","expires_in":3600}"#;

    fn config_for(server: &mockito::ServerGuard) -> SessionConfig {
        SessionConfig::new(server.url(), "/oauth/token", "/api")
    }

    fn credential_blob(access: &str, refresh: &str, expires_in: u64) -> String {
        serde_json::to_string(&Credential {
            access_token: access.into(),
            refresh_token: refresh.into(),
            expires_in,
            // Deliberately ancient: adoption must re-derive it
            expires_at: 5,
        })
        .unwrap()
    }

    fn seeded_session(
        config: SessionConfig,
        blob: &str,
    ) -> (Session, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::seeded(STORAGE_KEY, blob.to_string()));
        let session = Session::new(config, Some(persistence.clone())).unwrap();
        (session, persistence)
    }

    /// Recording subscriber: collects every status it is invoked with.
    fn recorder() -> (Arc<StdMutex<Vec<bool>>>, impl Fn(bool) + Send + Sync + 'static) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let writer = log.clone();
        (log, move |status| writer.lock().unwrap().push(status))
    }

    /// Let spawned tasks (the signout persistence clear) run.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn initialize_without_persisted_data_notifies_false_once() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let session =
            Session::new(config, Some(Arc::new(MemoryPersistence::new()))).unwrap();

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        assert_eq!(*log.lock().unwrap(), vec![false], "replay on subscribe");
        log.lock().unwrap().clear();

        session.initialize().await;

        assert!(!session.is_authenticated());
        assert_eq!(session.token().await, None);
        assert_eq!(*log.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn initialize_restores_credential_and_rederives_expiry() {
        let mut server = mockito::Server::new_async().await;
        // The persisted expires_at is ancient; a re-derived expiry means no
        // refresh call is attempted for a 3600s credential.
        let endpoint = server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;

        let (session, _persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 3600));
        session.initialize().await;

        assert!(session.is_authenticated());
        assert_eq!(session.token().await.as_deref(), Some("at_1"));
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn initialize_rejects_blob_without_refresh_token() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let (session, persistence) = {
            let persistence = Arc::new(MemoryPersistence::seeded(
                STORAGE_KEY,
                credential_blob("at_1", "", 3600),
            ));
            let session = Session::new(config, Some(persistence.clone())).unwrap();
            (session, persistence)
        };

        session.initialize().await;
        settle().await;

        assert!(!session.is_authenticated());
        assert_eq!(persistence.get(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn initialize_signs_out_on_malformed_blob() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let persistence = Arc::new(MemoryPersistence::seeded(
            STORAGE_KEY,
            "not a credential".into(),
        ));
        let session = Session::new(config, Some(persistence.clone())).unwrap();

        session.initialize().await;
        settle().await;

        assert!(!session.is_authenticated());
        assert_eq!(persistence.get(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn initialize_twice_is_a_noop() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let session =
            Session::new(config, Some(Arc::new(MemoryPersistence::new()))).unwrap();

        session.initialize().await;

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        log.lock().unwrap().clear();

        session.initialize().await;
        assert!(log.lock().unwrap().is_empty(), "second initialize must not notify");
    }

    #[tokio::test]
    async fn authenticate_success_persists_and_notifies() {
        let mut server = mockito::Server::new_async().await;
        let endpoint = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let persistence = Arc::new(MemoryPersistence::new());
        let session =
            Session::new(config_for(&server), Some(persistence.clone())).unwrap();
        session.initialize().await;

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        log.lock().unwrap().clear();

        let attempt = session.authenticate("alice", "s3cret").await.unwrap();
        assert!(attempt.ok());
        assert!(session.is_authenticated());
        assert_eq!(session.token().await.as_deref(), Some("at_new"));
        assert_eq!(*log.lock().unwrap(), vec![true]);

        let blob = persistence.get(STORAGE_KEY).await.unwrap().unwrap();
        let persisted: Credential = serde_json::from_str(&blob).unwrap();
        assert_eq!(persisted.access_token, "at_new");
        assert!(persisted.expires_at > 0, "persisted record carries derived expiry");

        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn authenticate_rejection_is_structured() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .create_async()
            .await;

        let session = Session::new(config_for(&server), None).unwrap();
        session.initialize().await;

        let attempt = session.authenticate("alice", "badpass").await.unwrap();
        assert_eq!(
            attempt,
            AuthAttempt::Denied {
                reason: "Wrong username or password".into()
            }
        );
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_endpoint_error_is_generic_denial() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(500)
            .create_async()
            .await;

        let session = Session::new(config_for(&server), None).unwrap();
        let attempt = session.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(
            attempt,
            AuthAttempt::Denied {
                reason: "Something went wrong".into()
            }
        );
    }

    #[tokio::test]
    async fn token_outside_skew_window_makes_no_network_call() {
        let mut server = mockito::Server::new_async().await;
        let endpoint = server
            .mock("POST", "/oauth/token")
            .expect(0)
            .create_async()
            .await;

        let (session, _persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 3600));
        session.initialize().await;

        assert_eq!(session.token().await.as_deref(), Some("at_1"));
        assert_eq!(session.token().await.as_deref(), Some("at_1"));
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn token_inside_skew_window_refreshes_exactly_once() {
        let mut server = mockito::Server::new_async().await;
        let endpoint = server
            .mock("POST", "/oauth/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "rt_1".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .expect(1)
            .create_async()
            .await;

        // expires_in 1s vs 3s default skew: inside the window immediately
        let (session, persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 1));
        session.initialize().await;

        assert_eq!(session.token().await.as_deref(), Some("at_new"));
        endpoint.assert_async().await;

        // Refreshed credential was written through
        let blob = persistence.get(STORAGE_KEY).await.unwrap().unwrap();
        assert!(blob.contains("at_new"));
    }

    #[tokio::test]
    async fn rejected_refresh_signs_out_and_notifies_false_once() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .create_async()
            .await;

        let (session, persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 1));
        session.initialize().await;

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        log.lock().unwrap().clear();

        assert_eq!(session.token().await, None);
        assert!(!session.is_authenticated());
        assert_eq!(*log.lock().unwrap(), vec![false]);

        settle().await;
        assert_eq!(persistence.get(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn transient_refresh_failure_hands_back_stale_token() {
        let mut server = mockito::Server::new_async().await;
        let endpoint = server
            .mock("POST", "/oauth/token")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let (session, _persistence) =
            seeded_session(config_for(&server), &credential_blob("at_stale", "rt_1", 1));
        session.initialize().await;

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        log.lock().unwrap().clear();

        // Best-effort degrade: the caller gets the stale token back and the
        // credential survives for the next attempt.
        assert_eq!(session.token().await.as_deref(), Some("at_stale"));
        assert!(session.is_authenticated());
        assert!(log.lock().unwrap().is_empty(), "no transition on transient failure");
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_token_calls_share_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let endpoint = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_chunked_body(|writer| {
                // Hold the refresh in flight long enough for the other
                // callers to queue behind the busy flag
                std::thread::sleep(Duration::from_millis(150));
                writer.write_all(TOKEN_BODY.as_bytes())
            })
            .expect(1)
            .create_async()
            .await;

        let (session, _persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 1));
        session.initialize().await;

        let (a, b, c) = tokio::join!(session.token(), session.token(), session.token());
        assert_eq!(a.as_deref(), Some("at_new"));
        assert_eq!(b.as_deref(), Some("at_new"));
        assert_eq!(c.as_deref(), Some("at_new"));
        endpoint.assert_async().await;
    }

    #[tokio::test]
    async fn queued_callers_resolve_none_when_refresh_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(401)
            .with_chunked_body(|writer| {
                std::thread::sleep(Duration::from_millis(150));
                writer.write_all(b"invalid_grant")
            })
            .expect(1)
            .create_async()
            .await;

        let (session, _persistence) =
            seeded_session(config_for(&server), &credential_blob("at_1", "rt_1", 1));
        session.initialize().await;

        let (a, b, c) = tokio::join!(session.token(), session.token(), session.token());
        assert_eq!(a, None);
        assert_eq!(b, None);
        assert_eq!(c, None);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn signout_clears_state_and_storage() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/oauth/token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let persistence = Arc::new(MemoryPersistence::new());
        let session =
            Session::new(config_for(&server), Some(persistence.clone())).unwrap();
        session.initialize().await;
        session.authenticate("alice", "s3cret").await.unwrap();
        assert!(session.is_authenticated());

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        log.lock().unwrap().clear();

        session.signout().await;

        assert!(!session.is_authenticated());
        assert_eq!(session.token().await, None);
        assert_eq!(*log.lock().unwrap(), vec![false]);

        settle().await;
        assert_eq!(persistence.get(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn signout_is_idempotent() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let session = Session::new(config, None).unwrap();
        session.initialize().await;

        session.signout().await;
        session.signout().await;
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn unsubscribed_callback_receives_no_further_notifications() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let session = Session::new(config, None).unwrap();
        session.initialize().await;

        let (gone_log, gone_callback) = recorder();
        let (kept_log, kept_callback) = recorder();
        let gone = session.on_auth_state_change(gone_callback);
        let _kept = session.on_auth_state_change(kept_callback);
        gone_log.lock().unwrap().clear();
        kept_log.lock().unwrap().clear();

        gone.unsubscribe();
        session.signout().await;

        assert!(gone_log.lock().unwrap().is_empty());
        assert_eq!(*kept_log.lock().unwrap(), vec![false]);
    }

    #[tokio::test]
    async fn replay_reports_authenticated_state() {
        let config = SessionConfig::new("https://example.com", "/oauth/token", "/api");
        let (session, _persistence) =
            seeded_session(config, &credential_blob("at_1", "rt_1", 3600));
        session.initialize().await;

        let (log, callback) = recorder();
        let _sub = session.on_auth_state_change(callback);
        assert_eq!(*log.lock().unwrap(), vec![true]);
    }
}
