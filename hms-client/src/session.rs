//! Session Guard: transparent recovery from an expired session.
//!
//! Every request the data layer issues goes through [`SessionGuard::guarded_send`].
//! An authentication failure triggers one shared refresh and one retry of the
//! original request. Callers never see the 401 unless the refresh itself fails.
//!
//! # Concurrency
//!
//! At most one refresh is in flight. The first caller to need one registers
//! it in [`SessionState::refresh_in_flight`] under the lock, before its first
//! suspension point; later callers join the same shared future. The refresh
//! runs as its own task, so it settles (and clears the slot) even if every
//! caller awaiting it goes away.
//!
//! Each sign-in and each reset starts a new session epoch. A refresh only
//! writes back into the epoch it was started in, and a request whose refresh
//! outlived its session is not retried.

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use hms_core::{ApiRequest, AuthUser, HmsResult, HttpFailure, Transport, REFRESH_PATH};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::persistence::{self, PersistedIdentity, PersistenceError};

/// The shared refresh every concurrent 401 waits on.
pub type RefreshFlight = Shared<BoxFuture<'static, HmsResult<()>>>;

/// Mutable session state owned by the guard.
#[derive(Default)]
pub struct SessionState {
    /// A request has been validated by the server in this run.
    pub authenticated: bool,
    pub refresh_in_flight: Option<RefreshFlight>,
    /// Identity snapshot, possibly restored from disk and not yet validated.
    pub user: Option<AuthUser>,
    /// The persisted snapshot has been consulted.
    pub initialized: bool,
    /// Bumped by every sign-in and reset.
    pub epoch: u64,
}

impl SessionState {
    fn status(&self) -> SessionStatus {
        SessionStatus {
            authenticated: self.authenticated,
            initialized: self.initialized,
            user: self.user.clone(),
        }
    }
}

/// What UI collaborators observe about the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub initialized: bool,
    pub user: Option<AuthUser>,
}

struct GuardInner {
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    status: watch::Sender<SessionStatus>,
    identity_path: Option<PathBuf>,
    refreshes: AtomicU64,
}

impl GuardInner {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F: FnOnce(&mut SessionState)>(&self, change: F) {
        let mut state = self.lock();
        change(&mut state);
        self.status.send_if_modified(|status| {
            let next = state.status();
            if *status == next {
                false
            } else {
                *status = next;
                true
            }
        });
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn remember(&self, user: &AuthUser) {
        if let Some(path) = &self.identity_path {
            if let Err(err) = persistence::save(path, &PersistedIdentity::new(user.clone())) {
                tracing::warn!(path = %path.display(), error = %err, "failed to persist identity");
            }
        }
    }

    fn forget(&self) {
        if let Some(path) = &self.identity_path {
            if let Err(err) = persistence::clear(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to clear identity");
            }
        }
    }
}

/// Wraps the [`Transport`] with single-flight session refresh.
#[derive(Clone)]
pub struct SessionGuard {
    inner: Arc<GuardInner>,
}

impl SessionGuard {
    pub fn new(transport: Arc<dyn Transport>, identity_path: Option<PathBuf>) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            inner: Arc::new(GuardInner {
                transport,
                state: Mutex::new(SessionState::default()),
                status,
                identity_path,
                refreshes: AtomicU64::new(0),
            }),
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    pub fn status(&self) -> SessionStatus {
        self.inner.lock().status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.inner.lock().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().authenticated
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.lock().refresh_in_flight.is_some()
    }

    /// Refresh calls issued so far.
    pub fn refresh_count(&self) -> u64 {
        self.inner.refreshes.load(Ordering::SeqCst)
    }

    /// Send `request`, absorbing one authentication failure through a shared
    /// refresh and a single retry.
    ///
    /// When the refresh fails the caller gets the original failure and the
    /// session is reset.
    pub async fn guarded_send(&self, request: &ApiRequest) -> HmsResult<Value> {
        let failure = match self.inner.transport.send(request).await {
            Err(failure) if failure.is_authentication() => failure,
            Ok(body) => {
                self.confirm();
                return Ok(body);
            }
            other => return other,
        };

        if request.is_auth_bootstrap() {
            tracing::debug!(request = %request, "auth endpoint rejected, not refreshing");
            return Err(failure);
        }

        let (epoch, flight) = self.join_refresh();
        match flight.await {
            Ok(()) if self.inner.epoch() != epoch => {
                tracing::debug!(request = %request, "session ended during refresh, not retrying");
                Err(failure)
            }
            Ok(()) => {
                tracing::debug!(request = %request, "retrying after session refresh");
                self.inner
                    .transport
                    .send(&request.without_authorization())
                    .await
            }
            Err(refresh_failure) => {
                tracing::debug!(
                    request = %request,
                    error = %refresh_failure,
                    "refresh failed, surfacing original failure"
                );
                Err(failure)
            }
        }
    }

    /// Join the refresh in flight, or start one, tagged with the current epoch.
    fn join_refresh(&self) -> (u64, RefreshFlight) {
        let mut state = self.inner.lock();
        let epoch = state.epoch;
        if let Some(flight) = &state.refresh_in_flight {
            tracing::debug!(epoch, "joining session refresh in flight");
            return (epoch, flight.clone());
        }
        let flight = refresh(Arc::clone(&self.inner), epoch).boxed().shared();
        state.refresh_in_flight = Some(flight.clone());
        drop(state);
        tokio::spawn(flight.clone());
        (epoch, flight)
    }

    /// A request succeeded while a (restored) user is present.
    fn confirm(&self) {
        if self.inner.lock().authenticated {
            return;
        }
        self.inner.update(|state| {
            if state.user.is_some() {
                state.authenticated = true;
            }
        });
    }

    /// Load the persisted identity snapshot. The user is kept unauthenticated
    /// until a request validates the session.
    pub fn restore(&self) -> Result<Option<AuthUser>, PersistenceError> {
        let loaded = match &self.inner.identity_path {
            Some(path) => persistence::load(path),
            None => Ok(None),
        };
        let user = match loaded {
            Ok(identity) => identity.map(|identity| identity.user),
            Err(err) => {
                self.inner.update(|state| state.initialized = true);
                return Err(err);
            }
        };
        self.inner.update(|state| {
            state.user = user.clone();
            state.authenticated = false;
            state.initialized = true;
        });
        if let Some(user) = &user {
            tracing::info!(user = %user.id, "restored session identity");
        }
        Ok(user)
    }

    /// Record a server-confirmed sign-in.
    pub fn establish(&self, user: AuthUser) {
        self.inner.remember(&user);
        tracing::info!(user = %user.id, role = %user.role, "session established");
        self.inner.update(|state| {
            next_epoch(state);
            state.user = Some(user);
            state.authenticated = true;
            state.initialized = true;
        });
    }

    /// Replace the identity snapshot without touching authentication.
    pub fn update_user(&self, user: AuthUser) {
        self.inner.remember(&user);
        self.inner.update(|state| state.user = Some(user));
    }

    /// Drop the session and its persisted snapshot. A refresh still in
    /// flight settles into the old epoch and changes nothing.
    pub fn reset(&self) {
        self.inner.forget();
        self.inner.update(|state| {
            next_epoch(state);
            state.user = None;
            state.authenticated = false;
            state.initialized = true;
        });
        tracing::info!("session reset");
    }
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("status", &self.status())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}

fn next_epoch(state: &mut SessionState) {
    state.epoch += 1;
    state.refresh_in_flight = None;
}

/// A 4xx from the refresh endpoint means the refresh credential is gone.
/// Timeouts and 5xx leave the identity snapshot in place.
fn ends_session(failure: &HttpFailure) -> bool {
    matches!(failure.status(), Some(400..=499))
}

async fn refresh(inner: Arc<GuardInner>, epoch: u64) -> HmsResult<()> {
    let attempt = inner.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!(attempt, epoch, "refreshing session");

    let result = inner
        .transport
        .send(&ApiRequest::post(REFRESH_PATH))
        .await
        .map(|_| ());

    let mut current = true;
    let mut ended = false;
    inner.update(|state| {
        if state.epoch != epoch {
            current = false;
            return;
        }
        state.refresh_in_flight = None;
        match &result {
            Ok(()) => state.authenticated = true,
            Err(err) => {
                state.authenticated = false;
                if ends_session(err) {
                    state.user = None;
                    ended = true;
                }
            }
        }
    });

    match &result {
        _ if !current => {
            tracing::debug!(attempt, epoch, "session changed during refresh, outcome dropped");
        }
        Ok(()) => tracing::info!(attempt, "session refreshed"),
        Err(err) if ended => {
            inner.forget();
            tracing::warn!(attempt, error = %err, "session refresh rejected, session reset");
        }
        Err(err) => {
            tracing::warn!(attempt, error = %err, "session refresh failed, keeping identity");
        }
    }
    result
}
