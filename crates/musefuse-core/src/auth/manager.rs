//! The session store.
//!
//! `SessionManager` owns the current token, keeps the persisted record in
//! step with it, publishes the authentication flag to subscribers and arms
//! the expiry timer whenever a token is established.
//!
//! Every login/refresh attempt and every logout bumps a generation counter.
//! A response is applied only when the generation it was issued under is
//! still current, so a logout always wins over a late login or refresh.
//!
//! Storage I/O runs outside the state lock. A separate persistence lock,
//! always taken before the state lock, keeps writes to the store in the
//! same order as the state changes they mirror.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use chrono::{DateTime, Duration, Utc};
use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::AuthBackend;
use super::credentials::Credentials;
use super::error::AuthError;
use super::scheduler::ExpirationScheduler;
use super::session::SessionData;
use super::store::TokenStore;

/// Result of re-reading the persisted session at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Nothing was persisted
    NoSession,
    /// A live token was found and the expiry timer re-armed
    Restored { expires_at: DateTime<Utc> },
    /// A record was found but unusable; it has been cleared
    Discarded(AuthError),
}

struct SessionState {
    data: Option<SessionData>,
    authenticated: bool,
    /// Bumped by every login/refresh attempt and every logout
    generation: u64,
    /// Bumped each time a token is established; ties a timer to its session
    session_id: u64,
    subscribers: Vec<mpsc::UnboundedSender<bool>>,
}

struct Inner {
    state: Mutex<SessionState>,
    /// Serializes store I/O. Lock order: `persist`, then `state`.
    persist: Mutex<()>,
    store: Arc<dyn TokenStore>,
    backend: Arc<dyn AuthBackend>,
    scheduler: ExpirationScheduler,
}

/// Handle to the process-wide session. Cloning shares the same session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    /// Build an unauthenticated session. Call [`initialize`](Self::initialize)
    /// to pick up a persisted token.
    pub fn new(store: Arc<dyn TokenStore>, backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    data: None,
                    authenticated: false,
                    generation: 0,
                    session_id: 0,
                    subscribers: Vec::new(),
                }),
                persist: Mutex::new(()),
                store,
                backend,
                scheduler: ExpirationScheduler::new(),
            }),
        }
    }

    /// Re-derive the session from persisted storage.
    ///
    /// Anything unusable is cleared: the session never comes back
    /// authenticated with an unknown or past deadline.
    pub fn initialize(&self) -> RestoreOutcome {
        let _io = self.inner.persist.lock();
        let loaded = match self.inner.store.load() {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(error = %e, "Persisted session unreadable, discarding");
                return self.discard(AuthError::MalformedToken);
            }
        };

        let Some(mut data) = loaded else {
            debug!("No persisted session");
            return RestoreOutcome::NoSession;
        };

        let expires_at = match data.resolve_expiry() {
            Ok(at) => at,
            Err(e) => {
                warn!("Persisted token has no readable expiry, discarding");
                return self.discard(e);
            }
        };

        let remaining = expires_at - Utc::now();
        if remaining <= Duration::zero() {
            info!(%expires_at, "Persisted session already expired");
            return self.discard(AuthError::Expired);
        }

        data.expires_at = Some(expires_at);

        let mut state = self.inner.state.lock();
        state.generation += 1;
        self.establish(&mut state, data, remaining);
        info!(%expires_at, "Session restored");

        RestoreOutcome::Restored { expires_at }
    }

    /// Exchange credentials for a token and establish the session.
    ///
    /// Rejections and transport errors leave the session untouched.
    pub async fn login(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let issued = self.begin_attempt();
        debug!(generation = issued, username = credentials.username(), "Login issued");

        let response = self
            .inner
            .backend
            .login(credentials)
            .await
            .map_err(|e| AuthError::TransportFailure(e.to_string()))?;

        let Some(token) = response.granted_token() else {
            let message = response.message_or("Login failed");
            info!(generation = issued, %message, "Login rejected");
            return Err(AuthError::InvalidCredentials { message });
        };

        let data = self.grant(issued, token, response.expires_in)?;
        self.apply(issued, data)?;
        info!(generation = issued, "Logged in");
        Ok(())
    }

    /// Swap the current token for a fresh one.
    ///
    /// On rejection the existing token stays in place; callers decide
    /// whether to log out.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let (issued, token) = {
            let mut state = self.inner.state.lock();
            let token = state
                .data
                .as_ref()
                .map(|d| d.token.clone())
                .ok_or(AuthError::NotLoggedIn)?;
            state.generation += 1;
            (state.generation, token)
        };
        debug!(generation = issued, "Refresh issued");

        let response = self
            .inner
            .backend
            .refresh(&token)
            .await
            .map_err(|e| AuthError::TransportFailure(e.to_string()))?;

        let Some(new_token) = response.granted_token() else {
            let message = response.message_or("Could not refresh token");
            warn!(generation = issued, %message, "Refresh rejected");
            return Err(AuthError::RefreshRejected { message });
        };

        let data = self.grant(issued, new_token, response.expires_in)?;
        self.apply(issued, data)?;
        info!(generation = issued, "Token refreshed");
        Ok(())
    }

    /// Clear the session, the persisted record and the expiry timer.
    /// Safe to call when already logged out.
    pub fn logout(&self) {
        let _io = self.inner.persist.lock();
        let was_authenticated = {
            let mut state = self.inner.state.lock();
            let was_authenticated = state.authenticated;
            self.reset(&mut state);
            was_authenticated
        };
        self.clear_store();
        if was_authenticated {
            info!("Logged out");
        }
    }

    pub fn current_token(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .data
            .as_ref()
            .map(|d| d.token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().authenticated
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner
            .state
            .lock()
            .data
            .as_ref()
            .and_then(|d| d.expires_at)
    }

    /// Remaining token lifetime
    pub fn expires_in(&self) -> Option<Duration> {
        self.expires_at().map(|at| at - Utc::now())
    }

    /// Time left on the armed expiry timer
    pub fn timer_remaining(&self) -> Option<std::time::Duration> {
        self.inner.scheduler.remaining()
    }

    /// Observe the authentication flag: the current value first, then every
    /// change in order until the subscription is dropped.
    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.state.lock();
        // The receiver is alive, so this cannot fail
        let _ = tx.send(state.authenticated);
        state.subscribers.push(tx);
        AuthSubscription { rx }
    }

    // ===== Internals =====

    fn begin_attempt(&self) -> u64 {
        let mut state = self.inner.state.lock();
        state.generation += 1;
        state.generation
    }

    /// Turn a granted token into a session record. A token with no readable
    /// lifetime forces a logout unless the attempt is already stale.
    fn grant(
        &self,
        issued: u64,
        token: &str,
        expires_in: Option<i64>,
    ) -> Result<SessionData, AuthError> {
        SessionData::from_grant(token, expires_in).map_err(|e| {
            let _io = self.inner.persist.lock();
            {
                let mut state = self.inner.state.lock();
                if state.generation != issued {
                    return AuthError::Superseded;
                }
                warn!(generation = issued, "Granted token has no usable expiry, logging out");
                self.reset(&mut state);
            }
            self.clear_store();
            e
        })
    }

    fn apply(&self, issued: u64, data: SessionData) -> Result<(), AuthError> {
        let _io = self.inner.persist.lock();
        {
            let mut state = self.inner.state.lock();
            if state.generation != issued {
                debug!(
                    issued,
                    current = state.generation,
                    "Discarding stale auth response"
                );
                return Err(AuthError::Superseded);
            }

            let remaining = data
                .expires_at
                .map(|at| at - Utc::now())
                .unwrap_or_else(Duration::zero);
            self.establish(&mut state, data.clone(), remaining);
        }

        if let Err(e) = self.inner.store.save(&data) {
            warn!(error = %e, "Failed to persist session");
        }
        Ok(())
    }

    fn establish(&self, state: &mut SessionState, data: SessionData, remaining: Duration) {
        state.session_id += 1;
        state.data = Some(data);
        Self::publish(state, true);
        self.arm_expiry(state.session_id, remaining);
    }

    fn arm_expiry(&self, session_id: u64, remaining: Duration) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.scheduler.arm(remaining, move || {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }.expire(session_id);
            }
        });
    }

    /// Timer callback: log out if the session it was armed for is still live.
    fn expire(&self, session_id: u64) {
        let _io = self.inner.persist.lock();
        {
            let mut state = self.inner.state.lock();
            if state.session_id != session_id || state.data.is_none() {
                debug!(session_id, "Ignoring expiry for a replaced session");
                return;
            }
            info!("Session expired");
            self.reset(&mut state);
        }
        self.clear_store();
    }

    /// Drop the in-memory session. The caller clears the store afterwards,
    /// still holding the persistence lock.
    fn reset(&self, state: &mut SessionState) {
        state.generation += 1;
        state.data = None;
        self.inner.scheduler.cancel();
        Self::publish(state, false);
    }

    fn clear_store(&self) {
        if let Err(e) = self.inner.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    /// Called from `initialize`, which already holds the persistence lock.
    fn discard(&self, reason: AuthError) -> RestoreOutcome {
        {
            let mut state = self.inner.state.lock();
            self.reset(&mut state);
        }
        self.clear_store();
        RestoreOutcome::Discarded(reason)
    }

    fn publish(state: &mut SessionState, authenticated: bool) {
        if state.authenticated == authenticated {
            return;
        }
        state.authenticated = authenticated;
        state
            .subscribers
            .retain(|tx| tx.send(authenticated).is_ok());
    }
}

/// Receives the authentication flag. Dropping it ends the subscription.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: mpsc::UnboundedReceiver<bool>,
}

impl AuthSubscription {
    /// Wait for the next value. `None` once the session is gone.
    pub async fn recv(&mut self) -> Option<bool> {
        self.rx.recv().await
    }

    /// Take the next value if one is already queued
    pub fn try_recv(&mut self) -> Option<bool> {
        self.rx.try_recv().ok()
    }
}

impl Stream for AuthSubscription {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<bool>> {
        self.rx.poll_recv(cx)
    }
}
