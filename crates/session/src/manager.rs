use crate::{IdentityProvider, LoginOptions, SessionError};
use account::SignerSlot;
use candid::Principal;
use client::SignerConnector;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Authenticating,
    LoggedIn { principal: Principal },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    User,
    Idle,
}

/// Notifications published by a [`SessionManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn { principal: Principal },
    /// No activity within the idle timeout; a logout follows
    Idle,
    LoggedOut { reason: LogoutReason },
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub login: LoginOptions,
    /// Log out after this long without activity. `None` disables the timer.
    pub idle_timeout: Option<Duration>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    connector: Arc<dyn SignerConnector>,
    slot: Arc<dyn SignerSlot>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    attempts: AtomicU64,
    last_activity: Mutex<Instant>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(watcher) = lock(&self.watcher).take() {
            watcher.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives login and logout and keeps the signer slot in step with them.
///
/// The slot is bound under the same lock that flips the state to
/// [`SessionState::LoggedIn`], and unbound under the lock that leaves it, so
/// the slot never holds a handle for an identity other than the logged-in
/// one. Cloning shares the session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        connector: Arc<dyn SignerConnector>,
        slot: Arc<dyn SignerSlot>,
        config: SessionConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                provider,
                connector,
                slot,
                config,
                state: Mutex::new(SessionState::LoggedOut),
                attempts: AtomicU64::new(0),
                last_activity: Mutex::new(Instant::now()),
                watcher: Mutex::new(None),
                events,
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.inner.state)
    }

    pub fn principal(&self) -> Option<Principal> {
        match self.state() {
            SessionState::LoggedIn { principal } => Some(principal),
            _ => None,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Reset the idle timer.
    pub fn record_activity(&self) {
        *lock(&self.inner.last_activity) = Instant::now();
    }

    /// Log in and bind a signer for the new identity.
    ///
    /// Skips the provider round trip when it still holds a session. Returns the
    /// current principal if already logged in.
    pub async fn login(&self) -> Result<Principal, SessionError> {
        let attempt = {
            let mut state = lock(&self.inner.state);
            match *state {
                SessionState::Authenticating => return Err(SessionError::AlreadyAuthenticating),
                SessionState::LoggedIn { principal } => return Ok(principal),
                SessionState::LoggedOut => {}
            }
            *state = SessionState::Authenticating;
            self.inner.attempts.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(attempt, "Logging in");

        match self.authenticate(attempt).await {
            Ok(principal) => Ok(principal),
            Err(err) => {
                {
                    let mut state = lock(&self.inner.state);
                    if self.is_current(attempt) && *state == SessionState::Authenticating {
                        *state = SessionState::LoggedOut;
                    }
                }
                if err == SessionError::Cancelled {
                    if let Err(logout_err) = self.inner.provider.logout().await {
                        warn!(error = %logout_err, "Failed to discard cancelled login");
                    }
                }

                warn!(error = %err, "Login failed");
                Err(err)
            }
        }
    }

    /// Log out and leave the signer slot unbound.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.end_session(LogoutReason::User).await
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.inner.attempts.load(Ordering::SeqCst) == attempt
    }

    async fn authenticate(&self, attempt: u64) -> Result<Principal, SessionError> {
        let provider = &self.inner.provider;
        if provider.is_authenticated().await {
            debug!("Reusing existing session");
        } else {
            provider.login(&self.inner.config.login).await?;
        }

        let identity = provider.identity().ok_or(SessionError::NoIdentity)?;
        if !self.is_current(attempt) {
            return Err(SessionError::Cancelled);
        }

        let handle = self.inner.connector.connect(identity).await?;
        let principal = handle.principal();

        {
            let mut state = lock(&self.inner.state);
            if !self.is_current(attempt) || *state != SessionState::Authenticating {
                return Err(SessionError::Cancelled);
            }
            self.inner.slot.bind(handle);
            *state = SessionState::LoggedIn { principal };
        }

        self.record_activity();
        self.start_idle_watcher();
        let _ = self.inner.events.send(SessionEvent::LoggedIn { principal });

        info!(%principal, "Logged in");
        Ok(principal)
    }

    async fn end_session(&self, reason: LogoutReason) -> Result<(), SessionError> {
        let previous = {
            let mut state = lock(&self.inner.state);
            self.inner.attempts.fetch_add(1, Ordering::SeqCst);
            self.inner.slot.unbind();
            std::mem::replace(&mut *state, SessionState::LoggedOut)
        };

        if let Some(watcher) = lock(&self.inner.watcher).take() {
            watcher.abort();
        }

        let result = self.inner.provider.logout().await;

        if previous != SessionState::LoggedOut {
            let _ = self.inner.events.send(SessionEvent::LoggedOut { reason });
            info!(?reason, "Logged out");
        }
        result
    }

    fn start_idle_watcher(&self) {
        let Some(timeout) = self.inner.config.idle_timeout else {
            return;
        };

        let task = tokio::spawn(watch_idle(Arc::downgrade(&self.inner), timeout));
        if let Some(previous) = lock(&self.inner.watcher).replace(task) {
            previous.abort();
        }
    }
}

async fn watch_idle(session: Weak<Inner>, timeout: Duration) {
    loop {
        let deadline = match session.upgrade() {
            Some(inner) => {
                let last_activity = *lock(&inner.last_activity);
                last_activity + timeout
            }
            None => return,
        };
        sleep_until(deadline).await;

        let Some(inner) = session.upgrade() else {
            return;
        };
        let last_activity = *lock(&inner.last_activity);
        if last_activity + timeout > Instant::now() {
            continue;
        }

        // Detach before logging out, which would otherwise abort this task.
        lock(&inner.watcher).take();

        let manager = SessionManager { inner };
        let _ = manager.inner.events.send(SessionEvent::Idle);
        warn!(?timeout, "Session idle");

        if let Err(err) = manager.end_session(LogoutReason::Idle).await {
            warn!(error = %err, "Idle logout failed");
        }
        return;
    }
}
