//! Scriptable identity provider.

use crate::{IdentityProvider, LoginOptions, SessionError};
use async_trait::async_trait;
use ic_agent::{identity::AnonymousIdentity, Identity};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

/// Identity provider handing out the anonymous identity.
pub struct MockIdentityProvider {
    identity: Arc<dyn Identity>,
    authenticated: AtomicBool,
    login_error: Mutex<Option<String>>,
    delay: Duration,
    logins: AtomicUsize,
    logouts: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            identity: Arc::new(AnonymousIdentity),
            authenticated: AtomicBool::new(false),
            login_error: Mutex::new(None),
            delay: Duration::ZERO,
            logins: AtomicUsize::new(0),
            logouts: AtomicUsize::new(0),
        }
    }

    /// Start out holding a session.
    pub fn authenticated(self) -> Self {
        self.authenticated.store(true, Ordering::SeqCst);
        self
    }

    /// Delay every login round trip.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fail_login(&self, error: Option<String>) {
        *self
            .login_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = error;
    }

    pub fn holds_session(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn is_authenticated(&self) -> bool {
        self.holds_session()
    }

    async fn login(&self, _options: &LoginOptions) -> Result<(), SessionError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let error = self
            .login_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(error) = error {
            return Err(SessionError::Authentication(error));
        }

        self.authenticated.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), SessionError> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        self.authenticated.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn identity(&self) -> Option<Arc<dyn Identity>> {
        self.holds_session().then(|| self.identity.clone())
    }
}
