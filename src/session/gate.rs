use std::sync::{Arc, Mutex};

use anyhow::anyhow;

use crate::remote::{client::AuthApi, envelope::Credentials, error::RemoteError};

use super::token::TokenStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Validating,
    Authenticated,
}

/// Shared view of the session: its state and the stored token.
///
/// Cloned into every component that may observe an unauthorized response, so that any of them
/// can force the session back to `Unauthenticated`.
#[derive(Clone)]
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
    tokens: Arc<dyn TokenStore>,
}

impl SessionHandle {
    pub fn new(tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::Unauthenticated)),
            tokens,
        }
    }

    pub fn state(&self) -> SessionState {
        match self.state.lock() {
            Ok(state) => *state,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub(crate) fn set_state(&self, new_state: SessionState) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        *state = new_state;
    }

    pub fn token(&self) -> Option<String> {
        self.tokens.load()
    }

    /// Forced logout: drop the token and return to `Unauthenticated`, whatever the current state.
    pub fn invalidate(&self) {
        if let Err(err) = self.tokens.clear() {
            log::error!("Could not clear the stored token: {:?}", err);
        }
        if self.state() != SessionState::Unauthenticated {
            log::warn!("Session is no longer valid, logging out");
        }
        self.set_state(SessionState::Unauthenticated);
    }
}

/// Authentication state machine in front of the dashboard.
///
/// `Unauthenticated -> Validating -> Authenticated`, or back to `Unauthenticated` when the stored
/// token is rejected. Any unauthorized response seen later forces `Unauthenticated` again.
pub struct SessionGate<A: AuthApi> {
    auth: A,
    handle: SessionHandle,
    last_error: Option<String>,
}

impl<A: AuthApi> SessionGate<A> {
    pub fn new(auth: A, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            auth,
            handle: SessionHandle::new(tokens),
            last_error: None,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    /// Message of the last failed login, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Resume a session from the stored token, validating it with the server.
    pub fn restore(&mut self) -> SessionState {
        let Some(token) = self.handle.token() else {
            self.handle.set_state(SessionState::Unauthenticated);
            return SessionState::Unauthenticated;
        };

        self.handle.set_state(SessionState::Validating);
        match self.auth.validate_token(&token) {
            Ok(()) => {
                log::info!("Stored session token is valid");
                self.handle.set_state(SessionState::Authenticated);
            }
            Err(err) => {
                log::error!("Token validation failed: {}", err);
                self.handle.invalidate();
            }
        }
        self.handle.state()
    }

    pub fn login(&mut self, email: &str, password: &str) -> anyhow::Result<()> {
        self.last_error = None;
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token = match self.auth.login(&credentials) {
            Ok(token) => token,
            Err(err) => {
                log::error!("Login failed: {}", err);
                self.last_error = Some(login_error_message(&err));
                return Err(err.into());
            }
        };
        self.handle.tokens.save(&token)?;
        self.handle.set_state(SessionState::Authenticated);
        log::info!("Logged in as {}", email);
        Ok(())
    }

    pub fn register(&self, email: &str, password: &str) -> Result<(), RemoteError> {
        self.auth.register(&Credentials {
            email: email.to_string(),
            password: password.to_string(),
        })
    }

    /// Log out locally, then tell the server. The local logout happens even if the server call fails.
    pub fn logout(&mut self) {
        let had_token = self.handle.token().is_some();
        self.handle.invalidate();
        if had_token {
            if let Err(err) = self.auth.logout() {
                log::warn!("Server logout failed: {}", err);
            }
        }
    }

    pub fn require_authenticated(&self) -> anyhow::Result<()> {
        match self.state() {
            SessionState::Authenticated => Ok(()),
            state => Err(anyhow!("Not logged in (session is {:?})", state)),
        }
    }
}

fn login_error_message(err: &RemoteError) -> String {
    match err {
        RemoteError::Rejected { body, .. } => serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|body| body["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| "Login failed. Please try again.".to_string()),
        _ => "Login failed. Please try again.".to_string(),
    }
}
