use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::oauth::{Navigator, OAuthConfig};
use crate::error::ValidationError;
use crate::models::{CredentialMode, ManualCredential, ManualKind, Session, Tool};
use crate::storage::{Cookie, SessionStore};

/// Login state of one front-end instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    /// Sent to the provider, waiting for the callback to deliver a cookie
    AwaitingCallback,
    LoggedIn,
}

/// Credential resolved for a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Raw cookie value, forwarded to the backend as-is
    Session(String),
    Token(String),
    File(PathBuf),
}

/// Resolves which credential is active and whether the form may submit.
///
/// The cookie is re-read on every call; nothing about the session is cached
/// besides the derived [`AuthState`].
pub struct SessionManager {
    tool: Tool,
    oauth: OAuthConfig,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(
        tool: Tool,
        oauth: OAuthConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::LoggedOut);
        let manager = Self {
            tool,
            oauth,
            store,
            clock,
            navigator,
            state,
        };
        manager.refresh();
        manager
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Raw value of the session cookie, if it has not expired
    pub fn session_cookie(&self) -> Option<String> {
        let now = self.clock.now();
        self.store
            .load()
            .filter(|cookie| cookie.is_live_at(now))
            .map(|cookie| cookie.value)
    }

    /// Decode the session cookie. Malformed cookies count as no session.
    pub fn current_session(&self) -> Option<Session> {
        let raw = self.session_cookie()?;
        match Session::decode(self.tool.provider(), &raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("Ignoring malformed session cookie: {}", e);
                None
            }
        }
    }

    pub fn is_valid(&self, session: Option<&Session>) -> bool {
        let now = self.clock.now();
        session.map_or(false, |s| s.is_valid_at(now))
    }

    pub fn is_ready(
        &self,
        mode: CredentialMode,
        session: Option<&Session>,
        manual: &ManualCredential,
    ) -> bool {
        match mode {
            CredentialMode::SessionBased => self.is_valid(session),
            CredentialMode::ManualToken => manual.is_present(),
        }
    }

    /// Readiness computed from a fresh read of the cookie
    pub fn readiness(&self, mode: CredentialMode, manual: &ManualCredential) -> bool {
        let session = self.current_session();
        self.is_ready(mode, session.as_ref(), manual)
    }

    /// Pick the credential to send, or explain why there is none
    pub fn resolve_credential(
        &self,
        mode: CredentialMode,
        manual: &ManualCredential,
    ) -> Result<Credential, ValidationError> {
        match mode {
            CredentialMode::SessionBased => {
                let cookie = self.session_cookie().ok_or(ValidationError::NotLoggedIn)?;
                let valid = match Session::decode(self.tool.provider(), &cookie) {
                    Ok(session) => self.is_valid(session.as_ref()),
                    Err(_) => false,
                };
                if !valid {
                    return Err(ValidationError::NotLoggedIn);
                }
                Ok(Credential::Session(cookie))
            }
            CredentialMode::ManualToken => match manual {
                ManualCredential::Token(token) if !token.trim().is_empty() => {
                    Ok(Credential::Token(token.trim().to_string()))
                }
                ManualCredential::File(path) => Ok(Credential::File(path.clone())),
                _ => Err(match self.tool.manual_kind() {
                    ManualKind::Token => ValidationError::MissingToken,
                    ManualKind::File => ValidationError::MissingFile,
                }),
            },
        }
    }

    /// Provider authorize URL that returns to this tool's page
    pub fn authorize_url(&self) -> String {
        self.oauth.authorize_request(self.tool.return_page())
    }

    /// Send the user to the provider's authorize page. Returns the URL.
    pub fn begin_login(&self) -> std::io::Result<String> {
        let url = self.authorize_url();
        self.navigator.navigate(&url)?;
        self.transition(AuthState::AwaitingCallback);
        Ok(url)
    }

    /// Accept the cookie delivered by the OAuth callback
    pub fn complete_login(&self, cookie_value: &str) -> AuthState {
        self.store.save(Cookie::new(cookie_value.trim()));
        let next = if self.is_valid(self.current_session().as_ref()) {
            AuthState::LoggedIn
        } else {
            tracing::warn!("Login callback did not deliver a usable {} session", self.tool.provider());
            AuthState::LoggedOut
        };
        self.transition(next);
        next
    }

    /// Expire the cookie locally. The token is not revoked at the provider.
    pub fn logout(&self) {
        self.store.save(Cookie::cleared());
        self.transition(AuthState::LoggedOut);
    }

    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Re-derive the state from the cookie and the clock
    pub fn refresh(&self) -> AuthState {
        let next = if self.is_valid(self.current_session().as_ref()) {
            AuthState::LoggedIn
        } else if self.state() == AuthState::AwaitingCallback {
            AuthState::AwaitingCallback
        } else {
            AuthState::LoggedOut
        };
        self.transition(next);
        next
    }

    /// Refresh every `period`. Expiry is wall-clock driven, so an idle
    /// front end must notice it without any user action.
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            loop {
                ticker.tick().await;
                manager.refresh();
            }
        })
    }

    fn transition(&self, next: AuthState) {
        let mut previous = next;
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            previous = std::mem::replace(current, next);
            true
        });

        if changed {
            tracing::info!(
                "Session state for {}: {:?} -> {:?}",
                self.tool.provider(),
                previous,
                next
            );
        }
    }
}
