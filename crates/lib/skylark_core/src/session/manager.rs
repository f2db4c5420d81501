//! The session manager: single source of truth for authentication state.
//!
//! State machine: `Anonymous → Authenticated` on login/registration,
//! `Authenticated → Refreshing → Authenticated` around a token refresh,
//! and `→ Anonymous` on logout or a failed who-am-I check. State updates
//! are published as one atomic snapshot over a `watch` channel — consumers
//! can never observe a token without its user.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::auth::{
    ActivityConfig, AuthPhase, AuthState, LoginCredentials, Registration, SessionBundle, User,
};
use crate::session::claims;
use crate::session::store::TokenStore;
use crate::session::SessionError;

/// Default grace period for [`SessionManager::is_token_expired`]: tokens
/// expiring within the next minute count as already expired.
pub const EXPIRY_GRACE_SECS: i64 = 60;

/// Seam to the backend auth endpoints. Implemented by the API client and
/// mocked in tests.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Authenticate with email + password. A backend response without
    /// `success: true` and a token is an [`SessionError::Authentication`].
    async fn login(&self, email: &str, password: &str) -> Result<SessionBundle, SessionError>;

    /// Create a new account; the backend auto-logs the user in.
    async fn register(&self, registration: &Registration) -> Result<SessionBundle, SessionError>;

    /// Exchange a refresh token for a new access token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError>;

    /// "Who am I" lookup used to re-validate a restored session.
    async fn user_by_email(&self, email: &str) -> Result<Option<User>, SessionError>;
}

/// Navigation seam — route changes requested by the session layer.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    navigator: Arc<dyn Navigator>,
    store: TokenStore,
    state_tx: watch::Sender<AuthState>,
    config_tx: watch::Sender<Option<ActivityConfig>>,
    /// In-flight refresh slot; concurrent callers await the same attempt.
    refresh_inflight: std::sync::Mutex<Option<watch::Receiver<Option<bool>>>>,
}

impl SessionManager {
    /// Create the manager and rehydrate any stored session.
    ///
    /// A stored token whose decoded expiry is already in the past is
    /// discarded, leaving the state anonymous.
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        navigator: Arc<dyn Navigator>,
        store: TokenStore,
    ) -> Self {
        let (state_tx, _) = watch::channel(AuthState::default());
        let (config_tx, _) = watch::channel(None);
        let manager = Self {
            backend,
            navigator,
            store,
            state_tx,
            config_tx,
            refresh_inflight: std::sync::Mutex::new(None),
        };
        manager.rehydrate();
        manager
    }

    fn rehydrate(&self) {
        let (Some(token), Some(user)) = (self.store.stored_token(), self.store.stored_user())
        else {
            return;
        };
        match claims::token_expiry(&token) {
            Some(expiry) if expiry > Utc::now() => {
                let refresh_token = self.store.stored_refresh_token();
                let config = self.store.stored_activity_config().unwrap_or_else(|| {
                    debug!("no stored activity config, using defaults");
                    ActivityConfig::default()
                });
                info!(email = %user.email, "restored session from storage");
                self.state_tx.send_replace(AuthState::authenticated(
                    user,
                    token,
                    refresh_token,
                    Some(expiry),
                ));
                self.config_tx.send_replace(Some(config));
            }
            _ => {
                warn!("stored token is expired, clearing session");
                self.store.clear();
            }
        }
    }

    /// Login with email and password.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<(), SessionError> {
        let bundle = self
            .backend
            .login(&credentials.email, &credentials.password)
            .await?;
        if credentials.remember_me {
            self.store.set_remember_me(true);
        }
        self.install_session(bundle);
        Ok(())
    }

    /// Register a new account; a successful registration is an auto-login.
    pub async fn register(&self, registration: &Registration) -> Result<(), SessionError> {
        let bundle = self.backend.register(registration).await?;
        self.install_session(bundle);
        Ok(())
    }

    /// Persist a token/user bundle and publish the new state in one step.
    ///
    /// A bundle without an activity config keeps the previous config value
    /// (registration is expected to be followed immediately by
    /// authenticated use).
    fn install_session(&self, bundle: SessionBundle) {
        let SessionBundle {
            token,
            refresh_token,
            user,
            activity_config,
        } = bundle;

        // store first, then publish — no consumer sees a torn state
        self.store.store_token(Some(&token));
        if let Some(refresh) = refresh_token.as_deref() {
            self.store.store_refresh_token(Some(refresh));
        }
        self.store.store_user(Some(&user));
        if let Some(config) = &activity_config {
            self.store.store_activity_config(Some(config));
        }

        let expiry = claims::token_expiry(&token);
        info!(email = %user.email, is_admin = user.is_admin, "session established");
        self.state_tx
            .send_replace(AuthState::authenticated(user, token, refresh_token, expiry));
        match activity_config {
            Some(config) => {
                self.config_tx.send_replace(Some(config));
            }
            None => debug!("no activity config in response, keeping previous value"),
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Resolves to `false` on any failure without forcing logout — the
    /// caller decides whether to escalate. Concurrent callers are
    /// coalesced onto a single in-flight attempt and all observe its
    /// result.
    pub async fn refresh_access_token(&self) -> bool {
        enum Role {
            Leader(watch::Sender<Option<bool>>),
            Follower(watch::Receiver<Option<bool>>),
        }

        let role = {
            let mut slot = self.lock_inflight();
            match slot.as_ref() {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Follower(mut rx) => {
                debug!("refresh already in flight, awaiting its result");
                if let Some(done) = *rx.borrow() {
                    return done;
                }
                match rx.changed().await {
                    Ok(()) => (*rx.borrow()).unwrap_or(false),
                    Err(_) => false,
                }
            }
            Role::Leader(tx) => {
                let ok = self.do_refresh().await;
                let _ = tx.send(Some(ok));
                *self.lock_inflight() = None;
                ok
            }
        }
    }

    async fn do_refresh(&self) -> bool {
        let refresh_token = self
            .current()
            .refresh_token
            .or_else(|| self.store.stored_refresh_token());
        let Some(refresh_token) = refresh_token else {
            debug!("no refresh token available");
            return false;
        };

        self.state_tx.send_modify(|state| {
            if state.is_authenticated {
                state.phase = AuthPhase::Refreshing;
            }
        });

        match self.backend.refresh(&refresh_token).await {
            Ok(token) => {
                self.store.store_token(Some(&token));
                let expiry = claims::token_expiry(&token);
                self.state_tx.send_modify(|state| {
                    state.token = Some(token);
                    state.token_expiry = expiry;
                    if state.is_authenticated {
                        state.phase = AuthPhase::Authenticated;
                    }
                });
                info!("access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed");
                self.state_tx.send_modify(|state| {
                    if state.is_authenticated {
                        state.phase = AuthPhase::Authenticated;
                    }
                });
                false
            }
        }
    }

    /// Clear store and state unconditionally and navigate home. Idempotent.
    pub fn logout(&self) {
        info!("logging out");
        self.store.clear();
        self.state_tx.send_replace(AuthState::default());
        self.config_tx.send_replace(None);
        self.navigator.navigate("/");
    }

    /// Re-validate the session against the backend ("who am I" check).
    ///
    /// A backend error forces logout; a response without a user resolves
    /// to `false` without touching the session.
    pub async fn refresh_auth(&self) -> bool {
        let Some(token) = self.store.stored_token() else {
            return false;
        };
        let Some(email) = self.current().user.map(|u| u.email) else {
            return false;
        };

        match self.backend.user_by_email(&email).await {
            Ok(Some(user)) => {
                self.store.store_user(Some(&user));
                let refresh_token = self.store.stored_refresh_token();
                let expiry = claims::token_expiry(&token);
                self.state_tx.send_replace(AuthState::authenticated(
                    user,
                    token,
                    refresh_token,
                    expiry,
                ));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "auth refresh failed, logging out");
                self.logout();
                false
            }
        }
    }

    // -- Reactive views ----------------------------------------------------

    /// Subscribe to state snapshots (read-only view + push notification).
    pub fn state(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    /// Current state snapshot.
    pub fn current(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to activity-config changes. `None` means unauthenticated.
    pub fn activity_config(&self) -> watch::Receiver<Option<ActivityConfig>> {
        self.config_tx.subscribe()
    }

    pub fn current_activity_config(&self) -> Option<ActivityConfig> {
        *self.config_tx.borrow()
    }

    pub fn token(&self) -> Option<String> {
        self.state_tx.borrow().token.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state_tx.borrow().is_authenticated
    }

    pub fn is_admin(&self) -> bool {
        self.state_tx.borrow().is_admin
    }

    pub fn token_expiry(&self) -> Option<DateTime<Utc>> {
        self.state_tx.borrow().token_expiry
    }

    /// Whether the access token is expired or expires within `grace_secs`.
    ///
    /// Derived from the same decode path as everything else
    /// ([`claims::token_expiry`], captured at install time).
    pub fn is_token_expired(&self, grace_secs: i64) -> bool {
        match self.token_expiry() {
            Some(expiry) => (expiry - Utc::now()).num_seconds() < grace_secs,
            None => true,
        }
    }

    /// [`Self::is_token_expired`] with the default grace: expired now or
    /// within the next [`EXPIRY_GRACE_SECS`].
    pub fn token_expires_soon(&self) -> bool {
        self.is_token_expired(EXPIRY_GRACE_SECS)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.state_tx
            .borrow()
            .user
            .as_ref()
            .is_some_and(|u| u.has_role(role))
    }

    pub fn has_any_role(&self, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(role))
    }

    pub fn is_guest(&self) -> bool {
        self.has_role("guest")
    }

    fn lock_inflight(
        &self,
    ) -> std::sync::MutexGuard<'_, Option<watch::Receiver<Option<bool>>>> {
        self.refresh_inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
