//! The authorized request guard.
//!
//! Wraps outgoing backend requests with bearer injection and transparent
//! 401 recovery. Recovery order on a 401: coalesced token refresh, then
//! one retry; failing that, logout plus an interactive re-login and one
//! retry; failing that, the error propagates. A 403 is never retried.
//!
//! While the inactivity warning dialog is open, automatic refresh is
//! suppressed so the guard cannot race the user-facing countdown.

use std::sync::Arc;

use reqwest::{Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use skylark_core::activity::ActivityHandle;
use skylark_core::routes::{LoginPrompt, LoginScope};
use skylark_core::session::manager::SessionManager;

use crate::ApiClient;
use crate::error::ApiError;

/// Path segments that never get a bearer header or 401 handling.
const UNAUTHENTICATED_SEGMENTS: &[&str] =
    &["/auth/login", "/auth/register", "/auth/refresh", "/contact"];

pub struct AuthorizedClient {
    api: ApiClient,
    session: Arc<SessionManager>,
    activity: Option<ActivityHandle>,
    login_prompt: Option<Arc<dyn LoginPrompt>>,
}

impl AuthorizedClient {
    pub fn new(api: ApiClient, session: Arc<SessionManager>) -> Self {
        Self {
            api,
            session,
            activity: None,
            login_prompt: None,
        }
    }

    /// Wire up warning-dialog awareness.
    pub fn with_activity(mut self, activity: ActivityHandle) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Wire up the interactive re-login fallback.
    pub fn with_login_prompt(mut self, prompt: Arc<dyn LoginPrompt>) -> Self {
        self.login_prompt = Some(prompt);
        self
    }

    pub async fn get(&self, path: &str) -> Result<Response, ApiError> {
        self.send(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Response, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Send an API request with bearer injection and 401/403 handling.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        if is_whitelisted(path) {
            return self.dispatch(method, path, body, None).await;
        }

        let token = self.session.token();
        let resp = self
            .dispatch(method.clone(), path, body, token.as_deref())
            .await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => self.recover_unauthorized(method, path, body).await,
            StatusCode::FORBIDDEN => {
                warn!(path, "403 from API, forcing logout");
                self.session.logout();
                Err(ApiError::Forbidden)
            }
            _ => Ok(resp),
        }
    }

    async fn recover_unauthorized(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        if self.warning_open() {
            debug!(path, "401 while warning dialog is open, not refreshing");
            return Err(ApiError::Unauthorized);
        }

        if self.session.refresh_access_token().await {
            info!(path, "401 recovered via token refresh, retrying");
            return self.retry(method, path, body).await;
        }

        // refresh failed: the stored session is dead
        warn!(path, "token refresh failed after 401, forcing logout");
        self.session.logout();

        let Some(prompt) = &self.login_prompt else {
            return Err(ApiError::Unauthorized);
        };
        match prompt.prompt_login(LoginScope::General).await {
            Ok(true) if self.session.is_authenticated() => {
                info!(path, "re-login completed, retrying");
                self.retry(method, path, body).await
            }
            Ok(_) => {
                debug!(path, "re-login cancelled");
                Err(ApiError::Unauthorized)
            }
            Err(e) => {
                warn!(error = %e, "re-login dialog failed");
                Err(ApiError::Unauthorized)
            }
        }
    }

    /// The single permitted retry; a second auth failure propagates.
    async fn retry(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, ApiError> {
        let token = self.session.token();
        let resp = self.dispatch(method, path, body, token.as_deref()).await?;
        match resp.status() {
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::FORBIDDEN => {
                self.session.logout();
                Err(ApiError::Forbidden)
            }
            _ => Ok(resp),
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let url = self.api.endpoint(path);
        let mut request = self.api.http().request(method, &url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    fn warning_open(&self) -> bool {
        self.activity.as_ref().is_some_and(|h| h.warning_shown())
    }
}

fn is_whitelisted(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    UNAUTHENTICATED_SEGMENTS
        .iter()
        .any(|segment| path.starts_with(segment))
}
