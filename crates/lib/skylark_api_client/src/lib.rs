//! # skylark_api_client
//!
//! HTTP client for the Skylark backend: typed auth endpoints (implementing
//! `skylark_core`'s `AuthBackend` seam), the authorized request guard with
//! 401/403 recovery, and opaque resource passthrough for quiz, file, and
//! payment endpoints.

pub mod authorized;
pub mod error;
pub mod models;
pub mod resources;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use skylark_core::models::auth::{Registration, SessionBundle, User};
use skylark_core::session::SessionError;
use skylark_core::session::manager::AuthBackend;

use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, RegisterRequest, UserResponse};

/// Client for the auth endpoints. Cheap to clone; the underlying
/// `reqwest::Client` pools connections.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Absolute URL for an API path (`path` starts with `/`).
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(%url, "POST");
        let resp = self.http.post(&url).json(body).send().await?;
        decode_json(resp).await
    }
}

/// Map status to the error taxonomy, then decode the body.
pub(crate) async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let status = resp.status();
    match status {
        StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
        StatusCode::FORBIDDEN => Err(ApiError::Forbidden),
        s if !s.is_success() => {
            let message = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
            Err(ApiError::Api {
                status: s.as_u16(),
                message,
            })
        }
        _ => resp
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string())),
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<SessionBundle, SessionError> {
        let response: AuthResponse = self
            .post_json("/auth/login", &LoginRequest { email, password })
            .await?;
        Ok(response.into_bundle()?)
    }

    async fn register(&self, registration: &Registration) -> Result<SessionBundle, SessionError> {
        let response: AuthResponse = self
            .post_json(
                "/auth/register",
                &RegisterRequest {
                    email: &registration.email,
                    name: registration.name.as_deref(),
                    password: &registration.password,
                },
            )
            .await?;
        Ok(response.into_bundle()?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, SessionError> {
        let response: RefreshResponse = self
            .post_json("/auth/refresh", &RefreshRequest { refresh_token })
            .await?;
        Ok(response.into_token()?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, SessionError> {
        let url = self.endpoint(&format!("/user/by-email/{email}"));
        debug!(%url, "GET");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(ApiError::from)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response: UserResponse = decode_json(resp).await?;
        Ok(response.into_user()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_doubled_slash() {
        let client = ApiClient::new(Url::parse("http://localhost:3000/api/").expect("url"));
        assert_eq!(client.endpoint("/auth/login"), "http://localhost:3000/api/auth/login");

        let client = ApiClient::new(Url::parse("http://localhost:3000/api").expect("url"));
        assert_eq!(client.endpoint("/auth/login"), "http://localhost:3000/api/auth/login");
    }
}
