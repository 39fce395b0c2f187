//! Bearer token lifecycle against the Solar Manager identity service.
//!
//! The manager logs in on first use and refreshes once the token's declared
//! validity window has elapsed. The session lock is held across the network
//! call, so concurrent callers wait for one login or refresh instead of
//! racing their own.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub bearer_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    /// Seconds until the token expires
    expires_in: i64,
}

pub struct TokenManager {
    http: reqwest::Client,
    identity_url: String,
    credentials: Credentials,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<AuthSession>>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        identity_url: impl Into<String>,
        credentials: Credentials,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            identity_url: identity_url.into().trim_end_matches('/').to_string(),
            credentials,
            clock,
            session: Mutex::new(None),
        }
    }

    /// Return a token usable for at least one request, logging in or
    /// refreshing first when needed.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        let mut session = self.session.lock().await;

        let held = session
            .as_ref()
            .map(|s| (s.bearer_token.clone(), s.expires_at));
        let expired_token = match held {
            Some((token, expires_at)) if self.clock.now() < expires_at => return Ok(token),
            Some((token, _)) => token,
            None => {
                let fresh = self.login().await?;
                let token = fresh.bearer_token.clone();
                *session = Some(fresh);
                return Ok(token);
            }
        };

        match self.refresh(&expired_token).await {
            Ok(fresh) => {
                let token = fresh.bearer_token.clone();
                *session = Some(fresh);
                Ok(token)
            }
            Err(e @ AppError::Unauthorized { .. }) => {
                // Revoked or unknown token; start over with a login next time.
                warn!("token refresh rejected, dropping session: {}", e);
                *session = None;
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Snapshot of the held session.
    pub async fn session(&self) -> Option<AuthSession> {
        self.session.lock().await.clone()
    }

    async fn login(&self) -> Result<AuthSession> {
        let url = format!("{}/oauth/login", self.identity_url);
        debug!(url = %url, "logging in");

        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest {
                email: &self.credentials.email,
                password: &self.credentials.password,
            })
            .send()
            .await?;

        let session = self.read_token_response("authentication", resp).await?;
        info!(expires_at = %session.expires_at, "logged in");
        Ok(session)
    }

    async fn refresh(&self, token: &str) -> Result<AuthSession> {
        let url = format!("{}/oauth/refresh", self.identity_url);
        debug!(url = %url, "refreshing token");

        let resp = self.http.post(&url).bearer_auth(token).send().await?;

        let session = self.read_token_response("token refresh", resp).await?;
        info!(expires_at = %session.expires_at, "token refreshed");
        Ok(session)
    }

    async fn read_token_response(
        &self,
        context: &'static str,
        resp: reqwest::Response,
    ) -> Result<AuthSession> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized {
                context,
                status: status.as_u16(),
            });
        }
        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Status {
                context,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&bytes)?;
        let expires_at = chrono::Duration::try_seconds(token.expires_in)
            .and_then(|validity| self.clock.now().checked_add_signed(validity))
            .ok_or_else(|| {
                AppError::Other(anyhow::anyhow!(
                    "{} returned an out-of-range expiresIn: {}",
                    context,
                    token.expires_in
                ))
            })?;
        Ok(AuthSession {
            bearer_token: token.access_token,
            expires_at,
        })
    }
}
