//! Authorization-code flow against Google's OAuth endpoints.
//!
//! The client holds no tokens. Every call receives the credential it needs
//! and refreshing produces a new [`TokenResponse`] instead of mutating state.

use crate::error::{AuthError, FetchError};
use crate::models::{TokenResponse, UserInfo};
use reqwest::Url;
use std::time::Duration;

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

pub const SCOPES: &[&str] = &[
    "openid",
    "email",
    "profile",
    "https://www.googleapis.com/auth/classroom.courses.readonly",
    "https://www.googleapis.com/auth/classroom.rosters.readonly",
    "https://www.googleapis.com/auth/classroom.coursework.me.readonly",
    "https://www.googleapis.com/auth/classroom.coursework.students",
    "https://www.googleapis.com/auth/classroom.profile.emails",
];

#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    token_url: String,
    userinfo_url: String,
}

impl OAuthClient {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Transport {
                path: TOKEN_URL.to_string(),
                message: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self {
            http,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            token_url: TOKEN_URL.to_string(),
            userinfo_url: USERINFO_URL.to_string(),
        })
    }

    /// Point the client at other endpoints (local test servers, proxies).
    pub fn with_endpoints(mut self, token_url: &str, userinfo_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self.userinfo_url = userinfo_url.to_string();
        self
    }

    /// Consent page URL the user is sent to.
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let scope = SCOPES.join(" ");
        Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| AuthError::TokenExchange(format!("invalid authorization URL: {}", e)))
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::MissingCode);
        }

        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Trade a refresh token for a fresh access token. Google usually omits the
    /// refresh token in this response, so the old one is carried over.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, AuthError> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let mut response = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .await?;
        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh_token.to_string());
        }
        Ok(response)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "token endpoint rejected request");
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {}", e)))?;
        if token.access_token.is_empty() {
            return Err(AuthError::TokenExchange(
                "token endpoint returned an empty access token".to_string(),
            ));
        }
        Ok(token)
    }

    pub async fn user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        if access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let response = self
            .http
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::InvalidToken(format!(
                "user info request returned {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::InvalidToken(format!("invalid user info response: {}", e)))
    }
}
