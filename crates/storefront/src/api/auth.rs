//! Token endpoints.
//!
//! Handles email/password login and refresh-token exchange. These requests
//! never carry a bearer token and are never retried.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use super::session::TokenPair;
use super::ApiError;

/// Login endpoint, relative to the API base URL.
pub const LOGIN_PATH: &str = "auth/token/";

/// Refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "auth/token/refresh/";

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access: String,
    refresh: String,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

/// A renewed access token and, if rotated, a new refresh token.
pub struct Refreshed {
    pub access: SecretString,
    pub refresh: Option<SecretString>,
}

/// Exchange email and password for a token pair.
///
/// # Errors
///
/// Returns `ApiError::Status` with the server's message if the credentials
/// are rejected, or `ApiError::Http` on network failure.
#[instrument(skip(client, base_url, password), fields(email = %email))]
pub async fn login(
    client: &reqwest::Client,
    base_url: &Url,
    email: &str,
    password: &SecretString,
) -> Result<TokenPair, ApiError> {
    let response = client
        .post(base_url.join(LOGIN_PATH)?)
        .json(&LoginRequest {
            email,
            password: password.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body,
        });
    }

    let tokens: LoginResponse = serde_json::from_str(&body)?;
    Ok(TokenPair::new(
        SecretString::from(tokens.access),
        Some(SecretString::from(tokens.refresh)),
    ))
}

/// Exchange a refresh token for a new access token.
///
/// # Errors
///
/// Returns `ApiError::AuthExpired` if the server rejects the refresh token.
/// Network failures surface as `ApiError::Http` so a flaky connection does
/// not end the session.
#[instrument(skip_all)]
pub async fn refresh(
    client: &reqwest::Client,
    base_url: &Url,
    refresh_token: &SecretString,
) -> Result<Refreshed, ApiError> {
    let response = client
        .post(base_url.join(REFRESH_PATH)?)
        .json(&RefreshRequest {
            refresh: refresh_token.expose_secret(),
        })
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST {
        return Err(ApiError::AuthExpired);
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            body,
        });
    }

    let tokens: RefreshResponse = serde_json::from_str(&body)?;
    Ok(Refreshed {
        access: SecretString::from(tokens.access),
        refresh: tokens.refresh.map(SecretString::from),
    })
}
