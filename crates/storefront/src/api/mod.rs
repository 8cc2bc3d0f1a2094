//! REST API client for the Lustre backend.
//!
//! # Architecture
//!
//! - The backend is the source of truth for carts, addresses, orders and
//!   payments; nothing here persists state locally
//! - Every request goes through [`ApiClient`], which attaches the bearer
//!   token held by the [`Session`]
//! - A `401` triggers exactly one refresh-and-retry; a second `401` for the
//!   same call ends the session and sends the user to sign-in
//!
//! # Example
//!
//! ```rust,ignore
//! use lustre_storefront::api::{ApiClient, Session};
//!
//! let session = Session::new();
//! let api = ApiClient::new(&config.api, session.clone(), navigator)?;
//! api.login("asha@example.com", &password).await?;
//!
//! let lines: Vec<CartLineItem> = api.get_list("cart/").await?;
//! ```

mod auth;
mod client;
mod session;

pub use client::ApiClient;
pub use session::{AccessClaims, Session, SessionStatus, TokenPair};

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the storefront API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {}", truncate_body(.body))]
    Status {
        /// Response status code.
        status: StatusCode,
        /// Response body as received; display truncates it.
        body: String,
    },

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authorization could not be renewed; the session has been ended.
    #[error("Session expired, sign in again")]
    AuthExpired,
}

impl ApiError {
    /// Whether the server rejected the request's credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::UNAUTHORIZED)
    }

    /// Whether this looks like a uniqueness violation from a concurrent create.
    ///
    /// The backend does not document a dedicated code for this. A `409`, or a
    /// `400` whose body reports a unique constraint, is treated as one.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::Status { status, .. } if *status == StatusCode::CONFLICT => true,
            Self::Status { status, body } if *status == StatusCode::BAD_REQUEST => {
                let body = body.to_lowercase();
                body.contains("unique") || body.contains("already exists")
            }
            _ => false,
        }
    }

    /// Whether retrying later could succeed (network, `5xx`, rate limiting).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited(_) => true,
            Self::Status { status, .. } => status.is_server_error(),
            Self::Parse(_) | Self::InvalidUrl(_) | Self::AuthExpired => false,
        }
    }
}

/// Maximum number of body characters shown when displaying [`ApiError::Status`].
const ERROR_BODY_LIMIT: usize = 200;

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn status(code: StatusCode, body: &str) -> ApiError {
        ApiError::Status {
            status: code,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_duplicate_classification() {
        assert!(status(StatusCode::CONFLICT, "").is_duplicate());
        assert!(
            status(
                StatusCode::BAD_REQUEST,
                r#"{"non_field_errors":["The fields user, product must make a unique set."]}"#
            )
            .is_duplicate()
        );
        assert!(status(StatusCode::BAD_REQUEST, "Cart item already exists").is_duplicate());
        assert!(!status(StatusCode::BAD_REQUEST, r#"{"quantity":["invalid"]}"#).is_duplicate());
        assert!(!status(StatusCode::INTERNAL_SERVER_ERROR, "unique").is_duplicate());
    }

    #[test]
    fn test_transient_classification() {
        assert!(status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(ApiError::RateLimited(3).is_transient());
        assert!(!status(StatusCode::NOT_FOUND, "").is_transient());
        assert!(!ApiError::AuthExpired.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = status(StatusCode::NOT_FOUND, "missing");
        assert_eq!(err.to_string(), "HTTP 404 Not Found: missing");
        assert!(status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
    }

    #[test]
    fn test_duplicate_detected_past_display_limit() {
        let body = format!(
            r#"{{"detail":"{}","non_field_errors":["The fields user, product must make a unique set."]}}"#,
            "Cart validation failed. ".repeat(20)
        );
        assert!(body.find("unique").unwrap() > ERROR_BODY_LIMIT);

        let err = status(StatusCode::BAD_REQUEST, &body);
        assert!(err.is_duplicate());
        assert!(!err.to_string().contains("unique"));
    }

    #[test]
    fn test_truncate_body() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).len(), ERROR_BODY_LIMIT);
    }
}
