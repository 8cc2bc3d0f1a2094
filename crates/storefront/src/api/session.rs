//! Access/refresh token store.
//!
//! The token pair is written only by login, refresh and logout. Readers take
//! a snapshot of the access token per request; a refresh racing an in-flight
//! request can leave that request with a stale token, which the client's
//! retry-once policy absorbs.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use lustre_core::CustomerId;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{RwLock, watch};

/// Claims read from the access token payload.
///
/// The signature is not verified; the server does that. These values are
/// only used to scope display data and report expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessClaims {
    /// Authenticated customer.
    pub customer: Option<CustomerId>,
    /// Access token expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<i64>,
}

impl AccessClaims {
    /// Decode claims from a JWT. Malformed tokens yield empty claims.
    #[must_use]
    pub fn decode(token: &str) -> Self {
        let Some(payload) = token.split('.').nth(1) else {
            return Self::default();
        };
        let Ok(bytes) = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')) else {
            return Self::default();
        };
        let Ok(raw) = serde_json::from_slice::<RawClaims>(&bytes) else {
            return Self::default();
        };

        let customer = raw.user_id.and_then(|value| match value {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        });

        Self {
            customer: customer.map(CustomerId::new),
            expires_at: raw.exp.and_then(|exp| DateTime::from_timestamp(exp, 0)),
        }
    }

    /// Whether the access token has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }
}

/// Access token plus the refresh token used to renew it.
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Bearer token attached to requests.
    pub access: SecretString,
    /// Token exchanged for a new access token.
    pub refresh: Option<SecretString>,
    /// Claims decoded from `access`.
    pub claims: AccessClaims,
}

impl TokenPair {
    /// Build a pair, decoding claims from the access token.
    #[must_use]
    pub fn new(access: SecretString, refresh: Option<SecretString>) -> Self {
        let claims = AccessClaims::decode(access.expose_secret());
        Self {
            access,
            refresh,
            claims,
        }
    }
}

/// Authentication status published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    SignedOut,
    SignedIn {
        customer: Option<CustomerId>,
    },
    /// Authorization could not be renewed and the tokens were dropped.
    Expired,
}

/// Process-wide session, cheaply cloneable.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    tokens: RwLock<Option<TokenPair>>,
    status: watch::Sender<SessionStatus>,
}

impl Session {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (status, _) = watch::channel(SessionStatus::SignedOut);
        Self {
            inner: Arc::new(SessionInner {
                tokens: RwLock::new(None),
                status,
            }),
        }
    }

    /// Install a token pair (login or restore).
    pub async fn install(&self, tokens: TokenPair) {
        let customer = tokens.claims.customer;
        *self.inner.tokens.write().await = Some(tokens);
        self.inner
            .status
            .send_replace(SessionStatus::SignedIn { customer });
    }

    /// Replace the access token after a refresh, keeping or rotating the
    /// refresh token.
    pub async fn update_access(&self, access: SecretString, rotated: Option<SecretString>) {
        let mut guard = self.inner.tokens.write().await;
        let refresh = rotated.or_else(|| guard.as_ref().and_then(|t| t.refresh.clone()));
        let tokens = TokenPair::new(access, refresh);
        let customer = tokens.claims.customer;
        *guard = Some(tokens);
        drop(guard);
        self.inner
            .status
            .send_replace(SessionStatus::SignedIn { customer });
    }

    /// Current access token, if signed in.
    pub async fn access_token(&self) -> Option<SecretString> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access.clone())
    }

    /// Current refresh token, if any.
    pub async fn refresh_token(&self) -> Option<SecretString> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh.clone())
    }

    /// Authenticated customer, if known from the access token.
    pub async fn customer(&self) -> Option<CustomerId> {
        self.inner
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|t| t.claims.customer)
    }

    /// Claims of the current access token.
    pub async fn claims(&self) -> Option<AccessClaims> {
        self.inner.tokens.read().await.as_ref().map(|t| t.claims)
    }

    /// Whether a token pair is installed.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.tokens.read().await.is_some()
    }

    /// Drop tokens after a voluntary sign-out.
    pub async fn sign_out(&self) {
        *self.inner.tokens.write().await = None;
        self.inner.status.send_replace(SessionStatus::SignedOut);
    }

    /// Drop tokens after authorization could not be renewed.
    pub async fn expire(&self) {
        *self.inner.tokens.write().await = None;
        self.inner.status.send_replace(SessionStatus::Expired);
    }

    /// Latest status.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        *self.inner.status.borrow()
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn jwt(payload: &serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn test_decode_claims() {
        let token = jwt(&serde_json::json!({"user_id": 42, "exp": 4_102_444_800_i64}));
        let claims = AccessClaims::decode(&token);
        assert_eq!(claims.customer, Some(CustomerId::new(42)));
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_decode_string_user_id_and_past_expiry() {
        let token = jwt(&serde_json::json!({"user_id": "17", "exp": 1}));
        let claims = AccessClaims::decode(&token);
        assert_eq!(claims.customer, Some(CustomerId::new(17)));
        assert!(claims.is_expired());
    }

    #[test]
    fn test_decode_garbage_is_empty() {
        assert_eq!(AccessClaims::decode("not-a-jwt"), AccessClaims::default());
        assert_eq!(AccessClaims::decode("a.%%%.c"), AccessClaims::default());
    }

    #[tokio::test]
    async fn test_install_and_expire_publish_status() {
        let session = Session::new();
        let mut rx = session.subscribe();
        assert_eq!(session.status(), SessionStatus::SignedOut);

        let token = jwt(&serde_json::json!({"user_id": 5}));
        session
            .install(TokenPair::new(
                SecretString::from(token),
                Some(SecretString::from("refresh")),
            ))
            .await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            SessionStatus::SignedIn {
                customer: Some(CustomerId::new(5))
            }
        );
        assert_eq!(session.customer().await, Some(CustomerId::new(5)));

        session.expire().await;
        assert!(!session.is_authenticated().await);
        assert_eq!(session.status(), SessionStatus::Expired);
    }

    #[tokio::test]
    async fn test_update_access_keeps_refresh_token() {
        let session = Session::new();
        session
            .install(TokenPair::new(
                SecretString::from("old"),
                Some(SecretString::from("refresh-1")),
            ))
            .await;
        session.update_access(SecretString::from("new"), None).await;

        assert_eq!(
            session.access_token().await.unwrap().expose_secret(),
            "new"
        );
        assert_eq!(
            session.refresh_token().await.unwrap().expose_secret(),
            "refresh-1"
        );
    }
}
