//! HTTP client with bearer authentication and the retry-once refresh policy.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};
use url::Url;

use super::session::{Session, TokenPair};
use super::{ApiError, auth, truncate_body};
use crate::config::ApiConfig;
use crate::navigation::{Destination, Navigator};

/// List endpoints may answer with a bare array or a paginated envelope.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum ListResponse<T> {
    Plain(Vec<T>),
    Paginated { results: Vec<T> },
}

impl<T> ListResponse<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Plain(items) | Self::Paginated { results: items } => items,
        }
    }
}

/// Client for the storefront REST API.
///
/// Cheaply cloneable; all clones share the HTTP connection pool, the session
/// and the navigator.
///
/// # Authorization
///
/// Every request carries the session's current access token. When the
/// server answers `401`, the client refreshes the access token once and
/// replays the request. If the refresh is rejected or the replay is also
/// `401`, the session is expired, the navigator is sent to sign-in and the
/// call fails with [`ApiError::AuthExpired`].
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Session,
    navigator: Arc<dyn Navigator>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Http` if the HTTP client cannot be built.
    pub fn new(
        config: &ApiConfig,
        session: Session,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.base_url.clone(),
                session,
                navigator,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Ask the embedding UI to move the user.
    pub fn navigate(&self, destination: Destination) {
        self.inner.navigator.navigate(destination);
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in with email and password and install the issued tokens.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Status` if the credentials are rejected.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<(), ApiError> {
        let tokens = auth::login(&self.inner.client, &self.inner.base_url, email, password).await?;
        debug!(customer = ?tokens.claims.customer, "signed in");
        self.inner.session.install(tokens).await;
        Ok(())
    }

    /// Install previously issued tokens.
    pub async fn restore(&self, access: SecretString, refresh: Option<SecretString>) {
        self.inner
            .session
            .install(TokenPair::new(access, refresh))
            .await;
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthExpired` if there is no refresh token or the
    /// server rejects it. Network errors are returned as-is.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<SecretString, ApiError> {
        let Some(refresh_token) = self.inner.session.refresh_token().await else {
            return Err(ApiError::AuthExpired);
        };

        let refreshed =
            auth::refresh(&self.inner.client, &self.inner.base_url, &refresh_token).await?;
        let access = refreshed.access.clone();
        self.inner
            .session
            .update_access(refreshed.access, refreshed.refresh)
            .await;
        debug!("access token refreshed");
        Ok(access)
    }

    /// End the session after authorization could not be renewed.
    async fn end_session(&self) {
        error!("authorization could not be renewed, ending session");
        self.inner.session.expire().await;
        self.navigate(Destination::SignIn);
    }

    // =========================================================================
    // Request Execution
    // =========================================================================

    /// Execute a request and return the raw response body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AuthExpired` once the retry-once policy gives up,
    /// `ApiError::RateLimited` on `429`, `ApiError::Status` on any other
    /// non-success status and `ApiError::Http` on network failure.
    #[instrument(skip(self, body), fields(method = %method, path = %path))]
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<String, ApiError> {
        let url = self.inner.base_url.join(path)?;

        let response = self.dispatch(&method, &url, body).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::read(response).await;
        }

        warn!("request unauthorized, refreshing access token");
        match self.refresh().await {
            Ok(_) => {}
            Err(ApiError::AuthExpired) => {
                self.end_session().await;
                return Err(ApiError::AuthExpired);
            }
            Err(err) => return Err(err),
        }

        let retry = self.dispatch(&method, &url, body).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            self.end_session().await;
            return Err(ApiError::AuthExpired);
        }
        Self::read(retry).await
    }

    /// Send one attempt with whatever access token the session holds now.
    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let mut request = self.inner.client.request(method.clone(), url.clone());
        if let Some(token) = self.inner.session.access_token().await {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        debug!("dispatching request");
        Ok(request.send().await?)
    }

    /// Map a response to its body or an error.
    async fn read(response: reqwest::Response) -> Result<String, ApiError> {
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        let text = response.text().await?;
        if !status.is_success() {
            warn!(
                status = %status,
                body = %truncate_body(&text),
                "API returned non-success status"
            );
            return Err(ApiError::Status {
                status,
                body: text,
            });
        }
        Ok(text)
    }

    // =========================================================================
    // Typed Helpers
    // =========================================================================

    /// `GET` a JSON document.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`]; also `ApiError::Parse` for malformed JSON.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let text = self.execute(Method::GET, path, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `GET` a list, accepting a bare array or a `{"results": [...]}` page.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let list: ListResponse<T> = self.get(path).await?;
        Ok(list.into_vec())
    }

    /// `POST` a JSON body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let text = self.execute(Method::POST, path, Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST` a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn post_discard<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, path, Some(&body)).await?;
        Ok(())
    }

    /// `PATCH` a JSON body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::get`].
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        let text = self.execute(Method::PATCH, path, Some(&body)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `PATCH` a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn patch_discard<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body)?;
        self.execute(Method::PATCH, path, Some(&body)).await?;
        Ok(())
    }

    /// `DELETE` a resource.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(Method::DELETE, path, None).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::SessionStatus;
    use crate::navigation::RecordingNavigator;

    async fn client_for(server: &MockServer) -> (ApiClient, Arc<RecordingNavigator>) {
        let config = ApiConfig::for_base_url(&format!("{}/api/", server.uri())).unwrap();
        let navigator = Arc::new(RecordingNavigator::new());
        let api = ApiClient::new(&config, Session::new(), navigator.clone()).unwrap();
        (api, navigator)
    }

    async fn signed_in(server: &MockServer) -> (ApiClient, Arc<RecordingNavigator>) {
        let (api, navigator) = client_for(server).await;
        api.restore(
            SecretString::from("stale-access"),
            Some(SecretString::from("refresh-1")),
        )
        .await;
        (api, navigator)
    }

    #[tokio::test]
    async fn test_bearer_token_is_attached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .and(header("authorization", "Bearer stale-access"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (api, _) = signed_in(&server).await;
        let lines: Vec<serde_json::Value> = api.get_list("cart/").await.unwrap();
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn test_paginated_lists_are_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/coupons/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"count": 1, "results": [{"code": "GOLD"}]})),
            )
            .mount(&server)
            .await;

        let (api, _) = client_for(&server).await;
        let coupons: Vec<serde_json::Value> = api.get_list("coupons/").await.unwrap();
        assert_eq!(coupons, vec![json!({"code": "GOLD"})]);
    }

    #[tokio::test]
    async fn test_unauthorized_refreshes_once_and_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .and(header("authorization", "Bearer stale-access"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/refresh/"))
            .and(body_json(json!({"refresh": "refresh-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .and(header("authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let (api, navigator) = signed_in(&server).await;
        let lines: Vec<serde_json::Value> = api.get_list("cart/").await.unwrap();
        assert!(lines.is_empty());
        assert!(navigator.visits().is_empty());
        assert_eq!(
            api.session().access_token().await.unwrap().expose_secret(),
            "fresh"
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "fresh"})))
            .expect(1)
            .mount(&server)
            .await;

        let (api, navigator) = signed_in(&server).await;
        let err = api.get_list::<serde_json::Value>("cart/").await.unwrap_err();

        assert!(matches!(err, ApiError::AuthExpired));
        assert!(!api.session().is_authenticated().await);
        assert_eq!(api.session().status(), SessionStatus::Expired);
        assert_eq!(navigator.visits(), vec![Destination::SignIn]);
    }

    #[tokio::test]
    async fn test_rejected_refresh_ends_session_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/refresh/"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"code": "token_not_valid"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (api, navigator) = signed_in(&server).await;
        let err = api.get_list::<serde_json::Value>("cart/").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthExpired));
        assert_eq!(navigator.last(), Some(Destination::SignIn));
    }

    #[tokio::test]
    async fn test_missing_refresh_token_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let (api, navigator) = client_for(&server).await;
        api.restore(SecretString::from("only-access"), None).await;
        let err = api.get_list::<serde_json::Value>("cart/").await.unwrap_err();
        assert!(matches!(err, ApiError::AuthExpired));
        assert_eq!(navigator.last(), Some(Destination::SignIn));
    }

    #[tokio::test]
    async fn test_refresh_server_error_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/cart/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (api, navigator) = signed_in(&server).await;
        let err = api.get_list::<serde_json::Value>("cart/").await.unwrap_err();
        assert!(err.is_transient());
        assert!(api.session().is_authenticated().await);
        assert!(navigator.visits().is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/products/"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let (api, _) = client_for(&server).await;
        let err = api.get_list::<serde_json::Value>("products/").await.unwrap_err();
        assert!(matches!(err, ApiError::RateLimited(7)));
    }

    #[tokio::test]
    async fn test_login_installs_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/"))
            .and(body_json(json!({"email": "asha@example.com", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": "a-1", "refresh": "r-1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (api, _) = client_for(&server).await;
        api.login("asha@example.com", &SecretString::from("pw"))
            .await
            .unwrap();
        assert!(api.session().is_authenticated().await);
        assert_eq!(
            api.session().refresh_token().await.unwrap().expose_secret(),
            "r-1"
        );
    }

    #[tokio::test]
    async fn test_login_rejection_is_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/auth/token/"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"detail": "No active account found"})),
            )
            .mount(&server)
            .await;

        let (api, _) = client_for(&server).await;
        let err = api
            .login("asha@example.com", &SecretString::from("wrong"))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        assert!(!api.session().is_authenticated().await);
    }
}
