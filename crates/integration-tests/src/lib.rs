//! End-to-end tests for the Lustre storefront client.
//!
//! Each test starts a `wiremock` server standing in for the REST backend and
//! drives a [`Storefront`] against it.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p lustre-integration-tests
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use lustre_core::checkout::{PaymentProof, ProviderError};
use lustre_storefront::api::ApiError;
use lustre_storefront::{Storefront, StorefrontError};
use lustre_storefront::checkout::{PaymentCallback, PaymentRequest, PaymentWidget};
use lustre_storefront::config::{ApiConfig, Credentials, StorefrontConfig};
use lustre_storefront::navigation::RecordingNavigator;
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::MockServer;

/// Customer id encoded in [`access_token`].
pub const CUSTOMER_ID: i64 = 5;

/// Order handle returned by [`payment_order`].
pub const ORDER_UUID: &str = "3b241101-e2bb-4255-8caf-4136c566a962";

/// Provider order reference returned by [`payment_order`].
pub const PROVIDER_ORDER_ID: &str = "order_EKwxwAgItmmXdp";

/// An unsigned JWT carrying `user_id` for `customer`.
#[must_use]
pub fn access_token(customer: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(json!({"user_id": customer, "token_type": "access"}).to_string());
    format!("{header}.{body}.test-signature")
}

/// A storefront wired to a fresh mock backend.
pub struct TestContext {
    pub server: MockServer,
    pub navigator: Arc<RecordingNavigator>,
    pub storefront: Storefront,
}

impl TestContext {
    /// Start a mock backend and a signed-out storefront pointed at it.
    ///
    /// # Errors
    ///
    /// Returns `StorefrontError` if the mock server URL cannot be used.
    pub async fn new() -> Result<Self, StorefrontError> {
        let server = MockServer::start().await;
        let base_url = format!("{}/api/", server.uri());
        let config = StorefrontConfig {
            api: ApiConfig::for_base_url(&base_url).map_err(ApiError::from)?,
            ..StorefrontConfig::from_lookup(|_| None)?
        };

        let navigator = Arc::new(RecordingNavigator::new());
        let storefront = Storefront::new(config, navigator.clone())?;

        Ok(Self {
            server,
            navigator,
            storefront,
        })
    }

    /// Start a context already signed in as [`CUSTOMER_ID`].
    ///
    /// # Errors
    ///
    /// See [`TestContext::new`].
    pub async fn signed_in() -> Result<Self, StorefrontError> {
        let ctx = Self::new().await?;
        let credentials = Credentials::Tokens {
            access: SecretString::from(access_token(CUSTOMER_ID)),
            refresh: Some(SecretString::from("refresh-token")),
        };
        ctx.storefront.sign_in(&credentials).await?;
        Ok(ctx)
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Catalog listing with two products.
#[must_use]
pub fn products() -> Value {
    json!([
        {"id": 1, "name": "Rose Gold Band", "price": "2500.00", "image": "/media/band.jpg"},
        {"id": 2, "name": "Pearl Drop Earrings", "price": "1800.00"}
    ])
}

/// A cart line.
#[must_use]
pub fn cart_line(id: i64, product: i64, quantity: u32) -> Value {
    json!({"id": id, "product": product, "quantity": quantity})
}

/// A saved address owned by `user`.
#[must_use]
pub fn address(id: i64, user: i64, is_default: bool) -> Value {
    json!({
        "id": id,
        "user": user,
        "full_name": "Meera Iyer",
        "phone": "9812345678",
        "line1": "44 Residency Road",
        "line2": "Flat 3B",
        "city": "Chennai",
        "state": "Tamil Nadu",
        "postal_code": "600006",
        "country": "India",
        "is_default": is_default
    })
}

/// Coupon listing.
#[must_use]
pub fn coupons() -> Value {
    json!([
        {
            "code": "SPARKLE10",
            "discount_type": "percentage",
            "discount_value": "10",
            "min_order_amount": "999",
            "max_discount_amount": "500"
        },
        {"code": "WELCOME250", "discount_type": "fixed_amount", "discount_value": "250"}
    ])
}

/// Order creation response.
#[must_use]
pub fn payment_order(amount_minor: i64) -> Value {
    json!({
        "order_uuid": ORDER_UUID,
        "razorpay_order_id": PROVIDER_ORDER_ID,
        "amount": amount_minor,
        "currency": "INR",
        "razorpay_key": "rzp_test_key"
    })
}

// =============================================================================
// Payment Widget
// =============================================================================

/// One scripted widget reply.
#[derive(Debug, Clone)]
pub enum WidgetReply {
    Pay,
    Decline,
    Close,
}

/// Widget that answers from a script and records each request.
#[derive(Default)]
pub struct ScriptedWidget {
    replies: Mutex<VecDeque<WidgetReply>>,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedWidget {
    #[must_use]
    pub fn new(replies: impl IntoIterator<Item = WidgetReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Requests seen so far.
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PaymentWidget for ScriptedWidget {
    fn open(&self, request: PaymentRequest, callback: PaymentCallback) {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(WidgetReply::Close);

        match reply {
            WidgetReply::Pay => callback.succeed(PaymentProof {
                provider_payment_id: "pay_FHfAzFGNC8Dj5D".to_string(),
                provider_order_id: request.provider_order_id,
                provider_signature: "0d4e745a1838664ad6c9c9902212a32d627d68e917290b0ad5f08ff4561bc50f"
                    .to_string(),
            }),
            WidgetReply::Decline => callback.fail(ProviderError {
                code: Some("BAD_REQUEST_ERROR".to_string()),
                description: "Your payment has been cancelled. Try again or complete the payment later."
                    .to_string(),
            }),
            WidgetReply::Close => drop(callback),
        }
    }
}
