//! Coupon book for one checkout session.
//!
//! Coupons are fetched once, on first use, and the entered code is kept so
//! the discount can be recomputed whenever the subtotal changes.

use std::sync::{Arc, Mutex, PoisonError};

use lustre_core::coupon::{self, Coupon, CouponError};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::api::{ApiClient, ApiError};

/// Coupons endpoint, relative to the API base URL.
pub const COUPONS_PATH: &str = "coupons/";

/// Errors returned by [`CouponBook::apply`].
#[derive(Debug, Error)]
pub enum CouponBookError {
    /// The coupon list could not be fetched.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The code does not apply to this subtotal.
    #[error(transparent)]
    Rejected(#[from] CouponError),
}

/// A code that evaluated to a discount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCoupon {
    /// Normalized code.
    pub code: String,
    pub discount: Decimal,
}

#[derive(Clone)]
pub struct CouponBook {
    inner: Arc<CouponBookInner>,
}

struct CouponBookInner {
    api: ApiClient,
    coupons: OnceCell<Vec<Coupon>>,
    entered: Mutex<Option<String>>,
}

impl CouponBook {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            inner: Arc::new(CouponBookInner {
                api,
                coupons: OnceCell::new(),
                entered: Mutex::new(None),
            }),
        }
    }

    /// The coupon list, fetched on first call.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the fetch fails. A later call tries again.
    pub async fn coupons(&self) -> Result<&[Coupon], ApiError> {
        let coupons = self
            .inner
            .coupons
            .get_or_try_init(|| async {
                let coupons: Vec<Coupon> = self.inner.api.get_list(COUPONS_PATH).await?;
                debug!(count = coupons.len(), "coupons loaded");
                Ok::<_, ApiError>(coupons)
            })
            .await?;
        Ok(coupons.as_slice())
    }

    /// Evaluate `code` against `subtotal` and remember it on success.
    ///
    /// A rejected code is forgotten, so it never affects later totals.
    ///
    /// # Errors
    ///
    /// Returns [`CouponBookError::Rejected`] for an unknown code or a subtotal
    /// under the minimum, and [`CouponBookError::Api`] if coupons cannot be
    /// fetched.
    #[instrument(skip(self), fields(code = %code, subtotal = %subtotal))]
    pub async fn apply(&self, code: &str, subtotal: Decimal) -> Result<AppliedCoupon, CouponBookError> {
        let coupons = self.coupons().await?;
        let normalized = coupon::normalize_code(code);

        match coupon::evaluate(&normalized, subtotal, coupons) {
            Ok(discount) => {
                self.set_entered(Some(normalized.clone()));
                Ok(AppliedCoupon {
                    code: normalized,
                    discount,
                })
            }
            Err(err) => {
                debug!(error = %err, "coupon rejected");
                self.set_entered(None);
                Err(err.into())
            }
        }
    }

    /// Re-run the evaluator for the remembered code against a new subtotal.
    ///
    /// Returns `None` when no code is applied. A code that falls under its
    /// minimum stays remembered and applies again once the subtotal recovers.
    #[must_use]
    pub fn reevaluate(&self, subtotal: Decimal) -> Option<Result<AppliedCoupon, CouponError>> {
        let code = self.applied_code()?;
        let coupons = self.inner.coupons.get()?;
        Some(
            coupon::evaluate(&code, subtotal, coupons).map(|discount| AppliedCoupon { code, discount }),
        )
    }

    /// Discount for `subtotal` from the remembered code, zero if none applies.
    #[must_use]
    pub fn discount(&self, subtotal: Decimal) -> Decimal {
        match self.reevaluate(subtotal) {
            Some(Ok(applied)) => applied.discount,
            _ => Decimal::ZERO,
        }
    }

    /// The remembered code, normalized.
    #[must_use]
    pub fn applied_code(&self) -> Option<String> {
        self.inner
            .entered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Forget the entered code.
    pub fn clear(&self) {
        self.set_entered(None);
    }

    fn set_entered(&self, code: Option<String>) {
        *self
            .inner
            .entered
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = code;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::api::Session;
    use crate::config::ApiConfig;
    use crate::navigation::LoggingNavigator;

    async fn book_for(server: &MockServer) -> CouponBook {
        Mock::given(method("GET"))
            .and(path("/api/coupons/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "code": "GOLD10",
                    "discount_type": "percentage",
                    "discount_value": "10",
                    "min_order_amount": "999",
                    "max_discount_amount": "500"
                },
                {"code": "FLAT200", "discount_type": "fixed_amount", "discount_value": "200"}
            ])))
            .expect(1)
            .mount(server)
            .await;

        let config = ApiConfig::for_base_url(&format!("{}/api/", server.uri())).unwrap();
        let api = ApiClient::new(&config, Session::new(), Arc::new(LoggingNavigator)).unwrap();
        CouponBook::new(api)
    }

    #[tokio::test]
    async fn test_apply_caps_percentage() {
        let server = MockServer::start().await;
        let book = book_for(&server).await;

        let applied = book.apply(" gold10 ", Decimal::new(10_000, 0)).await.unwrap();
        assert_eq!(applied.code, "GOLD10");
        assert_eq!(applied.discount, Decimal::new(500, 0));
        assert_eq!(book.applied_code().as_deref(), Some("GOLD10"));
    }

    #[tokio::test]
    async fn test_rejected_code_is_forgotten() {
        let server = MockServer::start().await;
        let book = book_for(&server).await;

        book.apply("FLAT200", Decimal::new(1_000, 0)).await.unwrap();
        let err = book.apply("GOLD10", Decimal::new(500, 0)).await.unwrap_err();

        assert!(matches!(
            err,
            CouponBookError::Rejected(CouponError::BelowMinimum { .. })
        ));
        assert!(book.applied_code().is_none());
        assert_eq!(book.discount(Decimal::new(500, 0)), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reevaluate_follows_subtotal_without_refetch() {
        let server = MockServer::start().await;
        let book = book_for(&server).await;
        assert!(book.reevaluate(Decimal::ONE).is_none());

        book.apply("GOLD10", Decimal::new(2_000, 0)).await.unwrap();
        assert_eq!(book.discount(Decimal::new(3_000, 0)), Decimal::new(300, 0));

        let below = book.reevaluate(Decimal::new(900, 0)).unwrap();
        assert!(below.is_err());
        assert_eq!(book.applied_code().as_deref(), Some("GOLD10"));
        assert_eq!(book.discount(Decimal::new(1_000, 0)), Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid() {
        let server = MockServer::start().await;
        let book = book_for(&server).await;

        let err = book.apply("NOPE", Decimal::new(5_000, 0)).await.unwrap_err();
        assert!(matches!(err, CouponBookError::Rejected(CouponError::Invalid)));
    }
}
