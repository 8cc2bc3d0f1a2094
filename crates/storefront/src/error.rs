//! Crate-level error type.
//!
//! Each store has its own error enum; [`StorefrontError`] gathers them for
//! callers that drive several stores, such as the CLI.

use thiserror::Error;

use crate::addresses::AddressError;
use crate::api::ApiError;
use crate::cart::CartError;
use crate::catalog::CatalogError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::coupons::CouponBookError;

/// Any error surfaced by the storefront client.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Coupon error: {0}")]
    Coupon(#[from] CouponBookError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),
}

impl StorefrontError {
    /// The underlying API error, if any.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err)
            | Self::Cart(CartError::Api(err))
            | Self::Coupon(CouponBookError::Api(err))
            | Self::Address(AddressError::Api(err)) => Some(err),
            Self::Catalog(err) => Some(err.api_error()),
            Self::Config(_)
            | Self::Cart(_)
            | Self::Coupon(_)
            | Self::Address(_)
            | Self::Checkout(_) => None,
        }
    }

    /// Whether the session ended and the user must sign in again.
    #[must_use]
    pub fn is_session_expired(&self) -> bool {
        matches!(self.api_error(), Some(ApiError::AuthExpired))
            || matches!(self, Self::Address(AddressError::SignInRequired))
    }

    /// Whether this indicates a bug or outage rather than user input.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        match self {
            Self::Config(_) | Self::Checkout(_) => false,
            _ => self
                .api_error()
                .is_some_and(|err| err.is_transient() || matches!(err, ApiError::Parse(_))),
        }
    }
}

#[cfg(test)]
mod tests {
    use lustre_core::address::AddressValidationError;
    use lustre_core::coupon::CouponError;
    use reqwest::StatusCode;

    use super::*;

    #[test]
    fn test_session_expiry_is_detected_through_stores() {
        assert!(StorefrontError::from(CartError::Api(ApiError::AuthExpired)).is_session_expired());
        assert!(StorefrontError::from(AddressError::SignInRequired).is_session_expired());
        assert!(!StorefrontError::from(CheckoutError::EmptyCart).is_session_expired());
    }

    #[test]
    fn test_unexpected_classification() {
        let outage = StorefrontError::from(ApiError::Status {
            status: StatusCode::BAD_GATEWAY,
            body: String::new(),
        });
        assert!(outage.is_unexpected());

        let rejected = StorefrontError::from(CouponBookError::Rejected(CouponError::Invalid));
        assert!(!rejected.is_unexpected());

        let invalid = StorefrontError::from(AddressError::Invalid(
            AddressValidationError::MissingField("city"),
        ));
        assert!(!invalid.is_unexpected());
        assert_eq!(
            invalid.to_string(),
            "Address error: city is required"
        );
    }
}
