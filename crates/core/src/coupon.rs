//! Coupon records and the discount evaluator.
//!
//! [`evaluate`] is pure and idempotent so callers can re-run it whenever the
//! subtotal changes without asking for the code again.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a coupon's value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Take a fixed amount off.
    #[serde(alias = "fixed")]
    FixedAmount,
    /// Take a percentage of the pre-discount subtotal off.
    #[serde(alias = "percent")]
    Percentage,
}

/// A coupon as listed by the coupons endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    /// Match key, compared case-insensitively.
    pub code: String,
    pub discount_type: DiscountType,
    /// Fixed amount, or percentage points for [`DiscountType::Percentage`].
    pub discount_value: Decimal,
    /// Subtotal required before the coupon applies.
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    /// Upper bound on the computed discount.
    #[serde(default)]
    pub max_discount_amount: Option<Decimal>,
}

impl Coupon {
    /// Raw discount for `subtotal` before the cap is applied.
    #[must_use]
    pub fn raw_discount(&self, subtotal: Decimal) -> Decimal {
        match self.discount_type {
            DiscountType::FixedAmount => self.discount_value,
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
        }
    }
}

/// Why a coupon code was rejected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CouponError {
    /// No coupon matches the normalized code.
    #[error("invalid coupon")]
    Invalid,
    /// The subtotal is below the coupon's minimum order amount.
    #[error("coupon requires a minimum order of {minimum}")]
    BelowMinimum {
        /// The coupon's minimum order amount.
        minimum: Decimal,
    },
}

/// Normalize a user-entered code for matching.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Evaluate `code` against `subtotal` and the available coupons.
///
/// A successful match always yields a non-negative discount, possibly zero.
///
/// # Errors
///
/// Returns [`CouponError::Invalid`] if no coupon matches and
/// [`CouponError::BelowMinimum`] if the subtotal is under the coupon minimum.
pub fn evaluate(code: &str, subtotal: Decimal, coupons: &[Coupon]) -> Result<Decimal, CouponError> {
    let wanted = normalize_code(code);
    if wanted.is_empty() {
        return Err(CouponError::Invalid);
    }

    let coupon = coupons
        .iter()
        .find(|c| normalize_code(&c.code) == wanted)
        .ok_or(CouponError::Invalid)?;

    if let Some(minimum) = coupon.min_order_amount
        && subtotal < minimum
    {
        return Err(CouponError::BelowMinimum { minimum });
    }

    let mut discount = coupon.raw_discount(subtotal);
    if let Some(cap) = coupon.max_discount_amount
        && discount > cap
    {
        discount = cap;
    }

    Ok(discount.max(Decimal::ZERO))
}
