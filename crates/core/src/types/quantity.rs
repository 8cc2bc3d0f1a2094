//! Line-item quantity.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when constructing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Quantity below one. Dropping a line to zero is a removal, not an update.
    #[error("quantity must be at least {min}")]
    BelowMinimum {
        /// Smallest accepted quantity.
        min: u32,
    },
    /// Summing quantities overflowed.
    #[error("quantity is too large")]
    Overflow,
}

/// A cart line quantity, always at least one.
///
/// ```
/// use lustre_core::Quantity;
///
/// assert!(Quantity::new(1).is_ok());
/// assert!(Quantity::new(0).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quantity(u32);

impl Quantity {
    /// Smallest valid quantity.
    pub const MIN: u32 = 1;

    /// A single unit.
    pub const ONE: Self = Self(1);

    /// Validate and wrap a raw quantity.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::BelowMinimum`] for zero.
    pub const fn new(value: u32) -> Result<Self, QuantityError> {
        if value < Self::MIN {
            return Err(QuantityError::BelowMinimum { min: Self::MIN });
        }
        Ok(Self(value))
    }

    /// Get the raw value.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Add two quantities.
    ///
    /// # Errors
    ///
    /// Returns [`QuantityError::Overflow`] if the sum does not fit in a `u32`.
    pub const fn checked_add(self, other: Self) -> Result<Self, QuantityError> {
        match self.0.checked_add(other.0) {
            Some(sum) => Ok(Self(sum)),
            None => Err(QuantityError::Overflow),
        }
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u32> for Quantity {
    type Error = QuantityError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for u32 {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_rejected() {
        assert_eq!(
            Quantity::new(0),
            Err(QuantityError::BelowMinimum { min: 1 })
        );
    }

    #[test]
    fn test_checked_add_sums() {
        let sum = Quantity::new(2)
            .unwrap()
            .checked_add(Quantity::new(3).unwrap())
            .unwrap();
        assert_eq!(sum.get(), 5);
    }

    #[test]
    fn test_checked_add_overflow() {
        let max = Quantity::new(u32::MAX).unwrap();
        assert_eq!(max.checked_add(Quantity::ONE), Err(QuantityError::Overflow));
    }

    #[test]
    fn test_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Quantity>("0").is_err());
        assert_eq!(serde_json::from_str::<Quantity>("4").unwrap().get(), 4);
    }
}
