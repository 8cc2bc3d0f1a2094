//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types. The storefront API
//! assigns integer primary keys, so every ID wraps an `i64`.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>`, `Display` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use lustre_core::define_id;
/// define_id!(WishlistId);
/// define_id!(ReviewId);
///
/// let wishlist_id = WishlistId::new(1);
/// let review_id = ReviewId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: WishlistId = review_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(ProductId);
define_id!(CartLineId);
define_id!(AddressId);
define_id!(CustomerId);

/// Storefront order handle returned by order creation.
///
/// Correlates order creation, payment and verification. Opaque to the client;
/// the server issues it as a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderHandle(Uuid);

impl OrderHandle {
    /// Wrap a server-issued UUID.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OrderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_id_serializes_transparently() {
        let id = ProductId::new(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let parsed: CartLineId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed.as_i64(), 7);
    }

    #[test]
    fn test_id_from_str_trims() {
        assert_eq!(" 15 ".parse::<AddressId>().unwrap(), AddressId::new(15));
        assert!("abc".parse::<AddressId>().is_err());
    }

    #[test]
    fn test_order_handle_round_trips_through_display() {
        let handle = OrderHandle::new(Uuid::new_v4());
        let parsed: OrderHandle = handle.to_string().parse().unwrap();
        assert_eq!(parsed, handle);
    }
}
