//! CLI error type.

use std::io;

use lustre_storefront::StorefrontError;
use lustre_storefront::addresses::AddressError;
use lustre_storefront::api::ApiError;
use lustre_storefront::cart::CartError;
use lustre_storefront::checkout::CheckoutError;
use lustre_storefront::config::ConfigError;
use lustre_storefront::coupons::CouponBookError;
use thiserror::Error;

/// Errors that end a command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Storefront(#[from] StorefrontError),

    /// Writing to the terminal failed.
    #[error("Terminal I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid command-line input.
    #[error("{0}")]
    Usage(String),

    /// The command ran but did not achieve its goal.
    #[error("{0}")]
    Failed(String),
}

impl CliError {
    /// Whether the error should be reported to Sentry.
    #[must_use]
    pub fn is_unexpected(&self) -> bool {
        match self {
            Self::Storefront(err) => err.is_unexpected(),
            Self::Io(_) => true,
            Self::Usage(_) | Self::Failed(_) => false,
        }
    }
}

macro_rules! via_storefront_error {
    ($($source:ty),+ $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(err: $source) -> Self {
                    Self::Storefront(err.into())
                }
            }
        )+
    };
}

via_storefront_error!(
    ConfigError,
    ApiError,
    CartError,
    CouponBookError,
    AddressError,
    CheckoutError,
);
