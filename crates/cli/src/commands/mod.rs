//! Command implementations.
//!
//! Results go to stdout; logs go to stderr through `tracing`.

pub mod address;
pub mod cart;
pub mod checkout;
pub mod coupon;

use std::io::{self, Write};

use lustre_core::cart::CartSummary;
use lustre_core::{CurrencyCode, Price};
use lustre_storefront::Storefront;
use rust_decimal::Decimal;

use crate::error::CliError;

/// Format a store-currency amount.
fn money(amount: Decimal) -> Price {
    Price::new(amount, CurrencyCode::INR)
}

/// Reload the cart, failing if the server could not be reached.
async fn load_cart(storefront: &Storefront) -> Result<(), CliError> {
    storefront.cart().fetch().await;
    match storefront.cart().state().error {
        Some(error) => Err(CliError::Failed(format!("Could not load your cart: {error}"))),
        None => Ok(()),
    }
}

fn write_summary(out: &mut impl Write, summary: &CartSummary) -> io::Result<()> {
    writeln!(out, "Items:    {}", summary.item_count)?;
    writeln!(out, "Subtotal: {}", money(summary.subtotal))?;
    if !summary.discount.is_zero() {
        writeln!(out, "Discount: -{}", money(summary.discount))?;
    }
    if summary.shipping.is_zero() {
        writeln!(out, "Shipping: free")?;
    } else {
        writeln!(out, "Shipping: {}", money(summary.shipping))?;
    }
    writeln!(out, "Total:    {}", money(summary.total))
}
