//! `lustre checkout` command.

use std::io::{self, Write};
use std::sync::Arc;

use lustre_core::AddressId;
use lustre_core::checkout::CheckoutState;
use lustre_storefront::Storefront;

use super::{load_cart, write_summary};
use crate::error::CliError;
use crate::widget::TerminalWidget;

/// Select an address, apply a coupon, then place and pay for the order.
pub async fn run(
    storefront: &Storefront,
    address: Option<i64>,
    coupon: Option<&str>,
) -> Result<(), CliError> {
    load_cart(storefront).await?;

    storefront.addresses().list().await?;
    if let Some(id) = address {
        storefront.addresses().select(AddressId::new(id))?;
    }

    if let Some(code) = coupon {
        let subtotal = storefront.summary().await.subtotal;
        storefront.coupons().apply(code, subtotal).await?;
    }

    let summary = storefront.summary().await;
    {
        let mut out = io::stdout().lock();
        if let Some(selected) = storefront.addresses().selected() {
            writeln!(out, "Ship to:  {}", selected.one_line())?;
        }
        write_summary(&mut out, &summary)?;
        writeln!(out)?;
    }

    let checkout = storefront.checkout(Arc::new(TerminalWidget));
    let request = storefront.checkout_request().await;
    let state = checkout.place_order(&request).await?;

    let message = state
        .user_message()
        .unwrap_or_else(|| format!("Checkout stopped in state {state}."));
    if matches!(state, CheckoutState::Confirmed(_)) {
        writeln!(io::stdout().lock(), "{message}")?;
        Ok(())
    } else {
        Err(CliError::Failed(message))
    }
}
