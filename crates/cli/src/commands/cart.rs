//! `lustre cart` commands.

use std::io::{self, Write};

use lustre_core::{CartLineId, ProductId, Quantity};
use lustre_storefront::Storefront;
use lustre_storefront::cart::AddOutcome;

use super::{load_cart, money, write_summary};
use crate::error::CliError;

fn quantity(value: u32) -> Result<Quantity, CliError> {
    Quantity::new(value).map_err(|e| CliError::Usage(e.to_string()))
}

/// Fail with the cart's recorded error, if the last operation left one.
fn check_cart_error(storefront: &Storefront, action: &str) -> Result<(), CliError> {
    match storefront.cart().state().error {
        Some(error) => Err(CliError::Failed(format!("Could not {action}: {error}"))),
        None => Ok(()),
    }
}

/// Print every line and the totals.
pub async fn show(storefront: &Storefront) -> Result<(), CliError> {
    load_cart(storefront).await?;

    let lines = storefront.cart().state().items;
    let items = storefront.catalog().enrich(&lines).await;
    let summary = storefront.summary().await;

    let mut out = io::stdout().lock();
    if items.is_empty() {
        writeln!(out, "Your cart is empty.")?;
        return Ok(());
    }

    for item in &items {
        let total = item
            .line_total()
            .map_or_else(|| "-".to_string(), |t| money(t).to_string());
        writeln!(
            out,
            "#{:<6} {:<32} x{:<3} {:>12}",
            item.line.id,
            item.display_name(),
            item.line.quantity,
            total
        )?;
    }
    writeln!(out)?;
    write_summary(&mut out, &summary)?;
    Ok(())
}

/// Add units of a product.
pub async fn add(storefront: &Storefront, product: i64, units: u32) -> Result<(), CliError> {
    let outcome = storefront
        .cart()
        .add(ProductId::new(product), quantity(units)?)
        .await?;

    let mut out = io::stdout().lock();
    match outcome {
        AddOutcome::Created | AddOutcome::Reconciled => {
            writeln!(out, "Added product {product} to your cart.")?;
        }
        AddOutcome::Incremented { line, quantity } => {
            writeln!(out, "Line #{line} now has {quantity} units.")?;
        }
        AddOutcome::AlreadyInFlight => {
            writeln!(out, "Product {product} is already being added.")?;
        }
        AddOutcome::SignInRequired => {
            return Err(CliError::Failed(
                "Sign in first: set LUSTRE_EMAIL and LUSTRE_PASSWORD.".to_string(),
            ));
        }
    }
    writeln!(out, "Cart: {} items", storefront.cart().count())?;
    Ok(())
}

/// Set a line's quantity.
pub async fn set(storefront: &Storefront, line: i64, units: u32) -> Result<(), CliError> {
    let units = quantity(units)?;
    storefront.cart().update(CartLineId::new(line), units).await;
    check_cart_error(storefront, "update the line")?;

    writeln!(io::stdout().lock(), "Line #{line} set to {units}.")?;
    Ok(())
}

/// Remove a line.
pub async fn remove(storefront: &Storefront, line: i64) -> Result<(), CliError> {
    storefront.cart().remove(CartLineId::new(line)).await;
    check_cart_error(storefront, "remove the line")?;

    writeln!(io::stdout().lock(), "Removed line #{line}.")?;
    Ok(())
}
