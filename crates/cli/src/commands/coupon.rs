//! `lustre coupon` commands.

use std::io::{self, Write};

use lustre_storefront::Storefront;

use super::{load_cart, money};
use crate::error::CliError;

/// Evaluate `code` against the current cart subtotal.
pub async fn check(storefront: &Storefront, code: &str) -> Result<(), CliError> {
    load_cart(storefront).await?;
    let subtotal = storefront.summary().await.subtotal;

    let applied = storefront.coupons().apply(code, subtotal).await?;
    writeln!(
        io::stdout().lock(),
        "{} takes {} off a subtotal of {}.",
        applied.code,
        money(applied.discount),
        money(subtotal)
    )?;
    Ok(())
}
