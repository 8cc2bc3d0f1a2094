//! `lustre address` commands.

use std::io::{self, Write};

use clap::Args;
use lustre_core::AddressId;
use lustre_core::address::AddressDraft;
use lustre_storefront::Storefront;

use crate::error::CliError;

/// Fields for a new address.
#[derive(Args)]
pub struct NewAddress {
    /// Recipient name
    #[arg(long)]
    full_name: String,

    /// Contact phone number
    #[arg(long)]
    phone: String,

    /// Street address
    #[arg(long)]
    line1: String,

    /// Apartment, floor or landmark
    #[arg(long)]
    line2: Option<String>,

    #[arg(long)]
    city: String,

    #[arg(long)]
    state: String,

    #[arg(long)]
    postal_code: String,

    #[arg(long, default_value = "India")]
    country: String,

    /// Make this the default shipping address
    #[arg(long = "default")]
    is_default: bool,
}

impl From<NewAddress> for AddressDraft {
    fn from(address: NewAddress) -> Self {
        Self {
            full_name: address.full_name,
            phone: address.phone,
            line1: address.line1,
            line2: address.line2,
            city: address.city,
            state: address.state,
            postal_code: address.postal_code,
            country: address.country,
            is_default: address.is_default,
        }
    }
}

/// Print saved addresses, marking the selected one.
pub async fn list(storefront: &Storefront) -> Result<(), CliError> {
    let addresses = storefront.addresses().list().await?;
    let selected = storefront.addresses().selected().map(|a| a.id);

    let mut out = io::stdout().lock();
    if addresses.is_empty() {
        writeln!(out, "No saved addresses.")?;
        return Ok(());
    }
    for address in &addresses {
        let marker = if Some(address.id) == selected { "*" } else { " " };
        writeln!(out, "{marker} #{:<5} {}", address.id, address.one_line())?;
    }
    Ok(())
}

/// Save a new address.
pub async fn add(storefront: &Storefront, address: NewAddress) -> Result<(), CliError> {
    let draft = AddressDraft::from(address);
    let saved = storefront.addresses().create(&draft).await?;
    writeln!(
        io::stdout().lock(),
        "Saved address #{}: {}",
        saved.id,
        saved.one_line()
    )?;
    Ok(())
}

/// Delete an address.
pub async fn delete(storefront: &Storefront, id: i64) -> Result<(), CliError> {
    storefront.addresses().delete(AddressId::new(id)).await?;
    writeln!(io::stdout().lock(), "Deleted address #{id}.")?;
    Ok(())
}
