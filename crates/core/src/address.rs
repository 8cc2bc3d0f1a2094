//! Shipping addresses owned by a customer.

use serde::{Deserialize, Serialize};

use crate::types::{AddressId, CustomerId};

/// A saved shipping address, in the server's canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    /// Owning customer. Addresses without one are never shown.
    #[serde(default, alias = "user")]
    pub customer: Option<CustomerId>,
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Whether this address belongs to `customer`.
    #[must_use]
    pub fn is_owned_by(&self, customer: CustomerId) -> bool {
        self.customer == Some(customer)
    }

    /// Single-line rendering for confirmations and CLI output.
    #[must_use]
    pub fn one_line(&self) -> String {
        let mut parts = vec![self.full_name.as_str(), self.line1.as_str()];
        if let Some(line2) = self.line2.as_deref().filter(|l| !l.trim().is_empty()) {
            parts.push(line2);
        }
        parts.extend([
            self.city.as_str(),
            self.state.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]);
        parts.join(", ")
    }
}

/// Keep only addresses owned by `customer`.
#[must_use]
pub fn owned_by(addresses: Vec<Address>, customer: CustomerId) -> Vec<Address> {
    addresses
        .into_iter()
        .filter(|a| a.is_owned_by(customer))
        .collect()
}

/// The first server-flagged default, if any.
#[must_use]
pub fn default_address(addresses: &[Address]) -> Option<&Address> {
    addresses.iter().find(|a| a.is_default)
}

/// Field-level problems with an address draft.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressValidationError {
    /// A required field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Address fields submitted on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressDraft {
    pub full_name: String,
    pub phone: String,
    pub line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

impl AddressDraft {
    /// Check required fields before anything is sent to the server.
    ///
    /// # Errors
    ///
    /// Returns the first blank required field.
    pub fn validate(&self) -> Result<(), AddressValidationError> {
        let required = [
            ("full name", &self.full_name),
            ("phone", &self.phone),
            ("address line 1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("postal code", &self.postal_code),
            ("country", &self.country),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AddressValidationError::MissingField(name));
            }
        }
        Ok(())
    }
}

/// Partial update; only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddressPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_default: Option<bool>,
}

impl AddressPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
