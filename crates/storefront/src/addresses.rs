//! Address book and shipping-address selection.
//!
//! Only addresses whose customer reference matches the signed-in customer
//! are kept, on top of the server's own scoping. At most one address is
//! selected; the server's default flag seeds the selection when nothing has
//! been chosen yet.

use std::sync::Arc;

use lustre_core::address::{
    self, Address, AddressDraft, AddressPatch, AddressValidationError,
};
use lustre_core::AddressId;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::navigation::Destination;

/// Address collection endpoint, relative to the API base URL.
pub const ADDRESSES_PATH: &str = "auth/addresses/";

fn address_path(id: AddressId) -> String {
    format!("{ADDRESSES_PATH}{id}/")
}

#[derive(Debug, Error)]
pub enum AddressError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Rejected before any request was sent.
    #[error(transparent)]
    Invalid(#[from] AddressValidationError),

    #[error("nothing to update")]
    EmptyPatch,

    #[error("address {0} is not in your address book")]
    UnknownAddress(AddressId),

    #[error("sign in to manage addresses")]
    SignInRequired,
}

/// Observable address book state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressState {
    pub addresses: Vec<Address>,
    pub selected: Option<AddressId>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AddressState {
    /// The selected address, if it is still in the book.
    #[must_use]
    pub fn selected_address(&self) -> Option<&Address> {
        let id = self.selected?;
        self.addresses.iter().find(|a| a.id == id)
    }

    fn contains(&self, id: AddressId) -> bool {
        self.addresses.iter().any(|a| a.id == id)
    }
}

/// Events applied to [`AddressState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressAction {
    LoadStarted,
    Loaded(Vec<Address>),
    LoadFailed(String),
    /// Server representation after a create or update.
    Saved(Address),
    Deleted(AddressId),
    Selected(Option<AddressId>),
    Cleared,
}

impl AddressState {
    /// Apply an action, returning the next state.
    #[must_use]
    pub fn reduce(mut self, action: AddressAction) -> Self {
        match action {
            AddressAction::LoadStarted => {
                self.loading = true;
            }
            AddressAction::Loaded(addresses) => {
                self.addresses = addresses;
                self.loading = false;
                self.error = None;
                if self.selected.is_some_and(|id| !self.contains(id)) {
                    self.selected = None;
                }
                if self.selected.is_none() {
                    self.selected = address::default_address(&self.addresses).map(|a| a.id);
                }
            }
            AddressAction::LoadFailed(error) => {
                self.loading = false;
                self.error = Some(error);
            }
            AddressAction::Saved(saved) => {
                match self.addresses.iter_mut().find(|a| a.id == saved.id) {
                    Some(existing) => *existing = saved,
                    None => self.addresses.push(saved),
                }
                self.error = None;
            }
            AddressAction::Deleted(id) => {
                self.addresses.retain(|a| a.id != id);
                if self.selected == Some(id) {
                    self.selected = None;
                }
            }
            AddressAction::Selected(id) => {
                self.selected = id;
            }
            AddressAction::Cleared => return Self::default(),
        }
        self
    }
}

/// The signed-in customer's shipping addresses.
#[derive(Clone)]
pub struct AddressBook {
    inner: Arc<AddressBookInner>,
}

struct AddressBookInner {
    api: ApiClient,
    state: watch::Sender<AddressState>,
}

impl AddressBook {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(AddressState::default());
        Self {
            inner: Arc::new(AddressBookInner { api, state }),
        }
    }

    fn dispatch(&self, action: AddressAction) {
        self.inner
            .state
            .send_modify(|state| *state = std::mem::take(state).reduce(action));
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> AddressState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AddressState> {
        self.inner.state.subscribe()
    }

    /// Load the customer's addresses.
    ///
    /// Addresses lacking a matching customer reference are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::SignInRequired`] when the session has no known
    /// customer, or [`AddressError::Api`] if the request fails. Request
    /// failures are also recorded in state.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Address>, AddressError> {
        let Some(customer) = self.inner.api.session().customer().await else {
            self.inner.api.navigate(Destination::SignIn);
            return Err(AddressError::SignInRequired);
        };

        self.dispatch(AddressAction::LoadStarted);
        let fetched = match self.inner.api.get_list::<Address>(ADDRESSES_PATH).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(error = %err, "address load failed");
                self.dispatch(AddressAction::LoadFailed(err.to_string()));
                return Err(err.into());
            }
        };

        let total = fetched.len();
        let owned = address::owned_by(fetched, customer);
        if owned.len() != total {
            warn!(dropped = total - owned.len(), "dropped addresses not owned by customer");
        }
        debug!(count = owned.len(), "addresses loaded");

        self.dispatch(AddressAction::Loaded(owned.clone()));
        Ok(owned)
    }

    /// Create an address from a validated draft.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Invalid`] for a missing required field, with
    /// no request sent, or [`AddressError::Api`] if the server rejects it.
    #[instrument(skip(self, draft))]
    pub async fn create(&self, draft: &AddressDraft) -> Result<Address, AddressError> {
        draft.validate()?;
        let saved: Address = self.inner.api.post(ADDRESSES_PATH, draft).await?;
        debug!(address = %saved.id, "address created");
        self.dispatch(AddressAction::Saved(saved.clone()));
        Ok(saved)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::EmptyPatch`] if nothing is set, or
    /// [`AddressError::Api`] if the server rejects it.
    #[instrument(skip(self, patch), fields(address = %id))]
    pub async fn update(&self, id: AddressId, patch: &AddressPatch) -> Result<Address, AddressError> {
        if patch.is_empty() {
            return Err(AddressError::EmptyPatch);
        }
        let saved: Address = self.inner.api.patch(&address_path(id), patch).await?;
        self.dispatch(AddressAction::Saved(saved.clone()));
        Ok(saved)
    }

    /// Delete an address, clearing the selection if it pointed there.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::Api`] if the request fails.
    #[instrument(skip(self), fields(address = %id))]
    pub async fn delete(&self, id: AddressId) -> Result<(), AddressError> {
        self.inner.api.delete(&address_path(id)).await?;
        self.dispatch(AddressAction::Deleted(id));
        Ok(())
    }

    /// Select an address from the loaded book.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError::UnknownAddress`] if `id` is not loaded.
    pub fn select(&self, id: AddressId) -> Result<(), AddressError> {
        if !self.inner.state.borrow().contains(id) {
            return Err(AddressError::UnknownAddress(id));
        }
        self.dispatch(AddressAction::Selected(Some(id)));
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.dispatch(AddressAction::Selected(None));
    }

    /// The selected address.
    #[must_use]
    pub fn selected(&self) -> Option<Address> {
        self.inner.state.borrow().selected_address().cloned()
    }

    /// Forget everything (sign-out).
    pub fn clear(&self) {
        self.dispatch(AddressAction::Cleared);
    }
}
