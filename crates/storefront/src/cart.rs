//! Remote cart store.
//!
//! The server owns the cart. Every mutation is followed by a full reload of
//! the line collection instead of patching local state, and the latest
//! reload wins. Load and mutation failures land in [`CartState::error`] for
//! the UI to offer a retry; they are not returned to the caller.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use lustre_core::cart::{CartLineItem, cart_count, find_line};
use lustre_core::{CartLineId, ProductId, Quantity, QuantityError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::navigation::Destination;

/// Cart collection endpoint, relative to the API base URL.
pub const CART_PATH: &str = "cart/";

fn line_path(line: CartLineId) -> String {
    format!("{CART_PATH}{line}/")
}

/// Errors returned by [`CartStore::add`].
#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Quantity(#[from] QuantityError),
}

/// Observable cart state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartState {
    /// Lines from the most recent successful load.
    pub items: Vec<CartLineItem>,
    pub loading: bool,
    /// Message for a retry affordance after a failed load or mutation.
    pub error: Option<String>,
}

impl CartState {
    /// Total units in the cart.
    #[must_use]
    pub fn count(&self) -> u64 {
        cart_count(&self.items)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Events applied to [`CartState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    LoadStarted,
    Loaded(Vec<CartLineItem>),
    LoadFailed(String),
    MutationFailed(String),
    Cleared,
}

impl CartState {
    /// Apply an action, returning the next state.
    #[must_use]
    pub fn reduce(self, action: CartAction) -> Self {
        match action {
            CartAction::LoadStarted => Self {
                loading: true,
                ..self
            },
            CartAction::Loaded(items) => Self {
                items,
                loading: false,
                error: None,
            },
            CartAction::LoadFailed(error) | CartAction::MutationFailed(error) => Self {
                loading: false,
                error: Some(error),
                ..self
            },
            CartAction::Cleared => Self::default(),
        }
    }
}

/// Result of [`CartStore::add`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new line was created.
    Created,
    /// An existing line for the product was raised to `quantity`.
    Incremented { line: CartLineId, quantity: Quantity },
    /// Creation collided with a concurrently created line; the cart was
    /// reloaded instead.
    Reconciled,
    /// Another add for the same product is still outstanding; nothing was sent.
    AlreadyInFlight,
    /// No session; the user was sent to sign-in.
    SignInRequired,
}

#[derive(Serialize)]
struct NewLine {
    product: ProductId,
    quantity: Quantity,
}

#[derive(Serialize)]
struct QuantityUpdate {
    quantity: Quantity,
}

/// Releases a product's in-flight flag when dropped.
struct InFlight<'a> {
    products: &'a Mutex<HashSet<ProductId>>,
    product: ProductId,
}

impl<'a> InFlight<'a> {
    fn acquire(products: &'a Mutex<HashSet<ProductId>>, product: ProductId) -> Option<Self> {
        let inserted = products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(product);
        inserted.then_some(Self { products, product })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.products
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.product);
    }
}

/// Client-side view of the server cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

struct CartStoreInner {
    api: ApiClient,
    state: watch::Sender<CartState>,
    adding: Mutex<HashSet<ProductId>>,
}

impl CartStore {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(CartState::default());
        Self {
            inner: Arc::new(CartStoreInner {
                api,
                state,
                adding: Mutex::new(HashSet::new()),
            }),
        }
    }

    fn dispatch(&self, action: CartAction) {
        self.inner
            .state
            .send_modify(|state| *state = std::mem::take(state).reduce(action));
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> CartState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.inner.state.subscribe()
    }

    /// Total units in the cart.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.state.borrow().count()
    }

    /// Load the server cart and publish it.
    async fn load(&self) -> Result<Vec<CartLineItem>, ApiError> {
        self.dispatch(CartAction::LoadStarted);
        match self.inner.api.get_list::<CartLineItem>(CART_PATH).await {
            Ok(items) => {
                debug!(lines = items.len(), "cart loaded");
                self.dispatch(CartAction::Loaded(items.clone()));
                Ok(items)
            }
            Err(err) => {
                warn!(error = %err, "cart load failed");
                self.dispatch(CartAction::LoadFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Replace local state with the server cart.
    ///
    /// A signed-out session clears the cart instead of calling the server.
    #[instrument(skip(self))]
    pub async fn fetch(&self) {
        if !self.inner.api.session().is_authenticated().await {
            self.dispatch(CartAction::Cleared);
            return;
        }
        // Failure is already recorded in state.
        let _ = self.load().await;
    }

    /// Add `quantity` units of `product`.
    ///
    /// Reads the live cart first. An existing line is raised by `quantity`;
    /// otherwise a line is created. A second call for the same product while
    /// one is outstanding sends nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Api`] if the cart cannot be read or the line
    /// cannot be created or updated, and [`CartError::Quantity`] if the summed
    /// quantity overflows. The error is also recorded in state.
    #[instrument(skip(self), fields(product = %product, quantity = %quantity))]
    pub async fn add(&self, product: ProductId, quantity: Quantity) -> Result<AddOutcome, CartError> {
        if !self.inner.api.session().is_authenticated().await {
            self.inner.api.navigate(Destination::SignIn);
            return Ok(AddOutcome::SignInRequired);
        }

        let Some(_guard) = InFlight::acquire(&self.inner.adding, product) else {
            debug!("add already in flight for product");
            return Ok(AddOutcome::AlreadyInFlight);
        };

        let lines = self.load().await?;

        if let Some(existing) = find_line(&lines, product) {
            let summed = match existing.quantity.checked_add(quantity) {
                Ok(summed) => summed,
                Err(err) => {
                    self.dispatch(CartAction::MutationFailed(err.to_string()));
                    return Err(err.into());
                }
            };
            self.try_update(existing.id, summed).await?;
            return Ok(AddOutcome::Incremented {
                line: existing.id,
                quantity: summed,
            });
        }

        let created = self
            .inner
            .api
            .post_discard(CART_PATH, &NewLine { product, quantity })
            .await;

        match created {
            Ok(()) => {
                info!("cart line created");
                let _ = self.load().await;
                Ok(AddOutcome::Created)
            }
            Err(err) if err.is_duplicate() => {
                info!("cart line already exists, reconciling");
                let _ = self.load().await;
                Ok(AddOutcome::Reconciled)
            }
            Err(err) => {
                warn!(error = %err, "cart line create failed");
                self.dispatch(CartAction::MutationFailed(err.to_string()));
                Err(err.into())
            }
        }
    }

    async fn try_update(&self, line: CartLineId, quantity: Quantity) -> Result<(), ApiError> {
        let patched = self
            .inner
            .api
            .patch_discard(&line_path(line), &QuantityUpdate { quantity })
            .await;
        if let Err(err) = patched {
            warn!(error = %err, line = %line, "cart line update failed");
            self.dispatch(CartAction::MutationFailed(err.to_string()));
            return Err(err);
        }
        let _ = self.load().await;
        Ok(())
    }

    /// Set a line's quantity, then reload the cart.
    ///
    /// Lowering a line to zero is [`CartStore::remove`].
    #[instrument(skip(self), fields(line = %line, quantity = %quantity))]
    pub async fn update(&self, line: CartLineId, quantity: Quantity) {
        let _ = self.try_update(line, quantity).await;
    }

    /// Delete a line, then reload the cart.
    #[instrument(skip(self), fields(line = %line))]
    pub async fn remove(&self, line: CartLineId) {
        if let Err(err) = self.inner.api.delete(&line_path(line)).await {
            warn!(error = %err, "cart line delete failed");
            self.dispatch(CartAction::MutationFailed(err.to_string()));
            return;
        }
        let _ = self.load().await;
    }

    /// Forget all local cart state (sign-out).
    pub fn clear(&self) {
        self.dispatch(CartAction::Cleared);
    }
}
