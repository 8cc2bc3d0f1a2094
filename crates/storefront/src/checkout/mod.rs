//! Checkout orchestrator.
//!
//! Drives one order attempt at a time through the
//! [`CheckoutState`](lustre_core::checkout::CheckoutState) machine:
//!
//! 1. Validate the request locally (address selected, cart not empty)
//! 2. `POST checkout/create_order/` for a payment order
//! 3. Open the [`PaymentWidget`] and wait for its single report
//! 4. `POST verify-payment/` with the payment proof
//! 5. Show the order confirmation and reload the cart
//!
//! Verification is never retried. A payment may already be captured when
//! verification fails, so that state is final and the user is directed to
//! support.
//!
//! Dropping a [`Checkout::place_order`] future leaves the attempt in an
//! in-progress state; [`Checkout::reset`] recovers it.

mod payment;

pub use payment::{PaymentCallback, PaymentOutcome, PaymentRequest, PaymentWidget};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lustre_core::checkout::{
    CheckoutEvent, CheckoutState, CreateFailure, InvalidTransition, PaymentFailure, PaymentOrder,
    PaymentProof,
};
use lustre_core::{AddressId, OrderHandle};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::api::{ApiClient, ApiError};
use crate::cart::CartStore;
use crate::navigation::Destination;

/// Order creation endpoint, relative to the API base URL.
pub const CREATE_ORDER_PATH: &str = "checkout/create_order/";

/// Payment verification endpoint, relative to the API base URL.
pub const VERIFY_PAYMENT_PATH: &str = "verify-payment/";

/// Reasons "place order" was refused without leaving the current state.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please select a shipping address before placing your order.")]
    MissingAddress,

    #[error("Your cart is empty.")]
    EmptyCart,

    #[error(transparent)]
    InvalidState(#[from] InvalidTransition),
}

/// Inputs for one order attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Selected shipping address.
    pub address: Option<AddressId>,
    /// Applied coupon code, already validated client-side.
    pub coupon_code: Option<String>,
    /// Units in the cart.
    pub item_count: u64,
}

#[derive(Serialize)]
struct CreateOrder<'a> {
    address_id: AddressId,
    coupon_code: Option<&'a str>,
}

#[derive(Serialize)]
struct VerifyPayment<'a> {
    #[serde(flatten)]
    proof: &'a PaymentProof,
    order_uuid: OrderHandle,
}

/// Checkout flow for a signed-in customer.
#[derive(Clone)]
pub struct Checkout {
    inner: Arc<CheckoutInner>,
}

struct CheckoutInner {
    api: ApiClient,
    widget: Arc<dyn PaymentWidget>,
    cart: Option<CartStore>,
    payment_timeout: Option<Duration>,
    state: watch::Sender<CheckoutState>,
    in_flight: AtomicBool,
}

/// Marks an attempt as driven until dropped.
struct Attempt<'a>(&'a AtomicBool);

impl<'a> Attempt<'a> {
    fn start(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Checkout {
    /// Create an orchestrator in `idle`.
    ///
    /// With a `payment_timeout`, an open widget that has not reported within
    /// that time counts as abandoned.
    #[must_use]
    pub fn new(
        api: ApiClient,
        widget: Arc<dyn PaymentWidget>,
        payment_timeout: Option<Duration>,
    ) -> Self {
        Self::build(api, widget, None, payment_timeout)
    }

    /// Like [`Checkout::new`], reloading `cart` after a confirmed order.
    #[must_use]
    pub fn with_cart(
        api: ApiClient,
        widget: Arc<dyn PaymentWidget>,
        cart: CartStore,
        payment_timeout: Option<Duration>,
    ) -> Self {
        Self::build(api, widget, Some(cart), payment_timeout)
    }

    fn build(
        api: ApiClient,
        widget: Arc<dyn PaymentWidget>,
        cart: Option<CartStore>,
        payment_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            inner: Arc::new(CheckoutInner {
                api,
                widget,
                cart,
                payment_timeout,
                state,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Latest state snapshot.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.inner.state.borrow().clone()
    }

    /// Subscribe to state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.inner.state.subscribe()
    }

    fn transition(&self, event: CheckoutEvent) -> Result<CheckoutState, InvalidTransition> {
        let mut outcome = Ok(());
        self.inner.state.send_if_modified(|state| match state.apply(event) {
            Ok(next) => {
                info!(from = %state, to = %next, "checkout transition");
                *state = next;
                true
            }
            Err(err) => {
                outcome = Err(err);
                false
            }
        });
        outcome.map(|()| self.state())
    }

    /// Run one order attempt to a terminal state.
    ///
    /// Returns the terminal state. Network and payment failures are states,
    /// not errors.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::MissingAddress`] or
    /// [`CheckoutError::EmptyCart`] before anything is sent, and
    /// [`CheckoutError::InvalidState`] while an attempt is in progress or
    /// after a final outcome.
    #[instrument(skip(self, request), fields(address = ?request.address))]
    pub async fn place_order(&self, request: &CheckoutRequest) -> Result<CheckoutState, CheckoutError> {
        let Some(address) = request.address else {
            return Err(CheckoutError::MissingAddress);
        };
        if request.item_count == 0 {
            return Err(CheckoutError::EmptyCart);
        }
        self.transition(CheckoutEvent::PlaceOrder)?;
        let _attempt = Attempt::start(&self.inner.in_flight);

        let order = match self.create_order(address, request.coupon_code.as_deref()).await {
            Ok(order) => order,
            Err(err) => {
                warn!(error = %err, "order creation failed");
                let failure = match err {
                    ApiError::AuthExpired => CreateFailure::SessionExpired,
                    other => CreateFailure::Server(other.to_string()),
                };
                return Ok(self.transition(CheckoutEvent::CreateFailed(failure))?);
            }
        };
        info!(order = %order.order, amount = %order.amount(), "order created");
        self.transition(CheckoutEvent::OrderCreated(order.clone()))?;

        let proof = match self.collect_payment(&order).await? {
            Ok(proof) => proof,
            Err(failure) => {
                warn!(order = %order.order, ?failure, "payment failed");
                return Ok(self.transition(CheckoutEvent::PaymentFailed(failure))?);
            }
        };
        self.transition(CheckoutEvent::PaymentSucceeded)?;

        let verified = self
            .inner
            .api
            .post_discard(
                VERIFY_PAYMENT_PATH,
                &VerifyPayment {
                    proof: &proof,
                    order_uuid: order.order,
                },
            )
            .await;
        if let Err(err) = verified {
            error!(
                order = %order.order,
                payment = %proof.provider_payment_id,
                error = %err,
                "payment verification failed"
            );
            return Ok(self.transition(CheckoutEvent::VerificationFailed(err.to_string()))?);
        }

        let confirmed = self.transition(CheckoutEvent::Verified)?;
        info!(order = %order.order, "order confirmed");
        self.inner
            .api
            .navigate(Destination::OrderConfirmation(order.order));
        if let Some(cart) = &self.inner.cart {
            cart.fetch().await;
        }
        Ok(confirmed)
    }

    async fn create_order(
        &self,
        address: AddressId,
        coupon_code: Option<&str>,
    ) -> Result<PaymentOrder, ApiError> {
        self.inner
            .api
            .post(
                CREATE_ORDER_PATH,
                &CreateOrder {
                    address_id: address,
                    coupon_code,
                },
            )
            .await
    }

    /// Open the widget and wait for its report.
    async fn collect_payment(
        &self,
        order: &PaymentOrder,
    ) -> Result<Result<PaymentProof, PaymentFailure>, InvalidTransition> {
        let (callback, rx) = PaymentCallback::channel();
        self.transition(CheckoutEvent::WidgetOpened)?;
        self.inner.widget.open(PaymentRequest::from(order), callback);

        let received = match self.inner.payment_timeout {
            Some(limit) => tokio::time::timeout(limit, rx).await.ok().and_then(Result::ok),
            None => rx.await.ok(),
        };

        Ok(match received {
            Some(PaymentOutcome::Succeeded(proof)) => Ok(proof),
            Some(PaymentOutcome::Failed(err)) => Err(PaymentFailure::Provider(err)),
            None => {
                warn!(order = %order.order, "payment widget closed or timed out without reporting");
                Err(PaymentFailure::Abandoned)
            }
        })
    }

    /// Return a retriable failure to `idle`.
    ///
    /// An attempt whose `place_order` future was dropped is recovered too:
    /// before payment it returns to `idle`; during verification it becomes
    /// `verification_failed`, since the payment may have been captured.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] while `place_order` is still running,
    /// and from `confirmed` or `verification_failed`.
    pub fn reset(&self) -> Result<CheckoutState, InvalidTransition> {
        let current = self.state();
        if self.inner.in_flight.load(Ordering::Acquire) {
            return Err(InvalidTransition {
                from: current.name(),
                event: CheckoutEvent::Reset.name(),
            });
        }
        if current.is_in_progress() {
            warn!(state = %current, "recovering interrupted checkout attempt");
            return self.transition(CheckoutEvent::Interrupted);
        }
        self.transition(CheckoutEvent::Reset)
    }
}
