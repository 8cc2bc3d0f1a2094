//! Checkout state machine.
//!
//! ```text
//! idle -> order_creating -> order_created -> payment_opened -> verifying -> confirmed
//!                                                   \-> payment_failed
//! order_creating -> failed_to_create
//! verifying -> verification_failed
//! ```
//!
//! `failed_to_create` and `payment_failed` may re-enter `order_creating`.
//! `verification_failed` is final: payment may already be captured, so
//! nothing is retried automatically.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{CurrencyCode, OrderHandle, Price};

/// Server response to order creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrder {
    /// Storefront order handle.
    #[serde(rename = "order_uuid")]
    pub order: OrderHandle,
    /// Payment provider's own order reference.
    #[serde(rename = "razorpay_order_id")]
    pub provider_order_id: String,
    /// Amount in minor units (paise).
    #[serde(rename = "amount")]
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Publishable provider key for the widget.
    #[serde(rename = "razorpay_key")]
    pub provider_key: String,
}

impl PaymentOrder {
    /// Amount as a [`Price`].
    #[must_use]
    pub fn amount(&self) -> Price {
        Price::from_minor_units(self.amount_minor, self.currency)
    }
}

/// Proof of payment handed back by the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    #[serde(rename = "razorpay_payment_id")]
    pub provider_payment_id: String,
    #[serde(rename = "razorpay_order_id")]
    pub provider_order_id: String,
    #[serde(rename = "razorpay_signature")]
    pub provider_signature: String,
}

/// Failure reported by the payment widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    #[serde(default)]
    pub code: Option<String>,
    pub description: String,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.description),
            None => f.write_str(&self.description),
        }
    }
}

/// Why order creation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateFailure {
    /// Network or server error.
    Server(String),
    /// Authorization could not be renewed; the session was ended.
    SessionExpired,
}

/// Why a payment attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFailure {
    /// The widget reported a provider error.
    Provider(ProviderError),
    /// The widget closed without reporting, or the wait timed out.
    Abandoned,
}

/// Checkout progress for one orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckoutState {
    #[default]
    Idle,
    OrderCreating,
    OrderCreated(PaymentOrder),
    PaymentOpened(PaymentOrder),
    Verifying(PaymentOrder),
    Confirmed(OrderHandle),
    FailedToCreate(CreateFailure),
    PaymentFailed {
        order: OrderHandle,
        failure: PaymentFailure,
    },
    VerificationFailed {
        order: OrderHandle,
        reason: String,
    },
}

/// Inputs that move the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutEvent {
    PlaceOrder,
    OrderCreated(PaymentOrder),
    CreateFailed(CreateFailure),
    WidgetOpened,
    PaymentSucceeded,
    PaymentFailed(PaymentFailure),
    Verified,
    VerificationFailed(String),
    Reset,
    /// The driving task stopped before the attempt finished.
    Interrupted,
}

impl CheckoutEvent {
    /// Short name for logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PlaceOrder => "place_order",
            Self::OrderCreated(_) => "order_created",
            Self::CreateFailed(_) => "create_failed",
            Self::WidgetOpened => "widget_opened",
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed(_) => "payment_failed",
            Self::Verified => "verified",
            Self::VerificationFailed(_) => "verification_failed",
            Self::Reset => "reset",
            Self::Interrupted => "interrupted",
        }
    }
}

/// An event that is not valid in the current state.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply {event} in state {from}")]
pub struct InvalidTransition {
    pub from: &'static str,
    pub event: &'static str,
}

impl CheckoutState {
    /// Snake-case state name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::OrderCreating => "order_creating",
            Self::OrderCreated(_) => "order_created",
            Self::PaymentOpened(_) => "payment_opened",
            Self::Verifying(_) => "verifying",
            Self::Confirmed(_) => "confirmed",
            Self::FailedToCreate(_) => "failed_to_create",
            Self::PaymentFailed { .. } => "payment_failed",
            Self::VerificationFailed { .. } => "verification_failed",
        }
    }

    /// Whether "place order" may start a new attempt from here.
    #[must_use]
    pub const fn can_place_order(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::FailedToCreate(_) | Self::PaymentFailed { .. }
        )
    }

    /// Whether an attempt is between "place order" and a terminal state.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::OrderCreating | Self::OrderCreated(_) | Self::PaymentOpened(_) | Self::Verifying(_)
        )
    }

    /// Whether no further automatic progress will happen.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed(_)
                | Self::FailedToCreate(_)
                | Self::PaymentFailed { .. }
                | Self::VerificationFailed { .. }
        )
    }

    /// Order handle of the current or last attempt, if one exists.
    #[must_use]
    pub const fn order(&self) -> Option<OrderHandle> {
        match self {
            Self::OrderCreated(o) | Self::PaymentOpened(o) | Self::Verifying(o) => Some(o.order),
            Self::Confirmed(order)
            | Self::PaymentFailed { order, .. }
            | Self::VerificationFailed { order, .. } => Some(*order),
            Self::Idle | Self::OrderCreating | Self::FailedToCreate(_) => None,
        }
    }

    /// Apply `event`, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the event does not apply to the
    /// current state. The current state is left untouched by the caller.
    pub fn apply(&self, event: CheckoutEvent) -> Result<Self, InvalidTransition> {
        let next = match (self, event) {
            (s, CheckoutEvent::PlaceOrder) if s.can_place_order() => Self::OrderCreating,
            (Self::OrderCreating, CheckoutEvent::OrderCreated(order)) => Self::OrderCreated(order),
            (Self::OrderCreating, CheckoutEvent::CreateFailed(failure)) => {
                Self::FailedToCreate(failure)
            }
            (Self::OrderCreated(order), CheckoutEvent::WidgetOpened) => {
                Self::PaymentOpened(order.clone())
            }
            (Self::PaymentOpened(order), CheckoutEvent::PaymentSucceeded) => {
                Self::Verifying(order.clone())
            }
            (Self::PaymentOpened(order), CheckoutEvent::PaymentFailed(failure)) => {
                Self::PaymentFailed {
                    order: order.order,
                    failure,
                }
            }
            (Self::Verifying(order), CheckoutEvent::Verified) => Self::Confirmed(order.order),
            (Self::Verifying(order), CheckoutEvent::VerificationFailed(reason)) => {
                Self::VerificationFailed {
                    order: order.order,
                    reason,
                }
            }
            (Self::FailedToCreate(_) | Self::PaymentFailed { .. }, CheckoutEvent::Reset) => {
                Self::Idle
            }
            (
                Self::OrderCreating | Self::OrderCreated(_) | Self::PaymentOpened(_),
                CheckoutEvent::Interrupted,
            ) => Self::Idle,
            // Payment proof was already sent, so the outcome is unknown.
            (Self::Verifying(order), CheckoutEvent::Interrupted) => Self::VerificationFailed {
                order: order.order,
                reason: "verification interrupted".to_string(),
            },
            (s, event) => {
                return Err(InvalidTransition {
                    from: s.name(),
                    event: event.name(),
                });
            }
        };
        Ok(next)
    }

    /// Message for the user in terminal states.
    ///
    /// Each failure names a different next step, so no two share wording.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::Confirmed(order) => Some(format!("Order {order} confirmed. Thank you!")),
            Self::FailedToCreate(CreateFailure::Server(_)) => Some(
                "We couldn't create your order. Nothing was charged; please try placing it again."
                    .to_string(),
            ),
            Self::FailedToCreate(CreateFailure::SessionExpired) => {
                Some("Your session has expired. Please sign in again to continue.".to_string())
            }
            Self::PaymentFailed {
                failure: PaymentFailure::Provider(err),
                ..
            } => Some(format!(
                "Payment failed: {err}. Please retry the payment."
            )),
            Self::PaymentFailed {
                failure: PaymentFailure::Abandoned,
                ..
            } => Some(
                "The payment window was closed before payment completed. Please retry the payment."
                    .to_string(),
            ),
            Self::VerificationFailed { order, .. } => Some(format!(
                "We couldn't confirm your payment for order {order}. If you were charged, \
                 please contact support with this order reference; do not pay again."
            )),
            Self::Idle
            | Self::OrderCreating
            | Self::OrderCreated(_)
            | Self::PaymentOpened(_)
            | Self::Verifying(_) => None,
        }
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use uuid::Uuid;

    use super::*;

    fn payment_order() -> PaymentOrder {
        PaymentOrder {
            order: OrderHandle::new(Uuid::new_v4()),
            provider_order_id: "order_N8x1".to_string(),
            amount_minor: 1_250_000,
            currency: CurrencyCode::INR,
            provider_key: "rzp_test_key".to_string(),
        }
    }

    #[test]
    fn test_happy_path() {
        let order = payment_order();
        let state = CheckoutState::Idle
            .apply(CheckoutEvent::PlaceOrder)
            .unwrap()
            .apply(CheckoutEvent::OrderCreated(order.clone()))
            .unwrap()
            .apply(CheckoutEvent::WidgetOpened)
            .unwrap()
            .apply(CheckoutEvent::PaymentSucceeded)
            .unwrap()
            .apply(CheckoutEvent::Verified)
            .unwrap();
        assert_eq!(state, CheckoutState::Confirmed(order.order));
        assert!(state.is_terminal());
        assert!(!state.can_place_order());
    }

    #[test]
    fn test_payment_failure_is_retriable() {
        let state = CheckoutState::OrderCreating
            .apply(CheckoutEvent::OrderCreated(payment_order()))
            .unwrap()
            .apply(CheckoutEvent::WidgetOpened)
            .unwrap()
            .apply(CheckoutEvent::PaymentFailed(PaymentFailure::Abandoned))
            .unwrap();
        assert_eq!(state.name(), "payment_failed");
        assert_eq!(
            state.apply(CheckoutEvent::PlaceOrder).unwrap(),
            CheckoutState::OrderCreating
        );
    }

    #[test]
    fn test_verification_failure_is_final() {
        let state = CheckoutState::Verifying(payment_order())
            .apply(CheckoutEvent::VerificationFailed("signature mismatch".to_string()))
            .unwrap();
        assert!(state.is_terminal());
        assert!(state.apply(CheckoutEvent::PlaceOrder).is_err());
        assert!(state.apply(CheckoutEvent::Reset).is_err());
    }

    #[test]
    fn test_interrupted_attempt() {
        let opened = CheckoutState::PaymentOpened(payment_order());
        assert!(opened.is_in_progress());
        assert_eq!(
            opened.apply(CheckoutEvent::Interrupted).unwrap(),
            CheckoutState::Idle
        );
        assert_eq!(
            CheckoutState::OrderCreating
                .apply(CheckoutEvent::Interrupted)
                .unwrap(),
            CheckoutState::Idle
        );

        let order = payment_order();
        let state = CheckoutState::Verifying(order.clone())
            .apply(CheckoutEvent::Interrupted)
            .unwrap();
        assert!(matches!(
            state,
            CheckoutState::VerificationFailed { order: o, .. } if o == order.order
        ));

        assert!(!CheckoutState::Idle.is_in_progress());
        assert!(CheckoutState::Idle.apply(CheckoutEvent::Interrupted).is_err());
    }

    #[test]
    fn test_invalid_transition_names_both_sides() {
        let err = CheckoutState::Idle
            .apply(CheckoutEvent::Verified)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot apply verified in state idle");
    }

    #[test]
    fn test_place_order_not_allowed_while_in_progress() {
        assert!(CheckoutState::OrderCreating
            .apply(CheckoutEvent::PlaceOrder)
            .is_err());
        assert!(CheckoutState::PaymentOpened(payment_order())
            .apply(CheckoutEvent::PlaceOrder)
            .is_err());
    }

    #[test]
    fn test_terminal_failure_messages_are_distinct() {
        let order = payment_order().order;
        let states = [
            CheckoutState::FailedToCreate(CreateFailure::Server("502".to_string())),
            CheckoutState::FailedToCreate(CreateFailure::SessionExpired),
            CheckoutState::PaymentFailed {
                order,
                failure: PaymentFailure::Provider(ProviderError {
                    code: Some("BAD_REQUEST_ERROR".to_string()),
                    description: "Card declined".to_string(),
                }),
            },
            CheckoutState::VerificationFailed {
                order,
                reason: "timeout".to_string(),
            },
        ];
        let messages: HashSet<String> = states
            .iter()
            .map(|s| s.user_message().unwrap())
            .collect();
        assert_eq!(messages.len(), states.len());
    }

    #[test]
    fn test_payment_order_deserializes_provider_fields() {
        let json = serde_json::json!({
            "razorpay_order_id": "order_N8x1",
            "amount": 1_250_000,
            "currency": "INR",
            "razorpay_key": "rzp_test_key",
            "order_uuid": "0b8f4a34-8f5e-4a5e-9d87-5b0b7c1f2a11"
        });
        let order: PaymentOrder = serde_json::from_value(json).unwrap();
        assert_eq!(order.provider_order_id, "order_N8x1");
        assert_eq!(order.amount().to_string(), "₹12500.00");
    }
}
