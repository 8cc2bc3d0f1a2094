//! Payment widget port.
//!
//! The widget is an external component that collects payment and reports
//! back exactly once. [`PaymentCallback`] is consumed by either outcome, so a
//! second report cannot be expressed. Dropping it unused reports nothing,
//! which the orchestrator treats as abandonment.

use lustre_core::checkout::{PaymentOrder, PaymentProof, ProviderError};
use lustre_core::{OrderHandle, Price};
use tokio::sync::oneshot;

/// What the widget needs to collect a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Storefront order handle.
    pub order: OrderHandle,
    /// Provider's order reference.
    pub provider_order_id: String,
    /// Publishable provider key.
    pub provider_key: String,
    pub amount: Price,
    /// Amount in minor units, as the provider expects it.
    pub amount_minor: i64,
}

impl From<&PaymentOrder> for PaymentRequest {
    fn from(order: &PaymentOrder) -> Self {
        Self {
            order: order.order,
            provider_order_id: order.provider_order_id.clone(),
            provider_key: order.provider_key.clone(),
            amount: order.amount(),
            amount_minor: order.amount_minor,
        }
    }
}

/// The widget's single report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded(PaymentProof),
    Failed(ProviderError),
}

/// Single-shot reply channel handed to the widget.
#[derive(Debug)]
pub struct PaymentCallback {
    tx: oneshot::Sender<PaymentOutcome>,
}

impl PaymentCallback {
    /// Create a callback and the receiver the orchestrator waits on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<PaymentOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report a successful payment.
    pub fn succeed(self, proof: PaymentProof) {
        self.report(PaymentOutcome::Succeeded(proof));
    }

    /// Report a provider failure.
    pub fn fail(self, error: ProviderError) {
        self.report(PaymentOutcome::Failed(error));
    }

    /// Report either outcome.
    pub fn report(self, outcome: PaymentOutcome) {
        // The orchestrator may have timed out and stopped listening.
        let _ = self.tx.send(outcome);
    }
}

/// An external payment widget.
///
/// `open` must return promptly; the outcome is delivered later through the
/// callback, possibly from another task or thread.
pub trait PaymentWidget: Send + Sync {
    /// Show the widget for `request`.
    fn open(&self, request: PaymentRequest, callback: PaymentCallback);
}
