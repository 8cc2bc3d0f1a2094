//! Navigation port.
//!
//! The client never renders anything itself. When a flow needs the user to
//! move somewhere (sign in again, view a confirmed order) it tells the
//! [`Navigator`] supplied by the embedding UI.

use std::sync::{Mutex, PoisonError};

use lustre_core::OrderHandle;
use tracing::info;

/// Where a flow wants the user to go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    /// Sign-in screen, after the session ended or for a signed-out action.
    SignIn,
    /// Confirmation view for a paid and verified order.
    OrderConfirmation(OrderHandle),
}

/// Receives navigation requests from the client.
pub trait Navigator: Send + Sync {
    /// Move the user to `destination`.
    fn navigate(&self, destination: Destination);
}

/// Navigator that only logs requests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNavigator;

impl Navigator for LoggingNavigator {
    fn navigate(&self, destination: Destination) {
        match destination {
            Destination::SignIn => info!("navigate: sign-in"),
            Destination::OrderConfirmation(order) => {
                info!(order = %order, "navigate: order confirmation");
            }
        }
    }
}

/// Navigator that remembers every request, for tests and headless drivers.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visits: Mutex<Vec<Destination>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All destinations requested so far, oldest first.
    #[must_use]
    pub fn visits(&self) -> Vec<Destination> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The most recent destination.
    #[must_use]
    pub fn last(&self) -> Option<Destination> {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, destination: Destination) {
        self.visits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_navigator_keeps_order() {
        let nav = RecordingNavigator::new();
        assert!(nav.last().is_none());
        nav.navigate(Destination::SignIn);
        nav.navigate(Destination::SignIn);
        assert_eq!(nav.visits(), vec![Destination::SignIn, Destination::SignIn]);
        assert_eq!(nav.last(), Some(Destination::SignIn));
    }
}
