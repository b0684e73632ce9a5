//! Port Interfaces
//!
//! Defines the interfaces (ports) between the subscription logic and the
//! transport, following the Hexagonal Architecture pattern. These are the
//! contracts that infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FrameSink`: writes an encoded frame to the live transport
//! - `CommandSender`: accepts subscription commands bound for the feed
//!
//! ## Driver Ports (Inbound)
//!
//! - `PriceDispatcher`: receives decoded price updates from the connection

use crate::domain::streaming::{DispatchReport, Price};
use crate::domain::subscription::SubscriptionId;

/// Error writing a frame to the transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The transport has gone away.
    #[error("transport closed")]
    Closed,
}

/// Writable half of an open transport.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSink: Send + Sync {
    /// Write one encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Closed`] if the transport can no longer accept frames.
    fn write(&self, frame: String) -> Result<(), SinkError>;
}

/// Subscription command direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionAction {
    /// Start receiving updates for a subscription.
    Add,
    /// Stop receiving updates for a subscription.
    Remove,
}

/// A subscribe or unsubscribe command for one subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCommand {
    /// Command direction.
    pub action: SubscriptionAction,
    /// Subscription the command applies to.
    pub subscription: SubscriptionId,
}

impl SubscriptionCommand {
    /// Subscribe command.
    #[must_use]
    pub const fn add(subscription: SubscriptionId) -> Self {
        Self {
            action: SubscriptionAction::Add,
            subscription,
        }
    }

    /// Unsubscribe command.
    #[must_use]
    pub const fn remove(subscription: SubscriptionId) -> Self {
        Self {
            action: SubscriptionAction::Remove,
            subscription,
        }
    }
}

/// Outbound path for subscription commands. Fire-and-forget.
#[cfg_attr(test, mockall::automock)]
pub trait CommandSender: Send + Sync {
    /// Hand a command to the transport, now or once it is ready.
    fn send_command(&self, command: &SubscriptionCommand);
}

/// Receiver of decoded price updates.
pub trait PriceDispatcher: Send + Sync {
    /// Deliver `price` to everything registered for `symbol`.
    fn dispatch(&self, symbol: &str, price: Price) -> DispatchReport;
}
