//! Price Streaming Types
//!
//! Core domain types for streamed prices. These types are codec-agnostic
//! and represent the canonical internal representation of a price update.

use rust_decimal::Decimal;

use crate::domain::subscription::Symbol;

/// A streamed price, quoted in the feed's configured currency.
pub type Price = Decimal;

/// A routable price update for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    /// Symbol the update pertains to.
    pub symbol: Symbol,
    /// New price.
    pub price: Price,
}

impl PriceUpdate {
    /// Create a new price update.
    #[must_use]
    pub fn new(symbol: impl Into<Symbol>, price: Price) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Outcome of dispatching one update to the handlers of a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers invoked (including the ones that failed).
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
}

impl DispatchReport {
    /// Whether the update reached no handler at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.invoked == 0
    }

    /// Handlers that completed successfully.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.invoked - self.failed
    }
}
