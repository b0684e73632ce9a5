//! Subscription Registry Types
//!
//! Domain types for tracking which callers want price updates for which
//! tickers, and for naming those subscriptions on the wire.
//!
//! # Design
//!
//! The handler registry tracks:
//! - The ordered list of price handlers registered for each symbol
//! - Nothing per caller: unsubscribing a symbol drops every handler for it
//!
//! Many callers can register for the same symbol while the feed only ever
//! sees one subscription identifier per symbol.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::domain::streaming::Price;

// =============================================================================
// Types
// =============================================================================

/// A ticker symbol (e.g. `BTC`). Matched exactly, never normalised.
pub type Symbol = String;

/// Error returned by a price handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a price handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Callback invoked with every new price for a subscribed symbol.
pub type PriceHandler = Arc<dyn Fn(Price) -> HandlerResult + Send + Sync>;

/// Message-kind tag of the cross-exchange aggregate index.
pub const AGGREGATE_INDEX: &str = "5";

/// Exchange tag used for aggregate index subscriptions.
pub const AGGREGATE_EXCHANGE: &str = "CCCAGG";

/// Separator between the parts of a subscription identifier.
const ID_SEPARATOR: char = '~';

// =============================================================================
// Subscription Identifier
// =============================================================================

/// Wire-level key the feed uses for a subscription.
///
/// Rendered as `<index>~<exchange>~<symbol>~<quote>`, e.g. `5~CCCAGG~BTC~USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    index: String,
    exchange: String,
    symbol: Symbol,
    quote_currency: String,
}

impl SubscriptionId {
    /// Aggregate index subscription for `symbol` quoted in `quote_currency`.
    #[must_use]
    pub fn aggregate(symbol: &str, quote_currency: &str) -> Self {
        Self {
            index: AGGREGATE_INDEX.to_string(),
            exchange: AGGREGATE_EXCHANGE.to_string(),
            symbol: symbol.to_string(),
            quote_currency: quote_currency.to_string(),
        }
    }

    /// The ticker symbol.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The quote currency.
    #[must_use]
    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// The index (message-kind) tag.
    #[must_use]
    pub fn index(&self) -> &str {
        &self.index
    }

    /// The exchange tag.
    #[must_use]
    pub fn exchange(&self) -> &str {
        &self.exchange
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{ID_SEPARATOR}{}{ID_SEPARATOR}{}{ID_SEPARATOR}{}",
            self.index, self.exchange, self.symbol, self.quote_currency
        )
    }
}

/// Error parsing a subscription identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid subscription identifier: {0}")]
pub struct InvalidSubscriptionId(pub String);

impl FromStr for SubscriptionId {
    type Err = InvalidSubscriptionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(ID_SEPARATOR).collect();
        match parts.as_slice() {
            [index, exchange, symbol, quote]
                if [index, exchange, symbol, quote].iter().all(|p| !p.is_empty()) =>
            {
                Ok(Self {
                    index: (*index).to_string(),
                    exchange: (*exchange).to_string(),
                    symbol: (*symbol).to_string(),
                    quote_currency: (*quote).to_string(),
                })
            }
            _ => Err(InvalidSubscriptionId(s.to_string())),
        }
    }
}

// =============================================================================
// Handler Registry
// =============================================================================

/// Symbol to handlers mapping shared by every caller of the feed.
///
/// Invariant: the handlers stored for a symbol are exactly the registrations
/// made since that symbol was last removed, in registration order.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ticker_stream_mux::domain::subscription::HandlerRegistry;
///
/// let registry = HandlerRegistry::new();
///
/// assert_eq!(registry.add("BTC", Arc::new(|_| Ok(()))), 1);
/// assert_eq!(registry.add("BTC", Arc::new(|_| Ok(()))), 2);
///
/// // Removal is all-or-nothing per symbol
/// assert_eq!(registry.remove("BTC"), 2);
/// assert!(registry.snapshot("BTC").is_none());
/// ```
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<Symbol, Vec<PriceHandler>>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `symbol`, creating the entry if absent.
    ///
    /// Returns the number of handlers now registered for the symbol.
    pub fn add(&self, symbol: &str, handler: PriceHandler) -> usize {
        let mut handlers = self.handlers.write();
        let entry = handlers.entry(symbol.to_string()).or_default();
        entry.push(handler);
        entry.len()
    }

    /// Remove every handler for `symbol`.
    ///
    /// Returns how many handlers were removed (0 if the symbol was unknown).
    pub fn remove(&self, symbol: &str) -> usize {
        self.handlers.write().remove(symbol).map_or(0, |h| h.len())
    }

    /// Copy of the handler list for `symbol`, or `None` if nothing is registered.
    ///
    /// The lock is released before this returns, so callers can invoke the
    /// handlers while the registry is being modified.
    #[must_use]
    pub fn snapshot(&self, symbol: &str) -> Option<Vec<PriceHandler>> {
        self.handlers.read().get(symbol).cloned()
    }

    /// Number of handlers registered for `symbol`.
    #[must_use]
    pub fn handler_count(&self, symbol: &str) -> usize {
        self.handlers.read().get(symbol).map_or(0, Vec::len)
    }

    /// All symbols with at least one handler.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.handlers.read().keys().cloned().collect()
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let handlers = self.handlers.read();
        RegistryStats {
            symbol_count: handlers.len(),
            handler_count: handlers.values().map(Vec::len).sum(),
        }
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("HandlerRegistry")
            .field("symbol_count", &stats.symbol_count)
            .field("handler_count", &stats.handler_count)
            .finish()
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Statistics for the handler registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of symbols with handlers.
    pub symbol_count: usize,
    /// Number of handlers across all symbols.
    pub handler_count: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> PriceHandler {
        Arc::new(|_| Ok(()))
    }

    #[test]
    fn subscription_id_formats_aggregate() {
        let id = SubscriptionId::aggregate("BTC", "USD");
        assert_eq!(id.to_string(), "5~CCCAGG~BTC~USD");
        assert_eq!(id.symbol(), "BTC");
        assert_eq!(id.quote_currency(), "USD");
        assert_eq!(id.index(), AGGREGATE_INDEX);
        assert_eq!(id.exchange(), AGGREGATE_EXCHANGE);
    }

    #[test]
    fn subscription_id_parses_wire_form() {
        let id: SubscriptionId = "5~CCCAGG~ETH~EUR".parse().unwrap();
        assert_eq!(id, SubscriptionId::aggregate("ETH", "EUR"));
    }

    #[test]
    fn subscription_id_rejects_malformed() {
        assert!("5~CCCAGG~ETH".parse::<SubscriptionId>().is_err());
        assert!("5~~ETH~USD".parse::<SubscriptionId>().is_err());
        assert!("".parse::<SubscriptionId>().is_err());
    }

    #[test]
    fn symbols_are_not_normalised() {
        let registry = HandlerRegistry::new();
        registry.add("btc", noop());

        assert!(registry.snapshot("BTC").is_none());
        assert_eq!(registry.handler_count("btc"), 1);
    }

    #[test]
    fn add_extends_existing_entry() {
        let registry = HandlerRegistry::new();

        assert_eq!(registry.add("BTC", noop()), 1);
        assert_eq!(registry.add("BTC", noop()), 2);
        assert_eq!(registry.add("ETH", noop()), 1);

        assert_eq!(registry.handler_count("BTC"), 2);
        assert_eq!(registry.handler_count("ETH"), 1);
    }

    #[test]
    fn remove_drops_every_handler_for_symbol() {
        let registry = HandlerRegistry::new();
        registry.add("BTC", noop());
        registry.add("BTC", noop());
        registry.add("ETH", noop());

        assert_eq!(registry.remove("BTC"), 2);
        assert!(registry.snapshot("BTC").is_none());
        assert_eq!(registry.handler_count("ETH"), 1);
    }

    #[test]
    fn remove_unknown_symbol_is_noop() {
        let registry = HandlerRegistry::new();
        registry.add("ETH", noop());

        assert_eq!(registry.remove("BTC"), 0);
        assert_eq!(registry.stats().symbol_count, 1);
    }

    #[test]
    fn snapshot_is_detached_from_registry() {
        let registry = HandlerRegistry::new();
        registry.add("BTC", noop());

        let snapshot = registry.snapshot("BTC").unwrap();
        registry.remove("BTC");

        assert_eq!(snapshot.len(), 1);
        assert!(registry.snapshot("BTC").is_none());
    }

    #[test]
    fn stats_are_accurate() {
        let registry = HandlerRegistry::new();
        registry.add("BTC", noop());
        registry.add("BTC", noop());
        registry.add("ETH", noop());

        assert_eq!(
            registry.stats(),
            RegistryStats {
                symbol_count: 2,
                handler_count: 3,
            }
        );

        let mut symbols = registry.symbols();
        symbols.sort();
        assert_eq!(symbols, vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn thread_safety_concurrent_adds() {
        use std::thread;

        let registry = Arc::new(HandlerRegistry::new());
        let mut handles = vec![];

        for i in 0..10 {
            let r = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                r.add(&format!("SYM{i}"), noop());
                r.add("SHARED", noop());
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.handler_count("SHARED"), 10);
        // 10 unique symbols + 1 shared
        assert_eq!(registry.stats().symbol_count, 11);
    }
}
