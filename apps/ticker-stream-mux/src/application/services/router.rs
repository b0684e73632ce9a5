//! Subscription Router
//!
//! Owns the symbol to handlers mapping, translates subscribe/unsubscribe
//! calls into feed commands and demultiplexes inbound price updates.
//!
//! # Dispatch Semantics
//!
//! - Handlers for a symbol run synchronously, in registration order.
//! - The handler list is copied before any handler runs and no lock is held
//!   while they run. A handler that subscribes or unsubscribes does not
//!   change the dispatch already in progress.
//! - A handler that returns an error or panics is logged and skipped; the
//!   remaining handlers for the same update still run.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::application::ports::{CommandSender, PriceDispatcher, SubscriptionCommand};
use crate::domain::streaming::{DispatchReport, Price};
use crate::domain::subscription::{
    HandlerRegistry, HandlerResult, RegistryStats, SubscriptionId, Symbol,
};

/// Routes subscriptions out to the feed and price updates back to callers.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ticker_stream_mux::application::ports::{CommandSender, SubscriptionCommand};
/// use ticker_stream_mux::application::services::SubscriptionRouter;
/// use rust_decimal::Decimal;
///
/// struct Discard;
/// impl CommandSender for Discard {
///     fn send_command(&self, _command: &SubscriptionCommand) {}
/// }
///
/// let router = SubscriptionRouter::new(Arc::new(Discard), "USD");
/// router.subscribe("BTC", |price| {
///     println!("BTC is now {price}");
///     Ok(())
/// });
///
/// let report = router.dispatch("BTC", Decimal::from(50_000));
/// assert_eq!(report.invoked, 1);
/// ```
pub struct SubscriptionRouter {
    registry: HandlerRegistry,
    commands: Arc<dyn CommandSender>,
    quote_currency: String,
}

impl SubscriptionRouter {
    /// Create a router that emits commands through `commands`.
    #[must_use]
    pub fn new(commands: Arc<dyn CommandSender>, quote_currency: impl Into<String>) -> Self {
        Self {
            registry: HandlerRegistry::new(),
            commands,
            quote_currency: quote_currency.into(),
        }
    }

    /// Register `callback` for `symbol` and emit a subscribe command.
    ///
    /// The command is emitted even if the symbol already has handlers; the
    /// feed treats repeated subscribes as idempotent.
    pub fn subscribe<F>(&self, symbol: &str, callback: F)
    where
        F: Fn(Price) -> HandlerResult + Send + Sync + 'static,
    {
        let handlers = self.registry.add(symbol, Arc::new(callback));
        tracing::debug!(symbol, handlers, "Price handler registered");

        self.commands
            .send_command(&SubscriptionCommand::add(self.subscription_id(symbol)));
    }

    /// Drop every handler for `symbol` and emit an unsubscribe command.
    ///
    /// The command is emitted even if nothing was registered.
    pub fn unsubscribe(&self, symbol: &str) {
        let removed = self.registry.remove(symbol);
        tracing::debug!(symbol, removed, "Price handlers removed");

        self.commands
            .send_command(&SubscriptionCommand::remove(self.subscription_id(symbol)));
    }

    /// Invoke every handler registered for `symbol` with `price`.
    ///
    /// Unknown symbols are ignored.
    pub fn dispatch(&self, symbol: &str, price: Price) -> DispatchReport {
        let Some(handlers) = self.registry.snapshot(symbol) else {
            tracing::trace!(symbol, "No handlers for price update");
            return DispatchReport::default();
        };

        let mut report = DispatchReport::default();

        for handler in &handlers {
            report.invoked += 1;

            match panic::catch_unwind(AssertUnwindSafe(|| handler(price))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(symbol, %price, error = %e, "Price handler failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(ToString::to_string)
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(symbol, %price, %reason, "Price handler panicked");
                }
            }
        }

        report
    }

    /// Subscription identifier used on the wire for `symbol`.
    #[must_use]
    pub fn subscription_id(&self, symbol: &str) -> SubscriptionId {
        SubscriptionId::aggregate(symbol, &self.quote_currency)
    }

    /// Configured quote currency.
    #[must_use]
    pub fn quote_currency(&self) -> &str {
        &self.quote_currency
    }

    /// Symbols that currently have handlers.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.registry.symbols()
    }

    /// Number of handlers registered for `symbol`.
    #[must_use]
    pub fn handler_count(&self, symbol: &str) -> usize {
        self.registry.handler_count(symbol)
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }
}

impl PriceDispatcher for SubscriptionRouter {
    fn dispatch(&self, symbol: &str, price: Price) -> DispatchReport {
        Self::dispatch(self, symbol, price)
    }
}

impl std::fmt::Debug for SubscriptionRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRouter")
            .field("registry", &self.registry)
            .field("quote_currency", &self.quote_currency)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
