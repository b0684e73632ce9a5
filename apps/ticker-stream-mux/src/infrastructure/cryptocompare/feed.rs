//! Price Feed
//!
//! The caller-facing handle. One `PriceFeed` owns the connection manager and
//! the subscription router for a single streamer connection; share it with
//! `Arc` instead of keeping process-wide state.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::client::{StreamClient, StreamClientError};
use super::connection::{ConnectionManager, ConnectionStatus};
use crate::application::ports::FrameSink;
use crate::application::services::SubscriptionRouter;
use crate::domain::streaming::{DispatchReport, Price};
use crate::domain::subscription::{HandlerResult, RegistryStats, Symbol};
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics;

/// Subscription multiplexer over one streamer connection.
pub struct PriceFeed {
    settings: FeedSettings,
    connection: Arc<ConnectionManager>,
    router: Arc<SubscriptionRouter>,
}

impl PriceFeed {
    /// Build the connection manager and router. Nothing is connected yet.
    #[must_use]
    pub fn new(settings: FeedSettings) -> Self {
        let connection = Arc::new(ConnectionManager::new());
        let router = Arc::new(SubscriptionRouter::new(
            connection.clone(),
            settings.quote_currency.clone(),
        ));

        Self {
            settings,
            connection,
            router,
        }
    }

    /// Invoke `callback` with every new price for `symbol`.
    ///
    /// Safe to call before the connection is open; the subscribe request is
    /// held until then.
    pub fn subscribe_to_ticker<F>(&self, symbol: &str, callback: F)
    where
        F: Fn(Price) -> HandlerResult + Send + Sync + 'static,
    {
        self.router.subscribe(symbol, callback);
        metrics::set_subscribed_symbols(self.router.stats().symbol_count);
    }

    /// Drop every callback registered for `symbol`.
    pub fn unsubscribe_from_ticker(&self, symbol: &str) {
        self.router.unsubscribe(symbol);
        metrics::set_subscribed_symbols(self.router.stats().symbol_count);
    }

    /// Readiness signal from a transport.
    pub fn on_open(&self, sink: Box<dyn FrameSink>) {
        self.connection.on_open(sink);
    }

    /// Feed one inbound frame through decoding and routing.
    pub fn on_message(&self, raw: &str) -> Option<DispatchReport> {
        self.connection.on_message(raw, self.router.as_ref())
    }

    /// Start the WebSocket client on the current runtime.
    ///
    /// The task ends when `cancel` fires or the server goes away.
    #[must_use]
    pub fn spawn(&self, cancel: CancellationToken) -> JoinHandle<Result<(), StreamClientError>> {
        let client = StreamClient::new(
            self.settings.clone(),
            self.connection.clone(),
            self.router.clone(),
            cancel,
        );
        tokio::spawn(client.run())
    }

    /// Connection snapshot.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Symbols with at least one callback.
    #[must_use]
    pub fn symbols(&self) -> Vec<Symbol> {
        self.router.symbols()
    }

    /// Number of callbacks registered for `symbol`.
    #[must_use]
    pub fn handler_count(&self, symbol: &str) -> usize {
        self.router.handler_count(symbol)
    }

    /// Registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.router.stats()
    }

    /// Connection settings.
    #[must_use]
    pub const fn settings(&self) -> &FeedSettings {
        &self.settings
    }
}

impl std::fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceFeed")
            .field("settings", &self.settings)
            .field("connection", &self.connection)
            .field("router", &self.router)
            .finish()
    }
}
