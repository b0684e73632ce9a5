#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Ticker Stream Mux - Price Subscription Multiplexer
//!
//! Keeps a single WebSocket connection to the CryptoCompare streamer and
//! multiplexes ticker subscriptions from any number of in-process callers
//! over it. Subscribe requests issued before the connection is ready are
//! held and sent, in order, once it opens.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no transport knowledge
//!   - `streaming`: Prices and dispatch outcomes
//!   - `subscription`: Subscription identifiers and the handler registry
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Frame sink, command sender and price dispatcher contracts
//!   - `services`: Subscription router
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `cryptocompare`: Wire types, codec, connection manager, WebSocket
//!     client and the `PriceFeed` handle
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! caller ──subscribe──► SubscriptionRouter ──SubAdd──► ConnectionManager ──► streamer
//!                              ▲                              │
//! caller ◄──callback─── dispatch(symbol, price) ◄──on_message─┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use ticker_stream_mux::{ApiKey, FeedSettings, PriceFeed};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let feed = PriceFeed::new(FeedSettings::new(ApiKey::new("my-key")));
//! feed.subscribe_to_ticker("BTC", |price| {
//!     println!("BTC: {price}");
//!     Ok(())
//! });
//!
//! let cancel = CancellationToken::new();
//! let client = feed.spawn(cancel.clone());
//! # cancel.cancel();
//! # let _ = client.await;
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::streaming::{DispatchReport, Price, PriceUpdate};
pub use domain::subscription::{
    HandlerError, HandlerRegistry, HandlerResult, PriceHandler, RegistryStats, SubscriptionId,
    Symbol,
};

// Application
pub use application::ports::{CommandSender, FrameSink, PriceDispatcher, SinkError};
pub use application::services::SubscriptionRouter;

// Price feed
pub use infrastructure::cryptocompare::{
    ConnectionManager, ConnectionState, ConnectionStatus, PriceFeed, StreamClient,
    StreamClientError,
};

// Infrastructure config
pub use infrastructure::config::{ApiKey, ConfigError, FeedConfig, FeedSettings};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
