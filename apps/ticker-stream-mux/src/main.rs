//! Ticker Stream Mux Binary
//!
//! Connects to the CryptoCompare streamer and logs every price for the
//! configured symbols.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ticker-stream-mux
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `CRYPTOCOMPARE_API_KEY`: CryptoCompare API key
//!
//! ## Optional
//! - `TICKER_MUX_STREAM_URL`: Streamer endpoint (default: wss://streamer.cryptocompare.com/v2)
//! - `TICKER_MUX_QUOTE_CURRENCY`: Quote currency (default: USD)
//! - `TICKER_MUX_SYMBOLS`: Comma-separated symbols (default: BTC)
//! - `TICKER_MUX_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: ticker-stream-mux)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ticker_stream_mux::infrastructure::telemetry;
use ticker_stream_mux::{FeedConfig, PriceFeed, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting Ticker Stream Mux");

    let config = FeedConfig::from_env()?;
    log_config(&config);

    init_metrics(config.metrics_port).context("failed to initialize metrics")?;

    let feed = Arc::new(PriceFeed::new(config.feed.clone()));
    let quote_currency = config.feed.quote_currency.clone();

    for symbol in &config.symbols {
        let ticker = symbol.clone();
        let quote = quote_currency.clone();
        feed.subscribe_to_ticker(symbol, move |price| {
            tracing::info!(symbol = %ticker, %price, quote = %quote, "Price update");
            Ok(())
        });
    }

    let shutdown_token = CancellationToken::new();
    let mut client = feed.spawn(shutdown_token.clone());

    let finished = tokio::select! {
        () = await_shutdown() => None,
        result = &mut client => Some(result),
    };

    if let Some(result) = finished {
        let status = feed.status();
        tracing::info!(
            state = status.state.as_str(),
            frames_sent = status.frames_sent,
            invalid_subscriptions = status.invalid_subscriptions,
            "Streamer connection finished"
        );
        result.context("stream client task failed")??;
    } else {
        shutdown_token.cancel();
        tracing::info!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Graceful shutdown started"
        );
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut client).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Stream client stopped with error"),
            Ok(Err(e)) => tracing::error!(error = %e, "Stream client task failed"),
            Err(_) => {
                tracing::warn!("Stream client did not stop in time");
                client.abort();
            }
        }
    }

    tracing::info!("Ticker Stream Mux stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        stream_url = %config.feed.stream_url,
        quote_currency = %config.feed.quote_currency,
        symbols = ?config.symbols,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
