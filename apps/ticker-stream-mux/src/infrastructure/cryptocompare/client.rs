//! Streamer WebSocket Client
//!
//! Drives the single connection to the CryptoCompare streamer.
//!
//! # Stream URL
//!
//! - Production: `wss://streamer.cryptocompare.com/v2?api_key=<key>`
//!
//! # Protocol
//!
//! Every frame is one JSON object. Outbound frames come from the
//! [`ConnectionManager`] through an unbounded channel; inbound text frames
//! are handed back to it for decoding and routing.
//!
//! The client connects once. When the server goes away the task ends and
//! nothing is retried.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::connection::ConnectionManager;
use crate::application::ports::{FrameSink, PriceDispatcher, SinkError};
use crate::infrastructure::config::FeedSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamClientError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection closed by the server.
    #[error("connection closed")]
    ConnectionClosed,
}

// =============================================================================
// Channel Sink
// =============================================================================

/// [`FrameSink`] that forwards frames to the client task's write loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelSink {
    /// Wrap the sending half of the outbound channel.
    #[must_use]
    pub const fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl FrameSink for ChannelSink {
    fn write(&self, frame: String) -> Result<(), SinkError> {
        self.tx.send(frame).map_err(|_| SinkError::Closed)
    }
}

// =============================================================================
// Stream Client
// =============================================================================

/// WebSocket client for the streamer.
pub struct StreamClient {
    settings: FeedSettings,
    connection: Arc<ConnectionManager>,
    dispatcher: Arc<dyn PriceDispatcher>,
    cancel: CancellationToken,
}

impl StreamClient {
    /// Create a new stream client.
    #[must_use]
    pub fn new(
        settings: FeedSettings,
        connection: Arc<ConnectionManager>,
        dispatcher: Arc<dyn PriceDispatcher>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            settings,
            connection,
            dispatcher,
            cancel,
        }
    }

    /// Connect and process frames until cancelled or the server goes away.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established, a socket
    /// error occurs, or the stream ends without a close frame.
    pub async fn run(self) -> Result<(), StreamClientError> {
        tracing::info!(url = %self.settings.stream_url, "Connecting to streamer");

        let connect = tokio::select! {
            () = self.cancel.cancelled() => {
                tracing::info!("Stream client cancelled before connecting");
                return Ok(());
            }
            result = tokio_tungstenite::connect_async(self.settings.endpoint()) => result,
        };
        let (ws_stream, _response) = connect.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to connect to streamer");
        })?;

        let (mut write, mut read) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        self.connection.on_open(Box::new(ChannelSink::new(tx)));

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Stream client cancelled");
                    let _ = write.send(Message::Close(None)).await;
                    metrics::set_connection_open(false);
                    return Ok(());
                }
                Some(frame) = rx.recv() => {
                    write.send(Message::Text(frame.into())).await?;
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.connection.on_message(text.as_str(), self.dispatcher.as_ref());
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Server sent close frame");
                            metrics::set_connection_open(false);
                            return Ok(());
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "Streamer connection error");
                            metrics::set_connection_open(false);
                            return Err(e.into());
                        }
                        None => {
                            tracing::info!("WebSocket stream ended");
                            metrics::set_connection_open(false);
                            return Err(StreamClientError::ConnectionClosed);
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamClient")
            .field("settings", &self.settings)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
