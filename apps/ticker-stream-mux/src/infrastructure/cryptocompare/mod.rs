//! CryptoCompare Streamer Adapters
//!
//! Wire types, codec, connection state machine and WebSocket client for
//! the CryptoCompare streaming API, plus the [`PriceFeed`] handle that
//! ties them to the subscription router.

pub mod client;
pub mod codec;
pub mod connection;
pub mod feed;
pub mod messages;

pub use client::{ChannelSink, StreamClient, StreamClientError};
pub use codec::{CodecError, JsonCodec};
pub use connection::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use feed::PriceFeed;
