//! Configuration Module
//!
//! Configuration loading for the price feed service.

mod settings;

pub use settings::{
    ApiKey, ConfigError, DEFAULT_METRICS_PORT, DEFAULT_QUOTE_CURRENCY, DEFAULT_STREAM_URL,
    FeedConfig, FeedSettings,
};
