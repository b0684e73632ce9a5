//! Feed Configuration Settings
//!
//! Configuration types for the price feed, loaded from environment variables.

/// Default streamer endpoint.
pub const DEFAULT_STREAM_URL: &str = "wss://streamer.cryptocompare.com/v2";

/// Default quote currency for subscriptions.
pub const DEFAULT_QUOTE_CURRENCY: &str = "USD";

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// CryptoCompare API key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap an API key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the raw key.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// Streaming connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    /// Streamer endpoint without the key.
    pub stream_url: String,
    /// API key appended to the endpoint.
    pub api_key: ApiKey,
    /// Quote currency in every subscription identifier.
    pub quote_currency: String,
}

impl FeedSettings {
    /// Settings for the public streamer with the default quote currency.
    #[must_use]
    pub fn new(api_key: ApiKey) -> Self {
        Self {
            stream_url: DEFAULT_STREAM_URL.to_string(),
            api_key,
            quote_currency: DEFAULT_QUOTE_CURRENCY.to_string(),
        }
    }

    /// Override the streamer endpoint.
    #[must_use]
    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = url.into();
        self
    }

    /// Override the quote currency.
    #[must_use]
    pub fn with_quote_currency(mut self, currency: impl Into<String>) -> Self {
        self.quote_currency = currency.into();
        self
    }

    /// Full connection URL including the API key.
    ///
    /// Contains the secret; never log it.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let separator = if self.stream_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}api_key={}",
            self.stream_url,
            self.api_key.expose()
        )
    }
}

/// Complete service configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Streaming connection settings.
    pub feed: FeedSettings,
    /// Symbols the service subscribes to on startup.
    pub symbols: Vec<String>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if `CRYPTOCOMPARE_API_KEY` is missing or empty.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("CRYPTOCOMPARE_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("CRYPTOCOMPARE_API_KEY".to_string()))?;

        if api_key.trim().is_empty() {
            return Err(ConfigError::EmptyValue("CRYPTOCOMPARE_API_KEY".to_string()));
        }

        let mut feed = FeedSettings::new(ApiKey::new(api_key.trim()));

        if let Some(url) = non_empty(lookup("TICKER_MUX_STREAM_URL")) {
            feed = feed.with_stream_url(url);
        }

        if let Some(currency) = non_empty(lookup("TICKER_MUX_QUOTE_CURRENCY")) {
            feed = feed.with_quote_currency(currency);
        }

        let symbols = lookup("TICKER_MUX_SYMBOLS")
            .map(|list| parse_symbol_list(&list))
            .unwrap_or_else(|| vec!["BTC".to_string()]);

        let metrics_port = parse_u16(lookup("TICKER_MUX_METRICS_PORT"), DEFAULT_METRICS_PORT);

        Ok(Self {
            feed,
            symbols,
            metrics_port,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_u16(value: Option<String>, default: u16) -> u16 {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_symbol_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}
