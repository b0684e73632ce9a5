//! CryptoCompare Streamer Message Types
//!
//! Wire format types for the CryptoCompare streaming API (`/v2`).
//!
//! # Message Types
//!
//! ## Outbound
//! - `SubscriptionRequest`: `SubAdd` / `SubRemove` with a list of
//!   subscription identifiers
//!
//! ## Inbound (discriminated by the `TYPE` field)
//! - `"5"`: Aggregate index (CCCAGG) price update
//! - `"500"`: Invalid subscription notice
//! - `"20"`, `"16"`, `"17"`, `"999"`: Welcome, subscribe complete,
//!   unsubscribe complete, heartbeat
//!
//! # References
//!
//! - [Streaming API](https://min-api.cryptocompare.com/documentation/websockets)

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::application::ports::{SubscriptionAction, SubscriptionCommand};
use crate::domain::subscription::{AGGREGATE_INDEX, Symbol};

// =============================================================================
// Message Kinds
// =============================================================================

/// `TYPE` of an aggregate index price update.
pub const TYPE_AGGREGATE_INDEX: &str = AGGREGATE_INDEX;

/// `TYPE` of an invalid subscription notice.
pub const TYPE_INVALID_SUBSCRIPTION: &str = "500";

/// `TYPE` of the welcome message sent after connecting.
pub const TYPE_WELCOME: &str = "20";

/// `TYPE` of a subscribe acknowledgement.
pub const TYPE_SUBSCRIBE_COMPLETE: &str = "16";

/// `TYPE` of an unsubscribe acknowledgement.
pub const TYPE_UNSUBSCRIBE_COMPLETE: &str = "17";

/// `TYPE` of a heartbeat.
pub const TYPE_HEARTBEAT: &str = "999";

// =============================================================================
// Outbound
// =============================================================================

/// Subscription action on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubAction {
    /// Add subscriptions.
    SubAdd,
    /// Remove subscriptions.
    SubRemove,
}

impl From<SubscriptionAction> for SubAction {
    fn from(action: SubscriptionAction) -> Self {
        match action {
            SubscriptionAction::Add => Self::SubAdd,
            SubscriptionAction::Remove => Self::SubRemove,
        }
    }
}

/// Subscribe/unsubscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"action": "SubAdd", "subs": ["5~CCCAGG~BTC~USD"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Requested action.
    pub action: SubAction,
    /// Subscription identifiers.
    pub subs: Vec<String>,
}

impl From<&SubscriptionCommand> for SubscriptionRequest {
    fn from(command: &SubscriptionCommand) -> Self {
        Self {
            action: command.action.into(),
            subs: vec![command.subscription.to_string()],
        }
    }
}

// =============================================================================
// Inbound
// =============================================================================

/// Aggregate index update.
///
/// Every field except `TYPE` and `FROMSYMBOL` is optional: the feed only
/// sends the fields that changed since the previous update. Informational
/// fields with an unexpected JSON type decode as `None`.
///
/// # Wire Format (JSON)
/// ```json
/// {"TYPE": "5", "MARKET": "CCCAGG", "FROMSYMBOL": "BTC", "TOSYMBOL": "USD",
///  "FLAGS": 1, "PRICE": 50000, "LASTUPDATE": 1700000000}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateIndexMessage {
    /// Message type (always "5").
    #[serde(rename = "TYPE")]
    pub msg_type: String,

    /// Base symbol.
    #[serde(rename = "FROMSYMBOL")]
    pub from_symbol: Symbol,

    /// Quote currency.
    #[serde(rename = "TOSYMBOL", default, deserialize_with = "lenient")]
    pub to_symbol: Option<String>,

    /// Market tag.
    #[serde(rename = "MARKET", default, deserialize_with = "lenient")]
    pub market: Option<String>,

    /// Price, if it changed.
    #[serde(rename = "PRICE", default)]
    pub price: Option<Decimal>,

    /// Price direction flags.
    #[serde(rename = "FLAGS", default, deserialize_with = "lenient")]
    pub flags: Option<u32>,

    /// Unix timestamp of the last update.
    #[serde(rename = "LASTUPDATE", default, deserialize_with = "lenient")]
    pub last_update: Option<i64>,
}

impl AggregateIndexMessage {
    /// Price worth routing: present and non-zero.
    #[must_use]
    pub fn routable_price(&self) -> Option<Decimal> {
        self.price.filter(|p| !p.is_zero())
    }
}

/// Decode an optional field, mapping a value of the wrong type to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Invalid subscription notice.
///
/// # Wire Format (JSON)
/// ```json
/// {"TYPE": "500", "MESSAGE": "INVALID_SUB", "PARAMETER": "5~CCCAGG~XYZ~USD",
///  "INFO": "We have not integrated any of the pairs"}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidSubscriptionMessage {
    /// Short error code.
    #[serde(rename = "MESSAGE", default)]
    pub message: Option<String>,

    /// Offending subscription identifier.
    #[serde(rename = "PARAMETER", default)]
    pub parameter: Option<String>,

    /// Human-readable explanation.
    #[serde(rename = "INFO", default)]
    pub info: Option<String>,
}

/// Control messages that carry no routable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Sent once after connecting.
    Welcome,
    /// Subscription acknowledged.
    SubscribeComplete,
    /// Unsubscription acknowledged.
    UnsubscribeComplete,
    /// Keep-alive.
    Heartbeat,
}

impl ControlKind {
    /// Map a `TYPE` value to a control kind.
    #[must_use]
    pub fn from_type(msg_type: &str) -> Option<Self> {
        match msg_type {
            TYPE_WELCOME => Some(Self::Welcome),
            TYPE_SUBSCRIBE_COMPLETE => Some(Self::SubscribeComplete),
            TYPE_UNSUBSCRIBE_COMPLETE => Some(Self::UnsubscribeComplete),
            TYPE_HEARTBEAT => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamerMessage {
    /// Aggregate index update.
    AggregateIndex(AggregateIndexMessage),
    /// Invalid subscription notice.
    InvalidSubscription(InvalidSubscriptionMessage),
    /// Control message.
    Control(ControlKind),
    /// Any other message kind.
    Unknown(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::SubscriptionId;

    #[test]
    fn subscription_request_serialization() {
        let command = SubscriptionCommand::add(SubscriptionId::aggregate("BTC", "USD"));
        let req = SubscriptionRequest::from(&command);

        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"action":"SubAdd","subs":["5~CCCAGG~BTC~USD"]}"#);
    }

    #[test]
    fn unsubscribe_request_serialization() {
        let command = SubscriptionCommand::remove(SubscriptionId::aggregate("ETH", "USD"));
        let json = serde_json::to_string(&SubscriptionRequest::from(&command)).unwrap();

        assert!(json.contains(r#""action":"SubRemove""#));
        assert!(json.contains("5~CCCAGG~ETH~USD"));
    }

    #[test]
    fn aggregate_index_deserialization() {
        let json = r#"{"TYPE":"5","MARKET":"CCCAGG","FROMSYMBOL":"BTC","TOSYMBOL":"USD","FLAGS":2,"PRICE":50000.5,"LASTUPDATE":1700000000}"#;
        let msg: AggregateIndexMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.from_symbol, "BTC");
        assert_eq!(msg.to_symbol.as_deref(), Some("USD"));
        assert_eq!(msg.price, Some(Decimal::new(500_005, 1)));
        assert_eq!(msg.flags, Some(2));
    }

    #[test]
    fn aggregate_index_without_price() {
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","FLAGS":4}"#;
        let msg: AggregateIndexMessage = serde_json::from_str(json).unwrap();

        assert!(msg.price.is_none());
        assert!(msg.routable_price().is_none());
    }

    #[test]
    fn mistyped_informational_fields_are_ignored() {
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","TOSYMBOL":1,"MARKET":["CCCAGG"],"FLAGS":"4","PRICE":50000,"LASTUPDATE":1700000000.5}"#;
        let msg: AggregateIndexMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.to_symbol, None);
        assert_eq!(msg.market, None);
        assert_eq!(msg.flags, None);
        assert_eq!(msg.last_update, None);
        assert_eq!(msg.routable_price(), Some(Decimal::from(50_000)));
    }

    #[test]
    fn zero_price_is_not_routable() {
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":0}"#;
        let msg: AggregateIndexMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.price, Some(Decimal::ZERO));
        assert!(msg.routable_price().is_none());
    }

    #[test]
    fn price_below_decimal_scale_rounds_to_zero() {
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":1e-29}"#;
        let msg: AggregateIndexMessage = serde_json::from_str(json).unwrap();

        assert!(msg.routable_price().is_none());
    }

    #[test]
    fn price_above_decimal_range_is_rejected() {
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":1e30}"#;
        assert!(serde_json::from_str::<AggregateIndexMessage>(json).is_err());
    }

    #[test]
    fn invalid_subscription_deserialization() {
        let json = r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~XYZ~USD","INFO":"We have not integrated any of the pairs"}"#;
        let msg: InvalidSubscriptionMessage = serde_json::from_str(json).unwrap();

        assert_eq!(msg.message.as_deref(), Some("INVALID_SUB"));
        assert_eq!(msg.parameter.as_deref(), Some("5~CCCAGG~XYZ~USD"));
    }

    #[test]
    fn control_kind_mapping() {
        assert_eq!(ControlKind::from_type("20"), Some(ControlKind::Welcome));
        assert_eq!(ControlKind::from_type("16"), Some(ControlKind::SubscribeComplete));
        assert_eq!(ControlKind::from_type("17"), Some(ControlKind::UnsubscribeComplete));
        assert_eq!(ControlKind::from_type("999"), Some(ControlKind::Heartbeat));
        assert_eq!(ControlKind::from_type("5"), None);
        assert_eq!(ControlKind::from_type("500"), None);
    }
}
