//! Stream Codec Module
//!
//! JSON encoding and decoding for the CryptoCompare streamer.
//!
//! Every inbound frame is a single JSON object whose `TYPE` field selects
//! the message kind. Outbound frames are serialized requests.

use crate::infrastructure::cryptocompare::messages::{
    AggregateIndexMessage, ControlKind, InvalidSubscriptionMessage, StreamerMessage,
    TYPE_AGGREGATE_INDEX, TYPE_INVALID_SUBSCRIPTION,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Invalid message format.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// JSON codec for the streamer connection.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a JSON text frame into a `StreamerMessage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not a JSON object, has no string
    /// `TYPE`, or a known kind is missing its required fields.
    pub fn decode(&self, text: &str) -> Result<StreamerMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text.trim())?;

        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}...",
                text.chars().take(50).collect::<String>()
            )));
        }

        let msg_type = value
            .get("TYPE")
            .and_then(serde_json::Value::as_str)
            .ok_or(CodecError::MissingField("TYPE"))?
            .to_string();

        match msg_type.as_str() {
            TYPE_AGGREGATE_INDEX => {
                if value.get("FROMSYMBOL").is_none_or(serde_json::Value::is_null) {
                    return Err(CodecError::MissingField("FROMSYMBOL"));
                }
                let m: AggregateIndexMessage = serde_json::from_value(value)?;
                Ok(StreamerMessage::AggregateIndex(m))
            }
            TYPE_INVALID_SUBSCRIPTION => {
                // Best effort: the notice is reported even if its fields are odd
                let m: InvalidSubscriptionMessage =
                    serde_json::from_value(value).unwrap_or_default();
                Ok(StreamerMessage::InvalidSubscription(m))
            }
            other => Ok(ControlKind::from_type(other).map_or_else(
                || StreamerMessage::Unknown(msg_type.clone()),
                StreamerMessage::Control,
            )),
        }
    }

    /// Encode a value to JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use test_case::test_case;

    use super::*;
    use crate::infrastructure::cryptocompare::messages::{SubAction, SubscriptionRequest};

    #[test]
    fn decode_aggregate_index() {
        let codec = JsonCodec::new();
        let json = r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":50000}"#;

        match codec.decode(json).unwrap() {
            StreamerMessage::AggregateIndex(msg) => {
                assert_eq!(msg.from_symbol, "BTC");
                assert_eq!(msg.routable_price(), Some(Decimal::from(50_000)));
            }
            other => panic!("expected AggregateIndex, got {other:?}"),
        }
    }

    #[test]
    fn decode_invalid_subscription() {
        let codec = JsonCodec::new();
        let json = r#"{"TYPE":"500","MESSAGE":"INVALID_SUB","PARAMETER":"5~CCCAGG~NOPE~USD"}"#;

        match codec.decode(json).unwrap() {
            StreamerMessage::InvalidSubscription(msg) => {
                assert_eq!(msg.parameter.as_deref(), Some("5~CCCAGG~NOPE~USD"));
            }
            other => panic!("expected InvalidSubscription, got {other:?}"),
        }
    }

    #[test]
    fn decode_bare_invalid_subscription() {
        let codec = JsonCodec::new();

        let msg = codec.decode(r#"{"TYPE":"500","MESSAGE":42}"#).unwrap();
        assert_eq!(
            msg,
            StreamerMessage::InvalidSubscription(InvalidSubscriptionMessage::default())
        );
    }

    #[test_case(r#"{"TYPE":"20","MESSAGE":"STREAMERWELCOME"}"#, ControlKind::Welcome ; "welcome")]
    #[test_case(r#"{"TYPE":"16","MESSAGE":"SUBSCRIBECOMPLETE"}"#, ControlKind::SubscribeComplete ; "subscribe complete")]
    #[test_case(r#"{"TYPE":"17","MESSAGE":"UNSUBSCRIBECOMPLETE"}"#, ControlKind::UnsubscribeComplete ; "unsubscribe complete")]
    #[test_case(r#"{"TYPE":"999","MESSAGE":"HEARTBEAT"}"#, ControlKind::Heartbeat ; "heartbeat")]
    fn decode_control(json: &str, expected: ControlKind) {
        let codec = JsonCodec::new();
        assert_eq!(codec.decode(json).unwrap(), StreamerMessage::Control(expected));
    }

    #[test]
    fn decode_unknown_kind() {
        let codec = JsonCodec::new();
        let msg = codec.decode(r#"{"TYPE":"2","FROMSYMBOL":"BTC"}"#).unwrap();

        assert_eq!(msg, StreamerMessage::Unknown("2".to_string()));
    }

    #[test_case("not json" ; "garbage")]
    #[test_case("" ; "empty")]
    #[test_case("[1,2,3]" ; "array")]
    #[test_case(r#""5""# ; "bare string")]
    #[test_case(r#"{"FROMSYMBOL":"BTC","PRICE":1}"# ; "missing type")]
    #[test_case(r#"{"TYPE":5,"FROMSYMBOL":"BTC","PRICE":1}"# ; "numeric type")]
    #[test_case(r#"{"TYPE":"5","PRICE":1}"# ; "missing symbol")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":null,"PRICE":1}"# ; "null symbol")]
    #[test_case(r#"{"TYPE":"5","FROMSYMBOL":"BTC","PRICE":"lots"}"# ; "non numeric price")]
    fn decode_rejects(json: &str) {
        let codec = JsonCodec::new();
        assert!(codec.decode(json).is_err());
    }

    #[test]
    fn encode_subscription_request() {
        let codec = JsonCodec::new();
        let req = SubscriptionRequest {
            action: SubAction::SubRemove,
            subs: vec!["5~CCCAGG~BTC~USD".to_string()],
        };

        let json = codec.encode(&req).unwrap();
        assert_eq!(json, r#"{"action":"SubRemove","subs":["5~CCCAGG~BTC~USD"]}"#);
    }
}
