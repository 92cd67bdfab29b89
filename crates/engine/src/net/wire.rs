use std::fmt;

use rmpv::Value;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::frame::FrameBoundsError;

pub(crate) const ID_FIELD: &str = "_id";

/// Correlation id attached to a request that expects a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode inbound message: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("failed to re-pack message value: {0}")]
    Value(String),
    #[error("message must encode to a map to carry a correlation id")]
    NotAMap,
    #[error("frame rejected: {0}")]
    Frame(#[from] FrameBoundsError),
}

/// Serializes `message` as a MessagePack map, adding `_id` when `id` is set.
pub fn encode_message<M>(message: &M, id: Option<RequestId>) -> Result<Vec<u8>, WireError>
where
    M: Serialize + ?Sized,
{
    let packed = rmp_serde::to_vec_named(message)?;
    let Some(id) = id else {
        return Ok(packed);
    };

    let mut value = rmpv::decode::read_value(&mut packed.as_slice())
        .map_err(|error| WireError::Value(error.to_string()))?;
    let Value::Map(entries) = &mut value else {
        return Err(WireError::NotAMap);
    };
    entries.retain(|(key, _)| key.as_str() != Some(ID_FIELD));
    entries.push((Value::from(ID_FIELD), Value::from(id.0)));

    let mut out = Vec::with_capacity(packed.len() + 12);
    rmpv::encode::write_value(&mut out, &value)
        .map_err(|error| WireError::Value(error.to_string()))?;
    Ok(out)
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(rename = "_id", default)]
    id: Option<u64>,
    #[serde(rename = "_event", default)]
    event: Option<String>,
}

/// A decoded inbound message: the routing fields plus the raw payload, which
/// is decoded into a concrete type only once a handler claims it.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    id: Option<RequestId>,
    event: Option<String>,
    payload: Vec<u8>,
}

/// Reply handlers receive the full inbound message.
pub type Reply = InboundMessage;

impl InboundMessage {
    pub fn decode(payload: Vec<u8>) -> Result<Self, WireError> {
        let envelope: Envelope = rmp_serde::from_slice(&payload)?;
        Ok(Self {
            id: envelope.id.filter(|id| *id != 0).map(RequestId),
            event: envelope.event,
            payload,
        })
    }

    pub fn id(&self) -> Option<RequestId> {
        self.id
    }

    pub fn event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, WireError> {
        Ok(rmp_serde::from_slice(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        ping: u64,
    }

    fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
        value
            .as_map()?
            .iter()
            .find(|(key, _)| key.as_str() == Some(name))
            .map(|(_, value)| value)
    }

    #[test]
    fn correlated_message_carries_id_alongside_fields() {
        let bytes = encode_message(&Ping { ping: 99 }, Some(RequestId(7))).expect("encode");
        let value = rmpv::decode::read_value(&mut bytes.as_slice()).expect("value");

        assert_eq!(field(&value, "ping").and_then(Value::as_u64), Some(99));
        assert_eq!(field(&value, "_id").and_then(Value::as_u64), Some(7));
    }

    #[test]
    fn uncorrelated_message_has_no_id_field() {
        let bytes = encode_message(&Ping { ping: 1 }, None).expect("encode");
        let value = rmpv::decode::read_value(&mut bytes.as_slice()).expect("value");
        assert!(field(&value, "_id").is_none());
    }

    #[test]
    fn non_map_messages_cannot_be_correlated() {
        let result = encode_message(&[1u8, 2, 3], Some(RequestId(1)));
        assert!(matches!(result, Err(WireError::NotAMap)));
    }

    #[test]
    fn inbound_routing_fields_are_extracted_and_payload_kept() {
        let value = Value::Map(vec![
            (Value::from("_event"), Value::from("notice")),
            (Value::from("notice"), Value::from("You hear a door.")),
            (Value::from("extra"), Value::Array(vec![Value::from(1), Value::Nil])),
        ]);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &value).expect("write");

        let message = InboundMessage::decode(bytes).expect("decode");
        assert_eq!(message.event(), Some("notice"));
        assert_eq!(message.id(), None);

        #[derive(Deserialize)]
        struct Notice {
            notice: String,
        }
        let notice: Notice = message.payload_as().expect("payload");
        assert_eq!(notice.notice, "You hear a door.");
    }

    #[test]
    fn reply_id_round_trips_into_request_id() {
        let bytes = encode_message(&Ping { ping: 5 }, Some(RequestId(12))).expect("encode");
        let message = InboundMessage::decode(bytes).expect("decode");
        assert_eq!(message.id(), Some(RequestId(12)));
        assert_eq!(message.payload_as::<Ping>().expect("ping"), Ping { ping: 5 });
    }

    #[test]
    fn garbage_bytes_are_a_decode_error() {
        assert!(matches!(
            InboundMessage::decode(vec![0xc1]),
            Err(WireError::Decode(_))
        ));
    }
}
