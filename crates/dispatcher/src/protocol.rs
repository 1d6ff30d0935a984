//! Foxglove WebSocket v1 wire messages
//!
//! Server -> client: `serverInfo`, `advertise`, `status` as JSON text, and
//! binary message data frames. Client -> server: `subscribe`, `unsubscribe`.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::registry::{ChannelNumber, ChannelRegistry};

/// WebSocket subprotocol negotiated with viewers
pub const SUBPROTOCOL: &str = "foxglove.websocket.v1";

/// Opcode of a binary message data frame
pub const MESSAGE_DATA_OPCODE: u8 = 0x01;

/// opcode + subscription id + log time
pub const MESSAGE_DATA_HEADER_LEN: usize = 1 + 4 + 8;

/// Subscription id chosen by the client
pub type SubscriptionId = u32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ServerMessage {
    ServerInfo(ServerInfo),
    Advertise(Advertise),
    Status(Status),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub capabilities: Vec<String>,
    pub supported_encodings: Vec<String>,
    pub metadata: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, session_id: u64) -> Self {
        Self {
            name: name.into(),
            capabilities: Vec::new(),
            supported_encodings: vec!["json".to_string()],
            metadata: BTreeMap::new(),
            session_id: Some(session_id.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertise {
    pub channels: Vec<AdvertisedChannel>,
}

impl Advertise {
    pub fn from_registry(registry: &ChannelRegistry) -> Self {
        Self {
            channels: registry
                .channels()
                .iter()
                .map(|spec| AdvertisedChannel {
                    id: spec.id,
                    topic: spec.topic.path(),
                    encoding: "json".to_string(),
                    schema_name: spec.schema_name().to_string(),
                    schema: spec.topic.schema().to_string(),
                    schema_encoding: spec.topic.schema_encoding().map(str::to_string),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvertisedChannel {
    pub id: ChannelNumber,
    pub topic: String,
    pub encoding: String,
    pub schema_name: String,
    pub schema: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_encoding: Option<String>,
}

/// Status level: 0 info, 1 warning, 2 error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub level: u8,
    pub message: String,
}

impl Status {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: 0,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: 1,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: SubscriptionId,
    pub channel_id: ChannelNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ClientMessage {
    Subscribe {
        subscriptions: Vec<Subscription>,
    },
    Unsubscribe {
        #[serde(rename = "subscriptionIds")]
        subscription_ids: Vec<SubscriptionId>,
    },
    /// Any op the streamer does not implement
    #[serde(other)]
    Unsupported,
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// `[0x01][u32 LE subscription id][u64 LE log time ns][payload]`
pub fn message_data(subscription: SubscriptionId, log_time_ns: u64, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(MESSAGE_DATA_HEADER_LEN + payload.len());
    buf.put_u8(MESSAGE_DATA_OPCODE);
    buf.put_u32_le(subscription);
    buf.put_u64_le(log_time_ns);
    buf.put_slice(payload);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Topic;

    #[test]
    fn test_message_data_layout() {
        let frame = message_data(7, 0x0102_0304_0506_0708, b"{}");
        assert_eq!(frame.len(), MESSAGE_DATA_HEADER_LEN + 2);
        assert_eq!(frame[0], 0x01);
        assert_eq!(&frame[1..5], &7u32.to_le_bytes());
        assert_eq!(&frame[5..13], &0x0102_0304_0506_0708u64.to_le_bytes());
        assert_eq!(&frame[13..], b"{}");
    }

    #[test]
    fn test_parse_subscribe() {
        let msg = ClientMessage::parse(
            r#"{"op":"subscribe","subscriptions":[{"id":3,"channelId":1},{"id":4,"channelId":6}]}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Subscribe {
                subscriptions: vec![
                    Subscription { id: 3, channel_id: 1 },
                    Subscription { id: 4, channel_id: 6 },
                ]
            }
        );
    }

    #[test]
    fn test_parse_unsubscribe() {
        let msg = ClientMessage::parse(r#"{"op":"unsubscribe","subscriptionIds":[3]}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Unsubscribe {
                subscription_ids: vec![3]
            }
        );
    }

    #[test]
    fn test_unknown_op_is_unsupported() {
        let msg = ClientMessage::parse(r#"{"op":"getParameters","parameterNames":[]}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unsupported);
    }

    #[test]
    fn test_advertise_shape() {
        let registry = ChannelRegistry::new([Topic::Camera("CAMERA_FRONT".into()), Topic::Transforms]);
        let json = ServerMessage::Advertise(Advertise::from_registry(&registry))
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["op"], "advertise");
        let camera = &value["channels"][0];
        assert_eq!(camera["id"], 1);
        assert_eq!(camera["topic"], "/camera/CAMERA_FRONT");
        assert_eq!(camera["schemaName"], "foxglove.CompressedImage");
        assert_eq!(camera["schemaEncoding"], "jsonschema");
        let tf = &value["channels"][1];
        assert_eq!(tf["schema"], "");
        assert!(tf.get("schemaEncoding").is_none());
    }

    #[test]
    fn test_server_info_shape() {
        let json = ServerMessage::ServerInfo(ServerInfo::new("TruckScenes Streamer", 9))
            .to_json()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["op"], "serverInfo");
        assert_eq!(value["supportedEncodings"][0], "json");
        assert_eq!(value["sessionId"], "9");
    }
}
