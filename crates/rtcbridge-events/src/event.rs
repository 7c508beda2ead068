use bytes::Bytes;
use rtcbridge_frame::Rotation;
use rtcbridge_transport::DataChannelState;
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

/// How a data channel payload is framed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Binary,
    Text,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Binary => "binary",
            MessageKind::Text => "text",
        }
    }

    pub fn is_binary(self) -> bool {
        self == MessageKind::Binary
    }

    pub fn from_binary_flag(binary: bool) -> Self {
        if binary {
            MessageKind::Binary
        } else {
            MessageKind::Text
        }
    }
}

impl std::str::FromStr for MessageKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "binary" => Ok(MessageKind::Binary),
            "text" => Ok(MessageKind::Text),
            other => Err(EventError::UnknownMessageKind(other.to_string())),
        }
    }
}

/// Payload of a received message.
///
/// Text is tried first when decoding so a JSON string never turns into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageData {
    Text(String),
    Binary(Bytes),
}

impl MessageData {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessageData::Text(_) => MessageKind::Text,
            MessageData::Binary(_) => MessageKind::Binary,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MessageData::Text(text) => text.as_bytes(),
            MessageData::Binary(bytes) => bytes,
        }
    }
}

/// One structured record published to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeEvent {
    /// A data channel moved to a new state.
    DataChannelStateChanged { id: i32, state: DataChannelState },

    /// A message arrived on a data channel.
    DataChannelReceiveMessage {
        id: i32,
        #[serde(rename = "type")]
        kind: MessageKind,
        data: MessageData,
    },

    /// A renderer received its first frame since its track was bound.
    DidFirstFrameRendered { id: i64 },

    /// Frame rotation differs from the last announced one.
    DidTextureChangeRotation { id: i64, rotation: Rotation },

    /// Frame dimensions differ from the last announced ones.
    DidTextureChangeVideoSize { id: i64, width: u32, height: u32 },
}

impl BridgeEvent {
    /// The `event` discriminator.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeEvent::DataChannelStateChanged { .. } => "dataChannelStateChanged",
            BridgeEvent::DataChannelReceiveMessage { .. } => "dataChannelReceiveMessage",
            BridgeEvent::DidFirstFrameRendered { .. } => "didFirstFrameRendered",
            BridgeEvent::DidTextureChangeRotation { .. } => "didTextureChangeRotation",
            BridgeEvent::DidTextureChangeVideoSize { .. } => "didTextureChangeVideoSize",
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_change_encodes_with_discriminator() {
        let event = BridgeEvent::DataChannelStateChanged {
            id: 3,
            state: DataChannelState::Open,
        };
        assert_eq!(
            event.to_value().unwrap(),
            json!({"event": "dataChannelStateChanged", "id": 3, "state": "open"})
        );
        assert_eq!(event.name(), "dataChannelStateChanged");
    }

    #[test]
    fn binary_message_encodes_as_byte_array() {
        let event = BridgeEvent::DataChannelReceiveMessage {
            id: 1,
            kind: MessageKind::Binary,
            data: MessageData::Binary(Bytes::from_static(&[0, 1, 255])),
        };
        assert_eq!(
            event.to_value().unwrap(),
            json!({"event": "dataChannelReceiveMessage", "id": 1, "type": "binary", "data": [0, 1, 255]})
        );
    }

    #[test]
    fn text_message_keeps_embedded_nul() {
        let event = BridgeEvent::DataChannelReceiveMessage {
            id: 1,
            kind: MessageKind::Text,
            data: MessageData::Text("a\0b".to_string()),
        };
        let value = event.to_value().unwrap();
        assert_eq!(value["data"], json!("a\u{0}b"));
        assert_eq!(BridgeEvent::from_value(value).unwrap(), event);
    }

    #[test]
    fn texture_events_use_numeric_fields() {
        let rotation = BridgeEvent::DidTextureChangeRotation {
            id: 7,
            rotation: Rotation::Deg90,
        };
        assert_eq!(
            rotation.to_value().unwrap(),
            json!({"event": "didTextureChangeRotation", "id": 7, "rotation": 90})
        );

        let size = BridgeEvent::DidTextureChangeVideoSize {
            id: 7,
            width: 640,
            height: 480,
        };
        assert_eq!(
            size.to_value().unwrap(),
            json!({"event": "didTextureChangeVideoSize", "id": 7, "width": 640, "height": 480})
        );

        let first = BridgeEvent::DidFirstFrameRendered { id: 7 };
        assert_eq!(
            first.to_value().unwrap(),
            json!({"event": "didFirstFrameRendered", "id": 7})
        );
    }

    #[test]
    fn binary_payload_decodes_back_to_bytes() {
        let value = json!({"event": "dataChannelReceiveMessage", "id": 2, "type": "binary", "data": [9, 8]});
        let event = BridgeEvent::from_value(value).unwrap();
        assert_eq!(
            event,
            BridgeEvent::DataChannelReceiveMessage {
                id: 2,
                kind: MessageKind::Binary,
                data: MessageData::Binary(Bytes::from_static(&[9, 8])),
            }
        );
    }

    #[test]
    fn message_kind_parses_known_names() {
        assert_eq!("text".parse::<MessageKind>().unwrap(), MessageKind::Text);
        assert!(matches!(
            "blob".parse::<MessageKind>(),
            Err(EventError::UnknownMessageKind(_))
        ));
        assert_eq!(MessageKind::from_binary_flag(true), MessageKind::Binary);
    }
}
