use rtcbridge_transport::DataChannelInit;
use serde_json::{Map, Value};

use crate::error::{ChannelError, Result};

/// Highest stream id a negotiated channel may ask for.
pub const MAX_CHANNEL_ID: u16 = 65_534;

/// Channel-creation parameters as the host sends them.
///
/// Numeric limits use `-1` (or absence) for "unset"; the host encodes unset
/// optionals that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelOptions {
    pub id: Option<u16>,
    pub ordered: bool,
    pub max_retransmits: Option<u16>,
    pub max_packet_life_time: Option<u16>,
    pub protocol: Option<String>,
    pub negotiated: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            id: None,
            ordered: true,
            max_retransmits: None,
            max_packet_life_time: None,
            protocol: None,
            negotiated: false,
        }
    }
}

impl ChannelOptions {
    /// Parse the `dataChannelDict` map of a create request.
    ///
    /// `null` is treated like an empty map.
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(ChannelError::InvalidOptions(format!(
                    "expected an object, got {}",
                    type_name(other)
                )))
            }
        };

        let options = Self {
            id: optional_u16(map, "id")?,
            ordered: optional_bool(map, "ordered")?.unwrap_or(true),
            max_retransmits: optional_u16(map, "maxRetransmits")?,
            max_packet_life_time: optional_u16(map, "maxPacketLifeTime")?,
            protocol: optional_string(map, "protocol")?,
            negotiated: optional_bool(map, "negotiated")?.unwrap_or(false),
        };
        options.validate()?;
        Ok(options)
    }

    /// Reject contradictory combinations before they reach the transport.
    pub fn validate(&self) -> Result<()> {
        if self.max_retransmits.is_some() && self.max_packet_life_time.is_some() {
            return Err(ChannelError::InvalidOptions(
                "maxRetransmits and maxPacketLifeTime cannot both be set".to_string(),
            ));
        }
        if self.negotiated && self.id.is_none() {
            return Err(ChannelError::InvalidOptions(
                "negotiated channels require an id".to_string(),
            ));
        }
        if let Some(id) = self.id {
            if id > MAX_CHANNEL_ID {
                return Err(ChannelError::InvalidOptions(format!(
                    "id {id} exceeds {MAX_CHANNEL_ID}"
                )));
            }
        }
        Ok(())
    }

    pub fn to_init(&self, default_protocol: &str) -> DataChannelInit {
        DataChannelInit {
            id: self.id,
            ordered: self.ordered,
            max_retransmits: self.max_retransmits,
            max_packet_life_time: self.max_packet_life_time,
            protocol: self
                .protocol
                .clone()
                .unwrap_or_else(|| default_protocol.to_string()),
            negotiated: self.negotiated,
        }
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn with_max_retransmits(mut self, max: u16) -> Self {
        self.max_retransmits = Some(max);
        self
    }

    pub fn with_max_packet_life_time(mut self, millis: u16) -> Self {
        self.max_packet_life_time = Some(millis);
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    pub fn with_negotiated(mut self, negotiated: bool) -> Self {
        self.negotiated = negotiated;
        self
    }
}

fn optional_u16(map: &Map<String, Value>, key: &str) -> Result<Option<u16>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => {
            let Some(raw) = number.as_i64() else {
                return Err(ChannelError::InvalidOptions(format!(
                    "`{key}` must be an integer"
                )));
            };
            if raw < 0 {
                return Ok(None);
            }
            u16::try_from(raw)
                .map(Some)
                .map_err(|_| ChannelError::InvalidOptions(format!("`{key}` out of range: {raw}")))
        }
        Some(other) => Err(ChannelError::InvalidOptions(format!(
            "`{key}` must be an integer, got {}",
            type_name(other)
        ))),
    }
}

fn optional_bool(map: &Map<String, Value>, key: &str) -> Result<Option<bool>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(flag)) => Ok(Some(*flag)),
        Some(other) => Err(ChannelError::InvalidOptions(format!(
            "`{key}` must be a boolean, got {}",
            type_name(other)
        ))),
    }
}

fn optional_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => Err(ChannelError::InvalidOptions(format!(
            "`{key}` must be a string, got {}",
            type_name(other)
        ))),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
