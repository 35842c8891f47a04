//! Inbound message and measurement wire schema.

use serde::{Deserialize, Serialize};

/// Schema version stamped on every published measurement.
pub const MEASURE_VERSION: &str = "ddc/measure/0.1";

/// Prefix of every per-device counter key.
pub const COUNTER_KEY_PREFIX: &str = "ddc/device-measurements/";

/// Raw delivery as received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Message body, undecoded.
    pub body: Vec<u8>,
    /// Broker delivery tag.
    pub delivery_tag: u64,
    /// Broker flagged this as a redelivery.
    pub redelivered: bool,
}

impl InboundMessage {
    pub fn new(body: impl Into<Vec<u8>>, delivery_tag: u64, redelivered: bool) -> Self {
        Self {
            body: body.into(),
            delivery_tag,
            redelivered,
        }
    }
}

/// A single device measurement.
///
/// ```text
/// {"version":"ddc/measure/0.1","devID":"x1","val":10,"scale":"C","date":"2024-01-01 12:00:00.000"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default)]
    pub version: String,
    #[serde(rename = "devID")]
    pub device_id: String,
    #[serde(rename = "val")]
    pub value: f64,
    #[serde(default)]
    pub scale: String,
    #[serde(rename = "date", default)]
    pub timestamp: String,
}

impl Measurement {
    /// Decode a message body.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Encode for the wire.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Counter key for this measurement's device.
    pub fn counter_key(&self) -> String {
        counter_key(&self.device_id)
    }
}

/// Counter store key for `device_id`.
pub fn counter_key(device_id: &str) -> String {
    format!("{}{}", COUNTER_KEY_PREFIX, device_id)
}

/// Device id from a counter key, if the key carries the prefix.
pub fn device_from_key(key: &str) -> Option<&str> {
    key.strip_prefix(COUNTER_KEY_PREFIX)
}
