//! Stream message envelope.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{Diagnostics, DtcEntry, EngineData, FuelAirData, LiveData, StatusData, TelemetryRecord};

/// One message from the telemetry stream: `{"type": ..., "data": {...}, "ts": ...}`.
///
/// `type` selects the schema of `data`. The envelope itself is kept loose so
/// that an unrecognized `type` can be reported as such instead of as a
/// generic parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,
}

/// Payload kinds understood by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// A full tick carrying any subset of every metric.
    Telemetry,
    Live,
    Engine,
    FuelAir,
    Status,
    /// Stored trouble codes, `{"dtcs": [...]}`.
    Diagnostics,
}

impl MessageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            MessageKind::Telemetry => "telemetry",
            MessageKind::Live => "live",
            MessageKind::Engine => "engine",
            MessageKind::FuelAir => "fuel_air",
            MessageKind::Status => "status",
            MessageKind::Diagnostics => "diagnostics",
        }
    }
}

impl FromStr for MessageKind {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telemetry" => Ok(MessageKind::Telemetry),
            "live" => Ok(MessageKind::Live),
            "engine" => Ok(MessageKind::Engine),
            "fuel_air" => Ok(MessageKind::FuelAir),
            "status" => Ok(MessageKind::Status),
            "diagnostics" => Ok(MessageKind::Diagnostics),
            other => Err(MessageError::UnknownKind(other.to_string())),
        }
    }
}

/// Why a stream message was not turned into a record.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unrecognized message type: {0}")]
    UnknownKind(String),

    #[error("message data is not an object")]
    NotAnObject,

    #[error("{0} message carries no telemetry")]
    NoTelemetry(&'static str),
}

/// The decoded content of a stream message.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPayload {
    /// Metric readings from a telemetry tick or one metric group.
    Record(TelemetryRecord),
    /// A `diagnostics` push, codes already normalized.
    Diagnostics { ts: u64, dtcs: Vec<DtcEntry> },
}

impl StreamMessage {
    /// Parse one JSON message.
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        Ok(serde_json::from_str(text.trim())?)
    }

    /// Parse one JSON message from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn message_kind(&self) -> Result<MessageKind, MessageError> {
        self.kind.parse()
    }

    /// Decode `data` according to `type`.
    ///
    /// The timestamp comes from the envelope, then from `data.ts`, then
    /// falls back to `received_at_ms`.
    pub fn decode(self, received_at_ms: u64) -> Result<StreamPayload, MessageError> {
        let kind = self.message_kind()?;
        if !self.data.is_object() {
            return Err(MessageError::NotAnObject);
        }

        let data_ts = self.data.get("ts").and_then(Value::as_u64);
        let ts = self.ts.or(data_ts).unwrap_or(received_at_ms);
        let mut record: TelemetryRecord = match kind {
            MessageKind::Telemetry => serde_json::from_value(self.data)?,
            MessageKind::Live => serde_json::from_value::<LiveData>(self.data)?.into(),
            MessageKind::Engine => serde_json::from_value::<EngineData>(self.data)?.into(),
            MessageKind::FuelAir => serde_json::from_value::<FuelAirData>(self.data)?.into(),
            MessageKind::Status => serde_json::from_value::<StatusData>(self.data)?.into(),
            MessageKind::Diagnostics => {
                let dtcs = serde_json::from_value::<Diagnostics>(self.data)?.normalized();
                return Ok(StreamPayload::Diagnostics { ts, dtcs });
            }
        };

        record.ts = ts;
        Ok(StreamPayload::Record(record))
    }

    /// Decode a metric message into a record.
    ///
    /// Fails with [`MessageError::NoTelemetry`] for `diagnostics` messages;
    /// use [`decode`](Self::decode) to accept those too.
    pub fn into_record(self, received_at_ms: u64) -> Result<TelemetryRecord, MessageError> {
        match self.decode(received_at_ms)? {
            StreamPayload::Record(record) => Ok(record),
            StreamPayload::Diagnostics { .. } => {
                Err(MessageError::NoTelemetry(MessageKind::Diagnostics.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Metric;

    #[test]
    fn live_message_decodes_scoped_fields() {
        let line = r#"{"type":"live","data":{"ts":1700000000000,"rpm":850,"speed_kph":0,"raw":{"010C":"41 0C 0D 48"}}}"#;
        let record = StreamMessage::parse(line).unwrap().into_record(42).unwrap();

        assert_eq!(record.ts, 1700000000000);
        assert_eq!(record.get(Metric::Rpm), Some(850.0));
        assert_eq!(record.get(Metric::SpeedKph), Some(0.0));
        assert_eq!(record.get(Metric::CoolantTemp), None);
        assert!(record.raw.contains_key("raw"));
    }

    #[test]
    fn envelope_ts_wins_over_data_ts() {
        let line = r#"{"type":"status","ts":200,"data":{"ts":100,"fuel_level":42.0}}"#;
        let record = StreamMessage::parse(line).unwrap().into_record(0).unwrap();
        assert_eq!(record.ts, 200);
    }

    #[test]
    fn receive_time_used_when_no_timestamp() {
        let line = r#"{"type":"engine","data":{"coolant_temp":91}}"#;
        let record = StreamMessage::parse(line).unwrap().into_record(777).unwrap();
        assert_eq!(record.ts, 777);
        assert_eq!(record.get(Metric::CoolantTemp), Some(91.0));
    }

    #[test]
    fn full_telemetry_tick() {
        let line = r#"{"type":"telemetry","data":{"rpm":3000,"fuel_level":60,"control_module_voltage":14.1}}"#;
        let record = StreamMessage::parse(line).unwrap().into_record(1).unwrap();
        assert_eq!(record.get(Metric::Rpm), Some(3000.0));
        assert_eq!(record.get(Metric::ControlModuleVoltage), Some(14.1));
    }

    #[test]
    fn diagnostics_message_decodes_normalized_codes() {
        let line = r#"{"type":"diagnostics","data":{"ts":5,"dtcs":["P0301",{"code":"P0171","status":"active","description":"System too lean"}]}}"#;
        let payload = StreamMessage::parse(line).unwrap().decode(0).unwrap();

        let StreamPayload::Diagnostics { ts, dtcs } = payload else {
            panic!("expected diagnostics, got {:?}", payload);
        };
        assert_eq!(ts, 5);
        assert_eq!(dtcs.len(), 2);
        assert_eq!(dtcs[0].code, "P0301");
        assert_eq!(dtcs[0].status, None);
        assert_eq!(dtcs[1].status.as_deref(), Some("active"));
    }

    #[test]
    fn diagnostics_message_is_not_a_record() {
        let line = r#"{"type":"diagnostics","data":{"dtcs":[]}}"#;
        let err = StreamMessage::parse(line).unwrap().into_record(0).unwrap_err();
        assert!(matches!(err, MessageError::NoTelemetry("diagnostics")));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let line = r#"{"type":"gps","data":{"lat":1.0}}"#;
        let err = StreamMessage::parse(line).unwrap().into_record(0).unwrap_err();
        assert!(matches!(err, MessageError::UnknownKind(ref k) if k == "gps"));
    }

    #[test]
    fn missing_type_is_malformed() {
        let line = r#"{"ts":1,"rpm":900}"#;
        assert!(matches!(StreamMessage::parse(line), Err(MessageError::Malformed(_))));
    }

    #[test]
    fn wrong_field_type_is_malformed() {
        let line = r#"{"type":"live","data":{"rpm":"fast"}}"#;
        let err = StreamMessage::parse(line).unwrap().into_record(0).unwrap_err();
        assert!(matches!(err, MessageError::Malformed(_)));
    }

    #[test]
    fn non_object_data_is_rejected() {
        let line = r#"{"type":"live","data":[1,2,3]}"#;
        let err = StreamMessage::parse(line).unwrap().into_record(0).unwrap_err();
        assert!(matches!(err, MessageError::NotAnObject));
    }

    #[test]
    fn not_json_at_all() {
        assert!(StreamMessage::parse("NO DATA").is_err());
        assert!(StreamMessage::from_slice(b"\xff\xfe").is_err());
    }
}
