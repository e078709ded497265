//! Typed messages and their field-map encoding

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::error::ContractError;
use super::kind::{MessageKind, TIME_FIELD};
use crate::bus::Envelope;
use crate::domain::TrainingPlan;

/// Tag used internally to pick the variant; never sent on the wire
const TAG: &str = "command";

/// Field map as carried in a payload
pub type Fields = Map<String, Value>;

/// Every message exchanged by Coach, Rider and Bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Message {
    ListDevices,
    DeviceList {
        device_list: Vec<String>,
    },
    /// A null rider removes the pairing
    PairTrainerRider {
        uuid_trainer: String,
        uuid_rider: Option<String>,
    },
    GetPlan,
    ListPlan {
        training_plan: TrainingPlan,
    },
    SetFtp {
        uuid_trainer: String,
        ftp: u32,
    },
    RequestFtp {
        uuid_trainer: String,
    },
    FtpValue {
        uuid_trainer: String,
        ftp: u32,
    },
    StartPlan,
    StopPlan,
    /// Broadcast: applies to every paired trainer
    SetTargetPower {
        target_power: u32,
    },
    SetTargetCadence {
        target_cadence: u32,
    },
    SetMeasuredPower {
        uuid_trainer: String,
        measured_power: f64,
        percent_ftp: i64,
    },
    SetMeasuredCadence {
        uuid_trainer: String,
        measured_cadence: f64,
    },
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ListDevices => MessageKind::ListDevices,
            Message::DeviceList { .. } => MessageKind::DeviceList,
            Message::PairTrainerRider { .. } => MessageKind::PairTrainerRider,
            Message::GetPlan => MessageKind::GetPlan,
            Message::ListPlan { .. } => MessageKind::ListPlan,
            Message::SetFtp { .. } => MessageKind::SetFtp,
            Message::RequestFtp { .. } => MessageKind::RequestFtp,
            Message::FtpValue { .. } => MessageKind::FtpValue,
            Message::StartPlan => MessageKind::StartPlan,
            Message::StopPlan => MessageKind::StopPlan,
            Message::SetTargetPower { .. } => MessageKind::SetTargetPower,
            Message::SetTargetCadence { .. } => MessageKind::SetTargetCadence,
            Message::SetMeasuredPower { .. } => MessageKind::SetMeasuredPower,
            Message::SetMeasuredCadence { .. } => MessageKind::SetMeasuredCadence,
        }
    }

    /// Encode as the field map a publisher sends (without `time`)
    pub fn to_fields(&self) -> Result<Fields, ContractError> {
        match serde_json::to_value(self)? {
            Value::Object(mut fields) => {
                fields.remove(TAG);
                Ok(fields)
            }
            _ => Err(ContractError::NotAnObject { kind: self.kind() }),
        }
    }

    /// Decode a received field map
    ///
    /// Every required field must be present; extra fields are ignored.
    pub fn from_fields(kind: MessageKind, mut fields: Fields) -> Result<Self, ContractError> {
        for field in kind.required_fields() {
            if !fields.contains_key(*field) {
                return Err(ContractError::MissingField {
                    kind,
                    field: field.to_string(),
                });
            }
        }

        fields.remove(TIME_FIELD);
        fields.insert(TAG.to_string(), Value::String(kind.command().to_string()));

        serde_json::from_value(Value::Object(fields)).map_err(|e| ContractError::Decode {
            kind,
            reason: e.to_string(),
        })
    }
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct Received {
    pub message: Message,
    /// Capture time stamped by the publisher, if present
    pub time: Option<String>,
}

/// Decode an envelope received under `namespace`
pub fn decode(namespace: &str, envelope: &Envelope) -> Result<Received, ContractError> {
    let kind = MessageKind::from_topic(namespace, &envelope.topic)
        .ok_or_else(|| ContractError::UnknownTopic(envelope.topic.clone()))?;

    let fields = match serde_json::from_str::<Value>(&envelope.payload) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => return Err(ContractError::NotAnObject { kind }),
        Err(e) => {
            return Err(ContractError::Decode {
                kind,
                reason: e.to_string(),
            });
        }
    };

    let extra: Vec<&String> = fields
        .keys()
        .filter(|k| k.as_str() != TIME_FIELD && !kind.required_fields().contains(&k.as_str()))
        .collect();
    if !extra.is_empty() {
        debug!(%kind, ?extra, "decode: ignoring extra fields");
    }

    let time = fields.get(TIME_FIELD).and_then(|t| t.as_str()).map(str::to_string);
    let message = Message::from_fields(kind, fields)?;
    Ok(Received { message, time })
}
