//! Publisher - validates, timestamps and transmits messages

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{debug, error};

use super::error::ContractError;
use super::kind::{MessageKind, TIME_FIELD};
use super::message::{Fields, Message};
use crate::bus::BusHandle;

/// Check a field map against the exact field set for `kind`
pub fn validate(kind: MessageKind, fields: &Fields) -> Result<(), ContractError> {
    let required = kind.required_fields();

    if let Some(field) = required.iter().find(|f| !fields.contains_key(**f)) {
        return Err(ContractError::MissingField {
            kind,
            field: field.to_string(),
        });
    }

    if fields.contains_key(TIME_FIELD) {
        return Err(ContractError::ReservedField { kind });
    }

    if let Some(field) = fields.keys().find(|k| !required.contains(&k.as_str())) {
        return Err(ContractError::UnexpectedField {
            kind,
            field: field.clone(),
        });
    }

    Ok(())
}

/// Capture-time stamp in ISO-8601, seconds precision, UTC
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Outbound side of the message contract for one agent
///
/// Transport failures are logged and reported but never retried.
#[derive(Clone)]
pub struct Publisher {
    bus: BusHandle,
    namespace: String,
    agent: String,
}

impl Publisher {
    pub fn new(bus: BusHandle, namespace: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            bus,
            namespace: namespace.into(),
            agent: agent.into(),
        }
    }

    /// Publish a typed message
    pub async fn publish(&self, message: &Message) -> Result<(), ContractError> {
        let fields = message.to_fields()?;
        self.publish_fields(message.kind(), fields).await
    }

    /// Publish a raw field map for `kind`
    ///
    /// Fails before transmission on a missing, unexpected or reserved field.
    pub async fn publish_fields(&self, kind: MessageKind, mut fields: Fields) -> Result<(), ContractError> {
        validate(kind, &fields)?;

        fields.insert(TIME_FIELD.to_string(), Value::String(timestamp()));
        let payload = serde_json::to_string(&Value::Object(fields))?;
        let topic = kind.topic(&self.namespace);

        match self.bus.publish(&topic, payload).await {
            Ok(()) => {
                debug!(agent = %self.agent, %topic, "Published message");
                Ok(())
            }
            Err(e) => {
                error!(agent = %self.agent, %topic, error = %e, "Failed to publish message");
                Err(ContractError::Transport(e.to_string()))
            }
        }
    }
}
