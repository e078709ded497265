//! Contract error types

use thiserror::Error;

use super::kind::MessageKind;

/// Errors from validating, encoding or decoding bus messages
#[derive(Debug, Error)]
pub enum ContractError {
    #[error("{kind}: missing required field '{field}'")]
    MissingField { kind: MessageKind, field: String },

    #[error("{kind}: unexpected field '{field}'")]
    UnexpectedField { kind: MessageKind, field: String },

    #[error("{kind}: field 'time' is injected at publish time")]
    ReservedField { kind: MessageKind },

    #[error("{kind}: payload is not a JSON object")]
    NotAnObject { kind: MessageKind },

    #[error("{kind}: {reason}")]
    Decode { kind: MessageKind, reason: String },

    #[error("Unknown topic: {0}")]
    UnknownTopic(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ContractError {
    /// Rejected before anything reached the bus
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ContractError::MissingField { .. }
                | ContractError::UnexpectedField { .. }
                | ContractError::ReservedField { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_validation() {
        assert!(
            ContractError::MissingField {
                kind: MessageKind::SetFtp,
                field: "ftp".to_string()
            }
            .is_validation()
        );
        assert!(ContractError::ReservedField { kind: MessageKind::StopPlan }.is_validation());
        assert!(!ContractError::Transport("Bus channel closed".to_string()).is_validation());
        assert!(!ContractError::UnknownTopic("x/y".to_string()).is_validation());
    }

    #[test]
    fn test_display_names_kind() {
        let err = ContractError::UnexpectedField {
            kind: MessageKind::SetTargetPower,
            field: "uuid_trainer".to_string(),
        };
        assert_eq!(err.to_string(), "set_target_power: unexpected field 'uuid_trainer'");
    }
}
