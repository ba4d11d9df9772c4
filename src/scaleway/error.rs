//! Error types for the Scaleway fleet adapter.

use crate::config::ConfigError;
use crate::provider::{FaultClass, ProviderFault};
use scaleway_rs::ScalewayError;
use thiserror::Error;

/// Errors raised by the Scaleway fleet adapter.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayFleetError {
    /// Raised when the configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Raised when an instance disappeared between enumeration and use.
    #[error("instance {instance_id} not found in zone {zone}")]
    InstanceNotFound {
        /// Server id.
        instance_id: String,
        /// Zone used for the lookup.
        zone: String,
    },
    /// `poweroff` is not among the allowed actions.
    #[error("instance {instance_id} in state {state} cannot be powered off")]
    PowerOffNotAllowed {
        /// Server id.
        instance_id: String,
        /// Server state when the request was refused.
        state: String,
    },
    /// `poweron` is not among the allowed actions.
    #[error("instance {instance_id} in state {state} cannot be powered on")]
    PowerOnNotAllowed {
        /// Server id.
        instance_id: String,
        /// Server state when the request was refused.
        state: String,
    },
    /// Raised when a wait exceeds the configured timeout.
    #[error("timeout waiting for {action} on instance {instance_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Server id.
        instance_id: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{operation} failed with HTTP {status}: {message}")]
    Http {
        /// Operation being attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body or status text.
        message: String,
    },
    /// Wrapper for transport and SDK level failures.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the HTTP client or SDK.
        message: String,
    },
    /// Raised when a response body does not match the documented schema.
    #[error("unexpected response to {operation}: {message}")]
    UnexpectedResponse {
        /// Operation whose response failed to decode.
        operation: String,
        /// Decoder error message.
        message: String,
    },
    /// Raised when the API reports a server state this tool does not know.
    #[error("instance {instance_id} reported unknown state '{state}'")]
    UnknownState {
        /// Server id.
        instance_id: String,
        /// Raw state string.
        state: String,
    },
}

impl ProviderFault for ScalewayFleetError {
    fn class(&self) -> FaultClass {
        match self {
            Self::Config(_) | Self::UnexpectedResponse { .. } | Self::UnknownState { .. } => {
                FaultClass::Contract
            }
            Self::InstanceNotFound { .. }
            | Self::PowerOffNotAllowed { .. }
            | Self::PowerOnNotAllowed { .. }
            | Self::Timeout { .. }
            | Self::Http { .. }
            | Self::Provider { .. } => FaultClass::Api,
        }
    }
}

impl From<ScalewayError> for ScalewayFleetError {
    fn from(value: ScalewayError) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScalewayFleetError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for ScalewayFleetError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ScalewayFleetError::Timeout { action: String::from("wait_until_stopped"), instance_id: String::from("i") }, FaultClass::Api)]
    #[case(ScalewayFleetError::Http { operation: String::from("poweroff"), status: 409, message: String::new() }, FaultClass::Api)]
    #[case(ScalewayFleetError::PowerOffNotAllowed { instance_id: String::from("i"), state: String::from("locked") }, FaultClass::Api)]
    #[case(ScalewayFleetError::UnexpectedResponse { operation: String::from("list servers"), message: String::new() }, FaultClass::Contract)]
    #[case(ScalewayFleetError::UnknownState { instance_id: String::from("i"), state: String::from("melting") }, FaultClass::Contract)]
    fn errors_are_classified(#[case] err: ScalewayFleetError, #[case] class: FaultClass) {
        assert_eq!(err.class(), class);
    }
}
