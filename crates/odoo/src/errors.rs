use leadbridge_core::errors::{ClassifiedError, ErrorClass};
use leadbridge_core::{CrmModel, SerializationError, ValidationError};
use thiserror::Error;

use crate::xmlrpc::CodecError;

/// Failure below the gateway: HTTP, status, XML or an XML-RPC fault.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("http request failed: {0}")]
    Http(String),
    #[error("backend answered with HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("{message}")]
    Fault { code: i64, message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unreachable backend or rejected credentials. Fatal at startup.
    #[error("could not connect to odoo: {0}")]
    Connection(String),
    #[error("{model}.{method} failed: {fault}")]
    RemoteCall { model: String, method: String, fault: String },
    #[error("odoo transport error: {0}")]
    Transport(String),
    #[error("unexpected {method} result: {detail}")]
    UnexpectedResult { method: String, detail: String },
}

impl GatewayError {
    pub(crate) fn from_call(model: &str, method: &str, error: TransportError) -> Self {
        match error {
            TransportError::Fault { message, .. } => Self::RemoteCall {
                model: model.to_string(),
                method: method.to_string(),
                fault: message,
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

impl ClassifiedError for GatewayError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Remote
    }
}

/// Everything a CRM operation can fail with.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] GatewayError),
    #[error("{model} record {id} not found")]
    NotFound { model: CrmModel, id: i64 },
    #[error("{model} record {id} was not updated by the backend")]
    NotApplied { model: CrmModel, id: i64 },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl ClassifiedError for CrmError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Remote(_) | Self::NotApplied { .. } => ErrorClass::Remote,
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Serialization(_) => ErrorClass::Serialization,
        }
    }
}
