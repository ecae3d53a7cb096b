use serde::Serialize;
use thiserror::Error;

/// Caller-supplied data that violates an entity schema.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{field}` is required")]
    MissingField { field: &'static str },
    #[error("`{field}` {reason}")]
    InvalidField { field: String, reason: String },
    #[error("unsupported model `{0}` (expected crm.lead or res.partner)")]
    UnsupportedModel(String),
}

impl ValidationError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField { field: field.into(), reason: reason.into() }
    }
}

/// A value that could not be converted to wire JSON.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("timestamp value reached the wire encoder without normalization")]
    UnnormalizedTimestamp,
    #[error("non-finite number `{0}` cannot be encoded as JSON")]
    NonFiniteNumber(String),
}

/// Coarse failure category shared by every surface. HTTP status codes and
/// user-facing wording derive from it, never from the concrete error type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Validation,
    NotFound,
    Remote,
    Completion,
    Plan,
    Serialization,
}

impl ErrorClass {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Validation | Self::Plan => 400,
            Self::NotFound => 404,
            Self::Remote | Self::Completion => 502,
            Self::Serialization => 500,
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Validation => "The request could not be processed. Check inputs and try again.",
            Self::NotFound => "The requested record does not exist.",
            Self::Remote => "The CRM backend rejected the operation.",
            Self::Completion => "The language model service is unavailable. Please retry shortly.",
            Self::Plan => "The generated update plan was malformed and was not executed.",
            Self::Serialization => "The response could not be encoded.",
        }
    }
}

/// Implemented by every error that crosses into an `OperationResult`.
pub trait ClassifiedError: std::error::Error {
    fn class(&self) -> ErrorClass;
}

impl ClassifiedError for ValidationError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

impl ClassifiedError for SerializationError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Serialization
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ClassifiedError, ErrorClass, SerializationError, ValidationError};

    #[test]
    fn validation_error_maps_to_bad_request() {
        let error = ValidationError::MissingField { field: "name" };

        assert_eq!(error.class(), ErrorClass::Validation);
        assert_eq!(error.class().status_code(), 400);
        assert_eq!(error.to_string(), "`name` is required");
    }

    #[test]
    fn remote_class_maps_to_bad_gateway_with_user_safe_message() {
        assert_eq!(ErrorClass::Remote.status_code(), 502);
        assert_eq!(ErrorClass::Remote.user_message(), "The CRM backend rejected the operation.");
    }

    #[test]
    fn serialization_error_maps_to_internal() {
        let error = SerializationError::UnnormalizedTimestamp;
        assert_eq!(error.class().status_code(), 500);
    }

    #[test]
    fn invalid_field_renders_field_and_reason() {
        let error = ValidationError::invalid("probability", "must be within 0..=100");
        assert_eq!(error.to_string(), "`probability` must be within 0..=100");
    }
}
