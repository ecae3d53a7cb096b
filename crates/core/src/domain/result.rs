use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ClassifiedError, ErrorClass};
use crate::value::OdooValue;
use crate::wire::to_wire;

/// The successful result of one CRM operation, before wire encoding.
#[derive(Clone, Debug, PartialEq)]
pub struct CrmOutcome {
    pub data: OdooValue,
    pub message: Option<String>,
    pub count: Option<i64>,
}

impl CrmOutcome {
    pub fn new(data: OdooValue) -> Self {
        Self { data, message: None, count: None }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Uniform response envelope.
///
/// Only constructible from a typed result, so `success == false` always
/// comes with `error` set and `data` empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    success: bool,
    data: Option<Value>,
    error: Option<String>,
    message: Option<String>,
    count: Option<i64>,
    #[serde(skip)]
    error_class: Option<ErrorClass>,
}

impl OperationResult {
    pub fn from_outcome<E: ClassifiedError>(result: Result<CrmOutcome, E>) -> Self {
        match result {
            Ok(outcome) => match to_wire(outcome.data) {
                Ok(data) => Self {
                    success: true,
                    data: Some(data),
                    error: None,
                    message: outcome.message,
                    count: outcome.count,
                    error_class: None,
                },
                Err(error) => Self::failure(&error),
            },
            Err(error) => Self::failure(&error),
        }
    }

    pub fn failure<E: ClassifiedError + ?Sized>(error: &E) -> Self {
        let class = error.class();
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            message: Some(class.user_message().to_string()),
            count: None,
            error_class: Some(class),
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn count(&self) -> Option<i64> {
        self.count
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        self.error_class
    }

    /// 200 on success, otherwise the status of the failure class.
    pub fn status_code(&self) -> u16 {
        match (self.success, self.error_class) {
            (true, _) => 200,
            (false, Some(class)) => class.status_code(),
            (false, None) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{CrmOutcome, OperationResult};
    use crate::errors::{ErrorClass, ValidationError};
    use crate::value::{OdooStruct, OdooValue};

    #[test]
    fn success_envelope_normalizes_timestamps() {
        let created = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|date| date.and_hms_opt(3, 4, 5))
            .expect("valid timestamp");
        let mut record = OdooStruct::new();
        record.insert("id".to_string(), OdooValue::Int(1));
        record.insert("create_date".to_string(), OdooValue::DateTime(created));

        let outcome = CrmOutcome::new(OdooValue::Array(vec![OdooValue::Struct(record)]))
            .with_count(1)
            .with_message("1 lead");
        let result = OperationResult::from_outcome::<ValidationError>(Ok(outcome));

        assert!(result.success());
        assert_eq!(result.status_code(), 200);
        assert_eq!(
            serde_json::to_value(&result).expect("encodes"),
            json!({
                "success": true,
                "data": [{"id": 1, "create_date": "2024-01-02 03:04:05"}],
                "error": null,
                "message": "1 lead",
                "count": 1
            })
        );
    }

    #[test]
    fn failure_envelope_has_error_and_no_data() {
        let result = OperationResult::from_outcome::<ValidationError>(Err(
            ValidationError::MissingField { field: "name" },
        ));

        assert!(!result.success());
        assert!(result.data().is_none());
        assert_eq!(result.error(), Some("`name` is required"));
        assert_eq!(result.error_class(), Some(ErrorClass::Validation));
        assert_eq!(result.status_code(), 400);
    }

    #[test]
    fn unencodable_data_becomes_serialization_failure() {
        let outcome = CrmOutcome::new(OdooValue::Double(f64::INFINITY));
        let result = OperationResult::from_outcome::<ValidationError>(Ok(outcome));

        assert!(!result.success());
        assert_eq!(result.error_class(), Some(ErrorClass::Serialization));
        assert_eq!(result.status_code(), 500);
    }
}
