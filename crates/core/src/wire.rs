//! Wire encoding for everything a surface returns.

use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::SerializationError;
use crate::normalize::normalize;
use crate::value::OdooValue;

/// Normalizes `value` and converts it to JSON.
pub fn to_wire(value: OdooValue) -> Result<Value, SerializationError> {
    normalize(value).into_json()
}

/// Pretty JSON text for a tool or HTTP response. Never fails: an encoding
/// problem yields a best-effort `{"error": ...}` document instead.
pub fn encode_text<T: Serialize>(payload: &T) -> String {
    serde_json::to_string_pretty(payload).unwrap_or_else(|error| error_text(&error.to_string()))
}

/// `{"error": message}` as JSON text.
pub fn error_text(message: &str) -> String {
    error_document(message).to_string()
}

pub fn error_document(message: &str) -> Value {
    json!({ "error": message })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;
    use serde::ser::{Error as _, Serializer};
    use serde::Serialize;
    use serde_json::Value;

    use super::{encode_text, error_text, to_wire};
    use crate::value::OdooValue;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to encode"))
        }
    }

    #[test]
    fn to_wire_normalizes_before_encoding() {
        let timestamp = NaiveDate::from_ymd_opt(2023, 12, 31)
            .and_then(|date| date.and_hms_opt(23, 59, 59))
            .expect("valid timestamp");
        let mut fields = BTreeMap::new();
        fields.insert("write_date".to_string(), OdooValue::DateTime(timestamp));

        let json = to_wire(OdooValue::Struct(fields)).expect("encodes");
        assert_eq!(json["write_date"], "2023-12-31 23:59:59");
    }

    #[test]
    fn encode_text_falls_back_to_error_document() {
        let text = encode_text(&Unencodable);
        let parsed: Value = serde_json::from_str(&text).expect("fallback is valid json");
        assert_eq!(parsed["error"], "refusing to encode");
    }

    #[test]
    fn error_text_escapes_quotes() {
        let text = error_text("bad \"value\"");
        let parsed: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(parsed["error"], "bad \"value\"");
    }
}
