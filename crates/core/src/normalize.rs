//! Response normalization.
//!
//! The backend hands back native timestamps; JSON has no such type. Every
//! value that reaches a caller goes through [`normalize`] first.

use crate::value::OdooValue;

/// Fixed text form for timestamps: second precision, naive backend time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Replaces every timestamp in `value` with its `YYYY-MM-DD HH:MM:SS` text.
///
/// Total and idempotent. Struct keys and array order are preserved.
pub fn normalize(value: OdooValue) -> OdooValue {
    match value {
        OdooValue::DateTime(timestamp) => {
            OdooValue::String(timestamp.format(TIMESTAMP_FORMAT).to_string())
        }
        OdooValue::Array(items) => OdooValue::Array(items.into_iter().map(normalize).collect()),
        OdooValue::Struct(fields) => OdooValue::Struct(
            fields.into_iter().map(|(key, value)| (key, normalize(value))).collect(),
        ),
        other => other,
    }
}
