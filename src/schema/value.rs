//! Typed field values and the default coercions for primitive fields.

use crate::framework::{Resource, SchemaError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;

/// Value types a compiled field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Number,
    String,
    Boolean,
    Date,
    /// An associated resource, nested or referenced.
    Resource,
    /// Opaque pass-through JSON.
    Any,
}

/// Primitive types accepted in a raw field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Number,
    String,
    Boolean,
    Date,
}

impl PrimitiveType {
    pub fn value_type(self) -> ValueType {
        match self {
            PrimitiveType::Number => ValueType::Number,
            PrimitiveType::String => ValueType::String,
            PrimitiveType::Boolean => ValueType::Boolean,
            PrimitiveType::Date => ValueType::Date,
        }
    }

    /// Coerces raw JSON into this type.
    ///
    /// JSON `null` stays [`FieldValue::Null`] for every type except Boolean, where
    /// anything other than `true` or `"true"` is false. Dates that cannot be read
    /// become [`FieldValue::Null`] as well.
    pub fn coerce(self, json: &Value) -> Result<FieldValue, SchemaError> {
        if json.is_null() && self != PrimitiveType::Boolean {
            return Ok(FieldValue::Null);
        }
        match self {
            PrimitiveType::Number => Ok(FieldValue::Number(coerce_number(json))),
            PrimitiveType::String => Ok(FieldValue::String(coerce_string(json))),
            PrimitiveType::Boolean => Ok(FieldValue::Boolean(coerce_boolean(json))),
            // An unreadable date is an invalid date, not an error.
            PrimitiveType::Date => Ok(coerce_date(json).map_or(FieldValue::Null, FieldValue::Date)),
        }
    }
}

/// A deserialized field value.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Null,
    Number(f64),
    String(String),
    Boolean(bool),
    Date(DateTime<Utc>),
    Resource(Resource),
    Json(Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            FieldValue::Resource(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FieldValue::Json(v) => Some(v),
            _ => None,
        }
    }

    /// Plain JSON rendering. Dates become ISO-8601 strings with millisecond
    /// precision, resources become their data payload.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Number(n) => number_to_json(*n),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Date(d) => Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            FieldValue::Resource(r) => r.data().unwrap_or(Value::Null),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Number(a), FieldValue::Number(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a == b,
            (FieldValue::Date(a), FieldValue::Date(b)) => a == b,
            (FieldValue::Resource(a), FieldValue::Resource(b)) => Resource::ptr_eq(a, b),
            (FieldValue::Json(a), FieldValue::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(n as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(n.into())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Boolean(b)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(d: DateTime<Utc>) -> Self {
        FieldValue::Date(d)
    }
}

impl From<Resource> for FieldValue {
    fn from(r: Resource) -> Self {
        FieldValue::Resource(r)
    }
}

impl From<&Resource> for FieldValue {
    fn from(r: &Resource) -> Self {
        FieldValue::Resource(r.clone())
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

/// Largest integer an f64 holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integral numbers stay integers in JSON; non-finite numbers become `null`.
pub(crate) fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Formats a number the way it reads in a URL or an id: no trailing `.0`.
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Formats a JSON number without going through `f64` when it is an integer.
pub(crate) fn format_json_number(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    n.as_f64().map(format_number).unwrap_or_else(|| n.to_string())
}

/// Numeric cast. Unparsable input becomes NaN.
pub fn coerce_number(json: &Value) -> f64 {
    match json {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// String cast. Arrays and objects become their JSON text.
pub fn coerce_string(json: &Value) -> String {
    match json {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_json_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => json.to_string(),
    }
}

/// `true` and `"true"` are true, everything else is false.
pub fn coerce_boolean(json: &Value) -> bool {
    match json {
        Value::Bool(b) => *b,
        Value::String(s) => s == "true",
        _ => false,
    }
}

/// Accepts RFC 3339 timestamps, naive timestamps (read as UTC), plain dates and
/// milliseconds since the epoch.
pub fn coerce_date(json: &Value) -> Result<DateTime<Utc>, SchemaError> {
    match json {
        Value::String(s) => parse_date(s).ok_or_else(|| SchemaError::coercion("Date", json)),
        Value::Number(n) => n
            .as_f64()
            .filter(|millis| millis.is_finite())
            .and_then(|millis| Utc.timestamp_millis_opt(millis as i64).single())
            .ok_or_else(|| SchemaError::coercion("Date", json)),
        _ => Err(SchemaError::coercion("Date", json)),
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(d.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_coercion() {
        assert_eq!(coerce_number(&json!(7)), 7.0);
        assert_eq!(coerce_number(&json!(" 2.5 ")), 2.5);
        assert_eq!(coerce_number(&json!("")), 0.0);
        assert_eq!(coerce_number(&json!(true)), 1.0);
        assert!(coerce_number(&json!("seven")).is_nan());
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(coerce_string(&json!("x")), "x");
        assert_eq!(coerce_string(&json!(7)), "7");
        assert_eq!(coerce_string(&json!(7.0)), "7");
        assert_eq!(coerce_string(&json!(7.5)), "7.5");
        assert_eq!(coerce_string(&json!(false)), "false");
        assert_eq!(coerce_string(&json!([1, 2])), "[1,2]");
        assert_eq!(coerce_string(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_large_integers_keep_every_digit() {
        assert_eq!(coerce_string(&json!(9_007_199_254_740_993_u64)), "9007199254740993");
        assert_eq!(coerce_string(&json!(-9_007_199_254_740_993_i64)), "-9007199254740993");
        assert_eq!(coerce_string(&json!(u64::MAX)), "18446744073709551615");
    }

    #[test]
    fn test_bad_server_data_reads_leniently() {
        assert_eq!(
            PrimitiveType::Date.coerce(&json!("not a date")).unwrap(),
            FieldValue::Null
        );
        assert_eq!(PrimitiveType::Date.coerce(&json!([1])).unwrap(), FieldValue::Null);
        assert_eq!(
            PrimitiveType::String.coerce(&json!(["a"])).unwrap(),
            FieldValue::String(r#"["a"]"#.into())
        );
    }

    #[test]
    fn test_boolean_coercion() {
        assert!(coerce_boolean(&json!(true)));
        assert!(coerce_boolean(&json!("true")));
        assert!(!coerce_boolean(&json!("yes")));
        assert!(!coerce_boolean(&json!(1)));
        assert!(!coerce_boolean(&Value::Null));
    }

    #[test]
    fn test_date_coercion_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(coerce_date(&json!("2024-03-01T12:30:00Z")).unwrap(), expected);
        assert_eq!(coerce_date(&json!("2024-03-01T14:30:00+02:00")).unwrap(), expected);
        assert_eq!(coerce_date(&json!("2024-03-01T12:30:00")).unwrap(), expected);
        assert_eq!(coerce_date(&json!(expected.timestamp_millis())).unwrap(), expected);
        assert_eq!(
            coerce_date(&json!("2024-03-01")).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        assert!(coerce_date(&json!("not a date")).is_err());
    }

    #[test]
    fn test_null_stays_null_except_for_boolean() {
        assert_eq!(PrimitiveType::Number.coerce(&Value::Null).unwrap(), FieldValue::Null);
        assert_eq!(PrimitiveType::Date.coerce(&Value::Null).unwrap(), FieldValue::Null);
        assert_eq!(
            PrimitiveType::Boolean.coerce(&Value::Null).unwrap(),
            FieldValue::Boolean(false)
        );
    }

    #[test]
    fn test_to_json() {
        assert_eq!(FieldValue::Number(7.0).to_json(), json!(7));
        assert_eq!(FieldValue::Number(0.5).to_json(), json!(0.5));
        assert_eq!(FieldValue::Number(f64::NAN).to_json(), Value::Null);
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(FieldValue::Date(date).to_json(), json!("2024-03-01T12:30:00.000Z"));
    }
}
