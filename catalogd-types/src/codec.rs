//! Primitive attribute value and timestamp codec (spec.md §4.1, C1).
//!
//! `PrimitiveValue` is the in-memory representation shared by the storage
//! and service layers. Conversions to/from the wire (`pb::ScalarValue`) are
//! pure and infallible in the wire→native direction for well-formed
//! messages; native→storage and storage→native conversions are where
//! `CodecError::DataCorruption` can surface, since the database is the one
//! place an already-validated invariant could have been violated out of
//! band.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pb;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("malformed timestamp: {0}")]
    MalformedTimestamp(String),
    #[error("malformed date: {0}")]
    MalformedDate(String),
    #[error("empty array value is not allowed")]
    EmptyArray,
    #[error("array elements do not share a single primitive type")]
    MixedArrayTypes,
    #[error("value is missing its oneof payload")]
    MissingValue,
    #[error("decoding {stored} storage column into a {requested} attribute is not allowed")]
    ForbiddenCoercion { stored: &'static str, requested: &'static str },
}

/// One of the seven primitive attribute kinds, carrying its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    /// Exact textual representation, per spec.md §4.1 ("DECIMAL values are
    /// stored as exact textual representations").
    Decimal(String),
    Str(String),
    Date(NaiveDate),
    /// Carries the original UTC offset; storage normalises to UTC but the
    /// wire form preserves it (spec.md §4.1).
    DateTime(DateTime<FixedOffset>),
}

impl PrimitiveValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveValue::Bool(_) => "BOOLEAN",
            PrimitiveValue::Int(_) => "INTEGER",
            PrimitiveValue::Float(_) => "FLOAT",
            PrimitiveValue::Decimal(_) => "DECIMAL",
            PrimitiveValue::Str(_) => "STRING",
            PrimitiveValue::Date(_) => "DATE",
            PrimitiveValue::DateTime(_) => "DATETIME",
        }
    }
}

/// Truncates a timestamp's sub-second precision to microseconds, the
/// precision spec.md §4.1 says is used for storage ("nanosecond-truncated
/// to microseconds when stored").
pub fn truncate_to_micros(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let micros = ts.timestamp_subsec_micros();
    ts.with_nanosecond(micros * 1_000)
        .expect("micros * 1000 is a valid nanosecond count")
}

use chrono::Timelike;

pub fn timestamp_to_wire(ts: DateTime<FixedOffset>) -> String {
    truncate_to_micros(ts).to_rfc3339_opts(SecondsFormat::Micros, false)
}

pub fn timestamp_from_wire(s: &str) -> Result<DateTime<FixedOffset>, CodecError> {
    DateTime::parse_from_rfc3339(s).map_err(|e| CodecError::MalformedTimestamp(e.to_string()))
}

pub fn date_to_wire(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn date_from_wire(s: &str) -> Result<NaiveDate, CodecError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| CodecError::MalformedDate(e.to_string()))
}

pub fn scalar_to_pb(value: &PrimitiveValue) -> pb::ScalarValue {
    use pb::scalar_value::Kind;
    let kind = match value {
        PrimitiveValue::Bool(b) => Kind::BoolValue(*b),
        PrimitiveValue::Int(i) => Kind::IntValue(*i),
        PrimitiveValue::Float(f) => Kind::FloatValue(*f),
        PrimitiveValue::Decimal(d) => Kind::DecimalValue(d.clone()),
        PrimitiveValue::Str(s) => Kind::StringValue(s.clone()),
        PrimitiveValue::Date(d) => Kind::DateValue(date_to_wire(*d)),
        PrimitiveValue::DateTime(dt) => Kind::DatetimeValue(timestamp_to_wire(*dt)),
    };
    pb::ScalarValue { kind: Some(kind) }
}

pub fn scalar_from_pb(value: pb::ScalarValue) -> Result<PrimitiveValue, CodecError> {
    use pb::scalar_value::Kind;
    match value.kind.ok_or(CodecError::MissingValue)? {
        Kind::BoolValue(b) => Ok(PrimitiveValue::Bool(b)),
        Kind::IntValue(i) => Ok(PrimitiveValue::Int(i)),
        Kind::FloatValue(f) => Ok(PrimitiveValue::Float(f)),
        Kind::DecimalValue(d) => Ok(PrimitiveValue::Decimal(d)),
        Kind::StringValue(s) => Ok(PrimitiveValue::Str(s)),
        Kind::DateValue(s) => Ok(PrimitiveValue::Date(date_from_wire(&s)?)),
        Kind::DatetimeValue(s) => Ok(PrimitiveValue::DateTime(timestamp_from_wire(&s)?)),
    }
}

/// A tag attribute's full value: a scalar, or a non-empty array of scalars
/// of one element type (spec.md §4.1, §3 "TagAttribute").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Scalar(PrimitiveValue),
    Array(Vec<PrimitiveValue>),
}

impl AttrValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Scalar(v) => v.type_name(),
            AttrValue::Array(items) => items
                .first()
                .map(PrimitiveValue::type_name)
                .unwrap_or("UNKNOWN"),
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, AttrValue::Array(_))
    }
}

fn same_primitive_kind(a: &PrimitiveValue, b: &PrimitiveValue) -> bool {
    a.type_name() == b.type_name()
}

pub fn attr_value_to_pb(value: &AttrValue) -> pb::AttrValue {
    use pb::attr_value::Kind;
    let kind = match value {
        AttrValue::Scalar(v) => Kind::Scalar(scalar_to_pb(v)),
        AttrValue::Array(items) => Kind::Array(pb::ScalarArray {
            items: items.iter().map(scalar_to_pb).collect(),
        }),
    };
    pb::AttrValue { kind: Some(kind) }
}

pub fn attr_value_from_pb(value: pb::AttrValue) -> Result<AttrValue, CodecError> {
    use pb::attr_value::Kind;
    match value.kind.ok_or(CodecError::MissingValue)? {
        Kind::Scalar(s) => Ok(AttrValue::Scalar(scalar_from_pb(s)?)),
        Kind::Array(arr) => {
            if arr.items.is_empty() {
                return Err(CodecError::EmptyArray);
            }
            let items = arr
                .items
                .into_iter()
                .map(scalar_from_pb)
                .collect::<Result<Vec<_>, _>>()?;
            let first = &items[0];
            if items.iter().any(|v| !same_primitive_kind(v, first)) {
                return Err(CodecError::MixedArrayTypes);
            }
            Ok(AttrValue::Array(items))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn timestamp_round_trips_with_offset() {
        let ts = DateTime::parse_from_rfc3339("2024-03-05T10:15:30.123456789+02:00").unwrap();
        let wire = timestamp_to_wire(ts);
        let back = timestamp_from_wire(&wire).unwrap();
        assert_eq!(back.offset(), ts.offset());
        assert_eq!(back.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn date_round_trips() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(date_from_wire(&date_to_wire(d)).unwrap(), d);
    }

    #[test]
    fn scalar_round_trips_each_type() {
        let values = vec![
            PrimitiveValue::Bool(true),
            PrimitiveValue::Int(42),
            PrimitiveValue::Float(1.5),
            PrimitiveValue::Decimal("3.1400000".to_string()),
            PrimitiveValue::Str("widget_orders".to_string()),
            PrimitiveValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
        ];
        for v in values {
            let pb = scalar_to_pb(&v);
            assert_eq!(scalar_from_pb(pb).unwrap(), v);
        }
    }

    #[test]
    fn empty_array_is_rejected() {
        let wire = pb::AttrValue {
            kind: Some(pb::attr_value::Kind::Array(pb::ScalarArray { items: vec![] })),
        };
        assert_eq!(attr_value_from_pb(wire), Err(CodecError::EmptyArray));
    }

    #[test]
    fn mixed_type_array_is_rejected() {
        let wire = pb::AttrValue {
            kind: Some(pb::attr_value::Kind::Array(pb::ScalarArray {
                items: vec![
                    scalar_to_pb(&PrimitiveValue::Int(1)),
                    scalar_to_pb(&PrimitiveValue::Str("x".to_string())),
                ],
            })),
        };
        assert_eq!(attr_value_from_pb(wire), Err(CodecError::MixedArrayTypes));
    }
}
