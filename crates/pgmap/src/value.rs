//! Driver-native value representation.
//!
//! [`Value`] is the closed set of cell shapes that cross the driver boundary:
//! statement parameters are `Value`s, and query-result cells are extracted
//! into `Value`s. Attribute loading (see [`crate::attribute`]) dispatches on
//! a value's [`ValueKind`], which carries an explicit supertype chain so a
//! loader registered for e.g. [`ValueKind::Number`] also covers every
//! numeric subtype.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};

/// A PostgreSQL interval: months, days, and microseconds kept separate,
/// matching the on-wire representation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interval {
    pub months: i32,
    pub days: i32,
    pub microseconds: i64,
}

impl Interval {
    pub fn new(months: i32, days: i32, microseconds: i64) -> Self {
        Self {
            months,
            days,
            microseconds,
        }
    }
}

impl<'a> FromSql<'a> for Interval {
    fn from_sql(
        _ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        if raw.len() != 16 {
            return Err(format!("invalid interval length: {}", raw.len()).into());
        }
        let microseconds = i64::from_be_bytes(raw[0..8].try_into()?);
        let days = i32::from_be_bytes(raw[8..12].try_into()?);
        let months = i32::from_be_bytes(raw[12..16].try_into()?);
        Ok(Interval {
            months,
            days,
            microseconds,
        })
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }
}

impl ToSql for Interval {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        out.extend_from_slice(&self.microseconds.to_be_bytes());
        out.extend_from_slice(&self.days.to_be_bytes());
        out.extend_from_slice(&self.months.to_be_bytes());
        Ok(IsNull::No)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::INTERVAL
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        if !<Self as ToSql>::accepts(ty) {
            return Err(format!("cannot convert interval to {}", ty).into());
        }
        self.to_sql(ty, out)
    }
}

/// A driver-native cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Time(NaiveTime),
    Interval(Interval),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    /// The runtime kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int2(_) => ValueKind::Int2,
            Value::Int4(_) => ValueKind::Int4,
            Value::Int8(_) => ValueKind::Int8,
            Value::Float4(_) => ValueKind::Float4,
            Value::Float8(_) => ValueKind::Float8,
            Value::Numeric(_) => ValueKind::Numeric,
            Value::Text(_) => ValueKind::Text,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::TimestampTz(_) => ValueKind::TimestampTz,
            Value::Date(_) => ValueKind::Date,
            Value::Time(_) => ValueKind::Time,
            Value::Interval(_) => ValueKind::Interval,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Json(_) => ValueKind::Json,
            Value::Array(_) => ValueKind::Array,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// The runtime-type tag of a [`Value`], including abstract supertypes.
///
/// Leaf kinds are what [`Value::kind`] returns; abstract kinds (`Integer`,
/// `Float`, `Number`, `Temporal`, `Any`) exist so loaders can be registered
/// once for a whole family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int2,
    Int4,
    Int8,
    Integer,
    Float4,
    Float8,
    Float,
    Numeric,
    Number,
    Text,
    Bytes,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Interval,
    Temporal,
    Uuid,
    Json,
    Array,
    Any,
}

impl ValueKind {
    /// The immediate supertype, or `None` for the root kind.
    pub fn parent(self) -> Option<ValueKind> {
        use ValueKind::*;
        match self {
            Int2 | Int4 | Int8 => Some(Integer),
            Integer => Some(Number),
            Float4 | Float8 => Some(Float),
            Float => Some(Number),
            Numeric => Some(Number),
            Timestamp | TimestampTz | Date | Time | Interval => Some(Temporal),
            Null | Bool | Number | Text | Bytes | Temporal | Uuid | Json | Array => Some(Any),
            Any => None,
        }
    }

    /// This kind followed by its supertypes, ending at the root.
    pub fn ancestry(self) -> impl Iterator<Item = ValueKind> {
        std::iter::successors(Some(self), |k| k.parent())
    }

    pub fn name(self) -> &'static str {
        use ValueKind::*;
        match self {
            Null => "null",
            Bool => "boolean",
            Int2 => "int2",
            Int4 => "int4",
            Int8 => "int8",
            Integer => "integer",
            Float4 => "float4",
            Float8 => "float8",
            Float => "float",
            Numeric => "numeric",
            Number => "number",
            Text => "text",
            Bytes => "bytea",
            Timestamp => "timestamp",
            TimestampTz => "timestamptz",
            Date => "date",
            Time => "time",
            Interval => "interval",
            Temporal => "temporal",
            Uuid => "uuid",
            Json => "json",
            Array => "array",
            Any => "any",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int2(v) => v.to_sql(ty, out),
            Value::Int4(v) => v.to_sql(ty, out),
            Value::Int8(v) => v.to_sql(ty, out),
            Value::Float4(v) => v.to_sql(ty, out),
            Value::Float8(v) => v.to_sql(ty, out),
            Value::Numeric(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Time(v) => v.to_sql(ty, out),
            Value::Interval(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
            Value::Array(_) => {
                Err("array values cannot be bound as parameters; expand into an IN list".into())
            }
        }
    }

    // The expected Postgres type is only known server-side; parameters are
    // normalized by attribute loading before they reach the driver.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn to_sql_checked(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        self.to_sql(ty, out)
    }
}

macro_rules! impl_value_from {
    ($($from:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$from> for Value {
                fn from(v: $from) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    Decimal => Numeric,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    NaiveDate => Date,
    NaiveTime => Time,
    Interval => Interval,
    uuid::Uuid => Uuid,
    serde_json::Value => Json,
    Vec<Value> => Array,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}
