//! Typed attributes and value loading.
//!
//! An [`AttributeType`] knows how to coerce any raw driver value into the
//! type's canonical [`Value`] shape, dispatching on the raw value's
//! [`ValueKind`](crate::value::ValueKind) through a [`LoaderDispatch`]
//! table. Each constructed attribute type owns its table outright —
//! deriving a specialized type means constructing a new one, so no memoized
//! resolution ever leaks between unrelated types.

mod dispatch;

pub use dispatch::{Loader, LoaderDispatch};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::error::{MapError, MapResult};
use crate::value::{Interval, Value, ValueKind};

/// A domain attribute type: a name plus its independently owned loader
/// dispatch table.
#[derive(Debug)]
pub struct AttributeType {
    name: &'static str,
    dispatch: LoaderDispatch,
}

impl AttributeType {
    fn build(name: &'static str, register: impl FnOnce(&mut LoaderDispatch)) -> Self {
        let mut dispatch = LoaderDispatch::new();
        dispatch.register(ValueKind::Null, Ok);
        register(&mut dispatch);
        Self { name, dispatch }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Coerce a raw value into this type's canonical shape.
    pub fn load(&self, value: impl Into<Value>) -> MapResult<Value> {
        self.dispatch.load(value.into())
    }

    /// Specialize this type by replacing or adding a loader. Memoized
    /// fallback resolutions of this type (and only this type) are dropped.
    pub fn register<F>(&mut self, kind: ValueKind, loader: F)
    where
        F: Fn(Value) -> MapResult<Value> + Send + Sync + 'static,
    {
        self.dispatch.register(kind, loader);
    }

    pub fn dispatch(&self) -> &LoaderDispatch {
        &self.dispatch
    }

    pub fn boolean() -> Self {
        Self::build("boolean", |d| {
            d.register(ValueKind::Bool, Ok);
            d.register(ValueKind::Text, |v| {
                let s = expect_text(v);
                match s.trim().to_ascii_lowercase().as_str() {
                    "t" | "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
                    "f" | "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
                    other => Err(MapError::coerce("boolean", format!("'{other}'"))),
                }
            });
        })
    }

    /// 16-bit integer.
    pub fn int2() -> Self {
        Self::build("int2", |d| {
            register_integer_loaders(d, "int2", |i| {
                i16::try_from(i)
                    .map(Value::Int2)
                    .map_err(|_| MapError::coerce("int2", format!("{i} out of range")))
            });
        })
    }

    /// 32-bit integer.
    pub fn integer() -> Self {
        Self::build("integer", |d| {
            register_integer_loaders(d, "integer", |i| {
                i32::try_from(i)
                    .map(Value::Int4)
                    .map_err(|_| MapError::coerce("integer", format!("{i} out of range")))
            });
        })
    }

    /// 64-bit integer.
    pub fn int8() -> Self {
        Self::build("int8", |d| {
            register_integer_loaders(d, "int8", |i| Ok(Value::Int8(i)));
        })
    }

    /// Arbitrary-precision numeric.
    pub fn decimal() -> Self {
        Self::build("decimal", |d| {
            d.register(ValueKind::Numeric, Ok);
            d.register(ValueKind::Integer, |v| {
                Ok(Value::Numeric(Decimal::from(expect_int(&v))))
            });
            d.register(ValueKind::Float, |v| {
                let f = match v {
                    Value::Float4(f) => f as f64,
                    Value::Float8(f) => f,
                    other => return Err(unexpected("decimal", &other)),
                };
                Decimal::try_from(f)
                    .map(Value::Numeric)
                    .map_err(|e| MapError::coerce("decimal", e.to_string()))
            });
            d.register(ValueKind::Text, |v| {
                expect_text(v)
                    .trim()
                    .parse::<Decimal>()
                    .map(Value::Numeric)
                    .map_err(|e| MapError::coerce("decimal", e.to_string()))
            });
        })
    }

    /// Unbounded text.
    pub fn text() -> Self {
        Self::build("text", |d| {
            d.register(ValueKind::Text, Ok);
            d.register(ValueKind::Number, |v| stringified(v).map(Value::Text));
            d.register(ValueKind::Bool, |v| stringified(v).map(Value::Text));
        })
    }

    /// Bounded text; values longer than `limit` characters are rejected.
    pub fn character(limit: usize) -> Self {
        Self::build("character", move |d| {
            let check = move |s: String| {
                if s.chars().count() > limit {
                    Err(MapError::coerce(
                        "character",
                        format!("value exceeds {limit} characters"),
                    ))
                } else {
                    Ok(Value::Text(s))
                }
            };
            d.register(ValueKind::Text, move |v| check(expect_text(v)));
            d.register(ValueKind::Number, move |v| stringified(v).and_then(check));
            d.register(ValueKind::Bool, move |v| stringified(v).and_then(check));
        })
    }

    /// Byte string.
    pub fn binary() -> Self {
        Self::build("binary", |d| {
            d.register(ValueKind::Bytes, Ok);
            d.register(ValueKind::Text, |v| {
                Ok(Value::Bytes(expect_text(v).into_bytes()))
            });
        })
    }

    /// Point in time, canonically UTC.
    pub fn timestamp() -> Self {
        Self::build("timestamp", |d| {
            d.register(ValueKind::Temporal, |v| match v {
                Value::TimestampTz(_) => Ok(v),
                Value::Timestamp(ndt) => Ok(Value::TimestampTz(ndt.and_utc())),
                Value::Date(date) => {
                    Ok(Value::TimestampTz(date.and_time(NaiveTime::MIN).and_utc()))
                }
                other => Err(unexpected("timestamp", &other)),
            });
            d.register(ValueKind::Text, |v| {
                parse_timestamp(expect_text(v).trim()).map(Value::TimestampTz)
            });
        })
    }

    /// Calendar date.
    pub fn date() -> Self {
        Self::build("date", |d| {
            d.register(ValueKind::Temporal, |v| match v {
                Value::Date(_) => Ok(v),
                Value::Timestamp(ndt) => Ok(Value::Date(ndt.date())),
                Value::TimestampTz(dt) => Ok(Value::Date(dt.naive_utc().date())),
                other => Err(unexpected("date", &other)),
            });
            d.register(ValueKind::Text, |v| {
                NaiveDate::parse_from_str(expect_text(v).trim(), "%Y-%m-%d")
                    .map(Value::Date)
                    .map_err(|e| MapError::coerce("date", e.to_string()))
            });
        })
    }

    /// Time of day.
    pub fn time() -> Self {
        Self::build("time", |d| {
            d.register(ValueKind::Temporal, |v| match v {
                Value::Time(_) => Ok(v),
                Value::Timestamp(ndt) => Ok(Value::Time(ndt.time())),
                Value::TimestampTz(dt) => Ok(Value::Time(dt.naive_utc().time())),
                other => Err(unexpected("time", &other)),
            });
            d.register(ValueKind::Text, |v| {
                NaiveTime::parse_from_str(expect_text(v).trim(), "%H:%M:%S%.f")
                    .map(Value::Time)
                    .map_err(|e| MapError::coerce("time", e.to_string()))
            });
        })
    }

    /// Duration as months/days/microseconds.
    pub fn interval() -> Self {
        Self::build("interval", |d| {
            d.register(ValueKind::Interval, Ok);
            d.register(ValueKind::Text, |v| {
                parse_interval(expect_text(v).trim()).map(Value::Interval)
            });
        })
    }

    pub fn uuid() -> Self {
        Self::build("uuid", |d| {
            d.register(ValueKind::Uuid, Ok);
            d.register(ValueKind::Text, |v| {
                uuid::Uuid::parse_str(expect_text(v).trim())
                    .map(Value::Uuid)
                    .map_err(|e| MapError::coerce("uuid", e.to_string()))
            });
        })
    }

    pub fn json() -> Self {
        Self::build("json", |d| {
            d.register(ValueKind::Json, Ok);
            d.register(ValueKind::Text, |v| {
                serde_json::from_str(&expect_text(v))
                    .map(Value::Json)
                    .map_err(|e| MapError::coerce("json", e.to_string()))
            });
        })
    }
}

fn register_integer_loaders(
    dispatch: &mut LoaderDispatch,
    target: &'static str,
    narrow: fn(i64) -> MapResult<Value>,
) {
    dispatch.register(ValueKind::Integer, move |v| narrow(expect_int(&v)));
    dispatch.register(ValueKind::Numeric, move |v| {
        let d = match v {
            Value::Numeric(d) => d,
            other => return Err(unexpected(target, &other)),
        };
        if d.fract() != Decimal::ZERO {
            return Err(MapError::coerce(target, format!("{d} has a fractional part")));
        }
        let i = d
            .to_i64()
            .ok_or_else(|| MapError::coerce(target, format!("{d} out of range")))?;
        narrow(i)
    });
    dispatch.register(ValueKind::Text, move |v| {
        let i = expect_text(v)
            .trim()
            .parse::<i64>()
            .map_err(|e| MapError::coerce(target, e.to_string()))?;
        narrow(i)
    });
}

// The helpers below are only invoked for kinds their loaders registered,
// so the fallthrough arms guard against dispatch-table edits, not normal flow.

fn expect_text(value: Value) -> String {
    match value {
        Value::Text(s) => s,
        other => format!("{other:?}"),
    }
}

fn expect_int(value: &Value) -> i64 {
    match value {
        Value::Int2(i) => i64::from(*i),
        Value::Int4(i) => i64::from(*i),
        Value::Int8(i) => *i,
        _ => 0,
    }
}

fn unexpected(target: &'static str, value: &Value) -> MapError {
    MapError::coerce(target, format!("unexpected {} value", value.kind()))
}

fn stringified(value: Value) -> MapResult<String> {
    match value {
        Value::Text(s) => Ok(s),
        Value::Int2(i) => Ok(i.to_string()),
        Value::Int4(i) => Ok(i.to_string()),
        Value::Int8(i) => Ok(i.to_string()),
        Value::Float4(f) => Ok(f.to_string()),
        Value::Float8(f) => Ok(f.to_string()),
        Value::Numeric(d) => Ok(d.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(unexpected("text", &other)),
    }
}

fn parse_timestamp(s: &str) -> MapResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ndt.and_utc());
    }
    Err(MapError::coerce("timestamp", format!("'{s}'")))
}

/// Parse Postgres-style interval text, e.g. `1 year 2 mons 3 days 04:05:06.789`.
fn parse_interval(s: &str) -> MapResult<Interval> {
    let bad = || MapError::coerce("interval", format!("'{s}'"));
    let mut interval = Interval::default();
    let tokens: Vec<&str> = s.split_whitespace().collect();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        if token.contains(':') {
            interval.microseconds += parse_clock(token).ok_or_else(bad)?;
            i += 1;
            continue;
        }
        let n: i64 = token.parse().map_err(|_| bad())?;
        let unit = *tokens.get(i + 1).ok_or_else(bad)?;
        match unit.trim_end_matches('s') {
            "year" => interval.months += (n * 12) as i32,
            "mon" | "month" => interval.months += n as i32,
            "week" => interval.days += (n * 7) as i32,
            "day" => interval.days += n as i32,
            _ => return Err(bad()),
        }
        i += 2;
    }

    Ok(interval)
}

fn parse_clock(token: &str) -> Option<i64> {
    let (sign, rest) = match token.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, token.strip_prefix('+').unwrap_or(token)),
    };
    let mut parts = rest.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds = parts.next().unwrap_or("0");
    if parts.next().is_some() {
        return None;
    }
    let (whole, frac) = match seconds.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds, ""),
    };
    let whole: i64 = whole.parse().ok()?;
    let mut frac_micros = 0_i64;
    if !frac.is_empty() {
        let padded = format!("{frac:0<6}");
        frac_micros = padded.get(..6)?.parse().ok()?;
    }
    let total = hours * 3_600_000_000 + minutes * 60_000_000 + whole * 1_000_000 + frac_micros;
    Some(sign * total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_loads_text_and_wider_ints() {
        let ty = AttributeType::integer();
        assert_eq!(ty.load("42").unwrap(), Value::Int4(42));
        assert_eq!(ty.load(42_i64).unwrap(), Value::Int4(42));
        assert_eq!(ty.load(42_i16).unwrap(), Value::Int4(42));
        assert_eq!(ty.load(Value::Null).unwrap(), Value::Null);
    }

    #[test]
    fn integer_rejects_malformed_text_as_coercion_failure() {
        let ty = AttributeType::integer();
        let err = ty.load("forty-two").unwrap_err();
        assert!(matches!(err, MapError::Coerce { target: "integer", .. }));
    }

    #[test]
    fn integer_rejects_out_of_range() {
        let ty = AttributeType::integer();
        assert!(ty.load(i64::MAX).is_err());
        assert!(AttributeType::int2().load(40_000_i32).is_err());
    }

    #[test]
    fn integer_has_no_loader_for_bytes() {
        let ty = AttributeType::integer();
        let err = ty.load(Value::Bytes(vec![1])).unwrap_err();
        assert!(matches!(err, MapError::NoLoader { kind: "bytea" }));
    }

    #[test]
    fn decimal_loads_ints_floats_and_text() {
        let ty = AttributeType::decimal();
        assert_eq!(
            ty.load(7_i32).unwrap(),
            Value::Numeric(Decimal::from(7_i64))
        );
        assert_eq!(
            ty.load("1.25").unwrap(),
            Value::Numeric("1.25".parse().unwrap())
        );
        assert!(ty.load(0.5_f64).is_ok());
    }

    #[test]
    fn integer_rejects_fractional_numeric() {
        let ty = AttributeType::integer();
        let d: Decimal = "1.5".parse().unwrap();
        assert!(ty.load(d).is_err());
        let d: Decimal = "2.000".parse().unwrap();
        assert_eq!(ty.load(d).unwrap(), Value::Int4(2));
    }

    #[test]
    fn text_stringifies_numbers_via_supertype_walk() {
        let ty = AttributeType::text();
        assert_eq!(ty.load(36_i32).unwrap(), Value::from("36"));
        assert_eq!(ty.load(true).unwrap(), Value::from("true"));
        assert!(ty.dispatch().memoized(crate::value::ValueKind::Int4));
    }

    #[test]
    fn character_enforces_its_limit() {
        let ty = AttributeType::character(3);
        assert_eq!(ty.load("abc").unwrap(), Value::from("abc"));
        assert!(ty.load("abcd").is_err());
    }

    #[test]
    fn timestamp_parses_wire_text() {
        let ty = AttributeType::timestamp();
        let loaded = ty.load("2026-08-07 10:30:00.5+00").unwrap();
        match loaded {
            Value::TimestampTz(dt) => {
                assert_eq!(dt.to_rfc3339(), "2026-08-07T10:30:00.500+00:00");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn timestamp_promotes_dates_but_not_times() {
        let ty = AttributeType::timestamp();
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        assert!(matches!(
            ty.load(date).unwrap(),
            Value::TimestampTz(_)
        ));
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        assert!(matches!(
            ty.load(noon).unwrap_err(),
            MapError::Coerce { .. }
        ));
    }

    #[test]
    fn date_and_time_parse_text() {
        assert_eq!(
            AttributeType::date().load("2026-08-07").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2026, 8, 7).unwrap())
        );
        assert_eq!(
            AttributeType::time().load("10:30:00").unwrap(),
            Value::Time(NaiveTime::from_hms_opt(10, 30, 0).unwrap())
        );
    }

    #[test]
    fn interval_parses_postgres_text() {
        let ty = AttributeType::interval();
        assert_eq!(
            ty.load("1 year 2 mons 3 days 04:05:06.789").unwrap(),
            Value::Interval(Interval::new(14, 3, 4 * 3_600_000_000 + 5 * 60_000_000 + 6_789_000))
        );
        assert_eq!(
            ty.load("-00:00:01").unwrap(),
            Value::Interval(Interval::new(0, 0, -1_000_000))
        );
        assert!(ty.load("sideways").is_err());
    }

    #[test]
    fn boolean_accepts_postgres_literals() {
        let ty = AttributeType::boolean();
        assert_eq!(ty.load("t").unwrap(), Value::Bool(true));
        assert_eq!(ty.load("false").unwrap(), Value::Bool(false));
        assert!(ty.load("maybe").is_err());
    }

    #[test]
    fn constructed_types_have_independent_dispatch_tables() {
        let mut specialized = AttributeType::integer();
        let plain = AttributeType::integer();

        specialized.register(ValueKind::Bool, |v| {
            Ok(Value::Int4(matches!(v, Value::Bool(true)) as i32))
        });

        assert_eq!(specialized.load(true).unwrap(), Value::Int4(1));
        // The sibling type constructed from the same constructor is untouched.
        assert!(matches!(
            plain.load(true).unwrap_err(),
            MapError::NoLoader { kind: "boolean" }
        ));
    }
}
