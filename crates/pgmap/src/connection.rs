//! The connection seam between repositories and the wire driver.
//!
//! A [`Connection`] executes one SQL string with positional parameters and
//! returns a tabular [`QueryResult`]. The trait is deliberately narrow so
//! that a `tokio_postgres::Client`, a pooled connection, or a test double
//! all fit behind it; everything above this seam sees driver cells only as
//! [`Value`]s.

use std::sync::Arc;

use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

use crate::error::{MapError, MapResult};
use crate::value::{Interval, Value};

/// One result row: ordered column names shared across the result, plus the
/// extracted cell values.
#[derive(Debug, Clone)]
pub struct TabularRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl TabularRow {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(|c| c.as_str())
            .zip(self.values.iter())
    }
}

/// The tabular result of one executed statement.
///
/// For commands carrying `RETURNING`, `rows_affected` equals `rows.len()`;
/// that pairing is what repository count verification relies on.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows_affected: u64,
    pub rows: Vec<TabularRow>,
}

/// A connection capable of executing SQL with positional parameters.
///
/// Driver errors propagate uninterpreted beyond SQLSTATE classification;
/// this seam never retries.
pub trait Connection: Send + Sync {
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = MapResult<QueryResult>> + Send;
}

impl Connection for tokio_postgres::Client {
    async fn execute(&self, sql: &str, params: &[Value]) -> MapResult<QueryResult> {
        execute_on(self, sql, params).await
    }
}

impl Connection for deadpool_postgres::Object {
    async fn execute(&self, sql: &str, params: &[Value]) -> MapResult<QueryResult> {
        execute_on(self, sql, params).await
    }
}

pub(crate) async fn execute_on(
    client: &tokio_postgres::Client,
    sql: &str,
    params: &[Value],
) -> MapResult<QueryResult> {
    let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|v| v as _).collect();
    let rows = client
        .query(sql, &refs)
        .await
        .map_err(MapError::from_db_error)?;
    tabulate(rows)
}

fn tabulate(rows: Vec<Row>) -> MapResult<QueryResult> {
    let Some(first) = rows.first() else {
        return Ok(QueryResult::default());
    };
    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>()
        .into();

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(cell(row, idx)?);
        }
        out.push(TabularRow::new(columns.clone(), values));
    }
    Ok(QueryResult {
        rows_affected: out.len() as u64,
        rows: out,
    })
}

/// Extract one cell into a [`Value`] by the column's Postgres type.
fn cell(row: &Row, idx: usize) -> MapResult<Value> {
    let column = &row.columns()[idx];
    let name = column.name();
    let ty = column.type_();
    let decode = |e: tokio_postgres::Error| MapError::decode(name, e.to_string());

    let value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map_err(decode)?.map(Value::Bool)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx).map_err(decode)?.map(Value::Int2)
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx).map_err(decode)?.map(Value::Int4)
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map_err(decode)?.map(Value::Int8)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx).map_err(decode)?.map(Value::Float4)
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map_err(decode)?.map(Value::Float8)
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<rust_decimal::Decimal>>(idx)
            .map_err(decode)?
            .map(Value::Numeric)
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx).map_err(decode)?.map(Value::Text)
    } else if *ty == Type::BYTEA {
        row.try_get::<_, Option<Vec<u8>>>(idx).map_err(decode)?.map(Value::Bytes)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .map_err(decode)?
            .map(Value::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .map_err(decode)?
            .map(Value::TimestampTz)
    } else if *ty == Type::DATE {
        row.try_get::<_, Option<chrono::NaiveDate>>(idx)
            .map_err(decode)?
            .map(Value::Date)
    } else if *ty == Type::TIME {
        row.try_get::<_, Option<chrono::NaiveTime>>(idx)
            .map_err(decode)?
            .map(Value::Time)
    } else if *ty == Type::INTERVAL {
        row.try_get::<_, Option<Interval>>(idx).map_err(decode)?.map(Value::Interval)
    } else if *ty == Type::UUID {
        row.try_get::<_, Option<uuid::Uuid>>(idx).map_err(decode)?.map(Value::Uuid)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        row.try_get::<_, Option<serde_json::Value>>(idx)
            .map_err(decode)?
            .map(Value::Json)
    } else {
        return Err(MapError::decode(
            name,
            format!("unsupported column type {ty}"),
        ));
    };

    Ok(value.unwrap_or(Value::Null))
}
