//! Statement execution and result reconciliation.
//!
//! A [`RecordProcessor`] executes a [`Statement`] against a borrowed
//! connection, verifies the affected/returned row count against what the
//! operation structurally expects, and hydrates or refreshes [`Record`]s
//! from the result. A count mismatch signals a lost update, a vanished
//! row, or a key collision and is never absorbed.

use std::sync::Arc;

use tracing::debug;

use crate::connection::{Connection, QueryResult};
use crate::error::{MapError, MapResult};
use crate::record::{Record, RecordType};
use crate::sql::Statement;

#[derive(Debug)]
pub struct RecordProcessor {
    ty: Arc<RecordType>,
}

impl RecordProcessor {
    pub fn new(ty: Arc<RecordType>) -> Self {
        Self { ty }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    async fn run(&self, conn: &impl Connection, statement: &Statement) -> MapResult<QueryResult> {
        statement.validate()?;
        let (sql, params) = statement.render();
        debug!(
            target: "pgmap::sql",
            verb = statement.verb().keyword(),
            params = params.len(),
            "{sql}"
        );
        let result = conn.execute(&sql, &params).await?;
        debug!(
            target: "pgmap::sql",
            affected = result.rows_affected,
            "executed"
        );
        Ok(result)
    }

    /// Execute a SELECT and hydrate every row, in result order.
    pub async fn select_many(
        &self,
        conn: &impl Connection,
        statement: &Statement,
    ) -> MapResult<Vec<Record>> {
        let result = self.run(conn, statement).await?;
        result
            .rows
            .iter()
            .map(|row| Record::hydrate(self.ty.clone(), row))
            .collect()
    }

    /// Execute a SELECT expected to match at most one row.
    pub async fn select_one(
        &self,
        conn: &impl Connection,
        statement: &Statement,
    ) -> MapResult<Option<Record>> {
        let result = self.run(conn, statement).await?;
        match result.rows.len() {
            0 => Ok(None),
            1 => Ok(Some(Record::hydrate(self.ty.clone(), &result.rows[0])?)),
            got => Err(MapError::mismatch(1, got as u64)),
        }
    }

    /// Execute a batch INSERT and reconcile each returned row onto its
    /// record positionally. The result must contain exactly one row per
    /// record; every record then transitions to stored with dirty cleared.
    ///
    /// Rows are loaded through the attribute types before anything is
    /// applied, so a failing row leaves every record untouched.
    pub async fn insert_many(
        &self,
        conn: &impl Connection,
        statement: &Statement,
        records: &mut [&mut Record],
    ) -> MapResult<()> {
        let result = self.run(conn, statement).await?;
        assert_result_size(records.len() as u64, &result)?;

        let mut staged = Vec::with_capacity(records.len());
        for (record, row) in records.iter().zip(&result.rows) {
            staged.push(record.load_row(row)?);
        }
        for (record, loaded) in records.iter_mut().zip(staged) {
            record.apply_loaded(loaded);
            record.mark_stored();
        }
        Ok(())
    }

    /// Execute a single-record UPDATE matched by key; exactly one row must
    /// come back, and its columns are written onto the record.
    pub async fn update_one(
        &self,
        conn: &impl Connection,
        statement: &Statement,
        record: &mut Record,
    ) -> MapResult<()> {
        let result = self.run(conn, statement).await?;
        assert_result_size(1, &result)?;
        let loaded = record.load_row(&result.rows[0])?;
        record.apply_loaded(loaded);
        record.mark_stored();
        Ok(())
    }

    /// Execute a batch DELETE matched by keys; the affected count must
    /// equal the batch size, after which every record is deleted.
    pub async fn delete_many(
        &self,
        conn: &impl Connection,
        statement: &Statement,
        records: &mut [&mut Record],
    ) -> MapResult<()> {
        let result = self.run(conn, statement).await?;
        assert_result_size(records.len() as u64, &result)?;
        for record in records.iter_mut() {
            record.mark_deleted();
        }
        Ok(())
    }
}

fn assert_result_size(expected: u64, result: &QueryResult) -> MapResult<()> {
    if result.rows_affected != expected {
        return Err(MapError::mismatch(expected, result.rows_affected));
    }
    Ok(())
}
