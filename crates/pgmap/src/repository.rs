//! Repositories: record lifecycle turned into minimal SQL operations.

use std::sync::Arc;

use crate::connection::Connection;
use crate::error::{MapError, MapResult};
use crate::ident;
use crate::processor::RecordProcessor;
use crate::record::{Lifecycle, Record, RecordType};
use crate::sql::{Fragment, Statement};
use crate::value::Value;

/// The capability interface every repository implements.
///
/// There are deliberately no default bodies: a backend that cannot perform
/// one of these operations fails to compile instead of failing at runtime.
pub trait Repository {
    fn record_type(&self) -> &Arc<RecordType>;

    /// Primary-key attribute names, defaulting to the record type's
    /// identifying attributes.
    fn primary_keys(&self) -> &[String];

    /// Fetch every record, in result order.
    fn all(
        &self,
        conn: &impl Connection,
    ) -> impl std::future::Future<Output = MapResult<Vec<Record>>> + Send;

    /// Fetch one record by primary-key values, or `None`.
    fn fetch(
        &self,
        conn: &impl Connection,
        key: &[Value],
    ) -> impl std::future::Future<Output = MapResult<Option<Record>>> + Send;

    /// Route each record to insert or update based on its lifecycle.
    fn store(
        &self,
        conn: &impl Connection,
        records: &mut [Record],
    ) -> impl std::future::Future<Output = MapResult<()>> + Send;

    /// Insert the batch in one statement; every record becomes stored.
    fn insert(
        &self,
        conn: &impl Connection,
        records: &mut [Record],
    ) -> impl std::future::Future<Output = MapResult<()>> + Send;

    /// Update each dirty record by primary key; clean records are skipped
    /// without a server round-trip.
    fn update(
        &self,
        conn: &impl Connection,
        records: &mut [Record],
    ) -> impl std::future::Future<Output = MapResult<()>> + Send;

    /// Delete the batch by primary keys; every record becomes deleted.
    fn delete(
        &self,
        conn: &impl Connection,
        records: &mut [Record],
    ) -> impl std::future::Future<Output = MapResult<()>> + Send;
}

/// PostgreSQL repository over one table and record type.
///
/// Every mutation carries `RETURNING *`, so server-assigned values
/// (generated keys, maintained timestamps) flow back onto the in-memory
/// records, and the returned-row count doubles as the affected count.
#[derive(Debug)]
pub struct PgRepository {
    table: String,
    primary_keys: Vec<String>,
    processor: RecordProcessor,
}

impl PgRepository {
    pub fn new(table: &str, ty: Arc<RecordType>) -> MapResult<Self> {
        ident::validate(table)?;
        let primary_keys = ty.identifying_attribute_names().to_vec();
        Ok(Self {
            table: table.to_string(),
            primary_keys,
            processor: RecordProcessor::new(ty),
        })
    }

    /// Override the primary-key attribute names.
    pub fn with_primary_keys(mut self, keys: &[&str]) -> Self {
        self.primary_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn key_predicate(&self, record: &Record) -> MapResult<Fragment> {
        let pairs: Vec<(&str, Value)> = self
            .primary_keys
            .iter()
            .map(|key| {
                (
                    key.as_str(),
                    record.get(key).cloned().unwrap_or(Value::Null),
                )
            })
            .collect();
        Fragment::predicate(pairs)
    }

    fn select_statement(&self) -> MapResult<Statement> {
        Statement::select(&self.table)
    }

    fn insert_statement(&self, records: &[&mut Record]) -> MapResult<Statement> {
        // One column list for the whole batch: the union of initialized
        // attributes, in declaration order. A record missing one of those
        // columns contributes DEFAULT so server-side defaults apply.
        let columns: Vec<&str> = self
            .record_type()
            .attribute_names()
            .filter(|name| records.iter().any(|r| r.get(name).is_some()))
            .collect();
        if columns.is_empty() {
            return Err(MapError::validation("no initialized attributes to insert"));
        }
        let mut statement = Statement::insert(&self.table, &columns)?;
        for record in records {
            let row = columns.iter().map(|c| record.get(c).cloned()).collect();
            statement = statement.values_with_defaults(row);
        }
        Ok(statement.returning("*"))
    }

    fn update_statement(&self, record: &Record) -> MapResult<Statement> {
        let assignments: Vec<(&str, Value)> = record
            .dirty_names()
            .into_iter()
            .map(|name| (name, record.get(name).cloned().unwrap_or(Value::Null)))
            .collect();
        Ok(Statement::update(&self.table)?
            .set(Fragment::assignments(assignments)?)
            .and_where(self.key_predicate(record)?)
            .returning("*"))
    }

    fn delete_statement(&self, records: &[&mut Record]) -> MapResult<Statement> {
        let mut predicate = Fragment::empty();
        for (i, record) in records.iter().enumerate() {
            if i > 0 {
                predicate.push_raw(" OR ");
            }
            predicate.push_raw("(");
            predicate.append(self.key_predicate(record)?);
            predicate.push_raw(")");
        }
        Ok(Statement::delete(&self.table)?
            .and_where(predicate)
            .returning("*"))
    }
}

impl Repository for PgRepository {
    fn record_type(&self) -> &Arc<RecordType> {
        self.processor.record_type()
    }

    fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    async fn all(&self, conn: &impl Connection) -> MapResult<Vec<Record>> {
        let statement = self.select_statement()?;
        self.processor.select_many(conn, &statement).await
    }

    async fn fetch(&self, conn: &impl Connection, key: &[Value]) -> MapResult<Option<Record>> {
        if key.len() != self.primary_keys.len() {
            return Err(MapError::validation(format!(
                "fetch key has {} values but the primary key has {} attributes",
                key.len(),
                self.primary_keys.len()
            )));
        }
        let pairs: Vec<(&str, Value)> = self
            .primary_keys
            .iter()
            .map(|k| k.as_str())
            .zip(key.iter().cloned())
            .collect();
        let statement = self
            .select_statement()?
            .and_where(Fragment::predicate(pairs)?);
        self.processor.select_one(conn, &statement).await
    }

    async fn insert(&self, conn: &impl Connection, records: &mut [Record]) -> MapResult<()> {
        let mut refs: Vec<&mut Record> = records.iter_mut().collect();
        insert_refs(self, conn, &mut refs).await
    }

    async fn update(&self, conn: &impl Connection, records: &mut [Record]) -> MapResult<()> {
        for record in records.iter_mut() {
            update_ref(self, conn, record).await?;
        }
        Ok(())
    }

    async fn delete(&self, conn: &impl Connection, records: &mut [Record]) -> MapResult<()> {
        let mut refs: Vec<&mut Record> = records.iter_mut().collect();
        if refs.is_empty() {
            return Ok(());
        }
        let statement = self.delete_statement(&refs)?;
        self.processor.delete_many(conn, &statement, &mut refs).await
    }

    async fn store(&self, conn: &impl Connection, records: &mut [Record]) -> MapResult<()> {
        if records.iter().any(|r| r.is_deleted()) {
            return Err(MapError::validation("cannot store a deleted record"));
        }

        let mut new_refs: Vec<&mut Record> = Vec::new();
        let mut stored_refs: Vec<&mut Record> = Vec::new();
        for record in records.iter_mut() {
            match record.lifecycle() {
                Lifecycle::New => new_refs.push(record),
                Lifecycle::Stored => stored_refs.push(record),
                Lifecycle::Deleted => unreachable!("checked above"),
            }
        }

        insert_refs(self, conn, &mut new_refs).await?;
        for record in stored_refs {
            update_ref(self, conn, record).await?;
        }
        Ok(())
    }
}

async fn insert_refs(
    repo: &PgRepository,
    conn: &impl Connection,
    records: &mut Vec<&mut Record>,
) -> MapResult<()> {
    if records.is_empty() {
        return Ok(());
    }
    let statement = repo.insert_statement(records)?;
    repo.processor.insert_many(conn, &statement, records).await
}

async fn update_ref(
    repo: &PgRepository,
    conn: &impl Connection,
    record: &mut Record,
) -> MapResult<()> {
    if !record.is_dirty() {
        // Explicit optimization: nothing changed, no statement, no round-trip.
        return Ok(());
    }
    let statement = repo.update_statement(record)?;
    repo.processor.update_one(conn, &statement, record).await
}
