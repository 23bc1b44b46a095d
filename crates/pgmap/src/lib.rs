//! # pgmap
//!
//! A data-mapper layer for PostgreSQL.
//!
//! pgmap builds parameterized SQL from composable fragments, coerces raw
//! driver values into typed attribute values, and orchestrates
//! create/read/update/delete operations while tracking each record's
//! persistence state and modified fields.
//!
//! ## Pieces
//!
//! - **SQL builder** ([`sql`]): [`Fragment`]s pair SQL text with ordered
//!   parameters, compose without tracking placeholder indices, and render
//!   into `$1, $2, ...` statements exactly once.
//! - **Typed attributes** ([`attribute`]): each [`AttributeType`] owns a
//!   loader dispatch table keyed by a raw value's runtime kind, with
//!   supertype fallback and per-kind memoization.
//! - **Records and repositories** ([`record`], [`repository`]):
//!   [`Record`]s track dirty attributes against their persisted baseline;
//!   a [`PgRepository`] turns lifecycle state into minimal SQL and writes
//!   server-assigned values back in place.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use pgmap::{AttributeType, PgRepository, Record, RecordType, Repository, Value};
//!
//! let people = Arc::new(
//!     RecordType::new()
//!         .attribute("id", AttributeType::integer())
//!         .attribute("name", AttributeType::text())
//!         .attribute("age", AttributeType::integer())
//!         .attribute("created_at", AttributeType::timestamp())
//!         .attribute("updated_at", AttributeType::timestamp()),
//! );
//! let repo = PgRepository::new("people", people.clone())?;
//!
//! let mut ernie = Record::new(people, [("name", "Ernie".into()), ("age", 36.into())])?;
//! repo.insert(&conn, std::slice::from_mut(&mut ernie)).await?;
//! assert!(ernie.is_stored());
//!
//! ernie.set("name", "Bert")?;
//! repo.update(&conn, std::slice::from_mut(&mut ernie)).await?;
//! ```

pub mod attribute;
pub mod connection;
pub mod error;
mod ident;
pub mod pool;
pub mod processor;
pub mod record;
pub mod repository;
pub mod sql;
pub mod value;

pub use attribute::{AttributeType, Loader, LoaderDispatch};
pub use connection::{Connection, QueryResult, TabularRow};
pub use error::{MapError, MapResult};
pub use pool::{ConnectionManager, PoolSpec, PooledConnection};
pub use processor::RecordProcessor;
pub use record::{Lifecycle, Record, RecordType};
pub use repository::{PgRepository, Repository};
pub use sql::{Binding, Bindings, Fragment, Statement, Verb};
pub use value::{Interval, Value, ValueKind};
