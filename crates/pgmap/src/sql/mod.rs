//! SQL fragment and statement building.
//!
//! The building blocks, leaf-first:
//!
//! - [`Fragment`]: an immutable pair of SQL text and ordered parameters,
//!   with template interpolation and a space-joining combinator.
//! - Predicate and assignment compilation from column→value pairs
//!   (`Fragment::predicate`, `Fragment::assignments`).
//! - [`Statement`]: a full command assembled from named clause fragments,
//!   rendered once into `$1, $2, ...` placeholder SQL plus the flat
//!   parameter list.

mod fragment;
mod predicate;
mod set;
mod statement;


pub use fragment::{Binding, Bindings, Fragment};
pub use statement::{Statement, Verb};
