//! Full SQL commands assembled from named clause fragments.

use crate::error::{MapError, MapResult};
use crate::ident;
use crate::value::Value;

use super::fragment::Fragment;

/// The command verb of a [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Select,
    Insert,
    Update,
    Delete,
}

impl Verb {
    pub fn keyword(self) -> &'static str {
        match self {
            Verb::Select => "SELECT",
            Verb::Insert => "INSERT",
            Verb::Update => "UPDATE",
            Verb::Delete => "DELETE",
        }
    }
}

/// A complete SELECT/INSERT/UPDATE/DELETE command.
///
/// Clauses are held as [`Fragment`]s and concatenated in a fixed
/// verb-specific order by [`render`](Statement::render), which also rewrites
/// emission placeholders to `$1, $2, ...` — exactly once, after all fragment
/// combination, so numbering is never computed before the full parameter
/// list is known.
#[derive(Debug, Clone)]
pub struct Statement {
    verb: Verb,
    table: String,
    select_list: String,
    columns: Vec<String>,
    values_rows: Vec<Fragment>,
    set: Fragment,
    wheres: Vec<Fragment>,
    returning: Option<String>,
    build_error: Option<String>,
}

impl Statement {
    fn new(verb: Verb, table: &str) -> MapResult<Self> {
        ident::validate(table)?;
        Ok(Self {
            verb,
            table: table.to_string(),
            select_list: "*".to_string(),
            columns: Vec::new(),
            values_rows: Vec::new(),
            set: Fragment::empty(),
            wheres: Vec::new(),
            returning: None,
            build_error: None,
        })
    }

    /// `SELECT * FROM table` until refined.
    pub fn select(table: &str) -> MapResult<Self> {
        Self::new(Verb::Select, table)
    }

    /// `INSERT INTO table (columns...)`; rows are added with
    /// [`values`](Statement::values).
    pub fn insert(table: &str, columns: &[&str]) -> MapResult<Self> {
        for column in columns {
            ident::validate(column)?;
        }
        let mut statement = Self::new(Verb::Insert, table)?;
        statement.columns = columns.iter().map(|c| c.to_string()).collect();
        Ok(statement)
    }

    /// `UPDATE table`; assignments are added with [`set`](Statement::set).
    pub fn update(table: &str) -> MapResult<Self> {
        Self::new(Verb::Update, table)
    }

    /// `DELETE FROM table`.
    pub fn delete(table: &str) -> MapResult<Self> {
        Self::new(Verb::Delete, table)
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Replace the projection list (caller-authored SQL, not validated).
    pub fn select_list(mut self, list: &str) -> Self {
        self.select_list = list.to_string();
        self
    }

    /// Append one `VALUES` row. The row length must match the column list.
    pub fn values(self, row: Vec<Value>) -> Self {
        self.values_with_defaults(row.into_iter().map(Some).collect())
    }

    /// Append one `VALUES` row where `None` emits the `DEFAULT` keyword,
    /// letting server-side defaults apply for that cell.
    pub fn values_with_defaults(mut self, row: Vec<Option<Value>>) -> Self {
        if row.len() != self.columns.len() && self.build_error.is_none() {
            self.build_error = Some(format!(
                "VALUES row has {} items but {} columns",
                row.len(),
                self.columns.len()
            ));
        }
        let mut fragment = Fragment::empty();
        fragment.push_raw("(");
        for (i, cell) in row.into_iter().enumerate() {
            if i > 0 {
                fragment.push_raw(", ");
            }
            match cell {
                Some(value) => fragment.push_param(value),
                None => fragment.push_raw("DEFAULT"),
            }
        }
        fragment.push_raw(")");
        self.values_rows.push(fragment);
        self
    }

    /// Append to the SET clause; multiple calls comma-join.
    pub fn set(mut self, assignments: Fragment) -> Self {
        if assignments.is_empty() {
            return self;
        }
        if !self.set.is_empty() {
            self.set.push_raw(", ");
        }
        self.set.append(assignments);
        self
    }

    /// Append a WHERE condition; multiple calls AND-join. Empty fragments
    /// are dropped, so a statement with zero predicates renders without a
    /// WHERE clause.
    pub fn and_where(mut self, condition: Fragment) -> Self {
        if !condition.is_empty() {
            self.wheres.push(condition);
        }
        self
    }

    /// Set the RETURNING list (caller-authored SQL, not validated).
    pub fn returning(mut self, list: &str) -> Self {
        self.returning = Some(list.to_string());
        self
    }

    /// Check builder state before execution.
    pub fn validate(&self) -> MapResult<()> {
        if let Some(message) = &self.build_error {
            return Err(MapError::validation(message.clone()));
        }
        match self.verb {
            Verb::Insert if self.columns.is_empty() => {
                Err(MapError::validation("INSERT requires a column list"))
            }
            Verb::Insert if self.values_rows.is_empty() => {
                Err(MapError::validation("INSERT requires at least one VALUES row"))
            }
            Verb::Update if self.set.is_empty() => {
                Err(MapError::validation("UPDATE requires a SET clause"))
            }
            _ => Ok(()),
        }
    }

    /// Render final SQL with 1-based positional placeholders and the flat
    /// parameter list in emission order.
    pub fn render(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        let mut next = 0;

        match self.verb {
            Verb::Select => {
                sql.push_str("SELECT ");
                sql.push_str(&self.select_list);
                sql.push_str(" FROM ");
                sql.push_str(&self.table);
            }
            Verb::Insert => {
                sql.push_str("INSERT INTO ");
                sql.push_str(&self.table);
                sql.push_str(" (");
                sql.push_str(&self.columns.join(", "));
                sql.push_str(") VALUES ");
                for (i, row) in self.values_rows.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    row.render_into(&mut sql, &mut params, &mut next);
                }
            }
            Verb::Update => {
                sql.push_str("UPDATE ");
                sql.push_str(&self.table);
                sql.push_str(" SET ");
                self.set.render_into(&mut sql, &mut params, &mut next);
            }
            Verb::Delete => {
                sql.push_str("DELETE FROM ");
                sql.push_str(&self.table);
            }
        }

        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            for (i, condition) in self.wheres.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                condition.render_into(&mut sql, &mut params, &mut next);
            }
        }

        if let Some(returning) = &self.returning {
            sql.push_str(" RETURNING ");
            sql.push_str(returning);
        }

        (sql, params)
    }
}
