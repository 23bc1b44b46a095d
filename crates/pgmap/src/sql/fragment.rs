//! Composable SQL fragments.
//!
//! A [`Fragment`] stores SQL pieces and parameters separately: raw text is
//! interleaved with emission placeholders, and the matching [`Value`]s are
//! kept in an ordered list. Placeholders are only numbered (`$1, $2, ...`)
//! when a whole [`Statement`](super::Statement) is rendered, so fragments
//! compose freely without anyone tracking indices.
//!
//! # Example
//!
//! ```ignore
//! use pgmap::sql::{Bindings, Fragment};
//!
//! let f = Fragment::template(
//!     "age > $limits.min AND age < $limits.max",
//!     &Bindings::new().set("limits", Bindings::new().set("min", 18).set("max", 65)),
//! )?;
//! assert_eq!(f.sql(), "age > $? AND age < $?");
//! ```

use std::collections::BTreeMap;

use crate::error::{MapError, MapResult};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Part {
    Raw(String),
    Param,
}

/// An immutable pair of SQL text and its positional parameters.
///
/// Invariant: the number of emission placeholders equals `params.len()`.
/// Every constructor upholds this; there is no way to push text-level
/// placeholders without their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    parts: Vec<Part>,
    params: Vec<Value>,
}

impl Fragment {
    /// An empty fragment: contributes no text, no separator, no parameters.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a fragment from raw SQL containing `$?` emission placeholders
    /// and the matching parameter values, in order.
    pub fn raw(sql: &str, params: Vec<Value>) -> MapResult<Self> {
        let mut fragment = Fragment::empty();
        let mut placeholders = 0;
        for (i, chunk) in sql.split("$?").enumerate() {
            if i > 0 {
                fragment.parts.push(Part::Param);
                placeholders += 1;
            }
            fragment.push_raw(chunk);
        }
        if placeholders != params.len() {
            return Err(MapError::validation(format!(
                "fragment has {} placeholders but {} params",
                placeholders,
                params.len()
            )));
        }
        fragment.params = params;
        Ok(fragment)
    }

    /// Build a fragment by interpolating `$name` / `$name.path` markers
    /// against `bindings`.
    ///
    /// Each marker becomes one emission placeholder and appends its resolved
    /// value, in left-to-right marker order. `\$name` renders a literal
    /// `$name` and consumes nothing. A missing key anywhere along a dotted
    /// path is [`MapError::Interpolation`] carrying the full path.
    pub fn template(text: &str, bindings: &Bindings) -> MapResult<Self> {
        let mut fragment = Fragment::empty();
        let mut buf = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'$') => {
                    chars.next();
                    buf.push('$');
                }
                '$' if chars
                    .peek()
                    .is_some_and(|&c| c == '_' || c.is_ascii_alphabetic()) =>
                {
                    let mut path = String::new();
                    while let Some(&c) = chars.peek() {
                        if c == '_' || c.is_ascii_alphanumeric() {
                            path.push(c);
                            chars.next();
                        } else if c == '.' {
                            // A dot only extends the path when an identifier
                            // character follows; "$foo." ends the marker.
                            let mut ahead = chars.clone();
                            ahead.next();
                            match ahead.next() {
                                Some(n) if n == '_' || n.is_ascii_alphanumeric() => {
                                    path.push('.');
                                    chars.next();
                                }
                                _ => break,
                            }
                        } else {
                            break;
                        }
                    }
                    let value = bindings
                        .resolve(&path)
                        .ok_or_else(|| MapError::interpolation(&path))?;
                    fragment.push_raw(&buf);
                    buf.clear();
                    fragment.push_param(value.clone());
                }
                other => buf.push(other),
            }
        }
        fragment.push_raw(&buf);
        Ok(fragment)
    }

    /// Join two fragments with a single space, parameters left-then-right.
    ///
    /// Associative but not commutative. An empty side contributes neither
    /// text nor separator.
    pub fn combine(mut self, other: Fragment) -> Fragment {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        self.push_raw(" ");
        self.append(other);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// The SQL text with `$?` standing in for each emission placeholder.
    ///
    /// Final `$1..$N` numbering happens once, in
    /// [`Statement::render`](super::Statement::render).
    pub fn sql(&self) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Raw(s) => out.push_str(s),
                Part::Param => out.push_str("$?"),
            }
        }
        out
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub(crate) fn push_raw(&mut self, sql: &str) {
        if sql.is_empty() {
            return;
        }
        match self.parts.last_mut() {
            Some(Part::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(Part::Raw(sql.to_string())),
        }
    }

    pub(crate) fn push_param(&mut self, value: Value) {
        self.parts.push(Part::Param);
        self.params.push(value);
    }

    /// Append without a separator.
    pub(crate) fn append(&mut self, mut other: Fragment) {
        // Merge adjacent raw parts so textually equal compositions compare equal.
        let mut parts = other.parts.drain(..);
        if let Some(first) = parts.next() {
            match first {
                Part::Raw(s) => self.push_raw(&s),
                Part::Param => self.parts.push(Part::Param),
            }
            self.parts.extend(parts);
        }
        self.params.append(&mut other.params);
    }

    /// Write this fragment into a statement being rendered, numbering each
    /// placeholder from `*next` and copying parameters out in order.
    pub(crate) fn render_into(&self, sql: &mut String, params: &mut Vec<Value>, next: &mut usize) {
        use std::fmt::Write;

        let mut local = self.params.iter();
        for part in &self.parts {
            match part {
                Part::Raw(s) => sql.push_str(s),
                Part::Param => {
                    *next += 1;
                    let _ = write!(sql, "${}", *next);
                    if let Some(value) = local.next() {
                        params.push(value.clone());
                    }
                }
            }
        }
    }
}

/// A nested structure of named values for template interpolation.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    entries: BTreeMap<String, Binding>,
}

/// One entry in a [`Bindings`] tree: a leaf value or a nested map.
#[derive(Debug, Clone)]
pub enum Binding {
    Value(Value),
    Nested(Bindings),
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, chainable.
    pub fn set(mut self, key: &str, value: impl Into<Binding>) -> Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    /// Follow a dotted path to a leaf value.
    pub(crate) fn resolve(&self, path: &str) -> Option<&Value> {
        let mut node: Option<&Binding> = None;
        for seg in path.split('.') {
            let map = match node {
                None => self,
                Some(Binding::Nested(b)) => b,
                Some(Binding::Value(_)) => return None,
            };
            node = map.entries.get(seg);
            node?;
        }
        match node {
            Some(Binding::Value(v)) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Value(v)
    }
}

impl From<Bindings> for Binding {
    fn from(b: Bindings) -> Self {
        Binding::Nested(b)
    }
}

macro_rules! impl_binding_from {
    ($($from:ty),* $(,)?) => {
        $(
            impl From<$from> for Binding {
                fn from(v: $from) -> Self {
                    Binding::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_binding_from!(bool, i16, i32, i64, f64, &str, String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_interpolates_named_markers() {
        let f = Fragment::template("$foo", &Bindings::new().set("foo", "bar")).unwrap();
        assert_eq!(f.sql(), "$?");
        assert_eq!(f.params(), &[Value::from("bar")]);
    }

    #[test]
    fn template_interpolates_nested_paths() {
        let b = Bindings::new().set(
            "foo",
            Bindings::new().set("bar", Bindings::new().set("baz", "qux")),
        );
        let f = Fragment::template("$foo.bar.baz", &b).unwrap();
        assert_eq!(f.sql(), "$?");
        assert_eq!(f.params(), &[Value::from("qux")]);
    }

    #[test]
    fn template_missing_path_names_the_full_path() {
        let err = Fragment::template("$foo.bar", &Bindings::new().set("foo", Bindings::new()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing content for \"foo.bar\".");
    }

    #[test]
    fn template_escape_renders_literal_marker() {
        let f = Fragment::template("\\$foo", &Bindings::new()).unwrap();
        assert_eq!(f.sql(), "$foo");
        assert!(f.params().is_empty());
    }

    #[test]
    fn template_mixes_markers_and_escapes() {
        let b = Bindings::new().set("a", Bindings::new().set("b", 5_i32));
        let f = Fragment::template("x = $a.b AND y = \\$c", &b).unwrap();
        assert_eq!(f.sql(), "x = $? AND y = $c");
        assert_eq!(f.params(), &[Value::Int4(5)]);
    }

    #[test]
    fn template_marker_ends_at_trailing_dot() {
        let f = Fragment::template("$foo.", &Bindings::new().set("foo", 1_i32)).unwrap();
        assert_eq!(f.sql(), "$?.");
        assert_eq!(f.params(), &[Value::Int4(1)]);
    }

    #[test]
    fn bare_dollar_stays_literal() {
        let f = Fragment::template("$1 $?", &Bindings::new()).unwrap();
        assert_eq!(f.sql(), "$1 $?");
        assert!(f.params().is_empty());
    }

    #[test]
    fn raw_checks_placeholder_count() {
        let f = Fragment::raw("id = $?", vec![Value::Int4(1)]).unwrap();
        assert_eq!(f.sql(), "id = $?");
        assert_eq!(f.params(), &[Value::Int4(1)]);

        assert!(Fragment::raw("id = $?", vec![]).is_err());
        assert!(Fragment::raw("id = 1", vec![Value::Int4(1)]).is_err());
    }

    #[test]
    fn combine_is_associative() {
        let a = Fragment::raw("a = $?", vec![Value::Int4(1)]).unwrap();
        let b = Fragment::raw("AND b = $?", vec![Value::Int4(2)]).unwrap();
        let c = Fragment::raw("AND c = $?", vec![Value::Int4(3)]).unwrap();

        let left = a.clone().combine(b.clone()).combine(c.clone());
        let right = a.combine(b.combine(c));

        assert_eq!(left.sql(), right.sql());
        assert_eq!(left.params(), right.params());
        assert_eq!(left.sql(), "a = $? AND b = $? AND c = $?");
    }

    #[test]
    fn combine_skips_empty_sides() {
        let a = Fragment::raw("a = $?", vec![Value::Int4(1)]).unwrap();
        let combined = Fragment::empty().combine(a.clone()).combine(Fragment::empty());
        assert_eq!(combined.sql(), "a = $?");
        assert_eq!(combined.params(), &[Value::Int4(1)]);
    }

    #[test]
    fn params_follow_combination_order() {
        let a = Fragment::raw("a = $?", vec![Value::Int4(1)]).unwrap();
        let b = Fragment::raw("b = $?", vec![Value::Int4(2)]).unwrap();
        let f = a.combine(b);
        assert_eq!(f.params(), &[Value::Int4(1), Value::Int4(2)]);
    }
}
