//! Predicate compilation: column→value pairs into an AND-able condition.

use crate::error::MapResult;
use crate::ident;
use crate::value::Value;

use super::fragment::Fragment;

/// `IN` with a NULL operand can never be provably true, so such a pair
/// compiles to a dead predicate instead of the naive (wrong) translation.
const DEAD_PREDICATE: &str = "FALSE /* IN with NULL value is never TRUE */";

impl Fragment {
    /// Compile column→value pairs into an AND-joined boolean condition,
    /// preserving pair order.
    ///
    /// - `Value::Null` → `col IS NULL`, no parameter
    /// - `Value::Array` without nulls → `col IN ($?, ...)`, one parameter
    ///   per element
    /// - `Value::Array` containing a null → the dead predicate literal
    /// - anything else → `col = $?`, one parameter
    pub fn predicate<'a, I>(pairs: I) -> MapResult<Fragment>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut fragment = Fragment::empty();
        for (i, (column, value)) in pairs.into_iter().enumerate() {
            ident::validate(column)?;
            if i > 0 {
                fragment.push_raw(" AND ");
            }
            match value {
                Value::Null => {
                    fragment.push_raw(column);
                    fragment.push_raw(" IS NULL");
                }
                Value::Array(elements) => {
                    if elements.iter().any(Value::is_null) {
                        fragment.push_raw(DEAD_PREDICATE);
                    } else {
                        fragment.push_raw(column);
                        fragment.push_raw(" IN (");
                        for (j, element) in elements.into_iter().enumerate() {
                            if j > 0 {
                                fragment.push_raw(", ");
                            }
                            fragment.push_param(element);
                        }
                        fragment.push_raw(")");
                    }
                }
                value => {
                    fragment.push_raw(column);
                    fragment.push_raw(" = ");
                    fragment.push_param(value);
                }
            }
        }
        Ok(fragment)
    }
}
