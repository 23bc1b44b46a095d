//! Assignment-list compilation for UPDATE statements.

use crate::error::MapResult;
use crate::ident;
use crate::value::Value;

use super::fragment::Fragment;

impl Fragment {
    /// Compile column→value pairs into a comma-joined assignment list,
    /// preserving pair order.
    ///
    /// A null value emits the literal `col = NULL` with no bound parameter,
    /// avoiding any ambiguity between SQL NULL and a bound NULL parameter.
    pub fn assignments<'a, I>(pairs: I) -> MapResult<Fragment>
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut fragment = Fragment::empty();
        for (i, (column, value)) in pairs.into_iter().enumerate() {
            ident::validate(column)?;
            if i > 0 {
                fragment.push_raw(", ");
            }
            fragment.push_raw(column);
            if value.is_null() {
                fragment.push_raw(" = NULL");
            } else {
                fragment.push_raw(" = ");
                fragment.push_param(value);
            }
        }
        Ok(fragment)
    }
}
