//! SQL identifier validation.
//!
//! Postgres does not allow parameterizing identifiers, so table and column
//! names are spliced into SQL text. Every name coming through the fragment
//! builders is validated here first: each `.`-separated segment must match
//! `[A-Za-z_][A-Za-z0-9_$]*`.

use crate::error::{MapError, MapResult};

pub(crate) fn validate(ident: &str) -> MapResult<()> {
    if ident.is_empty() {
        return Err(MapError::InvalidIdentifier(ident.to_string()));
    }

    for seg in ident.split('.') {
        let mut chars = seg.chars();
        let Some(first) = chars.next() else {
            return Err(MapError::InvalidIdentifier(ident.to_string()));
        };
        if first != '_' && !first.is_ascii_alphabetic() {
            return Err(MapError::InvalidIdentifier(ident.to_string()));
        }
        if !chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric()) {
            return Err(MapError::InvalidIdentifier(ident.to_string()));
        }
    }

    Ok(())
}
