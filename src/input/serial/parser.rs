//! Parser for the `i,j,k,real` line format.

use crate::sensors::{Component, Quaternion};
use std::num::ParseFloatError;
use strum::IntoEnumIterator;
use thiserror::Error;

/// Number of comma-separated fields in one record.
pub const FIELD_COUNT: usize = 4;

/// Reasons a line could not be turned into a [`Quaternion`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Wrong number of comma-separated fields.
    #[error("expected 4 values, got {0}")]
    FieldCount(usize),

    /// A field is not a decimal number.
    #[error("invalid {component} value {text:?}: {source}")]
    InvalidField {
        component: Component,
        text: String,
        source: ParseFloatError,
    },
}

/// Parse a line in format "i,j,k,real".
///
/// Only the line as a whole is trimmed; whitespace inside a field makes
/// that field invalid.
pub fn parse_quaternion(line: &str) -> Result<Quaternion, ParseError> {
    let parts: Vec<&str> = line.trim().split(',').collect();
    if parts.len() != FIELD_COUNT {
        return Err(ParseError::FieldCount(parts.len()));
    }

    let mut values = [0.0f64; FIELD_COUNT];
    for ((slot, text), component) in values.iter_mut().zip(&parts).zip(Component::iter()) {
        *slot = text.parse().map_err(|source| ParseError::InvalidField {
            component,
            text: text.to_string(),
            source,
        })?;
    }

    let [i, j, k, real] = values;
    Ok(Quaternion::new(i, j, k, real))
}
