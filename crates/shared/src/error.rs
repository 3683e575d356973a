use thiserror::Error;

use crate::domain::Field;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{field} value {value} is outside the accepted range {min}..={max}")]
    OutOfRange {
        field: Field,
        value: u32,
        min: u32,
        max: u32,
    },
    #[error("unrecognized {field} value '{value}'")]
    UnknownVariant { field: Field, value: String },
}
