use crate::values::{Value, ValueKind};
use thiserror::Error;

#[derive(Error, PartialEq, Debug, Clone)]
pub enum FilterError {
    #[error("filter field argument {key:?} not allowed: did you mean '{key}__eq'?")]
    UnknownOperator { key: String },
    #[error("filter field argument {key:?} has an empty attribute path")]
    InvalidPath { key: String },
    #[error("attribute {segment:?} does not exist (while resolving {path:?})")]
    AttributeResolution { path: String, segment: String },
    #[error("{operator}: mismatching types => observed: {observed:?}, literal: {literal:?}")]
    TypeMismatch {
        operator: &'static str,
        observed: ValueKind,
        literal: ValueKind,
    },
    #[error("number {number} cannot be represented without loss")]
    NumberOutOfRange { number: String },
}

impl FilterError {
    pub(crate) fn mismatch(operator: &'static str, observed: &Value, literal: &Value) -> Self {
        Self::TypeMismatch {
            operator,
            observed: observed.kind(),
            literal: literal.kind(),
        }
    }
}
