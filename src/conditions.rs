use crate::{
    error::FilterError,
    operators::{Comparison, Opcode, Operator, OperatorFn, OperatorRegistry},
    options::MissingHistory,
    values::{Object, Value},
};
use itertools::Itertools;
use std::fmt;

/// Separates the attribute path from the opcode in a condition key, and may also separate the
/// segments of the path (`author__last_name__eq`).
pub const SEPARATOR: &str = "__";
pub const PATH_DELIMITER: char = '.';

/// Dotted attribute path, e.g. `author.last_name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributePath(Vec<String>);

impl AttributePath {
    fn parse(key: &str, path: &str) -> Result<Self, FilterError> {
        let segments: Vec<String> = path
            .replace(SEPARATOR, ".")
            .split(PATH_DELIMITER)
            .map(str::to_owned)
            .collect();
        if segments.iter().any(String::is_empty) {
            return Err(FilterError::InvalidPath {
                key: key.to_owned(),
            });
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Reads the value at the end of the path. Every segment must exist.
    pub fn resolve(&self, object: &dyn Object) -> Result<Value, FilterError> {
        let (first, rest) = self.0.split_first().ok_or_else(|| self.missing(""))?;
        let value = object.attribute(first).ok_or_else(|| self.missing(first))?;
        rest.iter().try_fold(value, |value, segment| {
            value.into_field(segment).ok_or_else(|| self.missing(segment))
        })
    }

    fn missing(&self, segment: &str) -> FilterError {
        FilterError::AttributeResolution {
            path: self.to_string(),
            segment: segment.to_owned(),
        }
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().join("."))
    }
}

/// A single condition, compiled from its key and literal.
#[derive(Clone, Debug)]
pub struct CompiledCondition {
    key: String,
    path: AttributePath,
    operator: Operator,
    literal: Value,
}

impl CompiledCondition {
    pub fn compile(key: &str, literal: &Value) -> Result<Self, FilterError> {
        let registry = OperatorRegistry::global();
        let (path, opcode) = key
            .rsplit_once(SEPARATOR)
            .ok_or_else(|| FilterError::UnknownOperator {
                key: key.to_owned(),
            })?;
        let operator = registry.resolve(key, opcode)?;
        let path = AttributePath::parse(key, path)?;
        let operator = match prepare_opcode(operator.opcode(), literal) {
            Some(comparison) => *registry.resolve(key, comparison.name())?,
            None => *operator,
        };
        let literal = if operator.opcode().comparison().is_unary() {
            Value::Null
        } else {
            literal.clone()
        };

        Ok(Self {
            key: key.to_owned(),
            path,
            operator,
            literal,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &AttributePath {
        &self.path
    }

    pub fn opcode(&self) -> Opcode {
        self.operator.opcode()
    }

    /// `None` when the condition only tests truthiness.
    pub fn literal(&self) -> Option<&Value> {
        if self.opcode().comparison().is_unary() {
            None
        } else {
            Some(&self.literal)
        }
    }

    pub fn uses_previous_version(&self) -> bool {
        self.opcode().is_transition()
    }

    pub fn evaluate(
        &self,
        object: &dyn Object,
        missing_history: MissingHistory,
    ) -> Result<bool, FilterError> {
        let observed = self.path.resolve(object)?;
        match self.operator.function() {
            OperatorFn::Binary(op) => op(&observed, &self.literal),
            OperatorFn::Transition(op) => {
                let previous = object
                    .previous_version()
                    .map(|previous| self.path.resolve(previous))
                    .transpose()?;
                op.apply(
                    &observed,
                    &self.literal,
                    previous.as_ref(),
                    missing_history.counts_as_change(),
                )
            }
        }
    }
}

/// `eq True` and friends match any truthy (or falsy) value rather than checking equality.
fn prepare_opcode(opcode: Opcode, literal: &Value) -> Option<Comparison> {
    if opcode.is_transition() {
        return None;
    }
    match (opcode.comparison(), literal) {
        (Comparison::Equal, Value::Boolean(true))
        | (Comparison::NotEqual, Value::Boolean(false)) => Some(Comparison::Truthy),
        (Comparison::Equal, Value::Boolean(false))
        | (Comparison::NotEqual, Value::Boolean(true)) => Some(Comparison::Falsy),
        _ => None,
    }
}
