#[cfg(feature = "json")]
use crate::error::FilterError;
use rust_decimal::Decimal;
use std::{cmp::Ordering, collections::BTreeMap};

/// Attribute under which a [`Value::Record`] keeps the snapshot it was derived from.
pub const PREVIOUS_VERSION_ATTRIBUTE: &str = "_previous_version";

/// A candidate that can be filtered.
///
/// Implementors expose their attributes by name and, optionally, an earlier snapshot of
/// themselves. The previous version is only consulted by transition opcodes (`now_*`).
pub trait Object {
    /// Returns `None` when the attribute does not exist on the object.
    fn attribute(&self, name: &str) -> Option<Value>;

    fn previous_version(&self) -> Option<&dyn Object> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(Decimal),
    String(String),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    List,
    Record,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Record(_) => ValueKind::Record,
        }
    }

    pub fn record() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// `Null`, `false`, zero, and empty strings, lists and records are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Boolean(value) => *value,
            Self::Integer(value) => *value != 0,
            Self::Float(value) => !value.is_zero(),
            Self::String(value) => !value.is_empty(),
            Self::List(values) => !values.is_empty(),
            Self::Record(fields) => !fields.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Reads a field of a record, consuming it.
    pub(crate) fn into_field(self, name: &str) -> Option<Value> {
        match self {
            Self::Record(mut fields) => fields.remove(name),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<Decimal> {
        match self {
            Self::Integer(value) => Some(Decimal::from(*value)),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Equality where integers and floats compare by numeric value, recursively.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Integer(_) | Self::Float(_), Self::Integer(_) | Self::Float(_)) => {
                self.as_number() == other.as_number()
            }
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.loosely_equals(b))
            }
            (Self::Record(a), Self::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b)
                        .all(|((ka, va), (kb, vb))| ka == kb && va.loosely_equals(vb))
            }
            (a, b) => a == b,
        }
    }

    /// Natural ordering between two values, `None` when they cannot be ordered.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Integer(_) | Self::Float(_), Self::Integer(_) | Self::Float(_)) => {
                Some(self.as_number()?.cmp(&other.as_number()?))
            }
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Some(a.cmp(b)),
            (Self::List(a), Self::List(b)) => {
                for (a, b) in a.iter().zip(b) {
                    if !a.loosely_equals(b) {
                        return a.compare(b);
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

impl Object for Value {
    fn attribute(&self, name: &str) -> Option<Value> {
        match self {
            Self::Record(fields) => fields.get(name).cloned(),
            _ => None,
        }
    }

    fn previous_version(&self) -> Option<&dyn Object> {
        match self {
            Self::Record(fields) => match fields.get(PREVIOUS_VERSION_ATTRIBUTE) {
                Some(previous @ Self::Record(_)) => Some(previous as &dyn Object),
                _ => None,
            },
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(feature = "json")]
impl TryFrom<serde_json::Value> for Value {
    type Error = FilterError;

    /// Fails on numbers that neither an `i64` nor a `Decimal` holds exactly.
    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value as Json;
        Ok(match value {
            Json::Null => Self::Null,
            Json::Bool(value) => Self::Boolean(value),
            Json::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Self::Integer(integer)
                } else if let Some(integer) = number.as_u64() {
                    Self::Float(Decimal::from(integer))
                } else {
                    number
                        .as_f64()
                        .and_then(|float| Decimal::try_from(float).ok())
                        .map(Self::Float)
                        .ok_or_else(|| FilterError::NumberOutOfRange {
                            number: number.to_string(),
                        })?
                }
            }
            Json::String(value) => Self::String(value),
            Json::Array(values) => Self::List(
                values
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Json::Object(fields) => Self::Record(
                fields
                    .into_iter()
                    .map(|(name, value)| Ok((name, Value::try_from(value)?)))
                    .collect::<Result<_, FilterError>>()?,
            ),
        })
    }
}

#[derive(Default)]
pub struct RecordBuilder {
    fields: BTreeMap<String, Value>,
}

impl RecordBuilder {
    pub fn build(self) -> Value {
        Value::Record(self.fields)
    }

    pub fn with_null(self, name: &str) -> Self {
        self.with_value(name, Value::Null)
    }

    pub fn with_boolean(self, name: &str, value: bool) -> Self {
        self.with_value(name, Value::Boolean(value))
    }

    pub fn with_integer(self, name: &str, value: i64) -> Self {
        self.with_value(name, Value::Integer(value))
    }

    pub fn with_float(self, name: &str, value: Decimal) -> Self {
        self.with_value(name, Value::Float(value))
    }

    pub fn with_string(self, name: &str, value: &str) -> Self {
        self.with_value(name, Value::from(value))
    }

    pub fn with_list<T: Into<Value>>(self, name: &str, values: Vec<T>) -> Self {
        self.with_value(name, Value::from(values))
    }

    pub fn with_record(self, name: &str, record: RecordBuilder) -> Self {
        self.with_value(name, record.build())
    }

    pub fn with_previous_version(self, previous: Value) -> Self {
        self.with_value(PREVIOUS_VERSION_ATTRIBUTE, previous)
    }

    pub fn with_value(mut self, name: &str, value: Value) -> Self {
        self.fields.insert(name.to_owned(), value);
        self
    }
}

/// A value paired with the snapshot it replaced.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    current: Value,
    previous: Option<Box<Snapshot>>,
}

impl Snapshot {
    pub fn new(current: Value) -> Self {
        Self {
            current,
            previous: None,
        }
    }

    /// Builds a chain of snapshots, oldest first; the last value is the current one.
    pub fn history<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Value>,
    {
        values.into_iter().fold(None, |previous, current| {
            Some(Self {
                current,
                previous: previous.map(Box::new),
            })
        })
    }

    pub fn with_previous(mut self, previous: Snapshot) -> Self {
        self.previous = Some(Box::new(previous));
        self
    }

    pub fn current(&self) -> &Value {
        &self.current
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_deref()
    }
}

impl Object for Snapshot {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.current.attribute(name)
    }

    fn previous_version(&self) -> Option<&dyn Object> {
        match &self.previous {
            Some(previous) => Some(&**previous),
            None => self.current.previous_version(),
        }
    }
}
