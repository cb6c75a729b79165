//! The opcode vocabulary of condition keys and the functions backing it.
//!
//! Every binary operator takes the value observed on the candidate first and the literal of the
//! condition second. Note the direction of the membership operators: `in` looks for the observed
//! value inside the literal while `contains` looks for the literal inside the observed value.
use crate::{error::FilterError, values::Value};
use itertools::Itertools;
use once_cell::sync::Lazy;
use std::{collections::HashMap, fmt};

pub type BinaryOp = fn(&Value, &Value) -> Result<bool, FilterError>;

/// Prefix of the transition counterpart of an opcode.
pub const TRANSITION_PREFIX: &str = "now_";

#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
pub enum Comparison {
    Equal,
    NotEqual,
    GreaterThan,
    LessThan,
    GreaterThanEqual,
    LessThanEqual,
    In,
    NotIn,
    Is,
    IsNot,
    Contains,
    StartsWith,
    EndsWith,
    Falsy,
    Truthy,
}

impl Comparison {
    pub const ALL: [Comparison; 15] = [
        Self::Equal,
        Self::NotEqual,
        Self::GreaterThan,
        Self::LessThan,
        Self::GreaterThanEqual,
        Self::LessThanEqual,
        Self::In,
        Self::NotIn,
        Self::Is,
        Self::IsNot,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::Falsy,
        Self::Truthy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::GreaterThan => "gt",
            Self::LessThan => "lt",
            Self::GreaterThanEqual => "gte",
            Self::LessThanEqual => "lte",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
            Self::Falsy => "not",
            Self::Truthy => "true",
        }
    }

    /// Name of the `now_*` counterpart; the truthiness tests have none.
    pub fn transition_name(&self) -> Option<&'static str> {
        match self {
            Self::Equal => Some("now_eq"),
            Self::NotEqual => Some("now_ne"),
            Self::GreaterThan => Some("now_gt"),
            Self::LessThan => Some("now_lt"),
            Self::GreaterThanEqual => Some("now_gte"),
            Self::LessThanEqual => Some("now_lte"),
            Self::In => Some("now_in"),
            Self::NotIn => Some("now_not_in"),
            Self::Is => Some("now_is"),
            Self::IsNot => Some("now_is_not"),
            Self::Contains => Some("now_contains"),
            Self::StartsWith => Some("now_startswith"),
            Self::EndsWith => Some("now_endswith"),
            Self::Falsy | Self::Truthy => None,
        }
    }

    /// Whether the comparison ignores the literal of the condition.
    pub fn is_unary(&self) -> bool {
        matches!(self, Self::Falsy | Self::Truthy)
    }

    pub fn function(&self) -> BinaryOp {
        match self {
            Self::Equal => eq,
            Self::NotEqual => ne,
            Self::GreaterThan => gt,
            Self::LessThan => lt,
            Self::GreaterThanEqual => gte,
            Self::LessThanEqual => lte,
            Self::In => contained_in,
            Self::NotIn => not_contained_in,
            Self::Is => is,
            Self::IsNot => is_not,
            Self::Contains => contains,
            Self::StartsWith => starts_with,
            Self::EndsWith => ends_with,
            Self::Falsy => falsy,
            Self::Truthy => truthy,
        }
    }

    /// The test a previous value must pass for the transition counterpart to fire: the base
    /// comparison must not have held yet.
    pub fn did_change(&self) -> BinaryOp {
        match self {
            Self::Equal => ne,
            Self::NotEqual => eq,
            Self::GreaterThan => |a, b| gt(a, b).map(|matched| !matched),
            Self::LessThan => |a, b| lt(a, b).map(|matched| !matched),
            Self::GreaterThanEqual => |a, b| gte(a, b).map(|matched| !matched),
            Self::LessThanEqual => |a, b| lte(a, b).map(|matched| !matched),
            Self::In => not_contained_in,
            Self::NotIn => contained_in,
            Self::Is => is_not,
            Self::IsNot => is,
            Self::Contains => |a, b| contains(a, b).map(|matched| !matched),
            Self::StartsWith => |a, b| starts_with(a, b).map(|matched| !matched),
            Self::EndsWith => |a, b| ends_with(a, b).map(|matched| !matched),
            Self::Falsy => truthy,
            Self::Truthy => falsy,
        }
    }
}

/// A resolved opcode: the comparison to apply and whether it is a transition.
#[derive(Hash, PartialEq, Eq, Clone, Copy, Debug)]
pub struct Opcode {
    comparison: Comparison,
    transition: bool,
}

impl Opcode {
    pub fn new(comparison: Comparison) -> Self {
        Self {
            comparison,
            transition: false,
        }
    }

    pub fn transition(comparison: Comparison) -> Option<Self> {
        comparison.transition_name().map(|_| Self {
            comparison,
            transition: true,
        })
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn is_transition(&self) -> bool {
        self.transition
    }

    pub fn name(&self) -> &'static str {
        if self.transition {
            self.comparison
                .transition_name()
                .unwrap_or_else(|| self.comparison.name())
        } else {
            self.comparison.name()
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operator that only holds when the value moved into satisfying a comparison.
#[derive(Clone, Copy)]
pub struct TransitionOp {
    op: BinaryOp,
    did_change: BinaryOp,
}

/// Wraps `op` so that it also requires `did_change(old, needle)`.
///
/// `make_transition(eq, ne)` yields an operator matching when the new value equals the needle
/// but the old value did not.
pub const fn make_transition(op: BinaryOp, did_change: BinaryOp) -> TransitionOp {
    TransitionOp { op, did_change }
}

impl TransitionOp {
    /// `old` is `None` when no previous version exists; `missing` is then used in place of the
    /// result of `did_change`.
    pub fn apply(
        &self,
        new: &Value,
        needle: &Value,
        old: Option<&Value>,
        missing: bool,
    ) -> Result<bool, FilterError> {
        let changed = match old {
            Some(old) => (self.did_change)(old, needle)?,
            None => missing,
        };
        Ok(changed && (self.op)(new, needle)?)
    }
}

impl fmt::Debug for TransitionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionOp").finish_non_exhaustive()
    }
}

#[derive(Clone, Copy)]
pub enum OperatorFn {
    Binary(BinaryOp),
    Transition(TransitionOp),
}

impl fmt::Debug for OperatorFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(_) => f.write_str("Binary"),
            Self::Transition(transition) => f.debug_tuple("Transition").field(transition).finish(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Operator {
    opcode: Opcode,
    function: OperatorFn,
}

impl Operator {
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn function(&self) -> OperatorFn {
        self.function
    }
}

/// Process-wide mapping from opcode names to operators.
pub struct OperatorRegistry {
    by_names: HashMap<&'static str, Operator>,
}

static OPERATORS: Lazy<OperatorRegistry> = Lazy::new(OperatorRegistry::new);

impl OperatorRegistry {
    fn new() -> Self {
        let mut by_names = HashMap::with_capacity(2 * Comparison::ALL.len());
        for comparison in Comparison::ALL {
            let opcode = Opcode::new(comparison);
            by_names.insert(
                comparison.name(),
                Operator {
                    opcode,
                    function: OperatorFn::Binary(comparison.function()),
                },
            );
            if let Some(opcode) = Opcode::transition(comparison) {
                let transition = make_transition(comparison.function(), comparison.did_change());
                by_names.insert(
                    opcode.name(),
                    Operator {
                        opcode,
                        function: OperatorFn::Transition(transition),
                    },
                );
            }
        }
        Self { by_names }
    }

    pub fn global() -> &'static OperatorRegistry {
        &OPERATORS
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.by_names.get(name)
    }

    /// Resolves an opcode name, `key` being the condition key used for error reporting.
    pub fn resolve(&self, key: &str, name: &str) -> Result<&Operator, FilterError> {
        self.get(name).ok_or_else(|| FilterError::UnknownOperator {
            key: key.to_owned(),
        })
    }

    /// Opcode names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_names.keys().copied().sorted()
    }

    pub fn len(&self) -> usize {
        self.by_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_names.is_empty()
    }
}

fn eq(a: &Value, b: &Value) -> Result<bool, FilterError> {
    Ok(a.loosely_equals(b))
}

fn ne(a: &Value, b: &Value) -> Result<bool, FilterError> {
    Ok(!a.loosely_equals(b))
}

fn order(
    operator: &'static str,
    a: &Value,
    b: &Value,
) -> Result<std::cmp::Ordering, FilterError> {
    a.compare(b).ok_or_else(|| FilterError::mismatch(operator, a, b))
}

fn gt(a: &Value, b: &Value) -> Result<bool, FilterError> {
    order("gt", a, b).map(|ordering| ordering.is_gt())
}

fn lt(a: &Value, b: &Value) -> Result<bool, FilterError> {
    order("lt", a, b).map(|ordering| ordering.is_lt())
}

fn gte(a: &Value, b: &Value) -> Result<bool, FilterError> {
    order("gte", a, b).map(|ordering| ordering.is_ge())
}

fn lte(a: &Value, b: &Value) -> Result<bool, FilterError> {
    order("lte", a, b).map(|ordering| ordering.is_le())
}

fn membership(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::List(values), needle) => {
            Some(values.iter().any(|value| value.loosely_equals(needle)))
        }
        (Value::String(haystack), Value::String(needle)) => Some(haystack.contains(needle.as_str())),
        (Value::Record(fields), Value::String(needle)) => Some(fields.contains_key(needle)),
        _ => None,
    }
}

fn contained_in(a: &Value, b: &Value) -> Result<bool, FilterError> {
    membership(b, a).ok_or_else(|| FilterError::mismatch("in", a, b))
}

fn not_contained_in(a: &Value, b: &Value) -> Result<bool, FilterError> {
    membership(b, a)
        .map(|matched| !matched)
        .ok_or_else(|| FilterError::mismatch("not_in", a, b))
}

fn contains(a: &Value, b: &Value) -> Result<bool, FilterError> {
    membership(a, b).ok_or_else(|| FilterError::mismatch("contains", a, b))
}

fn is(a: &Value, b: &Value) -> Result<bool, FilterError> {
    Ok(a == b)
}

fn is_not(a: &Value, b: &Value) -> Result<bool, FilterError> {
    Ok(a != b)
}

fn affix<F>(operator: &'static str, a: &Value, b: &Value, f: F) -> Result<bool, FilterError>
where
    F: Fn(&str, &str) -> bool,
{
    let mismatch = || FilterError::mismatch(operator, a, b);
    let value = a.as_str().ok_or_else(mismatch)?;
    match b {
        Value::String(affix) => Ok(f(value, affix.as_str())),
        Value::List(affixes) => affixes.iter().try_fold(false, |matched, affix| {
            let affix = affix.as_str().ok_or_else(mismatch)?;
            Ok(matched || f(value, affix))
        }),
        _ => Err(mismatch()),
    }
}

fn starts_with(a: &Value, b: &Value) -> Result<bool, FilterError> {
    affix("startswith", a, b, |value, prefix| value.starts_with(prefix))
}

fn ends_with(a: &Value, b: &Value) -> Result<bool, FilterError> {
    affix("endswith", a, b, |value, suffix| value.ends_with(suffix))
}

fn falsy(a: &Value, _: &Value) -> Result<bool, FilterError> {
    Ok(!a.is_truthy())
}

fn truthy(a: &Value, _: &Value) -> Result<bool, FilterError> {
    Ok(a.is_truthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValueKind;

    fn apply(name: &str, a: impl Into<Value>, b: impl Into<Value>) -> Result<bool, FilterError> {
        match OperatorRegistry::global().get(name).unwrap().function() {
            OperatorFn::Binary(op) => op(&a.into(), &b.into()),
            OperatorFn::Transition(_) => panic!("{name} is a transition operator"),
        }
    }

    fn transition(
        name: &str,
        new: impl Into<Value>,
        needle: impl Into<Value>,
        old: impl Into<Value>,
    ) -> Result<bool, FilterError> {
        match OperatorRegistry::global().get(name).unwrap().function() {
            OperatorFn::Transition(op) => {
                op.apply(&new.into(), &needle.into(), Some(&old.into()), true)
            }
            OperatorFn::Binary(_) => panic!("{name} is not a transition operator"),
        }
    }

    #[test]
    fn can_resolve_every_opcode_of_the_vocabulary() {
        let registry = OperatorRegistry::global();
        let names = [
            "eq", "ne", "gt", "lt", "gte", "lte", "in", "not_in", "is", "is_not", "contains",
            "startswith", "endswith",
        ];

        for name in names {
            assert_eq!(name, registry.resolve(name, name).unwrap().opcode().name());
            let transition = format!("{TRANSITION_PREFIX}{name}");
            let operator = registry.resolve(&transition, &transition).unwrap();
            assert!(operator.opcode().is_transition());
            assert_eq!(transition, operator.opcode().to_string());
        }
        assert!(registry.get("not").is_some());
        assert!(registry.get("true").is_some());
        assert_eq!(28, registry.len());
    }

    #[test]
    fn can_list_the_vocabulary_in_order() {
        let names: Vec<_> = OperatorRegistry::global().names().collect();

        assert_eq!(28, names.len());
        assert_eq!(Some(&"contains"), names.first());
        assert_eq!(Some(&"true"), names.last());
        assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn return_an_error_on_unknown_opcodes() {
        let registry = OperatorRegistry::global();

        for name in ["EQ", "now_not", "now_true", "equals", ""] {
            assert_eq!(
                Some(FilterError::UnknownOperator {
                    key: format!("field__{name}")
                }),
                registry.resolve(&format!("field__{name}"), name).err()
            );
        }
    }

    #[test]
    fn can_compare_numbers_and_strings() {
        assert_eq!(Ok(true), apply("gt", 10, 5));
        assert_eq!(Ok(false), apply("gt", 5, 5));
        assert_eq!(Ok(true), apply("gte", 5, 5));
        assert_eq!(Ok(true), apply("lt", "abc", "abd"));
        assert_eq!(Ok(true), apply("lte", 3, rust_decimal::Decimal::new(35, 1)));
        assert_eq!(Ok(true), apply("eq", 3, rust_decimal::Decimal::new(30, 1)));
        assert_eq!(Ok(true), apply("ne", "Benes", "Costanza"));
    }

    #[test]
    fn return_an_error_when_ordering_unrelated_types() {
        assert_eq!(
            Err(FilterError::TypeMismatch {
                operator: "gt",
                observed: ValueKind::Null,
                literal: ValueKind::Integer,
            }),
            apply("gt", Value::Null, 5)
        );
        assert!(apply("lte", "5", 5).is_err());
    }

    #[test]
    fn can_look_for_the_observed_value_inside_the_literal() {
        assert_eq!(Ok(true), apply("in", 2, vec![1, 2, 3]));
        assert_eq!(Ok(false), apply("in", 4, vec![1, 2, 3]));
        assert_eq!(Ok(true), apply("in", "ell", "hello"));
        assert_eq!(Ok(true), apply("not_in", 4, vec![1, 2, 3]));
        assert_eq!(Ok(false), apply("not_in", "h", "hello"));
        assert!(apply("in", 2, 2).is_err());
    }

    #[test]
    fn can_look_for_the_literal_inside_the_observed_value() {
        assert_eq!(Ok(true), apply("contains", vec!["a", "b"], "b"));
        assert_eq!(Ok(true), apply("contains", "hello", "ell"));
        assert_eq!(Ok(false), apply("contains", "ell", "hello"));
        assert_eq!(
            Ok(true),
            apply("contains", Value::record().with_null("key").build(), "key")
        );
        assert!(apply("contains", 12, 1).is_err());
    }

    #[test]
    fn can_match_string_affixes() {
        assert_eq!(Ok(true), apply("startswith", "Costanza", "Cos"));
        assert_eq!(Ok(false), apply("startswith", "Costanza", "za"));
        assert_eq!(Ok(true), apply("endswith", "Costanza", "za"));
        assert_eq!(Ok(true), apply("endswith", "Costanza", vec!["x", "za"]));
    }

    #[test]
    fn return_an_error_when_matching_affixes_of_non_strings() {
        assert_eq!(
            Err(FilterError::TypeMismatch {
                operator: "startswith",
                observed: ValueKind::Integer,
                literal: ValueKind::String,
            }),
            apply("startswith", 10, "1")
        );
        assert!(apply("endswith", "10", 0).is_err());
        assert!(apply("endswith", "10", vec![0]).is_err());
    }

    #[test]
    fn can_compare_identities_without_coercion() {
        assert_eq!(Ok(true), apply("is", Value::Null, Value::Null));
        assert_eq!(Ok(false), apply("is", 1, rust_decimal::Decimal::ONE));
        assert_eq!(Ok(false), apply("is", 1, true));
        assert_eq!(Ok(true), apply("is_not", 0, Value::Null));
    }

    #[test]
    fn can_test_truthiness_ignoring_the_literal() {
        assert_eq!(Ok(true), apply("true", vec![1], Value::Null));
        assert_eq!(Ok(false), apply("true", "", true));
        assert_eq!(Ok(true), apply("not", 0, true));
    }

    #[test]
    fn can_only_fire_transitions_when_the_old_value_did_not_match() {
        assert_eq!(Ok(true), transition("now_gte", 100, 100, 90));
        assert_eq!(Ok(false), transition("now_gte", 150, 100, 100));
        assert_eq!(Ok(false), transition("now_gte", 95, 100, 90));
        assert_eq!(Ok(true), transition("now_eq", "done", "done", "pending"));
        assert_eq!(Ok(false), transition("now_eq", "done", "done", "done"));
        assert_eq!(Ok(true), transition("now_ne", "done", "pending", "pending"));
        assert_eq!(Ok(false), transition("now_ne", "done", "pending", "draft"));
        assert_eq!(Ok(true), transition("now_in", 2, vec![1, 2], 3));
        assert_eq!(Ok(true), transition("now_is_not", 1, Value::Null, Value::Null));
        assert_eq!(Ok(true), transition("now_startswith", "abc", "a", "xbc"));
    }

    #[test]
    fn can_fire_or_ignore_transitions_without_history() {
        let transition = make_transition(eq, ne);
        let (new, needle) = (Value::Integer(1), Value::Integer(1));

        assert_eq!(Ok(true), transition.apply(&new, &needle, None, true));
        assert_eq!(Ok(false), transition.apply(&new, &needle, None, false));
        assert_eq!(
            Ok(false),
            transition.apply(&Value::Integer(2), &needle, None, true)
        );
    }

    #[test]
    fn return_an_error_when_the_old_value_cannot_be_compared() {
        let registry = OperatorRegistry::global();
        let OperatorFn::Transition(op) = registry.get("now_gt").unwrap().function() else {
            panic!("now_gt should be a transition operator");
        };

        let result = op.apply(&Value::Integer(3), &Value::Integer(1), Some(&Value::Null), true);

        assert!(matches!(result, Err(FilterError::TypeMismatch { .. })));
    }
}
