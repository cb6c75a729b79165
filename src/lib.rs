//! Declarative predicate trees evaluated against plain objects.
//!
//! A [`Filter`] combines conditions under AND/OR gates, optionally negated. Each condition is a
//! key of the form `attribute[.attribute...]__opcode` and a literal, e.g. `author.last_name__eq`.
//! Trees are compiled on their first evaluation and the compiled form is reused afterwards.
//!
//! Transition opcodes (`now_*`) also look at the previous version of the object and only match
//! when the value just started satisfying the comparison.
//!
//! ```
//! use q_tree::{Filter, Predicate, Snapshot, Value};
//!
//! let filter = Filter::and()
//!     .with_field("author.account.is_staff__eq", true)
//!     .with_field("score__now_gte", 100)
//!     .build()
//!     .unwrap();
//!
//! let article = |score: i64| {
//!     let account = Value::record().with_integer("is_staff", 1);
//!     Value::record()
//!         .with_record("author", Value::record().with_record("account", account))
//!         .with_integer("score", score)
//!         .build()
//! };
//!
//! let snapshot = Snapshot::new(article(120)).with_previous(Snapshot::new(article(90)));
//! assert_eq!(Ok(true), filter.evaluate(&snapshot));
//! ```
mod adapter;
mod conditions;
mod error;
mod filter;
mod operators;
mod options;
mod values;

pub use crate::{
    adapter::{Adapter, BooleanTree, TreeChild},
    conditions::{AttributePath, CompiledCondition, PATH_DELIMITER, SEPARATOR},
    error::FilterError,
    filter::{branch, Child, CompileHook, Connector, Filter, FilterBuilder, Predicate, Step},
    operators::{
        make_transition, BinaryOp, Comparison, Opcode, Operator, OperatorFn, OperatorRegistry,
        TransitionOp, TRANSITION_PREFIX,
    },
    options::{MissingHistory, Options, Validation},
    values::{Object, RecordBuilder, Snapshot, Value, ValueKind, PREVIOUS_VERSION_ATTRIBUTE},
};
