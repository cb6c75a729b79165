//! Evaluation of boolean trees owned by someone else.
//!
//! Any tree exposing a connector, a negation flag and its children can be evaluated through an
//! [`Adapter`] without being converted into a [`Filter`]. The adapter only reads the foreign
//! nodes; compiled conditions live in the adapter.
use crate::{
    conditions::CompiledCondition,
    error::FilterError,
    filter::{branch, Child, Connector, Filter, Predicate},
    options::Options,
    values::{Object, Value},
};
use once_cell::sync::OnceCell;

pub trait BooleanTree {
    fn connector(&self) -> Connector;

    fn negated(&self) -> bool;

    fn children(&self) -> Vec<TreeChild<'_, Self>>
    where
        Self: Sized;
}

pub enum TreeChild<'a, T> {
    Node(&'a T),
    Field(&'a str, &'a Value),
}

enum AdaptedStep<'a, T> {
    Condition(CompiledCondition),
    Node(Adapter<'a, T>),
}

pub struct Adapter<'a, T> {
    node: &'a T,
    options: Options,
    stack: OnceCell<Vec<AdaptedStep<'a, T>>>,
}

impl<'a, T: BooleanTree> Adapter<'a, T> {
    pub fn new(node: &'a T) -> Self {
        Self::with_options(node, Options::default())
    }

    /// Only the missing history policy applies: foreign trees are always validated on their
    /// first evaluation.
    pub fn with_options(node: &'a T, options: Options) -> Self {
        Self {
            node,
            options,
            stack: OnceCell::new(),
        }
    }

    pub fn node(&self) -> &'a T {
        self.node
    }

    pub fn is_compiled(&self) -> bool {
        self.stack.get().is_some()
    }

    fn compile(&self) -> Result<&[AdaptedStep<'a, T>], FilterError> {
        self.stack
            .get_or_try_init(|| {
                let children = self.node.children();
                log::debug!(
                    "compiling foreign {:?} node with {} children",
                    self.node.connector(),
                    children.len()
                );
                children
                    .into_iter()
                    .map(|child| match child {
                        TreeChild::Node(node) => {
                            Ok(AdaptedStep::Node(Adapter::with_options(node, self.options)))
                        }
                        TreeChild::Field(key, value) => {
                            CompiledCondition::compile(key, value).map(AdaptedStep::Condition)
                        }
                    })
                    .collect()
            })
            .map(Vec::as_slice)
    }
}

impl<T: BooleanTree> Predicate for Adapter<'_, T> {
    fn evaluate(&self, object: &dyn Object) -> Result<bool, FilterError> {
        let history = self.options.missing_history;
        let matched = self
            .node
            .connector()
            .gate(self.compile()?.iter().map(|step| match step {
                AdaptedStep::Condition(condition) => condition.evaluate(object, history),
                AdaptedStep::Node(adapter) => adapter.evaluate(object),
            }))?;
        Ok(branch(self.node.negated(), matched))
    }
}

impl BooleanTree for Filter {
    fn connector(&self) -> Connector {
        Filter::connector(self)
    }

    fn negated(&self) -> bool {
        self.is_negated()
    }

    fn children(&self) -> Vec<TreeChild<'_, Self>> {
        Filter::children(self)
            .iter()
            .map(|child| match child {
                Child::Node(filter) => TreeChild::Node(&**filter),
                Child::Field(key, value) => TreeChild::Field(key.as_str(), value),
            })
            .collect()
    }
}
