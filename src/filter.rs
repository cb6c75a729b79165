use crate::{
    conditions::CompiledCondition,
    error::FilterError,
    options::{MissingHistory, Options, Validation},
    values::{Object, Value},
};
use once_cell::sync::OnceCell;
use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
    sync::Arc,
};

#[cfg(test)]
mod properties;

/// Anything that can decide whether an object matches.
pub trait Predicate {
    fn evaluate(&self, object: &dyn Object) -> Result<bool, FilterError>;
}

/// Boolean operator of a tree node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Connector {
    #[default]
    And,
    Or,
}

impl Connector {
    /// `all` for AND, `any` for OR. Stops at the first result deciding the outcome, or at the
    /// first error.
    pub fn gate<I>(&self, results: I) -> Result<bool, FilterError>
    where
        I: IntoIterator<Item = Result<bool, FilterError>>,
    {
        let decisive = matches!(self, Self::Or);
        for result in results {
            if result? == decisive {
                return Ok(decisive);
            }
        }
        Ok(!decisive)
    }
}

/// Applies the negation flag of a node to its aggregated result.
pub fn branch(negated: bool, matched: bool) -> bool {
    if negated {
        !matched
    } else {
        matched
    }
}

#[derive(Clone, Debug)]
pub enum Child {
    Node(Arc<Filter>),
    Field(String, Value),
}

impl<K: Into<String>, V: Into<Value>> From<(K, V)> for Child {
    fn from((key, value): (K, V)) -> Self {
        Self::Field(key.into(), value.into())
    }
}

impl From<Filter> for Child {
    fn from(filter: Filter) -> Self {
        Self::Node(Arc::new(filter))
    }
}

impl From<Arc<Filter>> for Child {
    fn from(filter: Arc<Filter>) -> Self {
        Self::Node(filter)
    }
}

/// Compiled form of a child.
#[derive(Clone, Debug)]
pub enum Step {
    Condition(CompiledCondition),
    Node(Arc<Filter>),
}

impl Step {
    fn evaluate(&self, object: &dyn Object, history: MissingHistory) -> Result<bool, FilterError> {
        match self {
            Self::Condition(condition) => condition.evaluate(object, history),
            Self::Node(filter) => filter.evaluate(object),
        }
    }
}

pub type CompileHook = Arc<dyn Fn(&Filter) + Send + Sync>;

/// A node of a predicate tree.
///
/// The children are compiled on the first evaluation and the compiled steps are reused for every
/// later one. Nested filters are kept as-is and compile their own children when first reached.
///
/// ```
/// use q_tree::{Filter, Predicate, Value};
///
/// let filter = Filter::or()
///     .with_field("x__gt", 5)
///     .with_field("x__lt", 0)
///     .build()
///     .unwrap();
///
/// let object = Value::record().with_integer("x", 10).build();
/// assert_eq!(Ok(true), filter.evaluate(&object));
/// ```
#[derive(Clone)]
pub struct Filter {
    connector: Connector,
    negated: bool,
    children: Vec<Child>,
    options: Options,
    on_compile: Option<CompileHook>,
    stack: OnceCell<Vec<Step>>,
}

impl Filter {
    pub fn new(
        connector: Connector,
        negated: bool,
        children: Vec<Child>,
    ) -> Result<Self, FilterError> {
        Self::with_options(connector, negated, children, Options::default())
    }

    pub fn with_options(
        connector: Connector,
        negated: bool,
        children: Vec<Child>,
        options: Options,
    ) -> Result<Self, FilterError> {
        let filter = Self {
            connector,
            negated,
            children,
            options,
            on_compile: None,
            stack: OnceCell::new(),
        };
        if filter.options.validation == Validation::Eager {
            filter.validate()?;
        }
        Ok(filter)
    }

    pub fn and() -> FilterBuilder {
        FilterBuilder::new(Connector::And)
    }

    pub fn or() -> FilterBuilder {
        FilterBuilder::new(Connector::Or)
    }

    pub fn connector(&self) -> Connector {
        self.connector
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn is_compiled(&self) -> bool {
        self.stack.get().is_some()
    }

    /// Compiles the direct children, once. Nested filters are not traversed.
    pub fn compile(&self) -> Result<&[Step], FilterError> {
        let mut compiled = false;
        let stack = self.stack.get_or_try_init(|| {
            log::debug!(
                "compiling {:?} node with {} children",
                self.connector,
                self.children.len()
            );
            let stack = self
                .children
                .iter()
                .map(compile_child)
                .collect::<Result<Vec<_>, _>>()?;
            compiled = true;
            Ok::<_, FilterError>(stack)
        })?;
        if compiled {
            if let Some(hook) = &self.on_compile {
                (**hook)(self);
            }
        }
        Ok(stack.as_slice())
    }

    /// Keeps the objects that match, in order.
    pub fn select<'a, O: Object>(
        &self,
        objects: impl IntoIterator<Item = &'a O>,
    ) -> Result<Vec<&'a O>, FilterError> {
        let mut selected = Vec::new();
        for object in objects {
            if self.evaluate(object)? {
                selected.push(object);
            }
        }
        Ok(selected)
    }

    fn validate(&self) -> Result<(), FilterError> {
        for child in &self.children {
            if let Child::Field(key, value) = child {
                CompiledCondition::compile(key, value)?;
            }
        }
        Ok(())
    }

    fn combine(self, other: Filter, connector: Connector) -> Filter {
        let options = self.options;
        Filter {
            connector,
            negated: false,
            children: vec![self.into(), other.into()],
            options,
            on_compile: None,
            stack: OnceCell::new(),
        }
    }
}

fn compile_child(child: &Child) -> Result<Step, FilterError> {
    match child {
        Child::Node(filter) => Ok(Step::Node(Arc::clone(filter))),
        Child::Field(key, value) => CompiledCondition::compile(key, value).map(Step::Condition),
    }
}

impl Predicate for Filter {
    fn evaluate(&self, object: &dyn Object) -> Result<bool, FilterError> {
        let stack = self.compile()?;
        let history = self.options.missing_history;
        let matched = self
            .connector
            .gate(stack.iter().map(|step| step.evaluate(object, history)))?;
        log::trace!(
            "{:?} node (negated: {}) evaluated to {}",
            self.connector,
            self.negated,
            matched
        );
        Ok(branch(self.negated, matched))
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("connector", &self.connector)
            .field("negated", &self.negated)
            .field("children", &self.children)
            .field("options", &self.options)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

impl BitAnd for Filter {
    type Output = Filter;

    fn bitand(self, rhs: Filter) -> Filter {
        self.combine(rhs, Connector::And)
    }
}

impl BitOr for Filter {
    type Output = Filter;

    fn bitor(self, rhs: Filter) -> Filter {
        self.combine(rhs, Connector::Or)
    }
}

impl Not for Filter {
    type Output = Filter;

    /// The compiled steps do not depend on the negation flag and are kept.
    fn not(mut self) -> Filter {
        self.negated = !self.negated;
        self
    }
}

pub struct FilterBuilder {
    connector: Connector,
    negated: bool,
    children: Vec<Child>,
    options: Options,
    on_compile: Option<CompileHook>,
}

impl FilterBuilder {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            negated: false,
            children: Vec::new(),
            options: Options::default(),
            on_compile: None,
        }
    }

    pub fn negated(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.children.push(Child::Field(key.to_owned(), value.into()));
        self
    }

    pub fn with_node(mut self, filter: impl Into<Arc<Filter>>) -> Self {
        self.children.push(Child::Node(filter.into()));
        self
    }

    pub fn with_child(mut self, child: impl Into<Child>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Called once the built node has compiled its children. The node is already compiled when
    /// the hook runs, so the hook may evaluate it.
    pub fn on_compile<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Filter) + Send + Sync + 'static,
    {
        self.on_compile = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Result<Filter, FilterError> {
        let mut filter =
            Filter::with_options(self.connector, self.negated, self.children, self.options)?;
        filter.on_compile = self.on_compile;
        Ok(filter)
    }
}
