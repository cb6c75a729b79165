/// When the keys of a tree are checked against the opcode vocabulary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Validation {
    /// Reject unknown opcodes while building the tree.
    #[default]
    Eager,
    /// Report unknown opcodes on the first evaluation.
    Deferred,
}

/// Outcome of a transition opcode on an object without a previous version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MissingHistory {
    /// Absent history counts as a change: `now_*` matches whenever the current value does.
    #[default]
    Fire,
    /// `now_*` never matches without a previous version.
    Ignore,
}

impl MissingHistory {
    pub(crate) fn counts_as_change(&self) -> bool {
        matches!(self, Self::Fire)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Options {
    pub validation: Validation,
    pub missing_history: MissingHistory,
}

impl Options {
    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn with_missing_history(mut self, missing_history: MissingHistory) -> Self {
        self.missing_history = missing_history;
        self
    }
}
