//! Opcode-tagged evaluation steps.

use std::fmt;

use super::state::Datum;

/// Tag of an evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Return the current result; last step of every expression.
    Terminate,
    /// Copy the current result into a result tuple attribute.
    StoreResult,
    /// Materialize a literal into the step's result storage.
    LoadConstant,
    /// Arithmetic negation of the current result.
    Negate,
    /// Replace the current result with its null flag.
    IsNull,
}

impl Opcode {
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Terminate => "Terminate",
            Opcode::StoreResult => "StoreResult",
            Opcode::LoadConstant => "LoadConstant",
            Opcode::Negate => "Negate",
            Opcode::IsNull => "IsNull",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opcode-specific operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Terminate,
    StoreResult { slot: usize },
    LoadConstant { value: Datum, isnull: bool },
    Negate,
    IsNull,
}

impl StepKind {
    pub fn opcode(&self) -> Opcode {
        match self {
            StepKind::Terminate => Opcode::Terminate,
            StepKind::StoreResult { .. } => Opcode::StoreResult,
            StepKind::LoadConstant { .. } => Opcode::LoadConstant,
            StepKind::Negate => Opcode::Negate,
            StepKind::IsNull => Opcode::IsNull,
        }
    }
}

/// One step of an expression program.
///
/// `resvalue` and `resnull` point at the storage the step writes its result
/// to. They are fixed for the lifetime of the owning expression, which is what
/// lets generated code embed them as literal addresses. Steps are only
/// created by [`Expression`](super::Expression), so the pointers always
/// target that expression's own state.
#[derive(Debug, Clone, Copy)]
pub struct EvalStep {
    pub(crate) resvalue: *mut Datum,
    pub(crate) resnull: *mut bool,
    pub(crate) kind: StepKind,
}

impl EvalStep {
    pub fn opcode(&self) -> Opcode {
        self.kind.opcode()
    }

    pub fn kind(&self) -> StepKind {
        self.kind
    }
}
