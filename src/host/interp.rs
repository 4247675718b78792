//! Reference interpreter for expression programs.
//!
//! This is the path every expression takes when it was never compiled or when
//! translation reported it unsupported. Tests also use it as the oracle for
//! native results.

use super::state::{Datum, ExprState};
use super::step::{EvalStep, StepKind};

/// Value and null flag produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalResult {
    pub value: Datum,
    pub isnull: bool,
}

/// Run `steps` against `state`.
///
/// # Safety
///
/// `state` and its result tuple must be valid for writes, and every step's
/// `resvalue`/`resnull` must point at live storage. `StoreResult` slots must be
/// below the tuple's `natts`.
pub unsafe fn interpret(state: *mut ExprState, steps: &[EvalStep]) -> EvalResult {
    for step in steps {
        match step.kind {
            StepKind::Terminate => break,
            StepKind::StoreResult { slot } => {
                let tuple = (*state).result;
                assert!(slot < (*tuple).natts as usize, "result slot {slot} out of range");
                *(*tuple).values.add(slot) = (*state).resvalue;
                *(*tuple).isnull.add(slot) = (*state).resnull;
            }
            StepKind::LoadConstant { value, isnull } => {
                *step.resvalue = value;
                *step.resnull = isnull;
            }
            StepKind::Negate => {
                if !(*state).resnull {
                    (*state).resvalue = ((*state).resvalue as i64).wrapping_neg() as Datum;
                }
            }
            StepKind::IsNull => {
                (*state).resvalue = (*state).resnull as Datum;
                (*state).resnull = false;
            }
        }
    }

    EvalResult {
        value: (*state).resvalue,
        isnull: (*state).resnull,
    }
}
