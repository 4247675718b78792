//! Host-side expression object.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use super::interp::EvalResult;
use super::state::{Datum, EvalContext, ExprState, TupleStorage};
use super::step::{EvalStep, StepKind};
use crate::core::error::{JitError, JitResult};
use crate::runtime::trampoline::{CompiledFunction, EvalDispatch};

static NEXT_EXPRESSION_ID: AtomicU64 = AtomicU64::new(0);

/// An expression program together with its state, result tuple and dispatch
/// slot.
///
/// The state lives at a fixed heap address for the whole life of the
/// expression; steps and generated code hold raw pointers into it. Compiled
/// functions are bound to the expression they were translated from by its
/// process-unique id.
pub struct Expression {
    id: u64,
    state: NonNull<ExprState>,
    tuple: TupleStorage,
    steps: Vec<EvalStep>,
    dispatch: EvalDispatch,
}

impl Expression {
    /// Create an empty expression writing into a tuple of `natts` attributes.
    pub fn new(natts: usize) -> Self {
        let mut tuple = TupleStorage::new(natts);
        let state = Box::new(ExprState {
            resvalue: 0,
            resnull: true,
            result: tuple.raw_mut(),
        });
        Self {
            id: NEXT_EXPRESSION_ID.fetch_add(1, Ordering::Relaxed),
            state: NonNull::from(Box::leak(state)),
            tuple,
            steps: Vec::new(),
            dispatch: EvalDispatch::Interpret,
        }
    }

    fn push(&mut self, kind: StepKind) -> &mut Self {
        let state = self.state.as_ptr();
        // SAFETY: `state` is a live allocation owned by `self`; only field
        // addresses are taken.
        let (resvalue, resnull) = unsafe {
            (
                std::ptr::addr_of_mut!((*state).resvalue),
                std::ptr::addr_of_mut!((*state).resnull),
            )
        };
        self.steps.push(EvalStep {
            resvalue,
            resnull,
            kind,
        });
        self
    }

    pub fn load_constant(&mut self, value: Datum, isnull: bool) -> &mut Self {
        self.push(StepKind::LoadConstant { value, isnull })
    }

    pub fn store_result(&mut self, slot: usize) -> &mut Self {
        assert!(
            slot < self.tuple.natts(),
            "result slot {slot} out of range for {} attributes",
            self.tuple.natts()
        );
        self.push(StepKind::StoreResult { slot })
    }

    pub fn negate(&mut self) -> &mut Self {
        self.push(StepKind::Negate)
    }

    pub fn is_null(&mut self) -> &mut Self {
        self.push(StepKind::IsNull)
    }

    pub fn terminate(&mut self) -> &mut Self {
        self.push(StepKind::Terminate)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn steps(&self) -> &[EvalStep] {
        &self.steps
    }

    pub fn natts(&self) -> usize {
        self.tuple.natts()
    }

    /// Attribute `slot` of the result tuple.
    pub fn result(&self, slot: usize) -> Option<(Datum, bool)> {
        self.tuple.get(slot)
    }

    pub fn clear_result(&mut self) {
        self.tuple.clear();
    }

    pub fn dispatch(&self) -> &EvalDispatch {
        &self.dispatch
    }

    /// Route later evaluations through `function`.
    ///
    /// The generated code of `function` writes into the state of the
    /// expression it was translated from, so only that expression accepts it.
    pub fn install(&mut self, function: CompiledFunction) -> JitResult<()> {
        if function.expression() != self.id {
            return Err(JitError::ForeignFunction {
                symbol: function.symbol().to_string(),
                expression: self.id,
            });
        }
        self.dispatch = EvalDispatch::Trampoline(function);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_dispatch(&mut self, dispatch: EvalDispatch) {
        self.dispatch = dispatch;
    }

    /// Evaluate once through the dispatch slot.
    pub fn evaluate(&mut self, econtext: &mut EvalContext) -> JitResult<EvalResult> {
        let result = self
            .dispatch
            .invoke(self.state.as_ptr(), &self.steps, econtext)?;
        econtext.rows_evaluated += 1;
        Ok(result)
    }
}

impl Drop for Expression {
    fn drop(&mut self) {
        // SAFETY: allocated by `Box::leak` in `new` and freed only here.
        unsafe { drop(Box::from_raw(self.state.as_ptr())) };
    }
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Expression")
            .field("id", &self.id)
            .field("steps", &self.steps.len())
            .field("natts", &self.tuple.natts())
            .field("dispatch", &self.dispatch)
            .finish()
    }
}
