// This module implements the execution trampoline. A translated expression's dispatch slot
// starts in the Trampoline state holding its CompiledFunction reference. The first call
// resolves the reference through the owning context, which may build and load the pending
// batch, then overwrites the slot with the Native state and calls straight through; every
// later call dispatches to the native function without touching the resolver. The
// transition is a single enum replacement and cannot be undone, so resolution runs at most
// once per expression. A failed resolution leaves the slot in the Trampoline state and
// propagates the error to the caller.

//! Lazy-resolve-then-replace dispatch for compiled expressions.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;

use crate::core::context::ContextInner;
use crate::core::error::{JitError, JitResult};
use crate::host::{interpret, EvalContext, EvalResult, EvalStep, ExprState, NativeEvalFn};

/// Handle to one translated function inside a context.
///
/// Holds the context weakly; resolving after the context is gone yields
/// [`JitError::ContextReleased`]. The handle also records the id of the
/// expression it was translated from, the only one it may be installed on.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    context: Weak<RefCell<ContextInner>>,
    symbol: String,
    expression: u64,
}

impl CompiledFunction {
    pub(crate) fn new(context: Weak<RefCell<ContextInner>>, symbol: String, expression: u64) -> Self {
        Self {
            context,
            symbol,
            expression,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Id of the [`Expression`](crate::host::Expression) this function
    /// belongs to.
    pub fn expression(&self) -> u64 {
        self.expression
    }

    /// Native address of this function; builds the pending batch on first
    /// use.
    pub fn resolve(&self) -> JitResult<NativeEvalFn> {
        let context = self.context.upgrade().ok_or(JitError::ContextReleased)?;
        let mut inner = context.borrow_mut();
        inner.resolve(&self.symbol)
    }

    /// Whether the owning context still holds its modules.
    pub fn is_live(&self) -> bool {
        self.context
            .upgrade()
            .and_then(|c| c.try_borrow().ok().map(|inner| !inner.is_released()))
            .unwrap_or(false)
    }
}

/// A resolved native entry point.
#[derive(Debug, Clone)]
pub struct NativeEntry {
    func: NativeEvalFn,
    origin: CompiledFunction,
}

impl NativeEntry {
    pub fn func(&self) -> NativeEvalFn {
        self.func
    }

    pub fn symbol(&self) -> &str {
        self.origin.symbol()
    }
}

/// The host's per-expression dispatch slot.
pub enum EvalDispatch {
    /// Evaluate with the reference interpreter.
    Interpret,
    /// Translated but not yet resolved.
    Trampoline(CompiledFunction),
    /// Resolved; calls go straight to native code.
    Native(NativeEntry),
}

impl EvalDispatch {
    pub fn is_interpreted(&self) -> bool {
        matches!(self, EvalDispatch::Interpret)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EvalDispatch::Trampoline(_))
    }

    pub fn is_native(&self) -> bool {
        matches!(self, EvalDispatch::Native(_))
    }

    /// Installed native function, once resolved.
    pub fn native(&self) -> Option<NativeEvalFn> {
        match self {
            EvalDispatch::Native(entry) => Some(entry.func),
            _ => None,
        }
    }

    /// Evaluate once, resolving and installing the native function first if
    /// the slot still holds a trampoline.
    pub(crate) fn invoke(
        &mut self,
        state: *mut ExprState,
        steps: &[EvalStep],
        econtext: &mut EvalContext,
    ) -> JitResult<EvalResult> {
        if let EvalDispatch::Trampoline(function) = self {
            let func = function.resolve()?;
            let EvalDispatch::Trampoline(origin) = std::mem::replace(self, EvalDispatch::Interpret)
            else {
                unreachable!("slot changed during resolution");
            };
            log::debug!("Installed native entry for {}", origin.symbol());
            *self = EvalDispatch::Native(NativeEntry { func, origin });
        }

        match self {
            // SAFETY: `state` and `steps` come from the same live Expression.
            EvalDispatch::Interpret => Ok(unsafe { interpret(state, steps) }),
            EvalDispatch::Native(entry) => {
                if !entry.origin.is_live() {
                    return Err(JitError::ContextReleased);
                }
                // SAFETY: the owning context is live, so the module defining
                // `func` is still mapped.
                Ok(unsafe { call_native(entry.func, state, econtext) })
            }
            EvalDispatch::Trampoline(_) => unreachable!("trampoline replaced above"),
        }
    }
}

impl fmt::Debug for EvalDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalDispatch::Interpret => f.write_str("Interpret"),
            EvalDispatch::Trampoline(function) => {
                f.debug_tuple("Trampoline").field(&function.symbol).finish()
            }
            EvalDispatch::Native(entry) => f
                .debug_tuple("Native")
                .field(&entry.symbol())
                .field(&(entry.func() as usize as *const ()))
                .finish(),
        }
    }
}

unsafe fn call_native(
    func: NativeEvalFn,
    state: *mut ExprState,
    econtext: &mut EvalContext,
) -> EvalResult {
    let mut isnull = false;
    let value = func(state, econtext, &mut isnull);
    EvalResult { value, isnull }
}
