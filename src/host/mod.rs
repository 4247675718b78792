// This module models the boundary with the query engine that hosts the JIT. The engine
// itself is external; what lives here is the contract the compiler depends on: a
// C-compatible expression state that generated functions read and write, the result tuple
// they store into, opcode-tagged evaluation steps carrying fixed result addresses, the
// reference interpreter used whenever an expression cannot be compiled, and the Expression
// object that ties a step program to its per-expression dispatch slot.

//! Host engine boundary: expression state, steps and the reference
//! interpreter.

pub mod expression;
pub mod interp;
pub mod state;
pub mod step;

pub use expression::Expression;
pub use interp::{interpret, EvalResult};
pub use state::{Datum, EvalContext, ExprState, NativeEvalFn, ResultTuple, TupleStorage};
pub use step::{EvalStep, Opcode, StepKind};
