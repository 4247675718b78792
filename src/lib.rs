//! slowjit - incremental native-code compilation of query expressions.
//!
//! An expression is an ordered program of opcode-tagged evaluation steps.
//! slowjit translates each program into a C function, batches every function
//! translated within one execution into a single compilation unit, and on the
//! first real evaluation compiles the batch with an external C compiler, loads
//! the resulting shared library and swaps the expression's dispatch slot over
//! to the native function.
//!
//! # Primary Usage
//!
//! ```ignore
//! use slowjit::{Expression, EvalContext, JitConfig, JitProvider, SlowJitProvider};
//!
//! let mut provider = SlowJitProvider::new(JitConfig::from_env());
//!
//! let mut expr = Expression::new(1);
//! expr.load_constant(42, false).store_result(0).terminate();
//!
//! // Falls back to interpretation when `false`.
//! provider.compile_expr(&mut expr);
//!
//! // First call builds and loads the batch, later calls go straight to native code.
//! let result = expr.evaluate(&mut EvalContext::default())?;
//! ```
//!
//! # Architecture
//!
//! - [`host`] - Expression state, steps and the reference interpreter
//! - [`codegen`] - Per-opcode C translation and per-generation batching
//! - [`build`] - Source files on disk and the external toolchain
//! - [`runtime`] - Loaded modules, symbol cache and the trampoline
//! - [`core`] - Compilation context, configuration, errors
//! - [`provider`] - Host-facing callbacks and execution scope

pub mod build;
pub mod codegen;
pub mod core;
pub mod host;
pub mod provider;
pub mod runtime;

pub use self::core::{
    ErrorKind, JitConfig, JitContext, JitError, JitInstrumentation, JitResult, Unsupported,
};
pub use self::host::{Datum, EvalContext, EvalResult, EvalStep, Expression, Opcode, StepKind};
pub use self::provider::{JitProvider, SlowJitProvider};
pub use self::runtime::{CompiledFunction, EvalDispatch};
