// This module serves as the hub for the compilation context and the pieces it is built
// from: configuration of the external toolchain, the error taxonomy, the symbol namer that
// keeps generated function names unique, instrumentation counters and JitContext itself,
// which owns the pending source batch, the generation counter, every loaded module and the
// symbol cache for one execution lifetime.

//! Compilation context and shared infrastructure.
//!
//! # Key Components
//!
//! - [`JitContext`]: batching, lazy build, symbol resolution and teardown
//! - [`JitConfig`]: compiler path, include directory, artifact directory
//! - [`JitError`] / [`Unsupported`]: fatal and recoverable failures
//! - [`SymbolNamer`]: `basename_<generation>_<counter>` names
//! - [`JitInstrumentation`]: counters and timings

pub mod config;
pub mod context;
pub mod error;
pub mod instrumentation;
pub mod namer;

pub use config::JitConfig;
pub use context::{JitContext, EXPR_BASENAME};
pub use error::{ErrorKind, JitError, JitResult, Unsupported};
pub use instrumentation::JitInstrumentation;
pub use namer::SymbolNamer;
