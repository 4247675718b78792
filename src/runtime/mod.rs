// This module groups the runtime half of the JIT: loaded modules and their export tables,
// the per-symbol address cache searched newest module first, and the trampoline that turns a
// host dispatch slot from "resolve on first call" into a direct native call.

//! Loading, symbol resolution and dispatch of compiled expressions.

pub mod module;
pub mod symbol_cache;
pub mod trampoline;

pub use module::LoadedModule;
pub use symbol_cache::SymbolCache;
pub use trampoline::{CompiledFunction, EvalDispatch, NativeEntry};
