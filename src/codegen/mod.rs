//! C source generation: step translation and per-generation batching.

pub mod accumulator;
pub mod emitter;
pub mod translate;

pub use accumulator::{SourceAccumulator, PROLOGUE_HEADERS};
pub use emitter::FunctionEmitter;
pub use translate::{EmitFn, TranslationTable};
