// This module tracks per-context JIT instrumentation: how many functions were translated,
// how many modules were built, how symbol resolution performed against the memo cache, and
// how much wall time went into source generation, the external toolchain and loading. The
// counters are plain fields updated by the owning context on its single execution thread;
// Display renders them as a short report for logs and the command-line driver.

//! Counters and timings of a compilation context.

use std::fmt;
use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JitInstrumentation {
    /// Functions handed out by the symbol namer.
    pub created_functions: usize,

    /// Successful build + load cycles.
    pub modules_built: usize,

    /// Calls to resolve.
    pub symbol_lookups: usize,

    /// Resolutions answered from the symbol cache.
    pub cache_hits: usize,

    /// Expressions that fell back to interpretation.
    pub unsupported_expressions: usize,

    /// Time spent translating steps to C.
    pub generation_time: Duration,

    /// Time spent writing source and running the toolchain.
    pub build_time: Duration,

    /// Time spent inspecting and mapping artifacts.
    pub load_time: Duration,
}

impl fmt::Display for JitInstrumentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "JIT Instrumentation:")?;
        writeln!(f, "  Functions created: {}", self.created_functions)?;
        writeln!(f, "  Unsupported expressions: {}", self.unsupported_expressions)?;
        writeln!(f, "  Modules built: {}", self.modules_built)?;
        writeln!(
            f,
            "  Symbol lookups: {} ({} cache hits)",
            self.symbol_lookups, self.cache_hits
        )?;
        writeln!(f, "  Generation time: {:?}", self.generation_time)?;
        writeln!(f, "  Build time: {:?}", self.build_time)?;
        writeln!(f, "  Load time: {:?}", self.load_time)?;
        Ok(())
    }
}
