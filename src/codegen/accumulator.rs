// This module holds the source accumulator: the growable buffer of C text for every function
// translated since the last build of a context. The first function of a generation carries
// the prologue (the host header include); every function starts with the shared signature
// and the locals used by step fragments. Expressions are translated into a separate
// FunctionEmitter and only committed here once they translated completely, so a failed
// translation can never leave partial text in the batch. The compiled flag tracks whether
// the buffer holds work the toolchain has not seen yet.

//! Batched C source of not-yet-compiled functions.

use super::emitter::{emit_line, FunctionEmitter};

/// Headers included once at the top of every generation.
pub const PROLOGUE_HEADERS: &[&str] = &["slowjit.h"];

#[derive(Debug)]
pub struct SourceAccumulator {
    buffer: String,
    symbols: Vec<String>,
    compiled: bool,
}

impl Default for SourceAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceAccumulator {
    /// Empty accumulator with nothing pending.
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            symbols: Vec::new(),
            compiled: true,
        }
    }

    /// Start a function named `symbol`.
    ///
    /// When the buffer is empty the returned emitter opens with the prologue,
    /// making this function the first of a new generation.
    pub fn begin_expression(&self, symbol: String) -> FunctionEmitter {
        let mut emitter = FunctionEmitter::new(symbol);
        if self.buffer.is_empty() {
            for header in PROLOGUE_HEADERS {
                emitter.include(header);
            }
        }

        emit_line!(
            emitter,
            "Datum {}(ExprState *state, EvalContext *econtext, bool *isnull)",
            emitter.symbol()
        );
        emitter.line("{");
        emitter.line("  ResultTuple *resultslot = state->result;");
        emitter.line("  (void) econtext;");
        emitter.line("  (void) resultslot;");
        emitter
    }

    /// Commit a fully translated function to the batch.
    ///
    /// The function body must already be closed by its Terminate fragment.
    pub fn finish_expression(&mut self, emitter: FunctionEmitter) -> String {
        let (symbol, text) = emitter.into_parts();
        self.buffer.push_str(&text);
        self.symbols.push(symbol.clone());
        self.compiled = false;
        symbol
    }

    /// Whether there is text the toolchain has not compiled yet.
    pub fn has_pending(&self) -> bool {
        !self.compiled
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    pub fn source(&self) -> &str {
        &self.buffer
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Symbols defined by the pending text, in translation order.
    pub fn pending_symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Flush after the pending text was built and loaded.
    pub fn mark_compiled(&mut self) {
        self.discard();
    }

    /// Drop pending text without compiling it.
    pub fn discard(&mut self) {
        self.buffer.clear();
        self.symbols.clear();
        self.compiled = true;
    }
}
