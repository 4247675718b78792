// This module implements the step translator. A TranslationTable maps each opcode to an
// emit function producing the C fragment for one step; the default table knows Terminate,
// StoreResult and LoadConstant, and callers may register more. translate_steps walks an
// expression program in order, checks that it ends with exactly one Terminate, and emits
// every fragment into the caller's scratch FunctionEmitter. Any step without a table entry
// aborts the whole expression with Unsupported; since the emitter is scratch space, the
// caller simply drops it and falls back to interpretation.

//! Per-opcode translation of evaluation steps to C.

use hashbrown::HashMap;

use super::emitter::{emit_line, FunctionEmitter};
use crate::core::error::Unsupported;
use crate::host::{EvalStep, Opcode, StepKind};

/// Emits the C fragment of one step.
pub type EmitFn = fn(&EvalStep, &mut FunctionEmitter);

/// Opcode → emitter table.
#[derive(Debug, Clone)]
pub struct TranslationTable {
    entries: HashMap<Opcode, EmitFn>,
}

impl Default for TranslationTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table.register(Opcode::Terminate, emit_terminate);
        table.register(Opcode::StoreResult, emit_store_result);
        table.register(Opcode::LoadConstant, emit_load_constant);
        table
    }
}

impl TranslationTable {
    /// A table that translates nothing.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Install or replace the translation of `opcode`.
    pub fn register(&mut self, opcode: Opcode, emit: EmitFn) -> Option<EmitFn> {
        self.entries.insert(opcode, emit)
    }

    pub fn supports(&self, opcode: Opcode) -> bool {
        self.entries.contains_key(&opcode)
    }

    /// Emit the fragment for a single step.
    pub fn translate(
        &self,
        index: usize,
        step: &EvalStep,
        emitter: &mut FunctionEmitter,
    ) -> Result<(), Unsupported> {
        let opcode = step.opcode();
        let emit = self
            .entries
            .get(&opcode)
            .ok_or(Unsupported::Opcode { opcode, index })?;

        let start = emitter.len();
        emit(step, emitter);
        log::trace!(
            "{} step {} ({}):\n{}",
            emitter.symbol(),
            index,
            opcode,
            &emitter.text()[start..]
        );
        Ok(())
    }

    /// Translate a whole expression program into `emitter`.
    pub fn translate_steps(
        &self,
        steps: &[EvalStep],
        emitter: &mut FunctionEmitter,
    ) -> Result<(), Unsupported> {
        let terminate = steps
            .iter()
            .position(|s| s.opcode() == Opcode::Terminate)
            .ok_or(Unsupported::MissingTerminate)?;
        if terminate + 1 != steps.len() {
            return Err(Unsupported::TrailingStep {
                index: terminate + 1,
            });
        }

        for (index, step) in steps.iter().enumerate() {
            self.translate(index, step, emitter)?;
        }
        Ok(())
    }
}

fn emit_terminate(_step: &EvalStep, e: &mut FunctionEmitter) {
    e.line("  { // Terminate");
    e.line("    *isnull = state->resnull;");
    e.line("  }");
    e.line("  return state->resvalue;");
    e.line("}");
}

fn emit_store_result(step: &EvalStep, e: &mut FunctionEmitter) {
    let StepKind::StoreResult { slot } = step.kind else {
        unreachable!("StoreResult emitter called for {:?}", step.kind);
    };
    e.line("  { // StoreResult");
    emit_line!(e, "    resultslot->values[{}] = state->resvalue;", slot);
    emit_line!(e, "    resultslot->isnull[{}] = state->resnull;", slot);
    e.line("  }");
}

fn emit_load_constant(step: &EvalStep, e: &mut FunctionEmitter) {
    let StepKind::LoadConstant { value, isnull } = step.kind else {
        unreachable!("LoadConstant emitter called for {:?}", step.kind);
    };
    e.line("  { // LoadConstant");
    emit_line!(
        e,
        "    bool *resnull = (bool *) (uintptr_t) {:#x}ull;",
        step.resnull as usize
    );
    emit_line!(
        e,
        "    Datum *resvalue = (Datum *) (uintptr_t) {:#x}ull;",
        step.resvalue as usize
    );
    emit_line!(e, "    *resnull = (bool) {};", isnull as u8);
    emit_line!(e, "    *resvalue = (Datum) {}ull;", value);
    e.line("  }");
}
