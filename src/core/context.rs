// This module implements JitContext, the compilation context owning everything the JIT
// creates during one execution lifetime: the source accumulator of the current generation,
// the generation number and symbol namer, the module builder, every loaded module, the
// symbol address cache and instrumentation. Expressions are translated eagerly into the
// accumulator but compiled lazily: the first resolve after new text was added builds and
// loads the whole pending batch as one module, so all expressions of a query share one
// toolchain run. State only advances after both build and load succeed, which keeps a failed
// build from registering a module or losing pending text. CompiledFunction references point
// back at the context weakly; release() drops every module exactly once and is also run by
// Drop, so teardown happens on error paths as well.

//! Compilation context: batching, lazy build, resolution and teardown.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::config::JitConfig;
use super::error::{JitError, JitResult, Unsupported};
use super::instrumentation::JitInstrumentation;
use super::namer::SymbolNamer;
use crate::build::{CcToolchain, ModuleBuilder, Toolchain};
use crate::codegen::{EmitFn, SourceAccumulator, TranslationTable};
use crate::host::{EvalStep, Expression, NativeEvalFn, Opcode};
use crate::runtime::module::{remove_artifact, LoadedModule};
use crate::runtime::symbol_cache::SymbolCache;
use crate::runtime::trampoline::CompiledFunction;

/// Basename of every generated expression function.
pub const EXPR_BASENAME: &str = "slowjit_eval_expr";

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) struct ContextInner {
    id: u64,
    generation: u64,
    namer: SymbolNamer,
    accumulator: SourceAccumulator,
    table: TranslationTable,
    builder: ModuleBuilder,
    modules: Vec<LoadedModule>,
    cache: SymbolCache,
    instr: JitInstrumentation,
    keep_artifacts: bool,
    /// Files of failed builds, removed at release.
    orphans: Vec<PathBuf>,
    released: bool,
}

impl ContextInner {
    pub(crate) fn is_released(&self) -> bool {
        self.released
    }

    fn next_symbol(&mut self, basename: &str) -> String {
        self.instr.created_functions += 1;
        self.namer.next(basename, self.generation)
    }

    fn translate(&mut self, steps: &[EvalStep]) -> Result<String, Unsupported> {
        if self.released {
            return Err(Unsupported::Released);
        }

        let start = Instant::now();
        let symbol = self.next_symbol(EXPR_BASENAME);
        let mut emitter = self.accumulator.begin_expression(symbol);
        let translated = self.table.translate_steps(steps, &mut emitter);
        self.instr.generation_time += start.elapsed();

        match translated {
            Ok(()) => {
                let symbol = self.accumulator.finish_expression(emitter);
                log::debug!(
                    "Translated expression {} ({} steps, generation {})",
                    symbol,
                    steps.len(),
                    self.generation
                );
                Ok(symbol)
            }
            Err(reason) => {
                self.instr.unsupported_expressions += 1;
                log::debug!("cannot translate {}: {}", emitter.symbol(), reason);
                Err(reason)
            }
        }
    }

    pub(crate) fn resolve(&mut self, symbol: &str) -> JitResult<NativeEvalFn> {
        if self.released {
            return Err(JitError::ContextReleased);
        }

        self.instr.symbol_lookups += 1;
        if let Some(func) = self.cache.get(symbol) {
            self.instr.cache_hits += 1;
            return Ok(func);
        }

        if self.accumulator.has_pending() {
            self.build_pending()?;
        }

        self.cache
            .search(&self.modules, symbol)?
            .ok_or_else(|| JitError::SymbolNotFound {
                symbol: symbol.to_string(),
                modules: self.modules.len(),
            })
    }

    fn build_pending(&mut self) -> JitResult<()> {
        let generation = self.generation;

        let start = Instant::now();
        let built = self.builder.build(
            generation,
            self.accumulator.source(),
            self.accumulator.pending_symbols().len(),
        );
        self.instr.build_time += start.elapsed();
        let artifact = built.inspect_err(|_| self.note_orphans(generation))?;

        let start = Instant::now();
        let loaded = LoadedModule::load(&artifact, !self.keep_artifacts);
        self.instr.load_time += start.elapsed();
        let module = loaded.inspect_err(|_| self.note_orphans(generation))?;

        self.accumulator.mark_compiled();
        self.modules.push(module);
        self.generation += 1;
        self.instr.modules_built += 1;
        Ok(())
    }

    fn note_orphans(&mut self, generation: u64) {
        for path in [
            self.builder.source_path(generation),
            self.builder.library_path(generation),
        ] {
            if !self.orphans.contains(&path) {
                self.orphans.push(path);
            }
        }
    }

    fn release(&mut self) -> usize {
        let modules = std::mem::take(&mut self.modules);
        let unloaded = modules.len();
        // Each module closes its library on drop.
        drop(modules);

        self.cache.clear();
        self.accumulator.discard();
        if !self.keep_artifacts {
            for path in self.orphans.drain(..) {
                remove_artifact(&path);
            }
        }

        if !self.released {
            log::info!(
                "Released JIT context {} ({} modules unloaded)",
                self.id,
                unloaded
            );
        }
        self.released = true;
        unloaded
    }
}

/// Compilation context for one execution lifetime.
///
/// Single-threaded: the context and the references it hands out are `!Send`.
pub struct JitContext {
    inner: Rc<RefCell<ContextInner>>,
}

impl JitContext {
    /// Context compiling with the configured `cc`-style compiler.
    pub fn new(config: &JitConfig) -> Self {
        Self::with_toolchain(config, Box::new(CcToolchain::new(config)))
    }

    /// Context compiling with a caller-provided toolchain.
    pub fn with_toolchain(config: &JitConfig, toolchain: Box<dyn Toolchain>) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let builder = ModuleBuilder::new(config.artifact_dir.clone(), id, toolchain);
        let inner = ContextInner {
            id,
            generation: 0,
            namer: SymbolNamer::new(),
            accumulator: SourceAccumulator::new(),
            table: TranslationTable::default(),
            builder,
            modules: Vec::new(),
            cache: SymbolCache::new(),
            instr: JitInstrumentation::default(),
            keep_artifacts: config.keep_artifacts,
            orphans: Vec::new(),
            released: false,
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.borrow().id
    }

    /// Generation the next built module will carry.
    pub fn generation(&self) -> u64 {
        self.inner.borrow().generation
    }

    /// `false` while translated text is waiting for a build.
    pub fn is_compiled(&self) -> bool {
        self.inner.borrow().accumulator.is_compiled()
    }

    /// Source text of the pending generation.
    pub fn pending_source(&self) -> String {
        self.inner.borrow().accumulator.source().to_string()
    }

    pub fn pending_symbols(&self) -> Vec<String> {
        self.inner.borrow().accumulator.pending_symbols().to_vec()
    }

    pub fn module_count(&self) -> usize {
        self.inner.borrow().modules.len()
    }

    /// Library paths of the loaded modules, oldest first.
    pub fn module_paths(&self) -> Vec<PathBuf> {
        self.inner
            .borrow()
            .modules
            .iter()
            .map(|m| m.path().to_path_buf())
            .collect()
    }

    pub fn instrumentation(&self) -> JitInstrumentation {
        self.inner.borrow().instr.clone()
    }

    pub fn is_released(&self) -> bool {
        self.inner.borrow().released
    }

    /// Add or replace the C translation of `opcode` for this context.
    ///
    /// # Safety
    ///
    /// The fragment runs as native code on every evaluation of expressions
    /// containing `opcode`. It may only touch `state`, `*isnull` and the
    /// attributes of `resultslot` below its `natts`, and must leave the
    /// function open unless `opcode` is [`Opcode::Terminate`].
    pub unsafe fn register_translation(&self, opcode: Opcode, emit: EmitFn) {
        self.inner.borrow_mut().table.register(opcode, emit);
    }

    /// Mint a fresh `basename_<generation>_<counter>` symbol.
    pub fn next_symbol(&self, basename: &str) -> String {
        self.inner.borrow_mut().next_symbol(basename)
    }

    /// Translate the program of `expr` into the pending batch.
    ///
    /// The returned function can only be installed on `expr`. On `Err` the
    /// batch is left exactly as it was and the caller should interpret the
    /// expression instead.
    pub fn translate_expression(&self, expr: &Expression) -> Result<CompiledFunction, Unsupported> {
        let symbol = self.inner.borrow_mut().translate(expr.steps())?;
        Ok(CompiledFunction::new(
            Rc::downgrade(&self.inner),
            symbol,
            expr.id(),
        ))
    }

    /// Native address of `symbol`, building pending text first if needed.
    pub fn resolve(&self, symbol: &str) -> JitResult<NativeEvalFn> {
        self.inner.borrow_mut().resolve(symbol)
    }

    /// Drop pending, uncompiled text.
    ///
    /// References to discarded functions fail with
    /// [`JitError::SymbolNotFound`] when resolved.
    pub fn discard_pending(&self) {
        let mut inner = self.inner.borrow_mut();
        let dropped = inner.accumulator.pending_symbols().len();
        if dropped > 0 {
            log::debug!("Discarding {} pending functions", dropped);
        }
        inner.accumulator.discard();
    }

    /// Unload every module. Returns how many were unloaded; repeated calls
    /// return 0.
    pub fn release(&self) -> usize {
        match self.inner.try_borrow_mut() {
            Ok(mut inner) => inner.release(),
            Err(_) => {
                log::warn!("cannot release JIT context while it is in use");
                0
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> std::rc::Weak<RefCell<ContextInner>> {
        Rc::downgrade(&self.inner)
    }
}

impl Drop for JitContext {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for JitContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("JitContext")
                .field("id", &inner.id)
                .field("generation", &inner.generation)
                .field("compiled", &inner.accumulator.is_compiled())
                .field("modules", &inner.modules)
                .field("released", &inner.released)
                .finish(),
            Err(_) => f.write_str("JitContext { <in use> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    /// Fails every build without touching the filesystem.
    struct Broken;

    impl Toolchain for Broken {
        fn compile(&self, source: &Path, _output: &Path) -> JitResult<()> {
            Err(JitError::ToolchainSpawn {
                command: format!("broken {}", source.display()),
                source: std::io::Error::other("toolchain disabled"),
            })
        }
    }

    fn context(dir: &Path) -> JitContext {
        let config = JitConfig::default().with_artifact_dir(dir);
        JitContext::with_toolchain(&config, Box::new(Broken))
    }

    fn constant(value: u64) -> Expression {
        let mut expr = Expression::new(1);
        expr.load_constant(value, false).store_result(0).terminate();
        expr
    }

    #[test]
    fn test_new_context_has_nothing_pending() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(ctx.is_compiled());
        assert_eq!(ctx.generation(), 0);
        assert_eq!(ctx.module_count(), 0);
        assert!(ctx.pending_source().is_empty());
    }

    #[test]
    fn test_ids_differ_between_contexts() {
        let dir = tempfile::tempdir().unwrap();
        assert_ne!(context(dir.path()).id(), context(dir.path()).id());
    }

    #[test]
    fn test_translation_is_batched_not_built() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let a = ctx.translate_expression(&constant(1)).unwrap();
        let b = ctx.translate_expression(&constant(2)).unwrap();

        assert_ne!(a.symbol(), b.symbol());
        assert!(!ctx.is_compiled());
        assert_eq!(ctx.pending_symbols(), vec![a.symbol(), b.symbol()]);
        assert_eq!(ctx.pending_source().matches("#include").count(), 1);
        assert_eq!(ctx.instrumentation().created_functions, 2);
        // Nothing was written: the build is lazy.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_leaves_buffer_identical() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.translate_expression(&constant(1)).unwrap();
        let before = ctx.pending_source();

        let mut expr = Expression::new(1);
        expr.load_constant(3, false).negate().store_result(0).terminate();
        let err = ctx.translate_expression(&expr).unwrap_err();

        assert!(matches!(err, Unsupported::Opcode { opcode: Opcode::Negate, .. }));
        assert_eq!(ctx.pending_source(), before);
        assert_eq!(ctx.instrumentation().unsupported_expressions, 1);
    }

    #[test]
    fn test_unsupported_first_expression_adds_no_prologue() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let mut expr = Expression::new(1);
        expr.load_constant(3, false);
        assert_eq!(
            ctx.translate_expression(&expr).unwrap_err(),
            Unsupported::MissingTerminate
        );
        assert!(ctx.pending_source().is_empty());
        assert!(ctx.is_compiled());
    }

    #[test]
    fn test_failed_build_keeps_pending_state() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let func = ctx.translate_expression(&constant(1)).unwrap();

        let err = ctx.resolve(func.symbol()).unwrap_err();
        assert!(matches!(err, JitError::ToolchainSpawn { .. }));
        assert!(!ctx.is_compiled());
        assert_eq!(ctx.module_count(), 0);
        assert_eq!(ctx.generation(), 0);
        assert_eq!(ctx.pending_symbols(), vec![func.symbol()]);
    }

    #[test]
    fn test_release_removes_orphaned_sources() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let func = ctx.translate_expression(&constant(1)).unwrap();
        ctx.resolve(func.symbol()).unwrap_err();

        let orphan = dir
            .path()
            .join(format!("{}.{}.0.c", std::process::id(), ctx.id()));
        assert!(orphan.exists());

        assert_eq!(ctx.release(), 0);
        assert!(!orphan.exists());
    }

    #[test]
    fn test_resolve_unknown_symbol_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let err = ctx.resolve("slowjit_eval_expr_9_9").unwrap_err();
        assert!(matches!(err, JitError::SymbolNotFound { modules: 0, .. }));
    }

    #[test]
    fn test_released_context_refuses_work() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        ctx.release();

        assert!(ctx.is_released());
        assert_eq!(
            ctx.translate_expression(&constant(1)).unwrap_err(),
            Unsupported::Released
        );
        assert!(matches!(
            ctx.resolve("slowjit_eval_expr_0_0"),
            Err(JitError::ContextReleased)
        ));
    }

    #[test]
    fn test_discard_pending() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let func = ctx.translate_expression(&constant(1)).unwrap();

        ctx.discard_pending();
        assert!(ctx.is_compiled());

        // Nothing pending means no build is attempted at all.
        let err = ctx.resolve(func.symbol()).unwrap_err();
        assert!(matches!(err, JitError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_weak_reference_outlives_context() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let func = ctx.translate_expression(&constant(1)).unwrap();
        let weak = ctx.downgrade();
        drop(ctx);

        assert!(weak.upgrade().is_none());
        assert!(matches!(func.resolve(), Err(JitError::ContextReleased)));
    }

    #[test]
    fn test_next_symbol_counts_and_stays_unique() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());

        let first = ctx.next_symbol("slowjit_agg");
        let func = ctx.translate_expression(&constant(1)).unwrap();
        let second = ctx.next_symbol("slowjit_agg");

        assert_eq!(first, "slowjit_agg_0_0");
        assert_eq!(func.symbol(), "slowjit_eval_expr_0_1");
        assert_eq!(second, "slowjit_agg_0_2");
        assert_eq!(ctx.instrumentation().created_functions, 3);
        // Minting a name adds nothing to the batch.
        assert_eq!(ctx.pending_symbols(), vec![func.symbol()]);
    }
}
