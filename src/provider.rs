// This module exposes the JIT to a host engine through the JitProvider trait, the three
// callbacks a host invokes: compile an expression, release the execution's context, and
// reset after an error. SlowJitProvider is the per-execution scope: it creates its
// JitContext lazily on the first compile request, installs a trampoline into the
// expression's dispatch slot when translation succeeds and leaves the slot on the
// interpreter otherwise. Dropping the provider releases the context, so modules are
// unloaded on both normal and error exits of the owning scope.

//! Host-facing provider callbacks and execution scope.

use crate::build::{CcToolchain, Toolchain};
use crate::core::{JitConfig, JitContext};
use crate::host::Expression;

/// Callbacks a host engine drives.
pub trait JitProvider {
    /// Try to compile `expr`. `false` means keep interpreting it.
    fn compile_expr(&mut self, expr: &mut Expression) -> bool;

    /// End of the execution scope: unload everything built for it.
    fn release_context(&mut self);

    /// Recover after the host aborted an execution mid-way.
    fn reset_after_error(&mut self);
}

type ToolchainFactory = Box<dyn Fn(&JitConfig) -> Box<dyn Toolchain>>;

/// Provider owning at most one [`JitContext`] at a time.
pub struct SlowJitProvider {
    config: JitConfig,
    toolchain: ToolchainFactory,
    context: Option<JitContext>,
}

impl SlowJitProvider {
    pub fn new(config: JitConfig) -> Self {
        Self::with_toolchain(config, |config: &JitConfig| -> Box<dyn Toolchain> {
            Box::new(CcToolchain::new(config))
        })
    }

    /// Provider whose contexts compile with toolchains from `factory`.
    pub fn with_toolchain(
        config: JitConfig,
        factory: impl Fn(&JitConfig) -> Box<dyn Toolchain> + 'static,
    ) -> Self {
        Self {
            config,
            toolchain: Box::new(factory),
            context: None,
        }
    }

    pub fn config(&self) -> &JitConfig {
        &self.config
    }

    /// The current context, if any expression was compiled since the last
    /// release.
    pub fn context(&self) -> Option<&JitContext> {
        self.context.as_ref()
    }

    fn context_mut(&mut self) -> &JitContext {
        let config = &self.config;
        let toolchain = &self.toolchain;
        self.context.get_or_insert_with(|| {
            let context = JitContext::with_toolchain(config, toolchain(config));
            log::debug!("Created JIT context {}", context.id());
            context
        })
    }
}

impl JitProvider for SlowJitProvider {
    fn compile_expr(&mut self, expr: &mut Expression) -> bool {
        match self.context_mut().translate_expression(expr) {
            Ok(function) => match expr.install(function) {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("cannot install compiled expression: {}", e);
                    false
                }
            },
            Err(reason) => {
                log::debug!("Falling back to interpretation: {}", reason);
                false
            }
        }
    }

    fn release_context(&mut self) {
        if let Some(context) = self.context.take() {
            context.release();
        }
    }

    fn reset_after_error(&mut self) {
        if let Some(context) = &self.context {
            context.discard_pending();
        }
    }
}

impl Drop for SlowJitProvider {
    fn drop(&mut self) {
        self.release_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JitError, JitResult};
    use crate::host::EvalContext;
    use std::path::Path;

    struct Unavailable;

    impl Toolchain for Unavailable {
        fn compile(&self, _source: &Path, _output: &Path) -> JitResult<()> {
            Err(JitError::ToolchainSpawn {
                command: "unavailable".to_string(),
                source: std::io::Error::other("no compiler"),
            })
        }
    }

    fn provider(dir: &Path) -> SlowJitProvider {
        SlowJitProvider::with_toolchain(
            JitConfig::default().with_artifact_dir(dir),
            |_: &JitConfig| -> Box<dyn Toolchain> { Box::new(Unavailable) },
        )
    }

    #[test]
    fn test_context_created_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider(dir.path());
        assert!(provider.context().is_none());

        let mut expr = Expression::new(1);
        expr.load_constant(1, false).store_result(0).terminate();
        assert!(provider.compile_expr(&mut expr));
        assert!(expr.dispatch().is_pending());
        assert!(provider.context().is_some());
    }

    #[test]
    fn test_unsupported_expression_keeps_interpreting() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider(dir.path());

        let mut expr = Expression::new(1);
        expr.load_constant(4, false).negate().store_result(0).terminate();
        assert!(!provider.compile_expr(&mut expr));
        assert!(expr.dispatch().is_interpreted());

        let result = expr.evaluate(&mut EvalContext::default()).unwrap();
        assert_eq!(result.value as i64, -4);
    }

    #[test]
    fn test_reset_after_error_discards_pending() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider(dir.path());

        let mut expr = Expression::new(1);
        expr.load_constant(1, false).store_result(0).terminate();
        assert!(provider.compile_expr(&mut expr));

        provider.reset_after_error();
        let context = provider.context().unwrap();
        assert!(context.is_compiled());
        assert!(context.pending_source().is_empty());
    }

    #[test]
    fn test_release_context_drops_context() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = provider(dir.path());

        let mut expr = Expression::new(1);
        expr.load_constant(1, false).store_result(0).terminate();
        provider.compile_expr(&mut expr);
        provider.release_context();
        assert!(provider.context().is_none());

        let err = expr.evaluate(&mut EvalContext::default()).unwrap_err();
        assert!(matches!(err, JitError::ContextReleased));

        // A later compile starts a fresh context.
        let mut next = Expression::new(1);
        next.load_constant(2, false).store_result(0).terminate();
        assert!(provider.compile_expr(&mut next));
    }
}
