//! Per-symbol memo of resolved native addresses.

use hashbrown::HashMap;

use super::module::LoadedModule;
use crate::core::error::JitResult;
use crate::host::NativeEvalFn;

#[derive(Debug, Default)]
pub struct SymbolCache {
    entries: HashMap<String, NativeEvalFn>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<NativeEvalFn> {
        self.entries.get(symbol).copied()
    }

    /// Search `modules` newest first and memoize the first definition.
    ///
    /// Names are unique per context, so the order only matters for speed: the
    /// symbol asked for is usually in the module built last.
    pub fn search(
        &mut self,
        modules: &[LoadedModule],
        symbol: &str,
    ) -> JitResult<Option<NativeEvalFn>> {
        for module in modules.iter().rev() {
            match module.lookup(symbol)? {
                Some(func) => {
                    self.entries.insert(symbol.to_string(), func);
                    return Ok(Some(func));
                }
                None => log::debug!(
                    "cannot find symbol '{}' from '{}' (generation {})",
                    symbol,
                    module.path().display(),
                    module.generation()
                ),
            }
        }
        Ok(None)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_without_modules() {
        let mut cache = SymbolCache::new();
        assert!(cache.search(&[], "slowjit_eval_expr_0_0").unwrap().is_none());
        assert!(cache.is_empty());
        assert!(cache.get("slowjit_eval_expr_0_0").is_none());
    }
}
