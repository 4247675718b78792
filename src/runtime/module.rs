// This module implements LoadedModule, one built shared library mapped into the process.
// Loading happens in two stages: the artifact is first parsed with the object crate, which
// rejects files that are not valid shared objects with a precise reason and yields the
// export table, and only then handed to libloading. Symbol lookups consult the export table
// before asking the dynamic loader, so searching a module that does not define a name costs
// a hash probe instead of a failed dlsym. The module owns its Library exclusively; Drop
// closes it exactly once, logging rather than propagating a failing close, and removes the
// source and library files unless the context was configured to keep them.

//! A built shared library loaded into the process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use hashbrown::HashSet;
use libloading::{Library, Symbol};
use object::{BinaryFormat, Object};

use crate::build::BuiltArtifact;
use crate::core::error::{JitError, JitResult};
use crate::host::NativeEvalFn;

pub struct LoadedModule {
    generation: u64,
    library_path: PathBuf,
    source_path: PathBuf,
    exports: HashSet<String>,
    library: Option<Library>,
    remove_files: bool,
}

impl LoadedModule {
    /// Inspect and map `artifact`.
    ///
    /// With `remove_files` set, the artifact's files are deleted when the
    /// module is dropped.
    pub fn load(artifact: &BuiltArtifact, remove_files: bool) -> JitResult<Self> {
        let path = &artifact.library_path;
        let data = fs::read(path).map_err(|e| JitError::InvalidArtifact {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let exports = exported_symbols(&data).map_err(|reason| JitError::InvalidArtifact {
            path: path.clone(),
            reason,
        })?;

        // SAFETY: the library was produced from our own generated source; it
        // has no initializers beyond what the C runtime adds.
        let library = unsafe { Library::new(path) }.map_err(|source| JitError::Load {
            path: path.clone(),
            source,
        })?;

        log::info!(
            "Loaded module {} (generation {}, {} exports)",
            path.display(),
            artifact.generation,
            exports.len()
        );

        Ok(Self {
            generation: artifact.generation,
            library_path: path.clone(),
            source_path: artifact.source_path.clone(),
            exports,
            library: Some(library),
            remove_files,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn path(&self) -> &Path {
        &self.library_path
    }

    pub fn defines(&self, symbol: &str) -> bool {
        self.exports.contains(symbol)
    }

    /// Address of `symbol`, or `None` when this module does not export it.
    pub fn lookup(&self, symbol: &str) -> JitResult<Option<NativeEvalFn>> {
        if !self.defines(symbol) {
            return Ok(None);
        }
        let Some(library) = self.library.as_ref() else {
            return Ok(None);
        };

        // SAFETY: every exported function of a generated module has the
        // NativeEvalFn signature.
        let func: Symbol<NativeEvalFn> =
            unsafe { library.get(symbol.as_bytes()) }.map_err(|source| JitError::Load {
                path: self.library_path.clone(),
                source,
            })?;
        Ok(Some(*func))
    }
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        if let Some(library) = self.library.take() {
            match library.close() {
                Ok(()) => log::debug!("Unloaded module {}", self.library_path.display()),
                Err(e) => log::warn!(
                    "cannot unload module '{}': {}",
                    self.library_path.display(),
                    e
                ),
            }
        }
        if self.remove_files {
            remove_artifact(&self.library_path);
            remove_artifact(&self.source_path);
        }
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("generation", &self.generation)
            .field("path", &self.library_path)
            .field("exports", &self.exports.len())
            .finish()
    }
}

/// Best-effort removal of a generated file.
pub(crate) fn remove_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("cannot remove '{}': {}", path.display(), e),
    }
}

fn exported_symbols(data: &[u8]) -> Result<HashSet<String>, String> {
    let file = object::File::parse(data).map_err(|e| e.to_string())?;
    let macho = file.format() == BinaryFormat::MachO;
    let exports = file.exports().map_err(|e| e.to_string())?;

    Ok(exports
        .iter()
        .filter_map(|export| std::str::from_utf8(export.name()).ok())
        .map(|name| match name.strip_prefix('_') {
            Some(stripped) if macho => stripped,
            _ => name,
        })
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(dir: &Path, contents: &[u8]) -> BuiltArtifact {
        let library_path = dir.join("bogus.so");
        fs::write(&library_path, contents).unwrap();
        BuiltArtifact {
            generation: 0,
            source_path: dir.join("bogus.c"),
            library_path,
            functions: 0,
        }
    }

    #[test]
    fn test_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let built = BuiltArtifact {
            generation: 0,
            source_path: dir.path().join("gone.c"),
            library_path: dir.path().join("gone.so"),
            functions: 0,
        };
        let err = LoadedModule::load(&built, false).unwrap_err();
        assert!(matches!(err, JitError::InvalidArtifact { .. }));
        assert!(err.to_string().contains("gone.so"));
    }

    #[test]
    fn test_garbage_artifact_rejected_before_dlopen() {
        let dir = tempfile::tempdir().unwrap();
        let built = artifact(dir.path(), b"definitely not an ELF file");
        let err = LoadedModule::load(&built, false).unwrap_err();
        assert!(matches!(err, JitError::InvalidArtifact { .. }));
    }

    #[test]
    fn test_remove_artifact_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_artifact(&dir.path().join("never-written.so"));
    }
}
