//! Writes a generation's source to disk and runs the toolchain on it.
//!
//! File names are `<pid>.<context id>.<generation>.{c,so}` so that
//! concurrently running contexts, in this process or others, never share a
//! path. Sharing one would also defeat the dynamic loader, which hands back
//! the already-mapped library for a path it has seen before.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use super::toolchain::Toolchain;
use crate::core::error::{JitError, JitResult};

/// Output of a successful build, not yet loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltArtifact {
    pub generation: u64,
    pub source_path: PathBuf,
    pub library_path: PathBuf,
    pub functions: usize,
}

pub struct ModuleBuilder {
    artifact_dir: PathBuf,
    namespace: String,
    toolchain: Box<dyn Toolchain>,
}

impl ModuleBuilder {
    pub fn new(artifact_dir: PathBuf, context_id: u64, toolchain: Box<dyn Toolchain>) -> Self {
        Self {
            artifact_dir,
            namespace: format!("{}.{}", std::process::id(), context_id),
            toolchain,
        }
    }

    pub fn source_path(&self, generation: u64) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}.c", self.namespace, generation))
    }

    pub fn library_path(&self, generation: u64) -> PathBuf {
        self.artifact_dir
            .join(format!("{}.{}.so", self.namespace, generation))
    }

    /// Compile `source` as generation `generation`.
    pub fn build(&self, generation: u64, source: &str, functions: usize) -> JitResult<BuiltArtifact> {
        let start = Instant::now();

        fs::create_dir_all(&self.artifact_dir).map_err(|source| JitError::ArtifactDir {
            path: self.artifact_dir.clone(),
            source,
        })?;

        let source_path = self.source_path(generation);
        fs::write(&source_path, source).map_err(|source| JitError::SourceWrite {
            path: source_path.clone(),
            source,
        })?;

        let library_path = self.library_path(generation);
        self.toolchain.compile(&source_path, &library_path)?;

        log::info!(
            "Built module {} ({} functions, {} bytes of source) in {:?}",
            library_path.display(),
            functions,
            source.len(),
            start.elapsed()
        );

        Ok(BuiltArtifact {
            generation,
            source_path,
            library_path,
            functions,
        })
    }
}

impl std::fmt::Debug for ModuleBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleBuilder")
            .field("artifact_dir", &self.artifact_dir)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;

    /// Records invocations instead of compiling.
    struct Recorder(Rc<RefCell<Vec<(PathBuf, PathBuf)>>>);

    impl Toolchain for Recorder {
        fn compile(&self, source: &Path, output: &Path) -> JitResult<()> {
            self.0
                .borrow_mut()
                .push((source.to_path_buf(), output.to_path_buf()));
            Ok(())
        }
    }

    #[test]
    fn test_build_writes_source_and_invokes_toolchain() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let builder = ModuleBuilder::new(
            dir.path().join("nested"),
            7,
            Box::new(Recorder(calls.clone())),
        );

        let artifact = builder.build(3, "int x;\n", 1).unwrap();

        let pid = std::process::id();
        assert_eq!(
            artifact.source_path,
            dir.path().join("nested").join(format!("{pid}.7.3.c"))
        );
        assert_eq!(
            artifact.library_path,
            dir.path().join("nested").join(format!("{pid}.7.3.so"))
        );
        assert_eq!(fs::read_to_string(&artifact.source_path).unwrap(), "int x;\n");
        assert_eq!(
            *calls.borrow(),
            vec![(artifact.source_path.clone(), artifact.library_path.clone())]
        );
    }

    #[test]
    fn test_unwritable_artifact_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "").unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let builder = ModuleBuilder::new(blocker.join("sub"), 0, Box::new(Recorder(calls.clone())));

        let err = builder.build(0, "", 0).unwrap_err();
        assert!(matches!(err, JitError::ArtifactDir { .. }));
        assert!(calls.borrow().is_empty());
    }
}
