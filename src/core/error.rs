// This module defines the error types for slowjit using the thiserror crate. Unsupported
// is the expected, non-fatal outcome of translating an expression containing a step with no
// C translation; callers recover from it by falling back to the interpreter. JitError covers
// the fatal failures of the lazy build and load pipeline: artifact directory or source file
// could not be written, the toolchain could not be spawned or exited non-zero, the artifact
// is not a loadable shared object, the dynamic loader rejected it, or a symbol handed out at
// translation time is absent from every loaded module. ErrorKind classifies these so that
// environment problems (toolchain, loader) can be reported apart from internal bookkeeping
// bugs. JitResult<T> is the convenience alias used throughout the crate.

//! Error types for slowjit.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

use crate::host::Opcode;

/// Reason an expression could not be translated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Unsupported {
    #[error("no translation for opcode {opcode} at step {index}")]
    Opcode { opcode: Opcode, index: usize },

    #[error("expression does not end with a Terminate step")]
    MissingTerminate,

    #[error("step {index} follows the Terminate step")]
    TrailingStep { index: usize },

    #[error("compilation context has been released")]
    Released,
}

/// Fatal build, load and lookup failures.
#[derive(Error, Debug)]
pub enum JitError {
    #[error("cannot create artifact directory '{path}': {source}")]
    ArtifactDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open file '{path}' for write: {source}")]
    SourceWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot execute command: {command}: {source}")]
    ToolchainSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot execute command: {command} ({status}): {stderr}")]
    ToolchainFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("cannot load '{path}': {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("cannot dlopen '{path}': {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("cannot jit function '{symbol}': not found in {modules} loaded module(s)")]
    SymbolNotFound { symbol: String, modules: usize },

    #[error("compilation context has been released")]
    ContextReleased,

    #[error("function '{symbol}' was translated for another expression than {expression}")]
    ForeignFunction { symbol: String, expression: u64 },
}

/// Coarse classification of a [`JitError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Source could not be written or the toolchain failed.
    Build,
    /// The dynamic loader or artifact format is at fault.
    Environment,
    /// Bookkeeping inconsistency inside the JIT.
    Internal,
}

impl JitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JitError::ArtifactDir { .. }
            | JitError::SourceWrite { .. }
            | JitError::ToolchainSpawn { .. }
            | JitError::ToolchainFailed { .. } => ErrorKind::Build,
            JitError::InvalidArtifact { .. } | JitError::Load { .. } => ErrorKind::Environment,
            JitError::SymbolNotFound { .. }
            | JitError::ContextReleased
            | JitError::ForeignFunction { .. } => ErrorKind::Internal,
        }
    }
}

/// Result type alias for JIT operations.
pub type JitResult<T> = Result<T, JitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let missing = JitError::SymbolNotFound {
            symbol: "slowjit_eval_expr_0_3".to_string(),
            modules: 2,
        };
        assert_eq!(missing.kind(), ErrorKind::Internal);
        assert_eq!(
            missing.to_string(),
            "cannot jit function 'slowjit_eval_expr_0_3': not found in 2 loaded module(s)"
        );

        let invalid = JitError::InvalidArtifact {
            path: PathBuf::from("/tmp/1.0.0.so"),
            reason: "truncated".to_string(),
        };
        assert_eq!(invalid.kind(), ErrorKind::Environment);
        assert!(invalid.to_string().contains("/tmp/1.0.0.so"));
    }

    #[test]
    fn test_unsupported_display() {
        let err = Unsupported::Opcode {
            opcode: Opcode::Negate,
            index: 1,
        };
        assert_eq!(err.to_string(), "no translation for opcode Negate at step 1");
    }
}
