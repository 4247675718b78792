// This module defines JitConfig, the knobs of the external compile step: which C compiler
// binary to invoke, the include directory holding the host header set, where generated
// source files and shared libraries are written, whether debug info is requested, whether
// artifacts survive context teardown, and any extra compiler flags. Defaults match a plain
// Unix toolchain and the header shipped in this crate's include/ directory. from_env()
// applies SLOWJIT_* environment overrides on top of the defaults, which is how deployments
// point the JIT at a different compiler or scratch directory without code changes.

//! Configuration of the build step.

use std::env;
use std::path::PathBuf;

/// Compiler and artifact settings shared by every context built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JitConfig {
    /// Compiler binary, looked up on `PATH` when relative.
    pub cc_path: PathBuf,

    /// Directory containing `slowjit.h`.
    pub include_dir: PathBuf,

    /// Directory receiving generated `.c` and `.so` files.
    pub artifact_dir: PathBuf,

    /// Pass `-ggdb -g3` to the compiler.
    pub debug_info: bool,

    /// Leave artifacts on disk when the context is released.
    pub keep_artifacts: bool,

    /// Appended to the compiler command line before the output flag.
    pub extra_cflags: Vec<String>,
}

impl Default for JitConfig {
    fn default() -> Self {
        Self {
            cc_path: PathBuf::from("cc"),
            include_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/include")),
            artifact_dir: env::temp_dir().join("slowjit"),
            debug_info: true,
            keep_artifacts: false,
            extra_cflags: Vec::new(),
        }
    }
}

impl JitConfig {
    /// Defaults overridden by `SLOWJIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(cc) = lookup("SLOWJIT_CC") {
            self.cc_path = PathBuf::from(cc);
        }
        if let Some(dir) = lookup("SLOWJIT_INCLUDE_DIR") {
            self.include_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SLOWJIT_ARTIFACT_DIR") {
            self.artifact_dir = PathBuf::from(dir);
        }
        if let Some(flag) = lookup("SLOWJIT_DEBUG_INFO") {
            self.debug_info = parse_bool(&flag).unwrap_or(self.debug_info);
        }
        if let Some(flag) = lookup("SLOWJIT_KEEP_ARTIFACTS") {
            self.keep_artifacts = parse_bool(&flag).unwrap_or(self.keep_artifacts);
        }
        if let Some(flags) = lookup("SLOWJIT_CFLAGS") {
            self.extra_cflags = flags.split_whitespace().map(str::to_string).collect();
        }
        self
    }

    pub fn with_cc(mut self, cc: impl Into<PathBuf>) -> Self {
        self.cc_path = cc.into();
        self
    }

    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_dir = dir.into();
        self
    }

    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
