// This module defines the Toolchain trait, the single external interface of the JIT: one
// synchronous call turning a C source file into a shared library at a given path. The
// default CcToolchain runs a cc-compatible compiler with position-independent code, the host
// include directory, shared-library output and -O0, optionally with debug info and extra
// flags from the configuration. It blocks until the compiler exits; there is no timeout and
// no cancellation. A non-zero exit status becomes ToolchainFailed carrying the rendered
// command line and the compiler's stderr so the failure can be reported verbatim.

//! External compiler invocation.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::config::JitConfig;
use crate::core::error::{JitError, JitResult};

/// Compiles one generated source file into a loadable shared library.
pub trait Toolchain {
    fn compile(&self, source: &Path, output: &Path) -> JitResult<()>;
}

/// A `cc`-style compiler driver.
#[derive(Debug, Clone)]
pub struct CcToolchain {
    cc: PathBuf,
    include_dir: PathBuf,
    debug_info: bool,
    extra_flags: Vec<String>,
}

impl CcToolchain {
    pub fn new(config: &JitConfig) -> Self {
        Self {
            cc: config.cc_path.clone(),
            include_dir: config.include_dir.clone(),
            debug_info: config.debug_info,
            extra_flags: config.extra_cflags.clone(),
        }
    }

    /// Arguments passed to the compiler, in order.
    pub fn args(&self, source: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-fPIC".to_string(),
            format!("-I{}", self.include_dir.display()),
            "-shared".to_string(),
        ];
        if self.debug_info {
            args.push("-ggdb".to_string());
            args.push("-g3".to_string());
        }
        args.push("-O0".to_string());
        args.extend(self.extra_flags.iter().cloned());
        args.push("-o".to_string());
        args.push(output.display().to_string());
        args.push(source.display().to_string());
        args
    }

    /// The command line as it would be typed in a shell.
    pub fn command_line(&self, source: &Path, output: &Path) -> String {
        let mut line = self.cc.display().to_string();
        for arg in self.args(source, output) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }
}

impl Toolchain for CcToolchain {
    fn compile(&self, source: &Path, output: &Path) -> JitResult<()> {
        let command = self.command_line(source, output);
        log::debug!("Running toolchain: {}", command);

        let result = Command::new(&self.cc)
            .args(self.args(source, output))
            .output()
            .map_err(|source| JitError::ToolchainSpawn {
                command: command.clone(),
                source,
            })?;

        if !result.status.success() {
            return Err(JitError::ToolchainFailed {
                command,
                status: result.status,
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line() {
        let config = JitConfig::default()
            .with_cc("/usr/bin/cc")
            .with_include_dir("/opt/host/include");
        let toolchain = CcToolchain::new(&config);

        let line = toolchain.command_line(Path::new("/tmp/1.0.0.c"), Path::new("/tmp/1.0.0.so"));
        assert_eq!(
            line,
            "/usr/bin/cc -fPIC -I/opt/host/include -shared -ggdb -g3 -O0 -o /tmp/1.0.0.so /tmp/1.0.0.c"
        );
    }

    #[test]
    fn test_extra_flags_without_debug_info() {
        let mut config = JitConfig::default().debug_info(false);
        config.extra_cflags = vec!["-Wall".to_string()];
        let args = CcToolchain::new(&config).args(Path::new("a.c"), Path::new("a.so"));

        assert!(!args.iter().any(|a| a == "-ggdb"));
        assert_eq!(&args[args.len() - 4..], ["-Wall", "-o", "a.so", "a.c"]);
    }

    #[test]
    fn test_missing_compiler() {
        let config = JitConfig::default().with_cc("/nonexistent/slowjit-cc");
        let err = CcToolchain::new(&config)
            .compile(Path::new("a.c"), Path::new("a.so"))
            .unwrap_err();
        assert!(matches!(err, JitError::ToolchainSpawn { .. }));
    }
}
