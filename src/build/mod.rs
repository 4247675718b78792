//! Module building: source files on disk and the external toolchain.

pub mod builder;
pub mod toolchain;

pub use builder::{BuiltArtifact, ModuleBuilder};
pub use toolchain::{CcToolchain, Toolchain};
