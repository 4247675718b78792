//! Collision-free function names for generated code.

/// Mints `basename_<generation>_<counter>` names.
///
/// The counter is never reset, so names stay unique across generations even
/// when the generation number alone would not disambiguate them.
#[derive(Debug, Default)]
pub struct SymbolNamer {
    counter: u64,
}

impl SymbolNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, basename: &str, generation: u64) -> String {
        debug_assert!(is_c_identifier(basename), "invalid basename '{basename}'");
        let name = format!("{}_{}_{}", basename, generation, self.counter);
        self.counter += 1;
        name
    }

    /// Number of names handed out so far.
    pub fn issued(&self) -> u64 {
        self.counter
    }
}

/// Whether `name` is a valid C identifier.
pub fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
