//! Line-oriented C text emission for one function.

/// Append one formatted line to a [`FunctionEmitter`].
macro_rules! emit_line {
    ($emitter:expr, $($arg:tt)*) => {
        $emitter.line(format!($($arg)*))
    };
}
pub(crate) use emit_line;

/// Scratch text of a single generated function.
///
/// Nothing written here is visible to the owning context until the emitter
/// is committed with
/// [`SourceAccumulator::finish_expression`](super::SourceAccumulator::finish_expression).
#[derive(Debug)]
pub struct FunctionEmitter {
    symbol: String,
    text: String,
}

impl FunctionEmitter {
    pub(crate) fn new(symbol: String) -> Self {
        Self {
            symbol,
            text: String::new(),
        }
    }

    /// Append `line` followed by a newline.
    pub fn line(&mut self, line: impl AsRef<str>) {
        self.text.push_str(line.as_ref());
        self.text.push('\n');
    }

    pub fn include(&mut self, header: &str) {
        emit_line!(self, "#include \"{}\"", header);
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Byte length of the text emitted so far.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn into_parts(self) -> (String, String) {
        (self.symbol, self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_includes() {
        let mut emitter = FunctionEmitter::new("f_0_0".to_string());
        assert!(emitter.is_empty());
        emitter.include("slowjit.h");
        emit_line!(emitter, "  int x = {};", 3);
        assert_eq!(emitter.text(), "#include \"slowjit.h\"\n  int x = 3;\n");
        assert_eq!(emitter.symbol(), "f_0_0");
        assert_eq!(emitter.len(), emitter.text().len());
        assert!(!emitter.is_empty());
    }
}
