//! A translation unit is just a file path paired with its source text; it is
//! threaded through the lexer, compiler, and VM so any of them can format a
//! diagnostic that points at the offending line.

/// Source of a single compile, shared (read-only) across every stage.
#[derive(Debug, Clone)]
pub struct TranslationUnit {
    path: String,
    source: String,
    /// Byte offset of the start of each line, used to slice a line out of
    /// `source` without rescanning on every diagnostic.
    line_starts: Vec<usize>,
}

impl TranslationUnit {
    pub fn new(path: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        TranslationUnit { path: path.into(), source, line_starts }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// 1-indexed line lookup. Returns an empty string for a line past the
    /// end of the source (shouldn't happen in practice, but diagnostics
    /// should never panic).
    pub fn line(&self, line: usize) -> &str {
        let Some(&start) = self.line_starts.get(line.saturating_sub(1)) else {
            return "";
        };
        let end = self
            .line_starts
            .get(line)
            .map(|&s| s.saturating_sub(1))
            .unwrap_or(self.source.len());
        self.source.get(start..end.max(start)).unwrap_or("")
    }
}
