//! The compiler reports every syntax/scope error it can find in one pass
//! (see `Parser::synchronize`) rather than stopping at the first one; this
//! type carries that whole batch back to the caller.

#[derive(Debug)]
pub struct CompileError {
    /// Fully formatted `error: <path> (line N): <msg>` diagnostics, one per
    /// problem found during this compile.
    pub diagnostics: Vec<String>,
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Compilation failed.")?;
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
