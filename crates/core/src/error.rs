//! Shared error type for core-level failures (constant pool / bytecode misuse).
//!
//! The pipeline-stage crates (`copper-lexer`, `copper-compiler`, `copper-vm`)
//! define their own error enums for the failures specific to that stage; this
//! one covers the few ways `Bytecode` itself can be misused by a caller.

#[derive(Debug)]
pub enum CoreError {
    /// A `patch` call referenced an offset outside the emitted stream.
    PatchOutOfBounds(usize),
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::PatchOutOfBounds(offset) => {
                write!(f, "attempted to patch bytecode offset {offset}, which was never emitted")
            }
        }
    }
}

impl std::error::Error for CoreError {}
