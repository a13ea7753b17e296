//! Runtime failures the VM can hit mid-execution, plus the formatted,
//! source-located message each one renders to.

use copper_core::{diagnostics::format_diagnostic, TranslationUnit};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    OperandMustBeNumber,
    OperandMustBeBoolean,
    InvalidOperandTypesForAdd,
    CannotIncrementNonNumeric,
    CannotDecrementNonNumeric,
    InvalidInstruction(u32),
    StackUnderflow,
}

impl RuntimeErrorKind {
    fn message(&self) -> String {
        match self {
            RuntimeErrorKind::OperandMustBeNumber => "Operand must be a number.".to_string(),
            RuntimeErrorKind::OperandMustBeBoolean => "Operand must be a boolean.".to_string(),
            RuntimeErrorKind::InvalidOperandTypesForAdd => {
                "Invalid operand types for operator +".to_string()
            }
            RuntimeErrorKind::CannotIncrementNonNumeric => {
                "Cannot increment non-numeric type".to_string()
            }
            RuntimeErrorKind::CannotDecrementNonNumeric => {
                "Cannot decrement non-numeric type".to_string()
            }
            RuntimeErrorKind::InvalidInstruction(word) => format!("Invalid instruction ({word})"),
            RuntimeErrorKind::StackUnderflow => "Stack underflow".to_string(),
        }
    }
}

/// A runtime failure, already formatted against the source line that
/// produced the offending instruction.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub diagnostic: String,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, tu: &TranslationUnit, line: u32, column: u32) -> Self {
        let diagnostic = format_diagnostic(tu, line as usize, column as usize, &kind.message());
        RuntimeError { kind, diagnostic }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.diagnostic)
    }
}

impl std::error::Error for RuntimeError {}
