//! The stack-based interpreter that executes the bytecode `copper-compiler`
//! produces.

pub mod disassembler;
pub mod error;
pub mod vm;

pub use disassembler::disassemble;
pub use error::{RuntimeError, RuntimeErrorKind};
pub use vm::Vm;
