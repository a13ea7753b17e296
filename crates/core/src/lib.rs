//! Copper Core: the value model, bytecode buffer, and diagnostics shared by
//! every stage of the Copper pipeline (lexer, compiler, VM).
//!
//! # Modules
//!
//! - `value`: the tagged `Value` enum (Boolean, Number, String, Array, Null,
//!   Undefined) and its operators.
//! - `bytecode`: the opcode stream, constant pool, and source-location side
//!   table produced by the compiler and consumed by the VM.
//! - `translation_unit`: the `(path, source)` pair threaded through every
//!   stage so diagnostics can point back at the offending line.
//! - `diagnostics`: the `error: <path> (line N): <msg>` formatter shared by
//!   the lexer, compiler, and VM.
//! - `error`: the hand-rolled error types each pipeline stage hangs its
//!   failures off of.

pub mod bytecode;
pub mod diagnostics;
pub mod error;
pub mod translation_unit;
pub mod value;

pub use bytecode::{Bytecode, OpCode};
pub use diagnostics::format_diagnostic;
pub use error::CoreError;
pub use translation_unit::TranslationUnit;
pub use value::Value;
