//! Recursive-descent parser and code generator for the Copper language.
//!
//! A [`Compiler`] is meant to be reused across many independent compiles —
//! one per file, or one per REPL line — so that a later compile can resolve
//! variables a previous one declared. See [`environment::LexicalEnvironment`]
//! for exactly what state persists and what gets reset.

pub mod environment;
pub mod error;
pub mod parser;

use copper_core::{Bytecode, TranslationUnit};
use environment::LexicalEnvironment;
pub use error::CompileError;

/// Owns the only state that survives across compiles: the variable/global
/// resolution table. Bytecode, the token stream, and the loop-jump stack are
/// all local to a single `compile` call.
#[derive(Default)]
pub struct Compiler {
    env: LexicalEnvironment,
}

impl Compiler {
    pub fn new() -> Self {
        Compiler { env: LexicalEnvironment::new() }
    }

    /// Tokenizes and parses `tu`, returning the compiled bytecode or every
    /// diagnostic collected along the way. A lexical failure short-circuits
    /// before parsing begins, matching the reference compiler: there is no
    /// point resolving variables against a token stream that's already
    /// known to be broken.
    pub fn compile(&mut self, tu: &TranslationUnit) -> Result<Bytecode, CompileError> {
        self.env.reset_scope_depth();

        let (tokens, lex_errors) = copper_lexer::tokenize(tu);
        if !lex_errors.is_empty() {
            let diagnostics = lex_errors
                .iter()
                .map(|e| copper_core::format_diagnostic(tu, e.line as usize, e.column as usize, &e.message))
                .collect();
            return Err(CompileError { diagnostics });
        }

        let parser = parser::Parser::new(tu, tokens, &mut self.env);
        let (bytecode, errors) = parser.parse();
        if !errors.is_empty() {
            return Err(CompileError { diagnostics: errors });
        }

        tracing::debug!(words = bytecode.len(), "compiled translation unit");
        Ok(bytecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_core::OpCode;

    fn compile(src: &str) -> Bytecode {
        let tu = TranslationUnit::new("test.cu", src);
        Compiler::new().compile(&tu).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn compiles_a_let_declaration_and_print() {
        let bc = compile("let x = 1; print x;");
        assert_eq!(bc.opcode_at(0), Some(OpCode::Ldc));
        assert!(bc.words().contains(&(OpCode::Print as u32)));
    }

    #[test]
    fn undefined_variable_is_a_compile_error() {
        let tu = TranslationUnit::new("test.cu", "print y;");
        let err = Compiler::new().compile(&tu).unwrap_err();
        assert!(err.diagnostics[0].contains("Undefined variable"));
    }

    #[test]
    fn redeclaration_in_the_same_scope_is_a_compile_error() {
        let tu = TranslationUnit::new("test.cu", "let x = 1; let x = 2;");
        let err = Compiler::new().compile(&tu).unwrap_err();
        assert!(err.diagnostics[0].contains("Redeclaration"));
    }

    #[test]
    fn assigning_to_a_const_is_a_compile_error() {
        let tu = TranslationUnit::new("test.cu", "const x = 1; x = 2;");
        let err = Compiler::new().compile(&tu).unwrap_err();
        assert!(err.diagnostics[0].contains("const"));
    }

    #[test]
    fn a_repl_style_second_compile_resolves_the_first_compiles_globals() {
        let mut compiler = Compiler::new();
        let first = TranslationUnit::new("<repl>", "let x = 1;");
        compiler.compile(&first).unwrap();

        let second = TranslationUnit::new("<repl>", "print x;");
        let bc = compiler.compile(&second).unwrap();
        assert!(bc.words().contains(&(OpCode::LdVar as u32)));
    }

    #[test]
    fn break_outside_a_loop_is_a_compile_error() {
        let tu = TranslationUnit::new("test.cu", "break;");
        let err = Compiler::new().compile(&tu).unwrap_err();
        assert!(err.diagnostics[0].contains("Illegal break"));
    }

    #[test]
    fn while_loop_compiles_with_a_backward_jump() {
        let bc = compile("let i = 0; while (i < 3) { i++; }");
        assert!(bc.words().contains(&(OpCode::Jnt as u32)));
        assert!(bc.words().contains(&(OpCode::Jmp as u32)));
    }
}
