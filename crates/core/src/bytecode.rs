//! The opcode stream, constant pool, and source-location side table the
//! compiler produces and the VM consumes.
//!
//! Each opcode and each of its operands occupies one 32-bit word. The
//! reference implementation's "byte" stream is, in its own headers, a
//! `typedef size_t byte` — a full machine word per slot rather than a packed
//! byte — so storing `u32` words here is the same choice, just made
//! explicit.

use crate::error::CoreError;
use crate::value::Value;

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    Ldc = 0,
    Pop,
    PopN,
    LdVar,
    SetVar,
    NewArr,
    LdProp,
    SetProp,
    Jmp,
    Jnt,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Neg,
    Incr,
    Decr,
    Grt,
    Lst,
    Gre,
    Lse,
    Equ,
    Neq,
    And,
    Or,
    Not,
    Print,
    Ret,
}

impl OpCode {
    /// How many operand words follow this opcode's tag word.
    pub fn operand_count(self) -> usize {
        match self {
            OpCode::Ldc
            | OpCode::PopN
            | OpCode::LdVar
            | OpCode::SetVar
            | OpCode::NewArr
            | OpCode::Jmp
            | OpCode::Jnt => 1,
            _ => 0,
        }
    }

    fn from_word(word: u32) -> Option<OpCode> {
        use OpCode::*;
        const TABLE: &[OpCode] = &[
            Ldc, Pop, PopN, LdVar, SetVar, NewArr, LdProp, SetProp, Jmp, Jnt, Add, Sub, Mul, Div,
            Mod, Exp, Neg, Incr, Decr, Grt, Lst, Gre, Lse, Equ, Neq, And, Or, Not, Print, Ret,
        ];
        TABLE.get(word as usize).copied()
    }
}

/// A compiled program: a linear word stream, an append-only constant pool,
/// and a sparse map from word offset to the source position that emitted it.
#[derive(Debug, Default)]
pub struct Bytecode {
    words: Vec<u32>,
    constants: Vec<Value>,
    locations: std::collections::HashMap<usize, (u32, u32)>,
}

impl Bytecode {
    pub fn new() -> Self {
        Bytecode::default()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Appends a no-operand opcode and records its source position. Returns
    /// the offset the opcode's tag word was written at.
    pub fn emit(&mut self, op: OpCode, line: u32, column: u32) -> usize {
        let offset = self.words.len();
        self.words.push(op as u32);
        self.locations.insert(offset, (line, column));
        offset
    }

    /// Appends an opcode with a single operand word (e.g. `LDC k`, `JMP t`).
    /// Returns the offset of the operand word, for later `patch` calls.
    pub fn emit_with_operand(&mut self, op: OpCode, operand: u32, line: u32, column: u32) -> usize {
        let offset = self.emit(op, line, column);
        self.words.push(operand);
        offset + 1
    }

    /// Rewrites a single previously-emitted word (used to back-patch forward
    /// jump targets once the jump's destination is known).
    pub fn patch(&mut self, offset: usize, word: u32) -> Result<(), CoreError> {
        let slot = self.words.get_mut(offset).ok_or(CoreError::PatchOutOfBounds(offset))?;
        *slot = word;
        Ok(())
    }

    pub fn add_constant(&mut self, value: Value) -> u32 {
        self.constants.push(value);
        (self.constants.len() - 1) as u32
    }

    pub fn constant(&self, index: u32) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    pub fn opcode_at(&self, offset: usize) -> Option<OpCode> {
        self.words.get(offset).copied().and_then(OpCode::from_word)
    }

    pub fn word_at(&self, offset: usize) -> Option<u32> {
        self.words.get(offset).copied()
    }

    /// The source position that emitted the opcode at `offset`, if any.
    pub fn location_at(&self, offset: usize) -> Option<(u32, u32)> {
        self.locations.get(&offset).copied()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_rewrites_a_jump_target() {
        let mut bc = Bytecode::new();
        let jmp_operand = bc.emit_with_operand(OpCode::Jmp, 0, 1, 1);
        bc.emit(OpCode::Ret, 1, 1);
        let target = bc.len() as u32;
        bc.patch(jmp_operand, target).unwrap();
        assert_eq!(bc.word_at(jmp_operand), Some(target));
    }

    #[test]
    fn patch_out_of_bounds_is_an_error() {
        let mut bc = Bytecode::new();
        assert!(bc.patch(5, 0).is_err());
    }

    #[test]
    fn constant_pool_is_append_only_and_allows_duplicates() {
        let mut bc = Bytecode::new();
        let a = bc.add_constant(Value::Number(1.0));
        let b = bc.add_constant(Value::Number(1.0));
        assert_ne!(a, b);
        assert_eq!(bc.constant(a).unwrap().display_string(), "1");
    }
}
