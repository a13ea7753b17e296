//! The fetch-decode-execute loop. One `Vm` owns one value stack; running the
//! same `Vm` against several [`Bytecode`] buffers in sequence (one per REPL
//! line) is what lets a later line read a variable an earlier line declared,
//! since declarations never pop their initializer off the stack.

use copper_core::{Bytecode, OpCode, TranslationUnit, Value};

use crate::error::{RuntimeError, RuntimeErrorKind};

#[derive(Default)]
pub struct Vm {
    stack: Vec<Value>,
}

impl Vm {
    pub fn new() -> Self {
        Vm::default()
    }

    /// Exposed for the REPL and for tests: the live variable slots, in
    /// declaration order.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    fn pop(&mut self, tu: &TranslationUnit, line: u32, column: u32) -> Result<Value, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))
    }

    fn pop_number(&mut self, tu: &TranslationUnit, line: u32, column: u32) -> Result<f64, RuntimeError> {
        let value = self.pop(tu, line, column)?;
        value
            .as_number()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::OperandMustBeNumber, tu, line, column))
    }

    fn pop_boolean(&mut self, tu: &TranslationUnit, line: u32, column: u32) -> Result<bool, RuntimeError> {
        let value = self.pop(tu, line, column)?;
        value
            .as_boolean()
            .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::OperandMustBeBoolean, tu, line, column))
    }

    /// Runs `bytecode` to completion (or until the first runtime error),
    /// printing whatever `PRINT` statements it contains along the way.
    pub fn run(&mut self, bytecode: &Bytecode, tu: &TranslationUnit) -> Result<(), RuntimeError> {
        let mut ip: usize = 0;

        while ip < bytecode.len() {
            let Some(op) = bytecode.opcode_at(ip) else {
                let word = bytecode.word_at(ip).unwrap_or(0);
                let (line, column) = bytecode.location_at(ip).unwrap_or((0, 0));
                return Err(RuntimeError::new(RuntimeErrorKind::InvalidInstruction(word), tu, line, column));
            };
            let (line, column) = bytecode.location_at(ip).unwrap_or((0, 0));

            match op {
                OpCode::Ldc => {
                    let index = bytecode.word_at(ip + 1).unwrap_or(0);
                    let value = bytecode.constant(index).cloned().unwrap_or(Value::Undefined);
                    self.stack.push(value);
                    ip += 2;
                }
                OpCode::Pop => {
                    self.pop(tu, line, column)?;
                    ip += 1;
                }
                OpCode::PopN => {
                    let count = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                    let new_len = self.stack.len().saturating_sub(count);
                    self.stack.truncate(new_len);
                    ip += 2;
                }
                OpCode::LdVar => {
                    let slot = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                    let value = self.stack[slot].clone();
                    self.stack.push(value);
                    ip += 2;
                }
                OpCode::SetVar => {
                    let slot = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                    let value = self
                        .stack
                        .last()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))?
                        .clone();
                    self.stack[slot] = value;
                    ip += 2;
                }
                OpCode::NewArr => {
                    let size = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                    let start = self.stack.len().saturating_sub(size);
                    let elements = self.stack.split_off(start);
                    self.stack.push(Value::array(elements));
                    ip += 2;
                }
                OpCode::SetProp => {
                    let value = self.pop(tu, line, column)?;
                    let key = self.pop(tu, line, column)?;
                    let object = self
                        .stack
                        .last()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))?;
                    object.index_set(&key, value);
                    ip += 1;
                }
                OpCode::LdProp => {
                    let key = self.pop(tu, line, column)?;
                    let object = self.pop(tu, line, column)?;
                    self.stack.push(object.index_get(&key));
                    ip += 1;
                }
                OpCode::Jmp => {
                    ip = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                }
                OpCode::Jnt => {
                    // Leaves the condition on the stack untouched (and
                    // un-coerced) — the compiler always emits a POP right
                    // after a JNT's target is reached, on both branches.
                    let target = bytecode.word_at(ip + 1).unwrap_or(0) as usize;
                    let truthy = self
                        .stack
                        .last()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))?
                        .is_truthy();
                    if !truthy {
                        ip = target;
                    } else {
                        ip += 2;
                    }
                }
                OpCode::Neg => {
                    let n = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(-n));
                    ip += 1;
                }
                OpCode::Add => {
                    let right = self.pop(tu, line, column)?;
                    let left = self.pop(tu, line, column)?;
                    let result = match (&left, &right) {
                        (Value::String(_), _) | (_, Value::String(_)) => {
                            Value::string(format!("{}{}", left.display_string(), right.display_string()))
                        }
                        (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
                        _ => return Err(RuntimeError::new(RuntimeErrorKind::InvalidOperandTypesForAdd, tu, line, column)),
                    };
                    self.stack.push(result);
                    ip += 1;
                }
                OpCode::Sub => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(left - right));
                    ip += 1;
                }
                OpCode::Mul => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(left * right));
                    ip += 1;
                }
                OpCode::Div => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(left / right));
                    ip += 1;
                }
                OpCode::Mod => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(left % right));
                    ip += 1;
                }
                OpCode::Exp => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Number(left.powf(right)));
                    ip += 1;
                }
                OpCode::Incr => {
                    let top = self
                        .stack
                        .last_mut()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))?;
                    let Value::Number(n) = top else {
                        return Err(RuntimeError::new(RuntimeErrorKind::CannotIncrementNonNumeric, tu, line, column));
                    };
                    *n += 1.0;
                    ip += 1;
                }
                OpCode::Decr => {
                    let top = self
                        .stack
                        .last_mut()
                        .ok_or_else(|| RuntimeError::new(RuntimeErrorKind::StackUnderflow, tu, line, column))?;
                    let Value::Number(n) = top else {
                        return Err(RuntimeError::new(RuntimeErrorKind::CannotDecrementNonNumeric, tu, line, column));
                    };
                    *n -= 1.0;
                    ip += 1;
                }
                OpCode::Grt => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Boolean(left > right));
                    ip += 1;
                }
                OpCode::Lst => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Boolean(left < right));
                    ip += 1;
                }
                OpCode::Gre => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Boolean(left >= right));
                    ip += 1;
                }
                OpCode::Lse => {
                    let right = self.pop_number(tu, line, column)?;
                    let left = self.pop_number(tu, line, column)?;
                    self.stack.push(Value::Boolean(left <= right));
                    ip += 1;
                }
                OpCode::Equ => {
                    let right = self.pop(tu, line, column)?;
                    let left = self.pop(tu, line, column)?;
                    self.stack.push(Value::Boolean(left.loosely_equals(&right)));
                    ip += 1;
                }
                OpCode::Neq => {
                    let right = self.pop(tu, line, column)?;
                    let left = self.pop(tu, line, column)?;
                    self.stack.push(Value::Boolean(!left.loosely_equals(&right)));
                    ip += 1;
                }
                OpCode::And => {
                    let right = self.pop_boolean(tu, line, column)?;
                    let left = self.pop_boolean(tu, line, column)?;
                    self.stack.push(Value::Boolean(left && right));
                    ip += 1;
                }
                OpCode::Or => {
                    let right = self.pop_boolean(tu, line, column)?;
                    let left = self.pop_boolean(tu, line, column)?;
                    self.stack.push(Value::Boolean(left || right));
                    ip += 1;
                }
                OpCode::Not => {
                    let b = self.pop_boolean(tu, line, column)?;
                    self.stack.push(Value::Boolean(!b));
                    ip += 1;
                }
                OpCode::Print => {
                    let value = self.pop(tu, line, column)?;
                    println!("{}", value.display_string());
                    ip += 1;
                }
                OpCode::Ret => {
                    let word = bytecode.word_at(ip).unwrap_or(0);
                    return Err(RuntimeError::new(RuntimeErrorKind::InvalidInstruction(word), tu, line, column));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_compiler::Compiler;

    fn run(src: &str) -> Vm {
        let tu = TranslationUnit::new("test.cu", src);
        let bytecode = Compiler::new().compile(&tu).unwrap_or_else(|e| panic!("{e}"));
        let mut vm = Vm::new();
        vm.run(&bytecode, &tu).unwrap_or_else(|e| panic!("{e}"));
        vm
    }

    #[test]
    fn arithmetic_evaluates_left_to_right() {
        let vm = run("let x = 2 + 3 * 4;");
        assert_eq!(vm.stack()[0].as_number(), Some(14.0));
    }

    #[test]
    fn string_concatenation_with_add() {
        let vm = run(r#"let x = "a" + "b";"#);
        assert_eq!(vm.stack()[0].display_string(), "ab");
    }

    #[test]
    fn while_loop_accumulates() {
        let vm = run("let i = 0; let sum = 0; while (i < 5) { sum = sum + i; i = i + 1; }");
        assert_eq!(vm.stack()[1].as_number(), Some(10.0));
    }

    #[test]
    fn post_increment_returns_the_pre_increment_value() {
        let vm = run("let i = 5; let j = i++;");
        assert_eq!(vm.stack()[0].as_number(), Some(6.0));
        assert_eq!(vm.stack()[1].as_number(), Some(5.0));
    }

    #[test]
    fn pre_increment_returns_the_post_increment_value() {
        let vm = run("let i = 5; let j = ++i;");
        assert_eq!(vm.stack()[0].as_number(), Some(6.0));
        assert_eq!(vm.stack()[1].as_number(), Some(6.0));
    }

    #[test]
    fn array_indexing_reads_and_writes() {
        let vm = run("let a = [1, 2, 3]; a[0] = 9;");
        assert_eq!(vm.stack()[0].index_get(&Value::Number(0.0)).as_number(), Some(9.0));
    }

    #[test]
    fn adding_a_string_and_a_number_is_not_a_type_error() {
        let vm = run(r#"let x = "n=" + 1;"#);
        assert_eq!(vm.stack()[0].display_string(), "n=1");
    }

    #[test]
    fn null_equals_null() {
        let vm = run("let x = null == null;");
        assert_eq!(vm.stack()[0].as_boolean(), Some(true));
    }

    #[test]
    fn adding_two_booleans_is_a_runtime_error() {
        let tu = TranslationUnit::new("test.cu", "let x = true + false;");
        let bytecode = Compiler::new().compile(&tu).unwrap();
        let mut vm = Vm::new();
        let err = vm.run(&bytecode, &tu).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::InvalidOperandTypesForAdd);
    }
}
