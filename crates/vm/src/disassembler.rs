//! Renders a [`Bytecode`] buffer as a flat listing of `OFFSET  MNEMONIC
//! OPERAND` lines, for the CLI's `--disassemble` flag. Never executes
//! anything; purely a debugging aid.

use copper_core::{Bytecode, OpCode};

fn mnemonic(op: OpCode) -> &'static str {
    match op {
        OpCode::Ldc => "LDC",
        OpCode::Pop => "POP",
        OpCode::PopN => "POPN",
        OpCode::LdVar => "LDVAR",
        OpCode::SetVar => "SETVAR",
        OpCode::NewArr => "NEWARR",
        OpCode::LdProp => "LDPROP",
        OpCode::SetProp => "SETPROP",
        OpCode::Jmp => "JMP",
        OpCode::Jnt => "JNT",
        OpCode::Add => "ADD",
        OpCode::Sub => "SUB",
        OpCode::Mul => "MUL",
        OpCode::Div => "DIV",
        OpCode::Mod => "MOD",
        OpCode::Exp => "EXP",
        OpCode::Neg => "NEG",
        OpCode::Incr => "INCR",
        OpCode::Decr => "DECR",
        OpCode::Grt => "GRT",
        OpCode::Lst => "LST",
        OpCode::Gre => "GRE",
        OpCode::Lse => "LSE",
        OpCode::Equ => "EQU",
        OpCode::Neq => "NEQ",
        OpCode::And => "AND",
        OpCode::Or => "OR",
        OpCode::Not => "NOT",
        OpCode::Print => "PRINT",
        OpCode::Ret => "RET",
    }
}

/// One line per instruction: its own word offset, mnemonic, and operand (if
/// any) rendered as a decimal literal. `LDC`'s operand is annotated with the
/// constant's display form as a trailing comment.
pub fn disassemble(bytecode: &Bytecode) -> String {
    let mut out = String::new();
    let mut ip = 0usize;

    while ip < bytecode.len() {
        let Some(op) = bytecode.opcode_at(ip) else {
            out.push_str(&format!("{ip:5} ??? ({})\n", bytecode.word_at(ip).unwrap_or(0)));
            ip += 1;
            continue;
        };

        match op.operand_count() {
            1 => {
                let operand = bytecode.word_at(ip + 1).unwrap_or(0);
                if op == OpCode::Ldc {
                    let comment = bytecode
                        .constant(operand)
                        .map(|v| v.display_string())
                        .unwrap_or_default();
                    out.push_str(&format!("{ip:5} {:<10} {:<4} # {comment}\n", mnemonic(op), operand));
                } else {
                    out.push_str(&format!("{ip:5} {:<10} {:<4}\n", mnemonic(op), operand));
                }
                ip += 2;
            }
            _ => {
                out.push_str(&format!("{ip:5} {}\n", mnemonic(op)));
                ip += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use copper_core::Value;

    #[test]
    fn disassembles_a_constant_load() {
        let mut bc = Bytecode::new();
        let k = bc.add_constant(Value::Number(1.0));
        bc.emit_with_operand(OpCode::Ldc, k, 1, 1);
        let text = disassemble(&bc);
        assert!(text.contains("LDC"));
        assert!(text.contains("# 1"));
    }
}
