//! The interactive read-compile-run loop. One `Compiler` and one `Vm` live
//! for the whole session, which is what lets a variable declared on one line
//! be read back on a later one.

use copper_compiler::Compiler;
use copper_core::TranslationUnit;
use copper_vm::Vm;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::config::ReplConfig;

/// Runs the REPL to completion (on EOF or Ctrl-D) and returns the process
/// exit code — always 0, matching the reference (a bad line never aborts
/// the session).
pub fn run() -> i32 {
    let config = ReplConfig::load();
    let mut compiler = Compiler::new();
    let mut vm = Vm::new();
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

    loop {
        match editor.readline(&config.prompt) {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                if line.trim().is_empty() {
                    continue;
                }
                run_line(&mut compiler, &mut vm, &line, &config);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => return 0,
            Err(err) => {
                eprintln!("error: {err}");
                return 0;
            }
        }
    }
}

fn run_line(compiler: &mut Compiler, vm: &mut Vm, line: &str, config: &ReplConfig) {
    let tu = TranslationUnit::new("<stdin>", line);

    let bytecode = match compiler.compile(&tu) {
        Ok(bytecode) => bytecode,
        Err(err) => {
            print!("{err}");
            return;
        }
    };

    if config.trace_bytecode_size {
        tracing::trace!(words = bytecode.len(), "compiled REPL line");
    }

    if let Err(err) = vm.run(&bytecode, &tu) {
        println!("{err}");
    }
}
