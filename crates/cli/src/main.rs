//! `copper`: REPL, file runner, and bytecode disassembler for the Copper
//! scripting language.

mod config;
mod repl;

use std::path::PathBuf;

use clap::Parser;
use copper_compiler::Compiler;
use copper_core::TranslationUnit;
use copper_vm::Vm;

#[derive(Parser)]
#[command(name = "copper", disable_help_flag = true, disable_version_flag = true)]
struct Cli {
    path: Option<PathBuf>,

    #[arg(long)]
    disassemble: bool,
}

fn init_tracing() {
    if std::env::var_os("COPPER_LOG").is_none() {
        return;
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("COPPER_LOG"))
        .init();
}

fn print_usage() {
    println!("Usage:");
    println!("REPL: copper");
    println!("Run file: copper <file_path>");
}

/// Compiles and runs a single file. Returns the process exit code: the VM's
/// own exit code on success, or 1 on a compile failure (the VM never runs
/// against broken bytecode).
fn run_file(path: &PathBuf, disassemble: bool) -> i32 {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: could not read {}: {err}", path.display());
            return 1;
        }
    };

    let tu = TranslationUnit::new(path.display().to_string(), source);
    let bytecode = match Compiler::new().compile(&tu) {
        Ok(bytecode) => bytecode,
        Err(err) => {
            print!("{err}");
            return 1;
        }
    };

    if disassemble {
        print!("{}", copper_vm::disassemble(&bytecode));
        return 0;
    }

    match Vm::new().run(&bytecode, &tu) {
        Ok(()) => 0,
        Err(err) => {
            println!("{err}");
            1
        }
    }
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(_) => {
            print_usage();
            std::process::exit(1);
        }
    };

    let exit_code = match &cli.path {
        Some(path) => run_file(path, cli.disassemble),
        None if cli.disassemble => {
            print_usage();
            1
        }
        None => repl::run(),
    };

    std::process::exit(exit_code);
}
