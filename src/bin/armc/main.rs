//! # armc
//!
//! This binary is the compiler driver. It combines the parser, type checker, and ARM code
//! generator into a single "compile this file to assembly" application.

mod cli;

use std::error::Error;
use std::fs;
use std::io::Write;

use cli::Cli;
use log::{error, info};

const DEMO_PROGRAM: &str = r#"
function fib(n) {
    if (n == 0) {
        return 0;
    } else {
        if (n == 1) {
            return 1;
        } else {
            return fib(n - 1) + fib(n - 2);
        }
    }
}

function main() {
    return fib(10);
}
"#;

fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::init();

    simple_logger::init_with_level((&args.verbosity).into()).unwrap();

    let source = match &args.file {
        Some(path) => fs::read_to_string(path)?,
        None => {
            info!("no input file given, compiling the embedded demo program");
            DEMO_PROGRAM.to_string()
        }
    };

    info!("parsing");
    let program = match armc::grammar::parse_program(&source) {
        Ok(program) => program,
        Err(parse_error) => {
            error!("{parse_error}");
            std::process::exit(1);
        }
    };

    if args.dump_ast {
        info!("parsed AST:\n{program:#?}");
    }

    info!("type checking");
    if let Err(type_error) = armc::checker::Checker::new().check_program(&program) {
        error!("{type_error}");
        std::process::exit(1);
    }

    info!("generating code");
    let instructions = match armc::codegen::generate(&program) {
        Ok(instructions) => instructions,
        Err(codegen_error) => {
            error!("{codegen_error}");
            std::process::exit(1);
        }
    };

    let assembly: String =
        instructions.iter().map(|i| format!("{i}\n")).collect::<Vec<_>>().concat();

    match args.output {
        Some(path) => fs::write(path, assembly)?,
        None => std::io::stdout().write_all(assembly.as_bytes())?,
    }

    Ok(())
}
