pub mod asm;
pub mod ast;
pub mod checker;
pub mod codegen;
pub mod combinators;
pub mod cursor;
pub mod grammar;
pub mod types;

use std::fmt;

use checker::{Checker, TypeError};
use codegen::CodegenError;
use grammar::ParseError;

/// A failure from any one of the three pipeline phases, boxed behind a single error type so
/// the driver can report whichever one fired without matching on each phase individually.
#[derive(Debug)]
pub enum CompileError {
    Parse(ParseError),
    Type(TypeError),
    Codegen(CodegenError),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Parse(e) => write!(f, "parse error: {e}"),
            CompileError::Type(e) => write!(f, "type error: {e}"),
            CompileError::Codegen(e) => write!(f, "code generation error: {e}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<ParseError> for CompileError {
    fn from(e: ParseError) -> Self {
        CompileError::Parse(e)
    }
}

impl From<TypeError> for CompileError {
    fn from(e: TypeError) -> Self {
        CompileError::Type(e)
    }
}

impl From<CodegenError> for CompileError {
    fn from(e: CodegenError) -> Self {
        CompileError::Codegen(e)
    }
}

/// Runs the whole pipeline - parse, type-check, generate - over a single source buffer and
/// renders the result as a stream of assembly lines, one `String` per instruction or directive.
pub fn compile(source: &str) -> Result<Vec<String>, CompileError> {
    log::info!("parsing");
    let program = grammar::parse_program(source)?;

    log::info!("type checking");
    Checker::new().check_program(&program)?;

    log::info!("generating code");
    let instructions = codegen::generate(&program)?;

    Ok(instructions.iter().map(ToString::to_string).collect())
}
