//! The ARM code generator.
//!
//! One function per `Func` node, each with its own frame-local [`CodeGenerator`]; all of them
//! share a single monotonically increasing label counter so that `.L<n>` labels are unique
//! across the whole compilation run, not just within one function.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::asm::{Instruction, Operand, Reg};
use crate::ast::AstNode;

const MAX_PARAMS: usize = 4;
const MAX_ARGS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    TooManyParams { function: String, count: usize },
    DuplicateParameterName { function: String, name: String },
    TooManyArgs { function: String, count: usize },
    UndefinedLocal(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenError::TooManyParams { function, count } => write!(
                f,
                "function '{function}' declares {count} parameters, but the calling convention supports at most {MAX_PARAMS}"
            ),
            CodegenError::DuplicateParameterName { function, name } => {
                write!(f, "function '{function}' declares the parameter '{name}' more than once")
            }
            CodegenError::TooManyArgs { function, count } => write!(
                f,
                "call to '{function}' passes {count} arguments, but the calling convention supports at most {MAX_ARGS}"
            ),
            CodegenError::UndefinedLocal(name) => write!(f, "undefined local '{name}' reached the code generator"),
        }
    }
}

impl std::error::Error for CodegenError {}

/// Generates assembly for every top-level `Func` node, in order, sharing one label counter.
pub fn generate(program: &[AstNode]) -> Result<Vec<Instruction>, CodegenError> {
    let labels = Rc::new(Cell::new(0usize));
    let mut out = Vec::new();
    for node in program {
        if let AstNode::Func { name, signature, body } = node {
            emit_function(name, &signature.parameters.iter().map(|(n, _)| n.clone()).collect::<Vec<_>>(), body, labels.clone(), &mut out)?;
        }
    }
    Ok(out)
}

fn emit_function(
    name: &str,
    parameters: &[String],
    body: &AstNode,
    labels: Rc<Cell<usize>>,
    out: &mut Vec<Instruction>,
) -> Result<(), CodegenError> {
    if parameters.len() > MAX_PARAMS {
        return Err(CodegenError::TooManyParams { function: name.to_string(), count: parameters.len() });
    }
    let mut locals = HashMap::new();
    for (i, param) in parameters.iter().enumerate() {
        if locals.insert(param.clone(), 4 * i as i32 - 16).is_some() {
            return Err(CodegenError::DuplicateParameterName {
                function: name.to_string(),
                name: param.clone(),
            });
        }
    }

    out.push(Instruction::Blank);
    out.push(Instruction::Global(name.to_string()));
    out.push(Instruction::Label(name.to_string()));
    out.push(Instruction::Push(vec![Reg::Fp, Reg::Lr]));
    out.push(Instruction::Mov(Operand::Reg(Reg::Fp), Operand::Reg(Reg::Sp)));
    out.push(Instruction::Push(vec![Reg::R0, Reg::R1, Reg::R2, Reg::R3]));

    let mut generator = CodeGenerator { labels, locals, next_offset: -20 };
    generator.compile(body, out)?;

    out.push(Instruction::Mov(Operand::Reg(Reg::Sp), Operand::Reg(Reg::Fp)));
    out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Imm(0)));
    out.push(Instruction::Pop(vec![Reg::Fp, Reg::Pc]));
    Ok(())
}

struct CodeGenerator {
    labels: Rc<Cell<usize>>,
    locals: HashMap<String, i32>,
    next_offset: i32,
}

impl CodeGenerator {
    fn fresh_label(&self) -> String {
        let n = self.labels.get();
        self.labels.set(n + 1);
        format!(".L{n}")
    }

    fn declare_local(&mut self, name: String) -> i32 {
        let offset = self.next_offset - 4;
        self.locals.insert(name, offset);
        self.next_offset -= 8;
        offset
    }

    fn local_offset(&self, name: &str) -> Result<i32, CodegenError> {
        self.locals.get(name).copied().ok_or_else(|| CodegenError::UndefinedLocal(name.to_string()))
    }

    /// Evaluates `first`, saves it (`push {r0, ip}`), then evaluates `second`, restoring the
    /// first value into `r1` (`pop {r1, ip}`). On return `r0` holds `second`'s value and `r1`
    /// holds `first`'s. Which operand is passed first controls evaluation order only - the
    /// caller picks the combining instruction's operand order independently.
    fn save_and_eval(&mut self, first: &AstNode, second: &AstNode, out: &mut Vec<Instruction>) -> Result<(), CodegenError> {
        self.compile(first, out)?;
        out.push(Instruction::Push(vec![Reg::R0, Reg::Ip]));
        self.compile(second, out)?;
        out.push(Instruction::Pop(vec![Reg::R1, Reg::Ip]));
        Ok(())
    }

    fn compile(&mut self, node: &AstNode, out: &mut Vec<Instruction>) -> Result<(), CodegenError> {
        match node {
            AstNode::Num(value) => {
                out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Imm(*value)));
                Ok(())
            }

            AstNode::Bool(value) => {
                out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Imm(if *value { 1 } else { 0 })));
                Ok(())
            }

            AstNode::Undefined | AstNode::Null => {
                out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Imm(0)));
                Ok(())
            }

            AstNode::StringLiteral(text) => {
                let elements: Vec<AstNode> = text.chars().map(|c| AstNode::Num(c as i32)).collect();
                self.compile_array_literal(&elements, out)
            }

            AstNode::ArrayLiteral(elements) => self.compile_array_literal(elements, out),

            AstNode::Id(name) => {
                let offset = self.local_offset(name)?;
                out.push(Instruction::Ldr(Operand::Reg(Reg::R0), Operand::Mem(Reg::Fp, offset)));
                Ok(())
            }

            AstNode::Not(inner) => {
                self.compile(inner, out)?;
                out.push(Instruction::Eor(Operand::Reg(Reg::R0), Operand::Reg(Reg::R0), Operand::Imm(1)));
                Ok(())
            }

            AstNode::Add(left, right) => {
                self.save_and_eval(left, right, out)?;
                out.push(Instruction::Add(Operand::Reg(Reg::R0), Operand::Reg(Reg::R1), Operand::Reg(Reg::R0)));
                Ok(())
            }

            AstNode::Subtract(left, right) => {
                self.save_and_eval(right, left, out)?;
                out.push(Instruction::Sub(Operand::Reg(Reg::R0), Operand::Reg(Reg::R0), Operand::Reg(Reg::R1)));
                Ok(())
            }

            AstNode::Multiply(left, right) => {
                self.save_and_eval(right, left, out)?;
                out.push(Instruction::Mul(Operand::Reg(Reg::R0), Operand::Reg(Reg::R0), Operand::Reg(Reg::R1)));
                Ok(())
            }

            AstNode::Divide(left, right) => {
                self.save_and_eval(right, left, out)?;
                out.push(Instruction::UDiv(Operand::Reg(Reg::R0), Operand::Reg(Reg::R0), Operand::Reg(Reg::R1)));
                Ok(())
            }

            AstNode::Equal(left, right) => {
                self.save_and_eval(right, left, out)?;
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Reg(Reg::R1)));
                out.push(Instruction::MovEq(Operand::Reg(Reg::R0), Operand::Imm(1)));
                out.push(Instruction::MovNe(Operand::Reg(Reg::R0), Operand::Imm(0)));
                Ok(())
            }

            AstNode::NotEqual(left, right) => {
                self.save_and_eval(right, left, out)?;
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Reg(Reg::R1)));
                out.push(Instruction::MovNe(Operand::Reg(Reg::R0), Operand::Imm(1)));
                out.push(Instruction::MovEq(Operand::Reg(Reg::R0), Operand::Imm(0)));
                Ok(())
            }

            AstNode::ArrayLookup { array, index } => {
                self.save_and_eval(array, index, out)?;
                out.push(Instruction::Ldr(Operand::Reg(Reg::R2), Operand::Mem(Reg::R1, 0)));
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Reg(Reg::R2)));
                out.push(Instruction::MovHs(Operand::Reg(Reg::R0), Operand::Imm(0)));
                out.push(Instruction::AddLo(Operand::Reg(Reg::R1), Operand::Reg(Reg::R1), Operand::Imm(4)));
                out.push(Instruction::LslLo(Operand::Reg(Reg::R0), Operand::Reg(Reg::R0), Operand::Imm(2)));
                out.push(Instruction::LdrLo(Operand::Reg(Reg::R0), Operand::MemReg(Reg::R1, Reg::R0)));
                Ok(())
            }

            AstNode::Length(array) => {
                self.compile(array, out)?;
                out.push(Instruction::Ldr(Operand::Reg(Reg::R0), Operand::Mem(Reg::R0, 0)));
                Ok(())
            }

            AstNode::Call { callee, args } => {
                match args.len() {
                    0 => {
                        out.push(Instruction::Bl(callee.clone()));
                    }
                    1 => {
                        self.compile(&args[0], out)?;
                        out.push(Instruction::Bl(callee.clone()));
                    }
                    2..=4 => {
                        out.push(Instruction::Sub(Operand::Reg(Reg::Sp), Operand::Reg(Reg::Sp), Operand::Imm(16)));
                        for (i, arg) in args.iter().enumerate() {
                            self.compile(arg, out)?;
                            out.push(Instruction::Str(Operand::Reg(Reg::R0), Operand::Mem(Reg::Sp, 4 * i as i32)));
                        }
                        out.push(Instruction::Pop(vec![Reg::R0, Reg::R1, Reg::R2, Reg::R3]));
                        out.push(Instruction::Bl(callee.clone()));
                    }
                    n => return Err(CodegenError::TooManyArgs { function: callee.clone(), count: n }),
                }
                Ok(())
            }

            AstNode::Return(value) => {
                self.compile(value, out)?;
                out.push(Instruction::Mov(Operand::Reg(Reg::Sp), Operand::Reg(Reg::Fp)));
                out.push(Instruction::Pop(vec![Reg::Fp, Reg::Pc]));
                Ok(())
            }

            AstNode::Block(statements) => {
                for statement in statements {
                    self.compile(statement, out)?;
                }
                Ok(())
            }

            AstNode::If { condition, then_branch, else_branch } => {
                let false_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.compile(condition, out)?;
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Imm(0)));
                out.push(Instruction::Beq(false_label.clone()));
                self.compile(then_branch, out)?;
                out.push(Instruction::B(end_label.clone()));
                out.push(Instruction::Label(false_label));
                self.compile(else_branch, out)?;
                out.push(Instruction::Label(end_label));
                Ok(())
            }

            AstNode::While { condition, body } => {
                let start_label = self.fresh_label();
                let end_label = self.fresh_label();
                out.push(Instruction::Label(start_label.clone()));
                self.compile(condition, out)?;
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Imm(0)));
                out.push(Instruction::Beq(end_label.clone()));
                self.compile(body, out)?;
                out.push(Instruction::B(start_label));
                out.push(Instruction::Label(end_label));
                Ok(())
            }

            AstNode::For { init, condition, step, body } => {
                let start_label = self.fresh_label();
                let end_label = self.fresh_label();
                self.compile(init, out)?;
                out.push(Instruction::Label(start_label.clone()));
                self.compile(condition, out)?;
                out.push(Instruction::Cmp(Operand::Reg(Reg::R0), Operand::Imm(0)));
                out.push(Instruction::Beq(end_label.clone()));
                self.compile(body, out)?;
                self.compile(step, out)?;
                out.push(Instruction::B(start_label));
                out.push(Instruction::Label(end_label));
                Ok(())
            }

            AstNode::Var { name, init } => {
                self.compile(init, out)?;
                out.push(Instruction::Push(vec![Reg::R0, Reg::Ip]));
                self.declare_local(name.clone());
                Ok(())
            }

            AstNode::Assign { name, value } => {
                self.compile(value, out)?;
                let offset = self.local_offset(name)?;
                out.push(Instruction::Str(Operand::Reg(Reg::R0), Operand::Mem(Reg::Fp, offset)));
                Ok(())
            }

            AstNode::Func { .. } => {
                // Nested function definitions never reach the generator: the grammar's
                // `statement` rule accepts `funcStmt` anywhere a statement is accepted, but
                // only top-level nodes are dispatched to `emit_function`.
                Ok(())
            }
        }
    }

    fn compile_array_literal(&mut self, elements: &[AstNode], out: &mut Vec<Instruction>) -> Result<(), CodegenError> {
        let n = elements.len() as i32;
        out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Imm(4 * (n + 1))));
        out.push(Instruction::Bl("malloc".to_string()));
        out.push(Instruction::Push(vec![Reg::R4]));
        out.push(Instruction::Mov(Operand::Reg(Reg::R4), Operand::Reg(Reg::R0)));
        out.push(Instruction::Mov(Operand::Reg(Reg::R1), Operand::Imm(n)));
        out.push(Instruction::Str(Operand::Reg(Reg::R1), Operand::Mem(Reg::R4, 0)));
        for (i, element) in elements.iter().enumerate() {
            self.compile(element, out)?;
            out.push(Instruction::Str(Operand::Reg(Reg::R0), Operand::Mem(Reg::R4, 4 * (i as i32 + 1))));
        }
        out.push(Instruction::Mov(Operand::Reg(Reg::R0), Operand::Reg(Reg::R4)));
        out.push(Instruction::Pop(vec![Reg::R4]));
        Ok(())
    }
}
