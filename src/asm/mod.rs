mod reg;

use std::fmt::Display;

pub use self::reg::Reg;

/// An addressing mode or immediate value, as it appears as an instruction operand.
#[derive(Debug, Clone)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
    /// `[base, #offset]`, rendered as plain `[base]` when `offset` is zero.
    Mem(Reg, i32),
    /// `[base, index]` - register-offset addressing, used only by array indexing.
    MemReg(Reg, Reg),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(value) => write!(f, "#{value}"),
            Operand::Mem(base, 0) => write!(f, "[{base}]"),
            Operand::Mem(base, offset) => write!(f, "[{base}, #{offset}]"),
            Operand::MemReg(base, index) => write!(f, "[{base}, {index}]"),
        }
    }
}

fn reg_list(regs: &[Reg]) -> String {
    regs.iter().map(Reg::to_string).collect::<Vec<_>>().join(", ")
}

/// One line of GNU-syntax AArch32 assembly. A `Func` node's emission is a sequence of these
/// plus the occasional raw [`Instruction::Blank`]/[`Instruction::Global`]/[`Instruction::Label`]
/// bracketing it.
#[derive(Debug, Clone)]
pub enum Instruction {
    Blank,
    Global(String),
    Label(String),
    Push(Vec<Reg>),
    Pop(Vec<Reg>),
    Mov(Operand, Operand),
    MovEq(Operand, Operand),
    MovNe(Operand, Operand),
    MovHs(Operand, Operand),
    Add(Operand, Operand, Operand),
    AddLo(Operand, Operand, Operand),
    Sub(Operand, Operand, Operand),
    Mul(Operand, Operand, Operand),
    UDiv(Operand, Operand, Operand),
    Eor(Operand, Operand, Operand),
    Lsl(Operand, Operand, Operand),
    LslLo(Operand, Operand, Operand),
    Ldr(Operand, Operand),
    LdrLo(Operand, Operand),
    Str(Operand, Operand),
    Cmp(Operand, Operand),
    B(String),
    Beq(String),
    Bl(String),
}

impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Blank => Ok(()),
            Instruction::Global(name) => write!(f, ".global {name}"),
            Instruction::Label(name) => write!(f, "{name}:"),
            Instruction::Push(regs) => write!(f, "\tpush\t{{{}}}", reg_list(regs)),
            Instruction::Pop(regs) => write!(f, "\tpop\t{{{}}}", reg_list(regs)),
            Instruction::Mov(t, s) => write!(f, "\tmov\t{t}, {s}"),
            Instruction::MovEq(t, s) => write!(f, "\tmoveq\t{t}, {s}"),
            Instruction::MovNe(t, s) => write!(f, "\tmovne\t{t}, {s}"),
            Instruction::MovHs(t, s) => write!(f, "\tmovhs\t{t}, {s}"),
            Instruction::Add(d, a, b) => write!(f, "\tadd\t{d}, {a}, {b}"),
            Instruction::AddLo(d, a, b) => write!(f, "\taddlo\t{d}, {a}, {b}"),
            Instruction::Sub(d, a, b) => write!(f, "\tsub\t{d}, {a}, {b}"),
            Instruction::Mul(d, a, b) => write!(f, "\tmul\t{d}, {a}, {b}"),
            Instruction::UDiv(d, a, b) => write!(f, "\tudiv\t{d}, {a}, {b}"),
            Instruction::Eor(d, a, b) => write!(f, "\teor\t{d}, {a}, {b}"),
            Instruction::Lsl(d, a, b) => write!(f, "\tlsl\t{d}, {a}, {b}"),
            Instruction::LslLo(d, a, b) => write!(f, "\tlsllo\t{d}, {a}, {b}"),
            Instruction::Ldr(t, m) => write!(f, "\tldr\t{t}, {m}"),
            Instruction::LdrLo(t, m) => write!(f, "\tldrlo\t{t}, {m}"),
            Instruction::Str(v, m) => write!(f, "\tstr\t{v}, {m}"),
            Instruction::Cmp(a, b) => write!(f, "\tcmp\t{a}, {b}"),
            Instruction::B(label) => write!(f, "\tb\t{label}"),
            Instruction::Beq(label) => write!(f, "\tbeq\t{label}"),
            Instruction::Bl(label) => write!(f, "\tbl\t{label}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_operand_with_zero_offset_omits_the_offset() {
        assert_eq!(Operand::Mem(Reg::R0, 0).to_string(), "[r0]");
        assert_eq!(Operand::Mem(Reg::Fp, -16).to_string(), "[fp, #-16]");
    }

    #[test]
    fn register_offset_addressing_renders_both_registers() {
        assert_eq!(Operand::MemReg(Reg::R1, Reg::R0).to_string(), "[r1, r0]");
    }

    #[test]
    fn push_and_pop_render_register_lists() {
        assert_eq!(Instruction::Push(vec![Reg::Fp, Reg::Lr]).to_string(), "\tpush\t{fp, lr}");
        assert_eq!(Instruction::Pop(vec![Reg::Fp, Reg::Pc]).to_string(), "\tpop\t{fp, pc}");
    }

    #[test]
    fn label_and_global_have_no_leading_tab() {
        assert_eq!(Instruction::Global("main".to_string()).to_string(), ".global main");
        assert_eq!(Instruction::Label("main".to_string()).to_string(), "main:");
    }
}
