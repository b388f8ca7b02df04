use std::fmt::Display;

/// The handful of AArch32 registers this code generator ever names directly. `r0` is the sole
/// scratch accumulator; `r1`-`r4` hold saved operands and callee-saved temporaries; the rest
/// are the standard frame/stack/link/program-counter registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    Fp,
    Sp,
    Lr,
    Pc,
    Ip,
}

impl Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Reg::R0 => "r0",
            Reg::R1 => "r1",
            Reg::R2 => "r2",
            Reg::R3 => "r3",
            Reg::R4 => "r4",
            Reg::Fp => "fp",
            Reg::Sp => "sp",
            Reg::Lr => "lr",
            Reg::Pc => "pc",
            Reg::Ip => "ip",
        })
    }
}
