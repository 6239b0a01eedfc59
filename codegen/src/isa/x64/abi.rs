//! System V AMD64 argument classification.

use crate::ir::Signature;
use crate::machinst::abi::{classify_signature, ABISignature, AbiRegisters};
use crate::machinst::reg::{PReg, RegClass};

/// `rdi, rsi, rdx, rcx, r8, r9`: the System V integer argument registers, in order.
pub static INT_ARG_REGS: [PReg; 6] = [
    PReg::new(7, RegClass::Int),  // rdi
    PReg::new(6, RegClass::Int),  // rsi
    PReg::new(2, RegClass::Int),  // rdx
    PReg::new(1, RegClass::Int),  // rcx
    PReg::new(8, RegClass::Int),  // r8
    PReg::new(9, RegClass::Int),  // r9
];

/// `xmm0`..=`xmm7`: the System V float/vector argument registers.
pub static FLOAT_ARG_REGS: [PReg; 8] = [
    PReg::new(0, RegClass::Float),
    PReg::new(1, RegClass::Float),
    PReg::new(2, RegClass::Float),
    PReg::new(3, RegClass::Float),
    PReg::new(4, RegClass::Float),
    PReg::new(5, RegClass::Float),
    PReg::new(6, RegClass::Float),
    PReg::new(7, RegClass::Float),
];

/// `rdi` carries the struct-return pointer when present (shifting normal arguments right by
/// one), so System V has no separate dedicated register for it.
pub const SRET_REG: Option<PReg> = None;

fn registers() -> AbiRegisters<'static> {
    AbiRegisters {
        int_args: &INT_ARG_REGS,
        float_args: &FLOAT_ARG_REGS,
        sret_reg: SRET_REG,
        stack_align: 16,
    }
}

/// Classify `sig`'s parameters and return values per System V AMD64.
pub fn classify(sig: &Signature) -> ABISignature {
    classify_signature(sig, &registers())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::I64;
    use crate::ir::AbiParam;
    use crate::isa::CallConv;

    #[test]
    fn first_integer_argument_goes_in_rdi() {
        let mut sig = Signature::new(CallConv::SystemV);
        sig.params.push(AbiParam::new(I64));
        let out = classify(&sig);
        match out.args[0] {
            crate::machinst::ABIArg::Reg(r, _) => assert_eq!(r.hw_enc(), 7),
            _ => panic!("expected register"),
        }
    }
}
