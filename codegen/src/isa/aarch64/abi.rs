//! AAPCS64 argument classification.

use crate::ir::Signature;
use crate::machinst::abi::{classify_signature, ABISignature, AbiRegisters};
use crate::machinst::reg::{PReg, RegClass};

/// `x0`..=`x7`: the AAPCS64 integer argument/return registers.
pub static INT_ARG_REGS: [PReg; 8] = [
    PReg::new(0, RegClass::Int),
    PReg::new(1, RegClass::Int),
    PReg::new(2, RegClass::Int),
    PReg::new(3, RegClass::Int),
    PReg::new(4, RegClass::Int),
    PReg::new(5, RegClass::Int),
    PReg::new(6, RegClass::Int),
    PReg::new(7, RegClass::Int),
];

/// `v0`..=`v7`: the AAPCS64 float/vector argument/return registers.
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

/// `x8`: the AAPCS64 indirect-result (struct-return) register.
pub const SRET_REG: PReg = PReg::new(8, RegClass::Int);

fn registers() -> AbiRegisters<'static> {
    AbiRegisters {
        int_args: &INT_ARG_REGS,
        float_args: &FLOAT_ARG_REGS,
        sret_reg: Some(SRET_REG),
        stack_align: 16,
    }
}

/// Classify `sig`'s parameters and return values per AAPCS64.
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
    fn first_integer_argument_goes_in_x0() {
        let mut sig = Signature::new(CallConv::Aapcs64);
        sig.params.push(AbiParam::new(I64));
        let out = classify(&sig);
        match out.args[0] {
            crate::machinst::ABIArg::Reg(r, _) => assert_eq!(r.hw_enc(), 0),
            _ => panic!("expected register"),
        }
    }
}
