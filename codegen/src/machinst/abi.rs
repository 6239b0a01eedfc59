//! Target-independent ABI argument classification.
//!
//! Each backend supplies the register list and stack-alignment rules for its supported calling
//! conventions; this module walks a [`crate::ir::Signature`] and assigns each parameter either a
//! register or an incoming-stack-argument slot, in the order its convention requires.

use crate::ir::{ArgumentPurpose, Signature, Type};
use crate::isa::CallConv;
use crate::machinst::reg::{PReg, RegClass};
use alloc::vec::Vec;

/// Where a single argument or return value lives after ABI classification.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ABIArg {
    /// Passed in a physical register.
    Reg(PReg, Type),
    /// Passed on the stack, at `offset` bytes from the start of the incoming-argument area.
    Stack { offset: u32, ty: Type },
}

/// The register conventions a backend must supply to classify arguments: which physical
/// registers are available for integer and float/vector arguments, in assignment order, plus
/// the struct-return register if the convention has a dedicated one.
pub struct AbiRegisters<'a> {
    /// Integer/pointer argument registers, in assignment order.
    pub int_args: &'a [PReg],
    /// Float/vector argument registers, in assignment order.
    pub float_args: &'a [PReg],
    /// The register carrying a struct-return pointer, if the convention dedicates one rather
    /// than passing it as an ordinary leading argument.
    pub sret_reg: Option<PReg>,
    /// Required alignment, in bytes, of the stack argument area.
    pub stack_align: u32,
}

/// The result of classifying every argument and return value of a [`Signature`].
#[derive(Clone, Debug, Default)]
pub struct ABISignature {
    /// Classified formal parameters, in signature order.
    pub args: Vec<ABIArg>,
    /// Classified return values, in signature order.
    pub rets: Vec<ABIArg>,
    /// Total bytes of incoming stack argument space required.
    pub stack_arg_space: u32,
}

/// Classify every parameter and return value of `sig` against `regs` and `sig.call_conv`.
///
/// Struct-return and VM-context parameters are assigned first (per `regs.sret_reg` or the
/// leading integer argument register), then remaining parameters are assigned registers in
/// order until each class's register list is exhausted, after which they spill to the stack.
pub fn classify_signature(sig: &Signature, regs: &AbiRegisters) -> ABISignature {
    let mut out = ABISignature::default();
    let mut next_int = 0usize;
    let mut next_float = 0usize;
    let mut stack_offset = 0u32;

    let mut assign = |ty: Type, purpose: ArgumentPurpose| -> ABIArg {
        if purpose == ArgumentPurpose::StructReturn {
            if let Some(r) = regs.sret_reg {
                return ABIArg::Reg(r, ty);
            }
        }
        let class = class_for(ty);
        let slot = match class {
            RegClass::Int => {
                let r = regs.int_args.get(next_int).copied();
                if r.is_some() {
                    next_int += 1;
                }
                r
            }
            RegClass::Float | RegClass::Vector => {
                let r = regs.float_args.get(next_float).copied();
                if r.is_some() {
                    next_float += 1;
                }
                r
            }
        };
        match slot {
            Some(reg) => ABIArg::Reg(reg, ty),
            None => {
                let size = ty.bits() / 8;
                let align = size.max(1);
                stack_offset = align_to(stack_offset, align);
                let offset = stack_offset;
                stack_offset += size;
                ABIArg::Stack { offset, ty }
            }
        }
    };

    for p in &sig.params {
        out.args.push(assign(p.value_type, p.purpose));
    }
    for r in &sig.returns {
        out.rets.push(assign(r.value_type, r.purpose));
    }
    out.stack_arg_space = align_to(stack_offset, regs.stack_align);
    out
}

fn class_for(ty: Type) -> RegClass {
    if ty.is_float() {
        RegClass::Float
    } else {
        RegClass::Int
    }
}

fn align_to(offset: u32, align: u32) -> u32 {
    if align == 0 {
        return offset;
    }
    (offset + align - 1) / align * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{I32, I64};
    use crate::ir::AbiParam;

    fn regs() -> AbiRegisters<'static> {
        static INT: [PReg; 2] = [PReg::new(0, RegClass::Int), PReg::new(1, RegClass::Int)];
        static FLOAT: [PReg; 1] = [PReg::new(0, RegClass::Float)];
        AbiRegisters {
            int_args: &INT,
            float_args: &FLOAT,
            sret_reg: Some(PReg::new(8, RegClass::Int)),
            stack_align: 8,
        }
    }

    #[test]
    fn spills_past_register_count() {
        let mut sig = Signature::new(CallConv::Aapcs64);
        sig.params.push(AbiParam::new(I64));
        sig.params.push(AbiParam::new(I64));
        sig.params.push(AbiParam::new(I64));
        let out = classify_signature(&sig, &regs());
        assert!(matches!(out.args[0], ABIArg::Reg(_, I64)));
        assert!(matches!(out.args[1], ABIArg::Reg(_, I64)));
        assert!(matches!(out.args[2], ABIArg::Stack { offset: 0, ty: I64 }));
        assert_eq!(out.stack_arg_space, 8);
    }

    #[test]
    fn struct_return_uses_dedicated_register() {
        let mut sig = Signature::new(CallConv::Aapcs64);
        sig.params.push(AbiParam::special(I32, ArgumentPurpose::StructReturn));
        let out = classify_signature(&sig, &regs());
        match out.args[0] {
            ABIArg::Reg(r, I32) => assert_eq!(r.hw_enc(), 8),
            _ => panic!("expected sret register"),
        }
    }
}
