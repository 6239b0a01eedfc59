//! The AArch64 backend: the primary supported target.
//!
//! Lowering walks a [`Function`] through [`lower`], producing a [`crate::machinst::VCode`] of
//! [`inst::Inst`]s; [`inst::Inst::emit`] turns each allocated instruction into bytes in a
//! [`crate::machinst::MachBuffer`].

pub mod abi;
pub mod inst;
mod lower;

use crate::ir::Function;
use crate::isa::{CallConv, CompiledCode, Target, TargetIsa};
use crate::machinst::reg::{PReg, RegClass};
use crate::machinst::{MachBuffer, VCodeBlock, VCodeBuilder};
use crate::regalloc::{allocate, to_preg, to_ra_preg};
use crate::CodegenError;
use alloc::vec::Vec;

/// The registers `regalloc2` may assign: `x0`-`x15` and `v0`-`v7`.
///
/// `x16`/`x17` are reserved as [`crate::machinst::buffer::MachBuffer`]'s veneer scratch
/// registers, `x18` is the AAPCS64 platform register, and `x19`-`x30` are callee-saved or
/// hard-wired (FP/LR) — none of those are safe to hand to the allocator without this backend
/// first emitting callee-save prologue/epilogue code, which it does not yet do.
fn machine_env() -> regalloc2::MachineEnv {
    let int_regs: Vec<PReg> = (0..=15).map(|n| PReg::new(n, RegClass::Int)).collect();
    let float_regs: Vec<PReg> = (0..=7).map(|n| PReg::new(n, RegClass::Float)).collect();
    regalloc2::MachineEnv {
        preferred_regs_by_class: [int_regs.iter().map(|&p| to_ra_preg(p)).collect(), float_regs.iter().map(|&p| to_ra_preg(p)).collect()],
        non_preferred_regs_by_class: [Vec::new(), Vec::new()],
        scratch_by_class: [None, None],
        fixed_stack_slots: Vec::new(),
    }
}

/// The AArch64 backend.
pub struct Aarch64Backend {
    default_call_conv: CallConv,
}

impl Aarch64Backend {
    /// A backend using the AAPCS64 calling convention by default.
    pub fn new() -> Self {
        Aarch64Backend {
            default_call_conv: CallConv::Aapcs64,
        }
    }
}

impl Default for Aarch64Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetIsa for Aarch64Backend {
    fn target(&self) -> Target {
        Target::Aarch64
    }

    fn default_call_conv(&self) -> CallConv {
        self.default_call_conv
    }

    fn compile_function(&self, func: &Function, _flags: &crate::settings::Flags) -> Result<CompiledCode, CodegenError> {
        let builder: VCodeBuilder<inst::Inst> = VCodeBuilder::new();
        let vcode = lower::lower(func, builder)?;
        let env = machine_env();
        let alloc = allocate(&vcode, &env)?;

        let mut buffer = MachBuffer::new();
        let labels: Vec<_> = vcode.block_order().iter().map(|_| buffer.get_label()).collect();
        let label_of = |b: VCodeBlock| labels[b.index()];

        let mut assignments = alloc.assignments.iter();
        for &block in vcode.block_order() {
            buffer.bind_label(labels[block.index()]);
            for &inst_idx in vcode.block_insts(block) {
                let mut mach_inst = vcode.inst(inst_idx).clone();
                let assigned = assignments.next().expect("one assignment per instruction");
                let mut next = 0;
                mach_inst.map_regs(&mut |_v| {
                    let p = to_preg(assigned[next]);
                    next += 1;
                    p
                });
                mach_inst.emit(&mut buffer, label_of);
            }
        }

        let finalized = buffer.finalize();
        let (_, frame_size) = func.layout_stack_slots(lower::STACK_ALIGN);
        Ok(CompiledCode {
            buffer: finalized,
            frame_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_call_conv_is_aapcs64() {
        let be = Aarch64Backend::new();
        assert_eq!(be.default_call_conv(), CallConv::Aapcs64);
    }
}
