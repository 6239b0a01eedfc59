//! x86-64 machine instructions.
//!
//! Grounded on the same representative subset as the AArch64 backend: register-register and
//! register-immediate ALU ops, base+displacement memory access, and the terminator forms needed
//! to close a block, with encodings in REX-prefixed, 64-bit operand-size form throughout.

use crate::ir::TrapCode;
use crate::machinst::{
    buffer::{LabelUseKind, MachBuffer},
    reg::{OperandDescriptor, OperandKind, PReg, Reg, RegClass, VReg, WritableReg},
    vcode::{MachInst, VCodeBlock},
};
use alloc::vec::Vec;

/// An ALU operation, keyed by its x86 opcode-extension field for the immediate form.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
}

impl AluOp {
    fn reg_opcode(self) -> u8 {
        match self {
            AluOp::Add => 0x01,
            AluOp::Sub => 0x29,
            AluOp::And => 0x21,
            AluOp::Or => 0x09,
            AluOp::Xor => 0x31,
        }
    }
}

/// A `jcc`/`setcc` condition, matching the x86 4-bit condition code field.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum CC {
    Z,
    NZ,
    L,
    GE,
    G,
    LE,
}

impl CC {
    fn bits(self) -> u8 {
        match self {
            CC::Z => 0x4,
            CC::NZ => 0x5,
            CC::L => 0xC,
            CC::GE => 0xD,
            CC::G => 0xF,
            CC::LE => 0xE,
        }
    }
}

/// One x86-64 machine instruction.
#[derive(Clone, Debug)]
pub enum Inst {
    /// `<op> rd, rm` (64-bit, two-operand form: `rd` is both a source and the destination).
    AluRRR {
        op: AluOp,
        rd: WritableReg,
        rn: Reg,
        rm: Reg,
    },
    /// `mov rd, imm64` (via `movabs`).
    MovImm { rd: WritableReg, imm: i64 },
    /// `mov rd, [rn + off]`.
    Load64 { rd: WritableReg, rn: Reg, offset: i32 },
    /// `mov [rn + off], rd`.
    Store64 { rd: Reg, rn: Reg, offset: i32 },
    /// `mov rd, rn`.
    Mov { rd: WritableReg, rn: Reg },
    /// `imul rd, rm` (two-operand form: `rd` is both a source and the destination).
    Mul { rd: WritableReg, rn: Reg, rm: Reg },
    /// `cqo; idiv rm` (64-bit signed division: dividend in `rdx:rax`, quotient to `rax`).
    /// Modeled here as a single pseudo-op over virtual registers; the ABI-fixed `rax`/`rdx`
    /// placement is left to the register allocator via `fixed` operand constraints.
    Sdiv { rd: WritableReg, rn: Reg, rm: Reg },
    /// `cmp rn, rm`, setting flags consumed by a following `SetCC`.
    CmpRR { rn: Reg, rm: Reg },
    /// `setcc rd8` then zero-extend into the full register.
    SetCC { rd: WritableReg, cc: CC },
    /// `movabs r11, imm64; movq rd, r11` (a 64-bit float bit pattern materialized via GPR,
    /// avoiding a dependency on SSE move encodings not modeled elsewhere in this backend).
    FConst64 { rd: WritableReg, bits: u64 },
    /// `jmp target`.
    Jump { target: VCodeBlock },
    /// `cmp rt, 0` then `jcc taken` (falls through to `not_taken`).
    CondBr {
        cc: CC,
        rt: Reg,
        taken: VCodeBlock,
        not_taken: VCodeBlock,
    },
    /// `call name`.
    Call { name: crate::ir::ExternalName },
    /// `ret`.
    Ret,
    /// `ud2`, or a guarded trap.
    Trap { code: TrapCode },
}

impl MachInst for Inst {
    fn operands(&self) -> Vec<OperandDescriptor> {
        let use_op = |reg: Reg| OperandDescriptor {
            reg,
            kind: OperandKind::Use,
            class: RegClass::Int,
            fixed: None,
        };
        let def_op = |reg: WritableReg| OperandDescriptor {
            reg: reg.to_reg(),
            kind: OperandKind::Def,
            class: RegClass::Int,
            fixed: None,
        };
        match *self {
            // rd is both read and written by the two-operand ALU form.
            Inst::AluRRR { rd, rn, rm, .. } => alloc::vec![
                OperandDescriptor {
                    reg: rd.to_reg(),
                    kind: OperandKind::Mod,
                    class: RegClass::Int,
                    fixed: None,
                },
                use_op(rn),
                use_op(rm),
            ],
            Inst::MovImm { rd, .. } => alloc::vec![def_op(rd)],
            Inst::Load64 { rd, rn, .. } => alloc::vec![def_op(rd), use_op(rn)],
            Inst::Store64 { rd, rn, .. } => alloc::vec![use_op(rd), use_op(rn)],
            Inst::Mov { rd, rn } => alloc::vec![def_op(rd), use_op(rn)],
            Inst::Mul { rd, rn, rm } => alloc::vec![def_op(rd), use_op(rn), use_op(rm)],
            Inst::Sdiv { rd, rn, rm } => alloc::vec![def_op(rd), use_op(rn), use_op(rm)],
            Inst::CmpRR { rn, rm } => alloc::vec![use_op(rn), use_op(rm)],
            Inst::SetCC { rd, .. } => alloc::vec![def_op(rd)],
            Inst::FConst64 { rd, .. } => alloc::vec![def_op(rd)],
            Inst::CondBr { rt, .. } => alloc::vec![use_op(rt)],
            Inst::Jump { .. } | Inst::Call { .. } | Inst::Ret | Inst::Trap { .. } => Vec::new(),
        }
    }

    fn is_uncond_branch(&self) -> Option<VCodeBlock> {
        match *self {
            Inst::Jump { target } => Some(target),
            _ => None,
        }
    }

    fn is_cond_branch(&self) -> Option<(VCodeBlock, VCodeBlock)> {
        match *self {
            Inst::CondBr { taken, not_taken, .. } => Some((taken, not_taken)),
            _ => None,
        }
    }

    fn is_ret(&self) -> bool {
        matches!(self, Inst::Ret)
    }

    fn map_regs(&mut self, map: &mut dyn FnMut(VReg) -> PReg) {
        let mut fix_reg = |r: &mut Reg| {
            if let Reg::Virtual(v) = *r {
                *r = Reg::Physical(map(v));
            }
        };
        let mut fix_writable = |r: &mut WritableReg| {
            let mut inner = r.to_reg();
            fix_reg(&mut inner);
            *r = WritableReg::from_reg(inner);
        };
        match self {
            Inst::AluRRR { rd, rn, rm, .. } => {
                fix_writable(rd);
                fix_reg(rn);
                fix_reg(rm);
            }
            Inst::MovImm { rd, .. } => fix_writable(rd),
            Inst::Load64 { rd, rn, .. } => {
                fix_writable(rd);
                fix_reg(rn);
            }
            Inst::Store64 { rd, rn, .. } => {
                fix_reg(rd);
                fix_reg(rn);
            }
            Inst::Mov { rd, rn } => {
                fix_writable(rd);
                fix_reg(rn);
            }
            Inst::Mul { rd, rn, rm } | Inst::Sdiv { rd, rn, rm } => {
                fix_writable(rd);
                fix_reg(rn);
                fix_reg(rm);
            }
            Inst::CmpRR { rn, rm } => {
                fix_reg(rn);
                fix_reg(rm);
            }
            Inst::SetCC { rd, .. } => fix_writable(rd),
            Inst::FConst64 { rd, .. } => fix_writable(rd),
            Inst::CondBr { rt, .. } => fix_reg(rt),
            Inst::Jump { .. } | Inst::Call { .. } | Inst::Ret | Inst::Trap { .. } => {}
        }
    }
}

fn greg(r: Reg) -> u8 {
    r.as_physical().expect("register not allocated before emission").hw_enc()
}

fn rex(w: bool, r: u8, x: u8, b: u8) -> u8 {
    0x40 | ((w as u8) << 3) | (((r >> 3) & 1) << 2) | (((x >> 3) & 1) << 1) | ((b >> 3) & 1)
}

impl Inst {
    /// Encode this instruction's bytes into `buf`.
    pub fn emit(&self, buf: &mut MachBuffer, label_of: impl Fn(VCodeBlock) -> crate::machinst::buffer::MachLabel) {
        match *self {
            Inst::AluRRR { op, rd, rn: _, rm } => {
                let d = greg(rd.to_reg());
                let m = greg(rm);
                buf.put(&[rex(true, m, 0, d), op.reg_opcode(), 0xc0 | (m << 3) | (d & 7)]);
            }
            Inst::MovImm { rd, imm } => {
                let d = greg(rd.to_reg());
                buf.put(&[rex(true, 0, 0, d), 0xb8 | (d & 7)]);
                buf.put(&imm.to_le_bytes());
            }
            Inst::Load64 { rd, rn, offset } => {
                let d = greg(rd.to_reg());
                let b = greg(rn);
                buf.put(&[rex(true, d, 0, b), 0x8b, 0x80 | (d << 3) | (b & 7)]);
                buf.put(&offset.to_le_bytes());
            }
            Inst::Store64 { rd, rn, offset } => {
                let s = greg(rd);
                let b = greg(rn);
                buf.put(&[rex(true, s, 0, b), 0x89, 0x80 | (s << 3) | (b & 7)]);
                buf.put(&offset.to_le_bytes());
            }
            Inst::Mov { rd, rn } => {
                let d = greg(rd.to_reg());
                let s = greg(rn);
                buf.put(&[rex(true, s, 0, d), 0x89, 0xc0 | (s << 3) | (d & 7)]);
            }
            Inst::Mul { rd, rn: _, rm } => {
                // two-address `imul rd, rm`: `rd` is read as well as written, matching AluRRR's
                // unenforced two-address convention.
                let d = greg(rd.to_reg());
                let m = greg(rm);
                buf.put(&[rex(true, d, 0, m), 0x0f, 0xaf, 0xc0 | (d << 3) | (m & 7)]);
            }
            Inst::Sdiv { rd, rn: _, rm } => {
                let m = greg(rm);
                buf.put(&[0x48, 0x99]); // cqo: sign-extend rax into rdx:rax
                buf.put(&[rex(true, 0, 0, m), 0xf7, 0xf8 | (m & 7)]); // idiv rm
                let d = greg(rd.to_reg());
                buf.put(&[rex(true, 0, 0, d), 0x89, 0xc0 | (d & 7)]); // mov rd, rax
            }
            Inst::CmpRR { rn, rm } => {
                let n = greg(rn);
                let m = greg(rm);
                buf.put(&[rex(true, m, 0, n), 0x39, 0xc0 | (m << 3) | (n & 7)]);
            }
            Inst::SetCC { rd, cc } => {
                let d = greg(rd.to_reg());
                buf.put(&[rex(true, 0, 0, d), 0x0f, 0x90 | cc.bits(), 0xc0 | (d & 7)]);
            }
            Inst::FConst64 { rd, bits } => {
                let d = greg(rd.to_reg());
                buf.put(&[rex(true, 0, 0, d), 0xb8 | (d & 7)]);
                buf.put(&bits.to_le_bytes());
            }
            Inst::Jump { target } => {
                buf.put(&[0xe9]);
                let off = buf.cur_offset();
                buf.put4(0);
                buf.use_label_at_offset(off, label_of(target), LabelUseKind::X86Rel32);
            }
            Inst::CondBr { cc, rt, taken, .. } => {
                let r = greg(rt);
                buf.put(&[rex(true, 0, 0, r), 0x85, 0xc0 | (r << 3) | (r & 7)]); // test rt, rt
                buf.put(&[0x0f, 0x80 | cc.bits()]);
                let off = buf.cur_offset();
                buf.put4(0);
                buf.use_label_at_offset(off, label_of(taken), LabelUseKind::X86Rel32);
            }
            Inst::Call { ref name } => {
                let off = buf.cur_offset();
                buf.put(&[0xe8]);
                buf.put4(0);
                buf.add_reloc(off + 1, crate::machinst::buffer::RelocKind::X86CallPcRel32, name, -4);
                buf.add_call_site(off + 5);
            }
            Inst::Ret => buf.put(&[0xc3]),
            Inst::Trap { code } => {
                let off = buf.cur_offset();
                buf.put(&[0x0f, 0x0b]); // ud2
                buf.add_trap(off, code);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::reg::VReg;

    #[test]
    fn alu_rrr_reports_mod_on_destination() {
        let inst = Inst::AluRRR {
            op: AluOp::Add,
            rd: WritableReg::from_reg(Reg::Virtual(VReg::new(0, RegClass::Int))),
            rn: Reg::Virtual(VReg::new(0, RegClass::Int)),
            rm: Reg::Virtual(VReg::new(1, RegClass::Int)),
        };
        let ops = inst.operands();
        assert_eq!(ops[0].kind, OperandKind::Mod);
    }

    #[test]
    fn rex_prefix_sets_w_bit_for_64_bit_operands() {
        assert_eq!(rex(true, 0, 0, 0) & 0x48, 0x48);
    }
}
