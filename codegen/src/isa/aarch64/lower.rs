//! Lowering: turns a [`Function`] into a [`VCode`] of AArch64 [`Inst`]s.
//!
//! Blocks are visited in reverse layout order, and within a block instructions are visited from
//! last to first, matching the order [`VCodeBuilder`] expects so a value's single use can be
//! inspected before its defining instruction is lowered.

use crate::ir::{Function, InstructionData, Opcode, StackSize, StackSlot, Value};
use crate::isa::aarch64::inst::{AluOp, Cond, Inst};
use crate::machinst::reg::{PReg, Reg, RegClass, WritableReg};
use crate::machinst::{VCodeBlock, VCodeBuilder};
use crate::CodegenError;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use cranelift_entity::PrimaryMap;

/// `x29`, the AAPCS64 frame pointer: every `StackLoad`/`StackStore` addresses its slot relative
/// to this register.
const FP: Reg = Reg::Physical(PReg::new(29, RegClass::Int));

/// The alignment this backend packs stack slots and rounds frame size to, matching
/// [`crate::isa::aarch64::abi`]'s `stack_align`.
pub(crate) const STACK_ALIGN: StackSize = 16;

fn class_of(func: &Function, v: Value) -> RegClass {
    if func.dfg.value_type(v).is_float() {
        RegClass::Float
    } else {
        RegClass::Int
    }
}

fn int_cc_to_cond(cc: crate::ir::IntCC) -> Cond {
    match cc {
        crate::ir::IntCC::Equal => Cond::Eq,
        crate::ir::IntCC::NotEqual => Cond::Ne,
        crate::ir::IntCC::SignedLessThan => Cond::Lt,
        crate::ir::IntCC::SignedGreaterThanOrEqual => Cond::Ge,
        crate::ir::IntCC::SignedGreaterThan => Cond::Gt,
        crate::ir::IntCC::SignedLessThanOrEqual => Cond::Le,
    }
}

/// Lower every block of `func` into `builder`, returning the finished [`crate::machinst::VCode`].
pub fn lower(func: &Function, mut builder: VCodeBuilder<Inst>) -> Result<crate::machinst::VCode<Inst>, CodegenError> {
    crate::verifier::verify_function(func)?;
    log::trace!("aarch64 lowering {}", func.display_name());

    let (stack_offsets, _) = func.layout_stack_slots(STACK_ALIGN);
    let blocks = func.layout.blocks();
    let mut value_regs: BTreeMap<Value, Reg> = BTreeMap::new();
    let mut vcode_block_of = BTreeMap::new();
    for (i, _) in blocks.iter().enumerate() {
        vcode_block_of.insert(blocks[i], VCodeBlock::new(i));
    }

    // Assign every block parameter and instruction result a fresh virtual register up front so
    // a later-visited (earlier in program order) instruction can already name the registers its
    // visited-first (later in program order) uses will read.
    for &block in &blocks {
        for &p in func.dfg.block_params(block) {
            value_regs.insert(p, Reg::Virtual(builder.alloc_vreg(class_of(func, p))));
        }
        for inst in func.layout.block_insts(block) {
            for &r in func.dfg.inst_results(inst) {
                value_regs.insert(r, Reg::Virtual(builder.alloc_vreg(class_of(func, r))));
            }
        }
    }

    for &block in blocks.iter().rev() {
        for &inst in func.layout.block_insts(block).iter().rev() {
            lower_inst(func, inst, &value_regs, &vcode_block_of, &stack_offsets, &mut builder)?;
        }
        let last = func.dfg.inst_data(func.layout.last_inst(block).expect("verified: non-empty block"));
        let (succs, branch_args): (Vec<VCodeBlock>, Vec<Vec<Reg>>) = match last {
            InstructionData::Jump { destination } => (
                alloc::vec![vcode_block_of[&destination.block]],
                alloc::vec![destination.args.iter().map(|&v| reg_of(&value_regs, v)).collect()],
            ),
            InstructionData::Brif { block_then, block_else, .. } => (
                alloc::vec![vcode_block_of[&block_then.block], vcode_block_of[&block_else.block]],
                alloc::vec![
                    block_then.args.iter().map(|&v| reg_of(&value_regs, v)).collect(),
                    block_else.args.iter().map(|&v| reg_of(&value_regs, v)).collect(),
                ],
            ),
            _ => (Vec::new(), Vec::new()),
        };
        let branch_args: Vec<Vec<crate::machinst::reg::VReg>> = branch_args
            .into_iter()
            .map(|regs: Vec<Reg>| regs.into_iter().map(|r| r.as_virtual().expect("lowering produces virtual regs")).collect())
            .collect();
        let params: Vec<crate::machinst::reg::VReg> = func
            .dfg
            .block_params(block)
            .iter()
            .map(|&p| reg_of(&value_regs, p).as_virtual().expect("lowering produces virtual regs"))
            .collect();
        builder.end_block(Some(block), params, succs, branch_args);
    }

    Ok(builder.finish())
}

fn reg_of(value_regs: &BTreeMap<Value, Reg>, v: Value) -> Reg {
    value_regs[&v]
}

fn lower_inst(
    func: &Function,
    inst: crate::ir::Inst,
    value_regs: &BTreeMap<Value, Reg>,
    vcode_block_of: &BTreeMap<crate::ir::Block, VCodeBlock>,
    stack_offsets: &PrimaryMap<StackSlot, StackSize>,
    builder: &mut VCodeBuilder<Inst>,
) -> Result<(), CodegenError> {
    let data = func.dfg.inst_data(inst).clone();
    let results = func.dfg.inst_results(inst);

    match data {
        InstructionData::UnaryImm { opcode: Opcode::Iconst, imm, .. } => {
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::MovWide {
                rd,
                imm16: (imm & 0xffff) as u16,
                shift: 0,
            });
        }
        InstructionData::UnaryIeee64 { opcode: Opcode::F64const, imm } => {
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::FConst64 { rd, bits: imm });
        }
        InstructionData::Binary {
            opcode: opcode @ (Opcode::Imul | Opcode::Sdiv),
            args,
        } => {
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            let rn = reg_of(value_regs, args[0]);
            let rm = reg_of(value_regs, args[1]);
            builder.push(if opcode == Opcode::Imul {
                Inst::Mul { rd, rn, rm }
            } else {
                Inst::Sdiv { rd, rn, rm }
            });
        }
        InstructionData::Binary { opcode, args } => {
            let op = match opcode {
                Opcode::Iadd => AluOp::Add,
                Opcode::Isub => AluOp::Sub,
                Opcode::Band => AluOp::And,
                Opcode::Bor => AluOp::Orr,
                Opcode::Bxor => AluOp::Eor,
                _ => {
                    return Err(CodegenError::Unsupported(alloc::format!(
                        "{} lowering not implemented",
                        opcode
                    )))
                }
            };
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::AluRRR {
                op,
                rd,
                rn: reg_of(value_regs, args[0]),
                rm: reg_of(value_regs, args[1]),
            });
        }
        InstructionData::IntCompare { cc, args } => {
            // pushed in reverse execution order: CSet (last) before CmpRR (first).
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::CSet {
                rd,
                cond: int_cc_to_cond(cc),
            });
            builder.push(Inst::CmpRR {
                rn: reg_of(value_regs, args[0]),
                rm: reg_of(value_regs, args[1]),
            });
        }
        InstructionData::Load { arg, offset, .. } => {
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::ULoad64 {
                rd,
                rn: reg_of(value_regs, arg),
                offset,
            });
        }
        InstructionData::Store { args, offset } => {
            builder.push(Inst::Store64 {
                rd: reg_of(value_regs, args[0]),
                rn: reg_of(value_regs, args[1]),
                offset,
            });
        }
        InstructionData::StackLoad { slot, offset, .. } => {
            let rd = WritableReg::from_reg(reg_of(value_regs, results[0]));
            builder.push(Inst::ULoad64 {
                rd,
                rn: FP,
                offset: stack_offsets[slot] as i32 + offset,
            });
        }
        InstructionData::StackStore { arg, slot, offset } => {
            builder.push(Inst::Store64 {
                rd: reg_of(value_regs, arg),
                rn: FP,
                offset: stack_offsets[slot] as i32 + offset,
            });
        }
        InstructionData::Jump { destination } => {
            builder.push(Inst::Jump {
                target: vcode_block_of[&destination.block],
            });
        }
        InstructionData::Brif {
            arg,
            block_then,
            block_else,
        } => {
            builder.push(Inst::CompareAndBranch {
                rt: reg_of(value_regs, arg),
                zero: false,
                taken: vcode_block_of[&block_then.block],
                not_taken: vcode_block_of[&block_else.block],
            });
        }
        InstructionData::Call { func_ref, .. } => {
            let name = func.dfg.ext_funcs[func_ref].name.clone();
            builder.push(Inst::Call { name });
        }
        InstructionData::Return { .. } => {
            builder.push(Inst::Ret);
        }
        InstructionData::Trap { code } | InstructionData::Trapz { code, .. } => {
            builder.push(Inst::Trap { code });
        }
        _ => {
            return Err(CodegenError::Unsupported(alloc::format!(
                "{} lowering not implemented",
                data.opcode()
            )))
        }
    }
    Ok(())
}
