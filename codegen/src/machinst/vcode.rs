//! The virtual-register machine-instruction container produced by lowering.
//!
//! Lowering walks a [`crate::ir::Function`] one [`crate::ir::Block`] at a time, but within a
//! block it visits instructions from the *last* to the *first* so that a value's uses are known
//! before its def is lowered (this lets instruction selection fuse a def into its single use,
//! e.g. folding an add into an addressing mode). [`VCodeBuilder`] accumulates machine
//! instructions in this reverse order and [`VCodeBuilder::finish`] reverses them back into
//! program order, matching the emitted block order to the original layout.

use crate::ir::Block as IrBlock;
use alloc::vec::Vec;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};

use super::reg::{OperandDescriptor, VReg};

/// A block index within the lowered [`VCode`]. Not the same entity as [`crate::ir::Block`],
/// though the lowering driver keeps a 1:1 mapping from IR blocks to VCode blocks (plus any extra
/// blocks a backend splits out, e.g. for out-of-line traps).
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct VCodeBlock(u32);
entity_impl!(VCodeBlock, "vblock");

/// An instruction index within the lowered [`VCode`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct VCodeInst(u32);
entity_impl!(VCodeInst, "vinst");

/// A target-specific machine instruction, opaque to the lowering driver.
///
/// Each backend defines its own concrete instruction type and implements this trait so the
/// driver can query register operands without knowing the instruction's shape.
pub trait MachInst: Clone {
    /// Every register operand this instruction reads or writes, in a stable order the register
    /// allocator can rely on.
    fn operands(&self) -> Vec<OperandDescriptor>;

    /// If this is an unconditional jump to a single [`VCodeBlock`], which one.
    fn is_uncond_branch(&self) -> Option<VCodeBlock>;

    /// If this is a conditional branch, the (taken, not-taken) successor blocks.
    fn is_cond_branch(&self) -> Option<(VCodeBlock, VCodeBlock)>;

    /// Whether this instruction is a function return.
    fn is_ret(&self) -> bool;

    /// Replace every virtual register in this instruction's operands with whatever
    /// `map` maps it to (a physical register). Called once per instruction after register
    /// allocation.
    fn map_regs(&mut self, map: &mut dyn FnMut(VReg) -> super::reg::PReg);
}

/// The lowered machine-instruction form of a function, indexed by [`VCodeBlock`]/[`VCodeInst`]
/// and still referencing virtual registers. This is the input to register allocation and the
/// output of the lowering driver described in
/// [`crate::machinst`](super).
pub struct VCode<I: MachInst> {
    insts: PrimaryMap<VCodeInst, I>,
    /// Instructions belonging to each block, in final program order.
    block_insts: SecondaryMap<VCodeBlock, Vec<VCodeInst>>,
    /// Successor blocks of each block, for building the control-flow graph regalloc2 needs.
    block_succs: SecondaryMap<VCodeBlock, Vec<VCodeBlock>>,
    /// Virtual registers bound by each block's parameters, in declaration order.
    block_params: SecondaryMap<VCodeBlock, Vec<VReg>>,
    /// Per successor (same order as `block_succs`), the virtual registers the block's terminator
    /// passes as that successor's block-parameter values.
    branch_args: SecondaryMap<VCodeBlock, Vec<Vec<VReg>>>,
    block_order: Vec<VCodeBlock>,
    /// Which original IR block each VCode block lowers, if any (split/synthetic blocks have
    /// none).
    source_block: SecondaryMap<VCodeBlock, Option<IrBlock>>,
    num_vregs: u32,
}

impl<I: MachInst> VCode<I> {
    /// Instructions of `block`, in program order.
    pub fn block_insts(&self, block: VCodeBlock) -> &[VCodeInst] {
        &self.block_insts[block]
    }

    /// Successor blocks of `block`.
    pub fn block_succs(&self, block: VCodeBlock) -> &[VCodeBlock] {
        &self.block_succs[block]
    }

    /// Virtual registers bound by `block`'s parameters, in declaration order.
    pub fn block_params(&self, block: VCodeBlock) -> &[VReg] {
        &self.block_params[block]
    }

    /// The virtual registers `block`'s terminator passes to successor `succ_idx` (indexing into
    /// [`Self::block_succs`]) as that successor's block-parameter values.
    pub fn branch_args(&self, block: VCodeBlock, succ_idx: usize) -> &[VReg] {
        &self.branch_args[block][succ_idx]
    }

    /// All blocks, in program order.
    pub fn block_order(&self) -> &[VCodeBlock] {
        &self.block_order
    }

    /// The instruction at `inst`.
    pub fn inst(&self, inst: VCodeInst) -> &I {
        &self.insts[inst]
    }

    /// The instruction at `inst`, mutably (used by register allocation to rewrite operands).
    pub fn inst_mut(&mut self, inst: VCodeInst) -> &mut I {
        &mut self.insts[inst]
    }

    /// The IR block `block` was lowered from, if it wasn't synthesized by the backend.
    pub fn source_block(&self, block: VCodeBlock) -> Option<IrBlock> {
        self.source_block[block]
    }

    /// Total number of distinct virtual registers allocated during lowering.
    pub fn num_vregs(&self) -> u32 {
        self.num_vregs
    }

    /// Iterate every instruction across every block, in program order.
    pub fn insts_in_order(&self) -> impl Iterator<Item = VCodeInst> + '_ {
        self.block_order
            .iter()
            .flat_map(move |&b| self.block_insts[b].iter().copied())
    }
}

/// Builds a [`VCode`] by appending instructions in reverse (last-to-first within a block,
/// blocks visited in reverse program order), as the lowering driver naturally produces them.
pub struct VCodeBuilder<I: MachInst> {
    insts: PrimaryMap<VCodeInst, I>,
    /// Instructions of the block currently being built, in reverse (last-emitted-first) order.
    cur_block_insts: Vec<VCodeInst>,
    /// Finished blocks, in reverse (last-visited-first) order; each entry's instructions are
    /// still reversed and get un-reversed in [`Self::finish`].
    finished_blocks: Vec<(Option<IrBlock>, Vec<VCodeInst>, Vec<VReg>, Vec<VCodeBlock>, Vec<Vec<VReg>>)>,
    next_vreg: u32,
}

impl<I: MachInst> Default for VCodeBuilder<I> {
    fn default() -> Self {
        Self {
            insts: PrimaryMap::new(),
            cur_block_insts: Vec::new(),
            finished_blocks: Vec::new(),
            next_vreg: 0,
        }
    }
}

impl<I: MachInst> VCodeBuilder<I> {
    /// A builder with no instructions yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh virtual register in register bank `class`.
    pub fn alloc_vreg(&mut self, class: super::reg::RegClass) -> VReg {
        let v = VReg::new(self.next_vreg, class);
        self.next_vreg += 1;
        v
    }

    /// Append `inst` to the block currently being built. Instructions within a block must be
    /// pushed in reverse program order (last instruction of the block first).
    pub fn push(&mut self, inst: I) -> VCodeInst {
        let idx = self.insts.push(inst);
        self.cur_block_insts.push(idx);
        idx
    }

    /// Close out the block currently being built: `params` are the virtual registers bound by
    /// its block parameters, `succs` the blocks it can fall through or branch to, and
    /// `branch_args` (one entry per `succs` element, same order) the virtual registers its
    /// terminator passes as that successor's block-parameter values. Blocks must be closed in
    /// reverse program order (the function's last block first).
    pub fn end_block(
        &mut self,
        source_block: Option<IrBlock>,
        params: Vec<VReg>,
        succs: Vec<VCodeBlock>,
        branch_args: Vec<Vec<VReg>>,
    ) -> VCodeBlock {
        debug_assert_eq!(succs.len(), branch_args.len());
        let insts = core::mem::take(&mut self.cur_block_insts);
        let idx = self.finished_blocks.len();
        self.finished_blocks.push((source_block, insts, params, succs, branch_args));
        VCodeBlock(idx as u32)
    }

    /// Finish building, reversing both block order and each block's instruction order back into
    /// normal forward program order.
    pub fn finish(self) -> VCode<I> {
        let mut block_order = Vec::with_capacity(self.finished_blocks.len());
        let mut block_insts = SecondaryMap::new();
        let mut block_succs = SecondaryMap::new();
        let mut block_params = SecondaryMap::new();
        let mut branch_args = SecondaryMap::new();
        let mut source_block = SecondaryMap::new();

        let n = self.finished_blocks.len();
        for (rev_idx, (src, mut insts, params, succs, args)) in self.finished_blocks.into_iter().enumerate() {
            insts.reverse();
            // Blocks were closed last-visited-first; the block closed first (index n-1) is the
            // function's first block in program order.
            let block = VCodeBlock((n - 1 - rev_idx) as u32);
            block_order.push(block);
            block_insts[block] = insts;
            block_succs[block] = succs;
            block_params[block] = params;
            branch_args[block] = args;
            source_block[block] = src;
        }
        block_order.reverse();
        block_order.sort_by_key(|b| b.0);

        VCode {
            insts: self.insts,
            block_insts,
            block_succs,
            block_params,
            branch_args,
            block_order,
            source_block,
            num_vregs: self.next_vreg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machinst::reg::{OperandKind, PReg, Reg, RegClass};

    #[derive(Clone)]
    struct FakeInst {
        def: VReg,
        use_: VReg,
    }

    impl MachInst for FakeInst {
        fn operands(&self) -> Vec<OperandDescriptor> {
            alloc::vec![
                OperandDescriptor {
                    reg: Reg::Virtual(self.def),
                    kind: OperandKind::Def,
                    class: RegClass::Int,
                    fixed: None,
                },
                OperandDescriptor {
                    reg: Reg::Virtual(self.use_),
                    kind: OperandKind::Use,
                    class: RegClass::Int,
                    fixed: None,
                },
            ]
        }
        fn is_uncond_branch(&self) -> Option<VCodeBlock> {
            None
        }
        fn is_cond_branch(&self) -> Option<(VCodeBlock, VCodeBlock)> {
            None
        }
        fn is_ret(&self) -> bool {
            false
        }
        fn map_regs(&mut self, map: &mut dyn FnMut(VReg) -> PReg) {
            let _ = map(self.def);
        }
    }

    #[test]
    fn builder_reverses_back_into_program_order() {
        let mut b = VCodeBuilder::<FakeInst>::new();
        let v0 = b.alloc_vreg(RegClass::Int);
        let v1 = b.alloc_vreg(RegClass::Int);

        // Function has two blocks; lowering visits block 1 first, then block 0, and within
        // each block pushes its single instruction (there's only one each here).
        b.push(FakeInst { def: v1, use_: v0 });
        let blk1 = b.end_block(None, alloc::vec![v1], Vec::new(), Vec::new());

        b.push(FakeInst { def: v0, use_: v0 });
        let blk0 = b.end_block(None, Vec::new(), alloc::vec![blk1], alloc::vec![alloc::vec![v0]]);

        let vcode = b.finish();
        assert_eq!(vcode.block_order(), &[VCodeBlock(0), VCodeBlock(1)]);
        assert_eq!(vcode.block_insts(VCodeBlock(0)).len(), 1);
        assert_eq!(vcode.block_succs(VCodeBlock(0)), &[VCodeBlock(1)]);
        assert_eq!(vcode.block_params(VCodeBlock(1)), &[v1]);
        assert_eq!(vcode.branch_args(VCodeBlock(0), 0), &[v0]);
        let _ = blk0;
        assert_eq!(vcode.num_vregs(), 2);
    }
}
