//! The ordering of blocks within a function and instructions within a block.
//!
//! [`DataFlowGraph`](super::dfg::DataFlowGraph) owns instruction and value *data*; `Layout` owns
//! their *order*, as two doubly-linked lists (blocks, and instructions within each block) so that
//! inserting or removing an instruction elsewhere in the function doesn't require renumbering
//! anything here.

use crate::ir::{Block, Inst};
use alloc::vec::Vec;
use cranelift_entity::SecondaryMap;

#[derive(Clone, Copy, Default)]
struct BlockNode {
    prev: Option<Block>,
    next: Option<Block>,
    first_inst: Option<Inst>,
    last_inst: Option<Inst>,
}

#[derive(Clone, Copy, Default)]
struct InstNode {
    block: Option<Block>,
    prev: Option<Inst>,
    next: Option<Inst>,
}

/// The linear order of blocks, and of instructions within each block.
#[derive(Default)]
pub struct Layout {
    blocks: SecondaryMap<Block, BlockNode>,
    insts: SecondaryMap<Inst, InstNode>,
    first_block: Option<Block>,
    last_block: Option<Block>,
}

impl Layout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Is `block` present in this layout?
    pub fn is_block_inserted(&self, block: Block) -> bool {
        self.first_block == Some(block) || self.blocks[block].prev.is_some() || self.blocks[block].next.is_some()
    }

    /// Append `block` to the end of the function.
    pub fn append_block(&mut self, block: Block) {
        debug_assert!(!self.is_block_inserted(block));
        if let Some(last) = self.last_block {
            self.blocks[last].next = Some(block);
            self.blocks[block].prev = Some(last);
        } else {
            self.first_block = Some(block);
        }
        self.last_block = Some(block);
    }

    /// The first block in layout order.
    pub fn entry_block(&self) -> Option<Block> {
        self.first_block
    }

    /// The block following `block`, if any.
    pub fn next_block(&self, block: Block) -> Option<Block> {
        self.blocks[block].next
    }

    /// The block preceding `block`, if any.
    pub fn prev_block(&self, block: Block) -> Option<Block> {
        self.blocks[block].prev
    }

    /// Every block, in layout order.
    pub fn blocks(&self) -> Vec<Block> {
        let mut out = Vec::new();
        let mut cur = self.first_block;
        while let Some(b) = cur {
            out.push(b);
            cur = self.blocks[b].next;
        }
        out
    }

    /// Append `inst` to the end of `block`.
    pub fn append_inst(&mut self, inst: Inst, block: Block) {
        debug_assert!(self.insts[inst].block.is_none());
        self.insts[inst].block = Some(block);
        if let Some(last) = self.blocks[block].last_inst {
            self.insts[last].next = Some(inst);
            self.insts[inst].prev = Some(last);
        } else {
            self.blocks[block].first_inst = Some(inst);
        }
        self.blocks[block].last_inst = Some(inst);
    }

    /// The block `inst` belongs to, if inserted.
    pub fn inst_block(&self, inst: Inst) -> Option<Block> {
        self.insts[inst].block
    }

    /// The instruction following `inst` within its block, if any.
    pub fn next_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].next
    }

    /// The instruction preceding `inst` within its block, if any.
    pub fn prev_inst(&self, inst: Inst) -> Option<Inst> {
        self.insts[inst].prev
    }

    /// Every instruction of `block`, in layout order.
    pub fn block_insts(&self, block: Block) -> Vec<Inst> {
        let mut out = Vec::new();
        let mut cur = self.blocks[block].first_inst;
        while let Some(i) = cur {
            out.push(i);
            cur = self.insts[i].next;
        }
        out
    }

    /// The last instruction of `block` (its terminator, once the function is well-formed).
    pub fn last_inst(&self, block: Block) -> Option<Inst> {
        self.blocks[block].last_inst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_appended_in_order() {
        let mut layout = Layout::new();
        let b0 = Block::new(0);
        let b1 = Block::new(1);
        layout.append_block(b0);
        layout.append_block(b1);
        assert_eq!(layout.blocks(), alloc::vec![b0, b1]);
        assert_eq!(layout.entry_block(), Some(b0));
        assert_eq!(layout.next_block(b0), Some(b1));
    }

    #[test]
    fn instructions_are_appended_within_their_block() {
        let mut layout = Layout::new();
        let b0 = Block::new(0);
        layout.append_block(b0);
        let i0 = Inst::new(0);
        let i1 = Inst::new(1);
        layout.append_inst(i0, b0);
        layout.append_inst(i1, b0);
        assert_eq!(layout.block_insts(b0), alloc::vec![i0, i1]);
        assert_eq!(layout.inst_block(i1), Some(b0));
        assert_eq!(layout.last_inst(b0), Some(i1));
    }
}
