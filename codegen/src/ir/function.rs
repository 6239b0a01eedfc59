//! The top-level IR container for one function.

use crate::ir::dfg::DataFlowGraph;
use crate::ir::layout::Layout;
use crate::ir::stackslot::StackSize;
use crate::ir::{Block, ExternalName, Inst, InstructionData, Signature, StackSlot, StackSlotData, Type, Value};
use alloc::string::String;
use cranelift_entity::PrimaryMap;

/// A function, in the typed SSA intermediate representation: its signature, the blocks and
/// instructions that implement it ([`DataFlowGraph`] for operand data, [`Layout`] for their
/// order), and its stack frame layout.
pub struct Function {
    /// The function's external name, used in disassembly and relocations.
    pub name: ExternalName,
    /// The function's calling convention and parameter/return types.
    pub signature: Signature,
    /// Instruction and value data.
    pub dfg: DataFlowGraph,
    /// Block and instruction order.
    pub layout: Layout,
    /// Explicit stack allocations (spill slots are allocated separately, by register
    /// allocation).
    pub stack_slots: PrimaryMap<StackSlot, StackSlotData>,
}

impl Function {
    /// An empty function named `name` with signature `signature`.
    pub fn with_name_signature(name: ExternalName, signature: Signature) -> Self {
        Function {
            name,
            signature,
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
            stack_slots: PrimaryMap::new(),
        }
    }

    /// Create a new, empty basic block and append it to the layout.
    pub fn create_block(&mut self) -> Block {
        // Blocks are plain entities with no side table of their own; `dfg.block_params` and
        // `layout`'s per-block lists grow lazily via `SecondaryMap` as they're touched, so simply
        // minting a fresh index and appending it to the layout is enough to bring it into
        // existence.
        let block = self.next_block();
        self.layout.append_block(block);
        block
    }

    fn next_block(&self) -> Block {
        Block::new(self.layout.blocks().len())
    }

    /// Declare a new stack slot in the function's preamble.
    pub fn create_stack_slot(&mut self, data: StackSlotData) -> StackSlot {
        self.stack_slots.push(data)
    }

    /// Frame-relative byte offset of every declared stack slot, in declaration order, and the
    /// total frame size — each slot packed at the largest alignment its size supports (up to
    /// `align`), the whole frame then rounded up to `align`.
    pub fn layout_stack_slots(&self, align: StackSize) -> (PrimaryMap<StackSlot, StackSize>, StackSize) {
        let mut offsets = PrimaryMap::new();
        let mut cursor: StackSize = 0;
        for (_slot, data) in self.stack_slots.iter() {
            let slot_align = data.alignment(align).max(1);
            cursor = (cursor + slot_align - 1) / slot_align * slot_align;
            offsets.push(cursor);
            cursor += data.size;
        }
        let frame_size = if cursor == 0 { 0 } else { (cursor + align - 1) / align * align };
        (offsets, frame_size)
    }

    /// Append a new instruction with operand data `data` to the end of `block`, and append one
    /// result value of each type in `result_types`.
    pub fn append_inst(&mut self, block: Block, data: InstructionData, result_types: &[Type]) -> (Inst, alloc::vec::Vec<Value>) {
        let inst = self.dfg.make_inst(data);
        self.layout.append_inst(inst, block);
        let results = result_types
            .iter()
            .map(|&ty| self.dfg.append_result(inst, ty))
            .collect();
        (inst, results)
    }

    /// A human-readable name for disassembly output.
    pub fn display_name(&self) -> String {
        alloc::format!("{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::I32;
    use crate::ir::{InstructionData, Opcode};
    use crate::isa::CallConv;

    #[test]
    fn blocks_and_instructions_compose_into_a_function() {
        let mut func = Function::with_name_signature(
            ExternalName::user(0, 0),
            Signature::new(CallConv::SystemV),
        );
        let b0 = func.create_block();
        let p0 = func.dfg.append_block_param(b0, I32);
        let (inst, results) = func.append_inst(
            b0,
            InstructionData::Binary {
                opcode: Opcode::Iadd,
                args: [p0, p0],
            },
            &[I32],
        );
        assert_eq!(func.layout.block_insts(b0), alloc::vec![inst]);
        assert_eq!(results.len(), 1);
        assert_eq!(func.dfg.value_type(results[0]), I32);
    }
}
