//! The data-flow graph: instruction data, value provenance, and block parameters.

use crate::ir::{Block, ExtFuncData, Inst, InstructionData, Opcode, SigRef, Signature, Type, Value};
use alloc::vec::Vec;
use cranelift_entity::{entity_impl, PrimaryMap, SecondaryMap};

/// Where a [`Value`] comes from: either the Nth result of an instruction, or the Nth parameter
/// of a block.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValueDef {
    /// Result number `num` of `inst`.
    Result(Inst, usize),
    /// Parameter number `num` of `block`.
    Param(Block, usize),
}

#[derive(Clone, Debug)]
struct ValueData {
    def: ValueDef,
    ty: Type,
}

/// A reference to a function signature, indexing [`DataFlowGraph::signatures`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, PartialOrd, Ord)]
pub struct SigIdx(u32);
entity_impl!(SigIdx, "sigidx");

/// The data-flow graph of a single function: every instruction's operands and result types,
/// every value's defining instruction or block parameter, and the preamble of referenced
/// signatures and external functions.
#[derive(Default)]
pub struct DataFlowGraph {
    insts: PrimaryMap<Inst, InstructionData>,
    /// Result values of each instruction, in result order.
    results: SecondaryMap<Inst, Vec<Value>>,
    values: PrimaryMap<Value, ValueData>,
    /// Parameter values of each block, in parameter order.
    block_params: SecondaryMap<Block, Vec<Value>>,
    /// Declared call signatures (the `sig0`, `sig1`, ... preamble).
    pub signatures: PrimaryMap<SigRef, Signature>,
    /// Declared external functions (the `fn0`, `fn1`, ... preamble).
    pub ext_funcs: PrimaryMap<crate::ir::FuncRef, ExtFuncData>,
}

impl DataFlowGraph {
    /// An empty data-flow graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `data` as a fresh instruction, with no results yet (call
    /// [`Self::append_result`] for each of its result types).
    pub fn make_inst(&mut self, data: InstructionData) -> Inst {
        let inst = self.insts.push(data);
        self.results[inst] = Vec::new();
        inst
    }

    /// The operand data of `inst`.
    pub fn inst_data(&self, inst: Inst) -> &InstructionData {
        &self.insts[inst]
    }

    /// The operand data of `inst`, mutably.
    pub fn inst_data_mut(&mut self, inst: Inst) -> &mut InstructionData {
        &mut self.insts[inst]
    }

    /// The opcode of `inst`.
    pub fn opcode(&self, inst: Inst) -> Opcode {
        self.insts[inst].opcode()
    }

    /// Value operands read by `inst`.
    pub fn inst_args(&self, inst: Inst) -> Vec<Value> {
        self.insts[inst].arguments()
    }

    /// Result values produced by `inst`, in result order.
    pub fn inst_results(&self, inst: Inst) -> &[Value] {
        &self.results[inst]
    }

    /// Append a new result value of type `ty` to `inst`, returning it.
    pub fn append_result(&mut self, inst: Inst, ty: Type) -> Value {
        let num = self.results[inst].len();
        let value = self.values.push(ValueData {
            def: ValueDef::Result(inst, num),
            ty,
        });
        self.results[inst].push(value);
        value
    }

    /// The type of `value`.
    pub fn value_type(&self, value: Value) -> Type {
        self.values[value].ty
    }

    /// What defines `value`: an instruction result or a block parameter.
    pub fn value_def(&self, value: Value) -> ValueDef {
        self.values[value].def
    }

    /// Append a new parameter of type `ty` to `block`, returning it.
    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        let num = self.block_params[block].len();
        let value = self.values.push(ValueData {
            def: ValueDef::Param(block, num),
            ty,
        });
        self.block_params[block].push(value);
        value
    }

    /// Parameter values of `block`, in parameter order.
    pub fn block_params(&self, block: Block) -> &[Value] {
        &self.block_params[block]
    }

    /// Total number of values defined so far.
    pub fn num_values(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::I32;

    #[test]
    fn instruction_results_accumulate_in_order() {
        let mut dfg = DataFlowGraph::new();
        let inst = dfg.make_inst(InstructionData::UnaryImm {
            opcode: Opcode::Iconst,
            imm: 7,
            ty: I32,
        });
        let v0 = dfg.append_result(inst, I32);
        assert_eq!(dfg.inst_results(inst), &[v0]);
        assert_eq!(dfg.value_type(v0), I32);
        assert_eq!(dfg.value_def(v0), ValueDef::Result(inst, 0));
    }

    #[test]
    fn block_params_are_tracked_per_block() {
        let mut dfg = DataFlowGraph::new();
        let b0 = Block::new(0);
        let p0 = dfg.append_block_param(b0, I32);
        let p1 = dfg.append_block_param(b0, I32);
        assert_eq!(dfg.block_params(b0), &[p0, p1]);
        assert_eq!(dfg.value_def(p1), ValueDef::Param(b0, 1));
    }
}
