//! Instruction opcodes and their operand encodings.
//!
//! The full instruction set distinguishes many more opcodes than are modeled here; this is a
//! representative subset spanning every instruction *shape* lowering needs to handle (constants,
//! binary arithmetic, memory access, calls, and every terminator kind), so a backend's lowering
//! pass and the pattern DSL both exercise the same variety of operand encodings a complete
//! instruction set would.

use crate::ir::{Block, FuncRef, StackSlot, TrapCode, Type, Value};
use alloc::vec::Vec;
use core::fmt;

/// Which operation an instruction performs.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Opcode {
    /// Materialize an integer constant.
    Iconst,
    /// Materialize a floating-point constant.
    F64const,
    /// Integer addition.
    Iadd,
    /// Integer subtraction.
    Isub,
    /// Integer multiplication.
    Imul,
    /// Signed integer division; traps on divide-by-zero and on overflow.
    Sdiv,
    /// Bitwise AND.
    Band,
    /// Bitwise OR.
    Bor,
    /// Bitwise XOR.
    Bxor,
    /// Integer comparison, producing a boolean value.
    Icmp,
    /// Load a value from memory.
    Load,
    /// Store a value to memory.
    Store,
    /// Load a value from a function-local stack slot.
    StackLoad,
    /// Store a value to a function-local stack slot.
    StackStore,
    /// Unconditional jump to a block, passing block arguments.
    Jump,
    /// Conditional branch: jump to one of two blocks depending on a boolean value.
    Brif,
    /// Direct call to a known function.
    Call,
    /// Return from the function, with result values.
    Return,
    /// Unconditionally trap.
    Trap,
    /// Trap if a condition is false.
    Trapz,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Opcode::Iconst => "iconst",
            Opcode::F64const => "f64const",
            Opcode::Iadd => "iadd",
            Opcode::Isub => "isub",
            Opcode::Imul => "imul",
            Opcode::Sdiv => "sdiv",
            Opcode::Band => "band",
            Opcode::Bor => "bor",
            Opcode::Bxor => "bxor",
            Opcode::Icmp => "icmp",
            Opcode::Load => "load",
            Opcode::Store => "store",
            Opcode::StackLoad => "stack_load",
            Opcode::StackStore => "stack_store",
            Opcode::Jump => "jump",
            Opcode::Brif => "brif",
            Opcode::Call => "call",
            Opcode::Return => "return",
            Opcode::Trap => "trap",
            Opcode::Trapz => "trapz",
        };
        f.write_str(s)
    }
}

impl Opcode {
    /// Whether this opcode ends a block (every block's last instruction must be one of these).
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Brif | Opcode::Return | Opcode::Trap)
    }

    /// Whether this opcode can branch to another block.
    pub fn is_branch(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::Brif)
    }

    /// Whether this opcode can trap at runtime.
    pub fn can_trap(self) -> bool {
        matches!(self, Opcode::Sdiv | Opcode::Trap | Opcode::Trapz)
    }
}

/// An integer comparison predicate, used by [`InstructionData::IntCompare`].
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum IntCC {
    Equal,
    NotEqual,
    SignedLessThan,
    SignedGreaterThanOrEqual,
    SignedGreaterThan,
    SignedLessThanOrEqual,
}

/// A target block plus the values passed as its block parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockCall {
    /// The destination block.
    pub block: Block,
    /// Arguments passed to the block's parameters.
    pub args: Vec<Value>,
}

/// The operands of one instruction, tagged by shape. Every [`Opcode`] above maps to exactly one
/// of these variants; [`InstructionData::opcode`] recovers it.
#[derive(Clone, Debug, PartialEq)]
pub enum InstructionData {
    /// A 64-bit immediate, no value operands: [`Opcode::Iconst`].
    UnaryImm { opcode: Opcode, imm: i64, ty: Type },
    /// A 64-bit float immediate: [`Opcode::F64const`].
    UnaryIeee64 { opcode: Opcode, imm: u64 },
    /// Two value operands, one result: [`Opcode::Iadd`]/[`Isub`]/[`Imul`]/[`Sdiv`]/[`Band`]/[`Bor`]/[`Bxor`].
    Binary { opcode: Opcode, args: [Value; 2] },
    /// An integer comparison: [`Opcode::Icmp`].
    IntCompare { cc: IntCC, args: [Value; 2] },
    /// A memory load: [`Opcode::Load`].
    Load { ty: Type, arg: Value, offset: i32 },
    /// A memory store: [`Opcode::Store`].
    Store {
        args: [Value; 2], // [value, address]
        offset: i32,
    },
    /// A load from a function-local stack slot: [`Opcode::StackLoad`].
    StackLoad { ty: Type, slot: StackSlot, offset: i32 },
    /// A store to a function-local stack slot: [`Opcode::StackStore`].
    StackStore { arg: Value, slot: StackSlot, offset: i32 },
    /// An unconditional jump: [`Opcode::Jump`].
    Jump { destination: BlockCall },
    /// A conditional branch: [`Opcode::Brif`].
    Brif {
        arg: Value,
        block_then: BlockCall,
        block_else: BlockCall,
    },
    /// A direct call: [`Opcode::Call`].
    Call { func_ref: FuncRef, args: Vec<Value> },
    /// A function return: [`Opcode::Return`].
    Return { args: Vec<Value> },
    /// An unconditional trap: [`Opcode::Trap`].
    Trap { code: TrapCode },
    /// A conditional trap, taken when `arg` is zero: [`Opcode::Trapz`].
    Trapz { arg: Value, code: TrapCode },
}

impl InstructionData {
    /// The opcode this instruction data represents.
    pub fn opcode(&self) -> Opcode {
        match self {
            InstructionData::UnaryImm { opcode, .. } => *opcode,
            InstructionData::UnaryIeee64 { opcode, .. } => *opcode,
            InstructionData::Binary { opcode, .. } => *opcode,
            InstructionData::IntCompare { .. } => Opcode::Icmp,
            InstructionData::Load { .. } => Opcode::Load,
            InstructionData::Store { .. } => Opcode::Store,
            InstructionData::StackLoad { .. } => Opcode::StackLoad,
            InstructionData::StackStore { .. } => Opcode::StackStore,
            InstructionData::Jump { .. } => Opcode::Jump,
            InstructionData::Brif { .. } => Opcode::Brif,
            InstructionData::Call { .. } => Opcode::Call,
            InstructionData::Return { .. } => Opcode::Return,
            InstructionData::Trap { .. } => Opcode::Trap,
            InstructionData::Trapz { .. } => Opcode::Trapz,
        }
    }

    /// The value operands this instruction reads, in operand order. Block call arguments are
    /// included for branch instructions.
    pub fn arguments(&self) -> Vec<Value> {
        match self {
            InstructionData::UnaryImm { .. } | InstructionData::UnaryIeee64 { .. } => Vec::new(),
            InstructionData::Binary { args, .. } => args.to_vec(),
            InstructionData::IntCompare { args, .. } => args.to_vec(),
            InstructionData::Load { arg, .. } => alloc::vec![*arg],
            InstructionData::Store { args, .. } => args.to_vec(),
            InstructionData::StackLoad { .. } => Vec::new(),
            InstructionData::StackStore { arg, .. } => alloc::vec![*arg],
            InstructionData::Jump { destination } => destination.args.clone(),
            InstructionData::Brif {
                arg,
                block_then,
                block_else,
            } => {
                let mut v = alloc::vec![*arg];
                v.extend_from_slice(&block_then.args);
                v.extend_from_slice(&block_else.args);
                v
            }
            InstructionData::Call { args, .. } => args.clone(),
            InstructionData::Return { args } => args.clone(),
            InstructionData::Trap { .. } => Vec::new(),
            InstructionData::Trapz { arg, .. } => alloc::vec![*arg],
        }
    }

    /// Blocks this instruction can branch to, if any.
    pub fn branch_destinations(&self) -> Vec<Block> {
        match self {
            InstructionData::Jump { destination } => alloc::vec![destination.block],
            InstructionData::Brif {
                block_then, block_else, ..
            } => alloc::vec![block_then.block, block_else.block],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_round_trips_through_instruction_data() {
        let data = InstructionData::Binary {
            opcode: Opcode::Iadd,
            args: [Value::new(0), Value::new(1)],
        };
        assert_eq!(data.opcode(), Opcode::Iadd);
        assert_eq!(data.arguments().len(), 2);
    }

    #[test]
    fn jump_reports_its_destination_block() {
        let data = InstructionData::Jump {
            destination: BlockCall {
                block: Block::new(3),
                args: Vec::new(),
            },
        };
        assert_eq!(data.branch_destinations(), alloc::vec![Block::new(3)]);
    }

    #[test]
    fn terminator_classification() {
        assert!(Opcode::Return.is_terminator());
        assert!(!Opcode::Iadd.is_terminator());
        assert!(Opcode::Brif.is_branch());
    }
}
