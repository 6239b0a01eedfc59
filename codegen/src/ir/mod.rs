//! The typed SSA intermediate representation: entities, instructions, the data-flow graph, and
//! the function container built from them.

mod builder;
pub mod dfg;
pub mod entities;
mod extfunc;
mod extname;
pub mod function;
pub mod instructions;
pub mod layout;
pub mod stackslot;
mod trapcode;
pub mod types;

pub use crate::ir::builder::{BuilderError, FunctionBuilder, InstBuilder};
pub use crate::ir::dfg::{DataFlowGraph, SigIdx, ValueDef};
pub use crate::ir::entities::{Block, FuncRef, GlobalValue, Inst, SigRef, StackSlot, Value};
pub use crate::ir::extfunc::{AbiParam, ArgumentExtension, ArgumentPurpose, ExtFuncData, Signature};
pub use crate::ir::extname::ExternalName;
pub use crate::ir::function::Function;
pub use crate::ir::instructions::{BlockCall, InstructionData, IntCC, Opcode};
pub use crate::ir::layout::Layout;
pub use crate::ir::stackslot::{StackSize, StackSlotData, StackSlotKind, StackSlots};
pub use crate::ir::trapcode::TrapCode;
pub use crate::ir::types::Type;
