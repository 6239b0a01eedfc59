//! A convenience API for constructing a [`Function`] one instruction at a time, stateful with
//! respect to a "current block" rather than requiring every append to name its block explicitly.

use crate::ir::{Block, BlockCall, FuncRef, Function, InstructionData, IntCC, Opcode, StackSlot, TrapCode, Type, Value};
use alloc::vec::Vec;
use core::fmt;

/// Why a [`FunctionBuilder`] operation was rejected.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// An instruction was appended before any [`FunctionBuilder::switch_to_block`] call, or after
    /// the current block's terminator.
    NoCurrentBlock,
    /// An operation's value operands disagree on type.
    TypeMismatch {
        /// The type of the first operand considered.
        expected: Type,
        /// The type of the operand that didn't match it.
        found: Type,
    },
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BuilderError::NoCurrentBlock => write!(f, "no current block"),
            BuilderError::TypeMismatch { expected, found } => {
                write!(f, "type mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

/// Builds up a [`Function`] by appending instructions to whichever block is currently selected.
pub struct FunctionBuilder<'f> {
    func: &'f mut Function,
    current_block: Option<Block>,
}

impl<'f> FunctionBuilder<'f> {
    /// Begin building on top of `func`, with no block selected yet.
    pub fn new(func: &'f mut Function) -> Self {
        FunctionBuilder {
            func,
            current_block: None,
        }
    }

    /// The function built so far.
    pub fn func(&self) -> &Function {
        self.func
    }

    /// Create a new, empty block. Does not select it; call [`Self::switch_to_block`] to append
    /// instructions to it.
    pub fn create_block(&mut self) -> Block {
        self.func.create_block()
    }

    /// Append a parameter of type `ty` to `block`, returning the value it binds.
    pub fn append_block_param(&mut self, block: Block, ty: Type) -> Value {
        self.func.dfg.append_block_param(block, ty)
    }

    /// Select `block` as the target of subsequent `ins()` calls.
    pub fn switch_to_block(&mut self, block: Block) {
        self.current_block = Some(block);
    }

    /// The block currently selected, if any.
    pub fn current_block(&self) -> Option<Block> {
        self.current_block
    }

    /// The instruction-appending interface.
    pub fn ins(&mut self) -> InstBuilder<'_, 'f> {
        InstBuilder { builder: self }
    }
}

/// One instruction-appending method per opcode, each constructing the matching
/// [`InstructionData`] and appending it to the builder's current block.
pub struct InstBuilder<'a, 'f> {
    builder: &'a mut FunctionBuilder<'f>,
}

impl<'a, 'f> InstBuilder<'a, 'f> {
    fn block(&self) -> Result<Block, BuilderError> {
        self.builder.current_block.ok_or(BuilderError::NoCurrentBlock)
    }

    fn value_type(&self, v: Value) -> Type {
        self.builder.func.dfg.value_type(v)
    }

    fn same_type(&self, a: Value, b: Value) -> Result<Type, BuilderError> {
        let ty = self.value_type(a);
        let other = self.value_type(b);
        if ty == other {
            Ok(ty)
        } else {
            Err(BuilderError::TypeMismatch { expected: ty, found: other })
        }
    }

    /// Materialize the integer constant `imm` as a value of type `ty`.
    pub fn iconst(&mut self, ty: Type, imm: i64) -> Result<Value, BuilderError> {
        let block = self.block()?;
        let data = InstructionData::UnaryImm { opcode: Opcode::Iconst, imm, ty };
        let (_, results) = self.builder.func.append_inst(block, data, &[ty]);
        Ok(results[0])
    }

    /// Materialize the float constant `imm` as an `f64` value.
    pub fn f64const(&mut self, imm: f64) -> Result<Value, BuilderError> {
        let block = self.block()?;
        let data = InstructionData::UnaryIeee64 {
            opcode: Opcode::F64const,
            imm: imm.to_bits(),
        };
        let (_, results) = self.builder.func.append_inst(block, data, &[Type::F64]);
        Ok(results[0])
    }

    fn binary(&mut self, opcode: Opcode, a: Value, b: Value) -> Result<Value, BuilderError> {
        let block = self.block()?;
        let ty = self.same_type(a, b)?;
        let data = InstructionData::Binary { opcode, args: [a, b] };
        let (_, results) = self.builder.func.append_inst(block, data, &[ty]);
        Ok(results[0])
    }

    pub fn iadd(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Iadd, a, b)
    }

    pub fn isub(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Isub, a, b)
    }

    pub fn imul(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Imul, a, b)
    }

    pub fn sdiv(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Sdiv, a, b)
    }

    pub fn band(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Band, a, b)
    }

    pub fn bor(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Bor, a, b)
    }

    pub fn bxor(&mut self, a: Value, b: Value) -> Result<Value, BuilderError> {
        self.binary(Opcode::Bxor, a, b)
    }

    /// Compare `a` and `b` under `cc`, producing an `i8` boolean result.
    pub fn icmp(&mut self, cc: IntCC, a: Value, b: Value) -> Result<Value, BuilderError> {
        let block = self.block()?;
        self.same_type(a, b)?;
        let data = InstructionData::IntCompare { cc, args: [a, b] };
        let (_, results) = self.builder.func.append_inst(block, data, &[Type::I8]);
        Ok(results[0])
    }

    /// Load a value of type `ty` from `addr + offset`.
    pub fn load(&mut self, ty: Type, addr: Value, offset: i32) -> Result<Value, BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Load { ty, arg: addr, offset };
        let (_, results) = self.builder.func.append_inst(block, data, &[ty]);
        Ok(results[0])
    }

    /// Store `value` to `addr + offset`.
    pub fn store(&mut self, value: Value, addr: Value, offset: i32) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Store { args: [value, addr], offset };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    /// Load a value of type `ty` from `slot + offset`.
    pub fn stack_load(&mut self, ty: Type, slot: StackSlot, offset: i32) -> Result<Value, BuilderError> {
        let block = self.block()?;
        let data = InstructionData::StackLoad { ty, slot, offset };
        let (_, results) = self.builder.func.append_inst(block, data, &[ty]);
        Ok(results[0])
    }

    /// Store `value` to `slot + offset`.
    pub fn stack_store(&mut self, value: Value, slot: StackSlot, offset: i32) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::StackStore { arg: value, slot, offset };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    /// Jump unconditionally to `destination`, passing `args` as its block parameters.
    pub fn jump(&mut self, destination: Block, args: Vec<Value>) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Jump {
            destination: BlockCall { block: destination, args },
        };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    /// Branch to `then_block` if `cond` is nonzero, otherwise to `else_block`.
    pub fn brif(
        &mut self,
        cond: Value,
        then_block: Block,
        then_args: Vec<Value>,
        else_block: Block,
        else_args: Vec<Value>,
    ) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Brif {
            arg: cond,
            block_then: BlockCall { block: then_block, args: then_args },
            block_else: BlockCall { block: else_block, args: else_args },
        };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    /// Call the preamble-declared function `func_ref`, producing one result per `result_types`.
    pub fn call(&mut self, func_ref: FuncRef, args: Vec<Value>, result_types: &[Type]) -> Result<Vec<Value>, BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Call { func_ref, args };
        let (_, results) = self.builder.func.append_inst(block, data, result_types);
        Ok(results)
    }

    pub fn return_(&mut self, args: Vec<Value>) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Return { args };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    pub fn trap(&mut self, code: TrapCode) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Trap { code };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }

    /// Trap with `code` if `arg` is zero.
    pub fn trapz(&mut self, arg: Value, code: TrapCode) -> Result<(), BuilderError> {
        let block = self.block()?;
        let data = InstructionData::Trapz { arg, code };
        self.builder.func.append_inst(block, data, &[]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{types::I32, ExternalName, Signature};
    use crate::isa::CallConv;

    fn new_func() -> Function {
        Function::with_name_signature(ExternalName::user(0, 0), Signature::new(CallConv::SystemV))
    }

    #[test]
    fn builds_a_block_with_an_add_and_a_return() {
        let mut func = new_func();
        let mut b = FunctionBuilder::new(&mut func);
        let block0 = b.create_block();
        let p0 = b.append_block_param(block0, I32);
        let p1 = b.append_block_param(block0, I32);
        b.switch_to_block(block0);
        let sum = b.ins().iadd(p0, p1).unwrap();
        b.ins().return_(alloc::vec![sum]).unwrap();

        assert_eq!(func.layout.block_insts(block0).len(), 2);
    }

    #[test]
    fn appending_without_a_current_block_fails() {
        let mut func = new_func();
        let mut b = FunctionBuilder::new(&mut func);
        let err = b.ins().trap(TrapCode::UNREACHABLE_CODE_REACHED).unwrap_err();
        assert_eq!(err, BuilderError::NoCurrentBlock);
    }

    #[test]
    fn stack_load_round_trips_through_a_stack_store() {
        let mut func = new_func();
        let slot = func.create_stack_slot(crate::ir::StackSlotData::new(crate::ir::StackSlotKind::ExplicitSlot, 8));
        let mut b = FunctionBuilder::new(&mut func);
        let block0 = b.create_block();
        b.switch_to_block(block0);
        let v = b.ins().iconst(I32, 7).unwrap();
        b.ins().stack_store(v, slot, 0).unwrap();
        let loaded = b.ins().stack_load(I32, slot, 0).unwrap();
        b.ins().return_(alloc::vec![loaded]).unwrap();

        assert_eq!(func.layout.block_insts(block0).len(), 4);
    }

    #[test]
    fn mismatched_operand_types_are_rejected() {
        let mut func = new_func();
        let mut b = FunctionBuilder::new(&mut func);
        let block0 = b.create_block();
        b.switch_to_block(block0);
        let i = b.ins().iconst(I32, 1).unwrap();
        let f = b.ins().f64const(1.0).unwrap();
        let err = b.ins().iadd(i, f).unwrap_err();
        assert!(matches!(err, BuilderError::TypeMismatch { .. }));
    }
}
