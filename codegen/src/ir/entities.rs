//! Entity references into a [`Function`](super::function::Function).
//!
//! Instructions reference other parts of the function — blocks, values, stack slots, external
//! entities declared in the preamble — not as Rust references but as opaque 32-bit handles into a
//! table owned by the `Function`. A separate type per entity kind keeps one kind of handle from
//! being used where another is expected, at zero runtime cost over a bare `u32`.

use core::fmt;
use cranelift_entity::entity_impl;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// A reference to a basic block.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Block(u32);
entity_impl!(Block, "block");

/// A reference to an SSA value: either the result of an instruction or a block parameter.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Value(u32);
entity_impl!(Value, "v");

/// A reference to an instruction.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct Inst(u32);
entity_impl!(Inst, "inst");

/// A reference to a stack slot declared in a function's preamble.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct StackSlot(u32);
entity_impl!(StackSlot, "ss");

/// A reference to a global value computation declared in a function's preamble.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct GlobalValue(u32);
entity_impl!(GlobalValue, "gv");

/// A reference to an external function declared in a function's preamble.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct FuncRef(u32);
entity_impl!(FuncRef, "fn");

/// A reference to a function signature declared in a function's preamble.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub struct SigRef(u32);
entity_impl!(SigRef, "sig");

/// Where a [`Value`] comes from: the result of an instruction, at a given result index, or a
/// parameter of a block, at a given parameter index.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ValueData {
    /// The `index`-th result of `inst`.
    Inst {
        /// Defining instruction.
        inst: Inst,
        /// Result index within that instruction.
        index: u32,
    },
    /// The `index`-th parameter of `block`.
    Param {
        /// Owning block.
        block: Block,
        /// Parameter index within that block.
        index: u32,
    },
}

impl fmt::Display for ValueData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueData::Inst { inst, index } => write!(f, "{}#{}", inst, index),
            ValueData::Param { block, index } => write!(f, "{}#{}", block, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cranelift_entity::EntityRef;

    #[test]
    fn entities_round_trip_their_index() {
        let b = Block::new(7);
        assert_eq!(b.index(), 7);
        let v = Value::new(3);
        assert_eq!(v.index(), 3);
    }
}
