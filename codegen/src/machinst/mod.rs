//! The machine-instruction framework: target-independent scaffolding that every backend's
//! instruction selector, register allocator interface, and binary emitter build on.
//!
//! A backend defines its own [`vcode::MachInst`] implementation and uses [`vcode::VCodeBuilder`]
//! to assemble a [`vcode::VCode`] during lowering, [`abi`] to classify call arguments, and
//! [`buffer::MachBuffer`] to emit bytes with deferred label resolution.

pub mod abi;
pub mod buffer;
pub mod reg;
pub mod vcode;

pub use abi::{classify_signature, ABIArg, ABISignature, AbiRegisters};
pub use buffer::{LabelUseKind, MachBuffer, MachBufferFinalized, MachCallSite, MachReloc, MachTrap, RelocKind};
pub use reg::{OperandDescriptor, OperandKind, PReg, Reg, RegClass, VReg, WritableReg};
pub use vcode::{MachInst, VCode, VCodeBlock, VCodeBuilder, VCodeInst};
