//! A low-level code generator: translate a typed SSA intermediate representation into
//! target-specific machine code.
//!
//! A [`ir::Function`] is built up instruction by instruction, [`verifier::verify_function`]
//! checks it is well-formed, and [`context::Context::compile`] hands it to a [`isa::TargetIsa`]
//! (AArch64 or x86-64) which lowers it through [`machinst`] into a [`isa::CompiledCode`].
//!
//! Each backend's lowering pass matches on [`ir::InstructionData`] directly rather than against
//! `isle`-compiled patterns; see `DESIGN.md` for why.

#![no_std]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub(crate) use cranelift_entity as entity;

pub mod context;
pub mod ir;
pub mod isa;
pub mod machinst;
mod regalloc;
pub mod settings;
mod verifier;

mod error;

pub use context::Context;
pub use error::{CodegenError, CodegenResult};
