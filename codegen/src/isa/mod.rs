//! Target instruction set architectures.
//!
//! [`TargetIsa`] is the dynamic-dispatch boundary between the target-independent compilation
//! pipeline and a specific backend: it hides the backend's concrete [`crate::machinst::MachInst`]
//! type so [`crate::context::Context`] can hold one of several possible targets behind a single
//! trait object, selected at runtime from a [`Target`].

pub mod aarch64;
pub mod call_conv;
pub mod x64;

pub use call_conv::CallConv;

use crate::ir::Function;
use crate::machinst::MachBufferFinalized;
use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

/// The architectures a backend may exist for.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Target {
    /// AArch64 (ARMv8-A and later), the primary supported target.
    Aarch64,
    /// x86-64, the secondary supported target.
    X64,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Target::Aarch64 => "aarch64",
            Target::X64 => "x86_64",
        })
    }
}

/// Failure to construct a [`TargetIsa`] for a requested target triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupError(pub String);

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unsupported target: {}", self.0)
    }
}

/// The fully compiled output for one function.
#[derive(Clone, Debug, Default)]
pub struct CompiledCode {
    /// Emitted machine code and its side tables.
    pub buffer: MachBufferFinalized,
    /// Total stack frame size in bytes, including spill slots and saved registers.
    pub frame_size: u32,
}

/// Behavior specialized per target architecture: lowering a function to machine code.
///
/// A concrete backend (e.g. the AArch64 or x86-64 backend) implements this trait over its own
/// [`crate::machinst::MachInst`] type; callers that don't care which target they're compiling
/// for hold a `&dyn TargetIsa` or `Box<dyn TargetIsa>`.
pub trait TargetIsa: Send + Sync {
    /// Which architecture this is.
    fn target(&self) -> Target;

    /// The name of this backend's default calling convention.
    fn default_call_conv(&self) -> CallConv;

    /// Pointer width in bits (64 for both currently supported targets).
    fn pointer_bits(&self) -> u8 {
        64
    }

    /// Lower, register-allocate, and emit `func`, producing final machine code.
    fn compile_function(
        &self,
        func: &Function,
        flags: &crate::settings::Flags,
    ) -> Result<CompiledCode, crate::CodegenError>;
}

/// Look up a [`TargetIsa`] for `target`.
pub fn lookup(target: Target) -> Result<Box<dyn TargetIsa>, LookupError> {
    match target {
        Target::Aarch64 => Ok(Box::new(crate::isa::aarch64::Aarch64Backend::new())),
        Target::X64 => Ok(Box::new(crate::isa::x64::X64Backend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_succeeds_for_every_supported_target() {
        for t in [Target::Aarch64, Target::X64] {
            let isa = lookup(t).unwrap();
            assert_eq!(isa.target(), t);
        }
    }
}
