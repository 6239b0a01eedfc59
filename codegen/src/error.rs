//! The error taxonomy produced by compilation: verification failures, unsupported constructs,
//! and register allocation failures are kept distinct so callers can decide what's recoverable.

use alloc::string::String;
use core::fmt;

/// Everything that can go wrong turning a [`crate::ir::Function`] into machine code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodegenError {
    /// The function failed structural or type verification before compilation began.
    Verifier(String),
    /// Lowering encountered an IR construct this backend does not implement.
    Unsupported(String),
    /// A compiled function's code size exceeded an internal implementation limit (e.g. a jump
    /// table or constant pool index overflowed its encoding width).
    ImplLimitExceeded,
    /// Register allocation could not find a valid assignment.
    RegisterAllocation(String),
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CodegenError::Verifier(s) => write!(f, "verifier errors: {}", s),
            CodegenError::Unsupported(s) => write!(f, "unsupported: {}", s),
            CodegenError::ImplLimitExceeded => write!(f, "implementation limit exceeded"),
            CodegenError::RegisterAllocation(s) => write!(f, "register allocation failed: {}", s),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CodegenError {}

/// The result of a fallible compilation step.
pub type CodegenResult<T> = Result<T, CodegenError>;

impl From<crate::verifier::VerifierErrors> for CodegenError {
    fn from(errs: crate::verifier::VerifierErrors) -> Self {
        CodegenError::Verifier(alloc::format!("{}", errs))
    }
}
