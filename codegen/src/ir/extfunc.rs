//! External function calls and call signatures.
//!
//! To a function being compiled, every callee is "external": directly called functions must be
//! declared in the preamble, and every call site carries a signature.

use crate::ir::{ExternalName, SigRef, Type};
use crate::isa::CallConv;
use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

/// A function signature: parameter and return types plus a calling convention.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    /// Formal parameters.
    pub params: Vec<AbiParam>,
    /// Return values.
    pub returns: Vec<AbiParam>,
    /// Calling convention.
    pub call_conv: CallConv,
}

impl Signature {
    /// Create a new, empty signature for `call_conv`.
    pub fn new(call_conv: CallConv) -> Self {
        Self {
            params: Vec::new(),
            returns: Vec::new(),
            call_conv,
        }
    }

    /// Index of the parameter with special purpose `purpose`, if any.
    pub fn special_param_index(&self, purpose: ArgumentPurpose) -> Option<usize> {
        self.params.iter().position(|p| p.purpose == purpose)
    }

    /// Does this signature take a struct-return pointer parameter?
    pub fn uses_struct_return_param(&self) -> bool {
        self.special_param_index(ArgumentPurpose::StructReturn).is_some()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ")")?;
        if !self.returns.is_empty() {
            write!(f, " -> ")?;
            for (i, r) in self.returns.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", r)?;
            }
        }
        write!(f, " {}", self.call_conv)
    }
}

/// A single formal parameter or return value.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AbiParam {
    /// The value's type.
    pub value_type: Type,
    /// The argument's ABI purpose.
    pub purpose: ArgumentPurpose,
    /// How a sub-register-width integer argument is extended to a full register.
    pub extension: ArgumentExtension,
}

impl AbiParam {
    /// A normal parameter of type `vt`.
    pub fn new(vt: Type) -> Self {
        Self {
            value_type: vt,
            purpose: ArgumentPurpose::Normal,
            extension: ArgumentExtension::None,
        }
    }

    /// A special-purpose parameter of type `vt`.
    pub fn special(vt: Type, purpose: ArgumentPurpose) -> Self {
        Self {
            value_type: vt,
            purpose,
            extension: ArgumentExtension::None,
        }
    }

    /// This parameter, zero-extended to a full register.
    pub fn uext(self) -> Self {
        Self {
            extension: ArgumentExtension::Uext,
            ..self
        }
    }

    /// This parameter, sign-extended to a full register.
    pub fn sext(self) -> Self {
        Self {
            extension: ArgumentExtension::Sext,
            ..self
        }
    }
}

impl fmt::Display for AbiParam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value_type)?;
        match self.extension {
            ArgumentExtension::None => {}
            ArgumentExtension::Uext => write!(f, " uext")?,
            ArgumentExtension::Sext => write!(f, " sext")?,
        }
        if self.purpose != ArgumentPurpose::Normal {
            write!(f, " {}", self.purpose)?;
        }
        Ok(())
    }
}

/// How a sub-register-width integer argument is widened.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ArgumentExtension {
    /// High bits are indeterminate.
    None,
    /// High bits are zero.
    Uext,
    /// High bits replicate the sign bit.
    Sext,
}

/// Special meaning of a function argument or return value, beyond carrying a user value.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ArgumentPurpose {
    /// An ordinary user-program value.
    Normal,
    /// A struct-return out-pointer (e.g. `x8` on AAPCS64, `rdi` on System V, `rcx` on Win64).
    StructReturn,
    /// A VM context pointer, threaded through as the first normal argument by convention.
    VMContext,
}

static PURPOSE_NAMES: [&str; 3] = ["normal", "sret", "vmctx"];

impl fmt::Display for ArgumentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(PURPOSE_NAMES[*self as usize])
    }
}

impl FromStr for ArgumentPurpose {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "normal" => Ok(Self::Normal),
            "sret" => Ok(Self::StructReturn),
            "vmctx" => Ok(Self::VMContext),
            _ => Err(()),
        }
    }
}

/// A callable external function, as recorded in a function's preamble.
#[derive(Clone, Debug)]
pub struct ExtFuncData {
    /// The callee's name.
    pub name: ExternalName,
    /// The callee's signature.
    pub signature: SigRef,
    /// Whether the callee is known to end up close enough (after linking) that a short-range
    /// relocation can reach it directly, skipping a GOT/PLT indirection.
    pub colocated: bool,
}

impl fmt::Display for ExtFuncData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.colocated {
            write!(f, "colocated ")?;
        }
        write!(f, "{} {}", self.name, self.signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::{F32, I32};
    use alloc::string::ToString;

    #[test]
    fn signature_display() {
        let mut sig = Signature::new(CallConv::SystemV);
        sig.params.push(AbiParam::new(I32).uext());
        sig.returns.push(AbiParam::new(F32));
        assert_eq!(sig.to_string(), "(i32 uext) -> f32 system_v");
    }

    #[test]
    fn argument_purpose_round_trips() {
        for p in [
            ArgumentPurpose::Normal,
            ArgumentPurpose::StructReturn,
            ArgumentPurpose::VMContext,
        ] {
            assert_eq!(Ok(p), p.to_string().parse());
        }
    }
}
