//! Calling convention identifiers.

use core::fmt;
use core::str::FromStr;
#[cfg(feature = "enable-serde")]
use serde::{Deserialize, Serialize};

/// Which calling convention a [`crate::ir::Signature`] follows.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "enable-serde", derive(Serialize, Deserialize))]
pub enum CallConv {
    /// The standard System V AMD64 ABI, used on Linux/BSD/macOS x86-64.
    SystemV,
    /// The Windows x64 "fastcall" ABI.
    WindowsFastcall,
    /// The AArch64 Procedure Call Standard.
    Aapcs64,
    /// A convention that additionally supports proper tail calls: the callee reuses the
    /// caller's stack frame instead of growing the stack, and the call site does not leave a
    /// return address belonging to the tail-called function's frame.
    TailCall,
}

impl fmt::Display for CallConv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            CallConv::SystemV => "system_v",
            CallConv::WindowsFastcall => "windows_fastcall",
            CallConv::Aapcs64 => "aapcs64",
            CallConv::TailCall => "tail_call",
        })
    }
}

impl FromStr for CallConv {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, ()> {
        match s {
            "system_v" => Ok(CallConv::SystemV),
            "windows_fastcall" => Ok(CallConv::WindowsFastcall),
            "aapcs64" => Ok(CallConv::Aapcs64),
            "tail_call" => Ok(CallConv::TailCall),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn round_trips_through_display() {
        for cc in [
            CallConv::SystemV,
            CallConv::WindowsFastcall,
            CallConv::Aapcs64,
            CallConv::TailCall,
        ] {
            assert_eq!(Ok(cc), cc.to_string().parse());
        }
    }
}
