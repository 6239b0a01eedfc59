//! Names of external functions and symbols referenced from IR.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

/// The name of an external function, as referenced by a [`super::ExtFuncData`] or a direct
/// `call` instruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ExternalName {
    /// A name given by the embedder, carried as an opaque namespace/index pair (e.g. a Wasm
    /// function index within a module).
    User {
        /// Namespace identifying which table of names `index` is drawn from.
        namespace: u32,
        /// Index within that namespace.
        index: u32,
    },
    /// A library call with a fixed, well-known name (e.g. `memcpy`, `__cranelift_probestack`).
    LibCall(String),
    /// A raw, already-mangled symbol name, used for testing and for symbols with no structured
    /// namespace.
    TestCase(Vec<u8>),
}

impl fmt::Display for ExternalName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExternalName::User { namespace, index } => write!(f, "u{}:{}", namespace, index),
            ExternalName::LibCall(name) => write!(f, "%{}", name),
            ExternalName::TestCase(bytes) => {
                write!(f, "%")?;
                for b in bytes {
                    write!(f, "{}", *b as char)?;
                }
                Ok(())
            }
        }
    }
}

impl ExternalName {
    /// Create a user-defined external name.
    pub fn user(namespace: u32, index: u32) -> Self {
        ExternalName::User { namespace, index }
    }

    /// Create a name for a well-known runtime library call.
    pub fn libcall(name: &str) -> Self {
        ExternalName::LibCall(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_forms() {
        assert_eq!(ExternalName::user(0, 3).to_string(), "u0:3");
        assert_eq!(ExternalName::libcall("memcpy").to_string(), "%memcpy");
    }
}
