//! Compilation settings: a typed, validated snapshot ([`Flags`]) built from untyped
//! `(name, value)` pairs via a [`Builder`], so a driver can expose these as CLI flags or a config
//! file without this crate depending on a CLI-parsing or config-file crate.

use alloc::string::{String, ToString};
use core::fmt;

/// How aggressively the lowering driver should apply selection-adjacent optimizations (constant
/// folding during selection, peephole fusion). The core does not implement a general optimizing
/// middle end regardless of this setting; it only changes which of those lowering-adjacent
/// rewrites are attempted.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum OptLevel {
    /// Prefer fast compilation; skip optional peephole rewrites.
    #[default]
    None,
    /// Apply every lowering-adjacent optimization the backend's pattern rules offer.
    Speed,
}

impl fmt::Display for OptLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            OptLevel::None => "none",
            OptLevel::Speed => "speed",
        })
    }
}

/// Failure to apply a named setting: the name is unknown, or the value doesn't parse for that
/// setting's type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingError(pub String);

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid setting: {}", self.0)
    }
}

/// Accumulates named settings before they are validated into a [`Flags`] snapshot.
#[derive(Clone, Debug)]
pub struct Builder {
    opt_level: OptLevel,
    enable_verifier: bool,
    is_pic: bool,
    unwind_info: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            opt_level: OptLevel::None,
            enable_verifier: true,
            is_pic: false,
            unwind_info: false,
        }
    }
}

impl Builder {
    /// A builder with every setting at its default value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one `(name, value)` pair, as a driver would when translating a CLI flag.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), SettingError> {
        match name {
            "opt_level" => {
                self.opt_level = match value {
                    "none" => OptLevel::None,
                    "speed" => OptLevel::Speed,
                    _ => return Err(SettingError(alloc::format!("opt_level: {}", value))),
                };
            }
            "enable_verifier" => self.enable_verifier = parse_bool(name, value)?,
            "is_pic" => self.is_pic = parse_bool(name, value)?,
            "unwind_info" => self.unwind_info = parse_bool(name, value)?,
            _ => return Err(SettingError(alloc::format!("unknown setting: {}", name))),
        }
        Ok(())
    }

    /// Freeze the accumulated settings into an immutable [`Flags`].
    pub fn finish(self) -> Flags {
        Flags {
            opt_level: self.opt_level,
            enable_verifier: self.enable_verifier,
            is_pic: self.is_pic,
            unwind_info: self.unwind_info,
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, SettingError> {
    match value {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(SettingError(alloc::format!("{}: {}", name, value))),
    }
}

/// An immutable, validated set of compilation settings, threaded through
/// [`crate::context::Context::compile`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Flags {
    opt_level: OptLevel,
    enable_verifier: bool,
    is_pic: bool,
    unwind_info: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Builder::new().finish()
    }
}

impl Flags {
    /// The configured optimization level.
    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    /// Whether [`crate::verifier::verify_function`] runs before every compile. Defaults to
    /// `true`; a driver compiling IR it already trusts may disable it for speed.
    pub fn enable_verifier(&self) -> bool {
        self.enable_verifier
    }

    /// Whether emitted code must be position-independent (no absolute addressing).
    pub fn is_pic(&self) -> bool {
        self.is_pic
    }

    /// Whether the backend should build unwind info alongside the code buffer.
    pub fn unwind_info(&self) -> bool {
        self.unwind_info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_enable_the_verifier() {
        let flags = Flags::default();
        assert!(flags.enable_verifier());
        assert_eq!(flags.opt_level(), OptLevel::None);
    }

    #[test]
    fn unknown_setting_name_is_rejected() {
        let mut b = Builder::new();
        assert!(b.set("not_a_real_setting", "1").is_err());
    }

    #[test]
    fn opt_level_accepts_its_two_values() {
        let mut b = Builder::new();
        b.set("opt_level", "speed").unwrap();
        assert_eq!(b.finish().opt_level(), OptLevel::Speed);
    }
}
