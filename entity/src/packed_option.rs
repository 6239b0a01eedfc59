//! Compact representation of `Option<E>` for entity references.

use core::fmt;
use core::mem;

/// Types that have a reserved value which is not a valid instance.
///
/// This makes it possible to pack `Option<Self>` into the same space as `Self` by using the
/// reserved value to represent `None`.
pub trait ReservedValue {
    /// Create an instance of the reserved value.
    fn reserved_value() -> Self;

    /// Checks whether value is the reserved one.
    fn is_reserved_value(&self) -> bool;
}

/// Optional value stored in the same space as a `T` with a reserved sentinel.
///
/// This is equivalent to `Option<T>` but takes up the same number of bytes as `T` itself, because
/// `T::reserved_value()` stands in for `None`. Used pervasively to keep `InstructionData`
/// variants and dense side tables compact.
#[derive(PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "enable-serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PackedOption<T: ReservedValue>(T);

impl<T: ReservedValue> PackedOption<T> {
    /// Returns `true` if this packed option is `None`.
    pub fn is_none(&self) -> bool {
        self.0.is_reserved_value()
    }

    /// Returns `true` if this packed option is `Some`.
    pub fn is_some(&self) -> bool {
        !self.is_none()
    }

    /// Expand the packed option into a normal `Option`.
    pub fn expand(self) -> Option<T> {
        if self.is_none() { None } else { Some(self.0) }
    }

    /// Map a packed option like `Option::map`.
    pub fn map<U, F>(self, f: F) -> Option<U>
    where
        F: FnOnce(T) -> U,
    {
        self.expand().map(f)
    }

    /// Unwrap a packed `Some` value, panicking if it is `None`.
    pub fn unwrap(self) -> T {
        self.expand().expect("unwrapped a None packed option")
    }

    /// Takes the value out, leaving `None` in its place.
    pub fn take(&mut self) -> Option<T> {
        mem::replace(self, None.into()).expand()
    }
}

impl<T: ReservedValue> Default for PackedOption<T> {
    fn default() -> Self {
        Self(T::reserved_value())
    }
}

impl<T: ReservedValue> From<T> for PackedOption<T> {
    fn from(value: T) -> Self {
        debug_assert!(
            !value.is_reserved_value(),
            "cannot construct a PackedOption from a reserved value"
        );
        Self(value)
    }
}

impl<T: ReservedValue> From<Option<T>> for PackedOption<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::default(),
        }
    }
}

impl<T: ReservedValue + fmt::Debug> fmt::Debug for PackedOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.expand() {
            Some(v) => write!(f, "Some({:?})", v),
            None => write!(f, "None"),
        }
    }
}
