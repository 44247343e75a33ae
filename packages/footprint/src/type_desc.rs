use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::MemSize;

/// The shape of a value, as far as the scanner is concerned.
///
/// Every type that can be scanned maps to exactly one kind. The kind decides how the scanner
/// finds memory owned indirectly by a value of that type.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "the set of value kinds is closed - the scanner handles each one explicitly"
)]
pub enum Kind {
    /// Plain data that owns no memory outside its own footprint.
    Scalar,

    /// A reference to a single value elsewhere in memory, which is billed separately.
    Pointer,

    /// A type-erased value whose payload is not part of the value's own footprint.
    Interface,

    /// Immutable character data behind a reference.
    String,

    /// A view of a contiguous buffer of elements, possibly shared with other views.
    Slice,

    /// A fixed number of elements stored inline.
    Array,

    /// Key-value entries stored in memory owned by the map.
    Map,

    /// An aggregate of fields stored inline.
    Struct,

    /// A message queue with a buffer of elements.
    Channel,

    /// Executable code and any captured state. Cannot be introspected.
    Function,
}

impl Kind {
    /// Whether the in-place representation of a value of this kind is itself an indirection.
    #[must_use]
    pub const fn is_reference_like(self) -> bool {
        match self {
            Self::Scalar | Self::Array | Self::Struct => false,
            Self::Pointer
            | Self::Interface
            | Self::String
            | Self::Slice
            | Self::Map
            | Self::Channel
            | Self::Function => true,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Pointer => "pointer",
            Self::Interface => "interface",
            Self::String => "string",
            Self::Slice => "slice",
            Self::Array => "array",
            Self::Map => "map",
            Self::Struct => "struct",
            Self::Channel => "channel",
            Self::Function => "function",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a type: its name, in-place size and kind.
///
/// Types are identified by name. Names are taken from [`std::any::type_name`], which erases
/// lifetimes, so `&'a [u8]` and `&'static [u8]` are the same type for the purposes of a scan.
/// This is what allows borrowed views to be scanned at all.
///
/// Array and pointer descriptors may also describe their element or pointee type, which
/// lets the scanner decide without looking at any value whether an array needs to be walked
/// and whether a pointer targets a value of a given type.
#[derive(Clone, Copy)]
pub struct TypeDesc {
    name: &'static str,
    size: usize,
    kind: Kind,
    inner: Option<fn() -> TypeDesc>,
}

impl TypeDesc {
    /// Describes `T` as a value of the given kind.
    ///
    /// # Example
    ///
    /// ```
    /// use footprint::{Kind, TypeDesc};
    ///
    /// let desc = TypeDesc::new::<u64>(Kind::Scalar);
    ///
    /// assert_eq!(desc.size(), 8);
    /// assert_eq!(desc.name(), "u64");
    /// ```
    #[must_use]
    pub fn new<T>(kind: Kind) -> Self {
        Self {
            name: type_name::<T>(),
            size: size_of::<T>(),
            kind,
            inner: None,
        }
    }

    /// Describes `T` as an array of `E`.
    #[must_use]
    pub fn array<T, E: MemSize>() -> Self {
        Self {
            inner: Some(E::type_desc),
            ..Self::new::<T>(Kind::Array)
        }
    }

    /// Describes `T` as a pointer to a value of type `P`.
    #[must_use]
    pub fn pointer<T, P: MemSize>() -> Self {
        Self {
            inner: Some(P::type_desc),
            ..Self::new::<T>(Kind::Pointer)
        }
    }

    /// The name of the type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The in-place size of a value of the type, in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The kind of the type.
    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The element type of an array or the target type of a pointer, if known statically.
    #[must_use]
    pub fn inner(&self) -> Option<Self> {
        self.inner.map(|describe| describe())
    }
}

impl PartialEq for TypeDesc {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.size == other.size && self.kind == other.kind
    }
}

impl Eq for TypeDesc {}

impl Hash for TypeDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("name", &self.name)
            .field("size", &self.size)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(TypeDesc: Send, Sync, Copy);
    assert_impl_all!(Kind: Send, Sync, Copy);

    #[test]
    fn reference_like_kinds() {
        for kind in [
            Kind::Pointer,
            Kind::Interface,
            Kind::String,
            Kind::Slice,
            Kind::Map,
            Kind::Channel,
            Kind::Function,
        ] {
            assert!(kind.is_reference_like(), "{kind}");
        }

        for kind in [Kind::Scalar, Kind::Array, Kind::Struct] {
            assert!(!kind.is_reference_like(), "{kind}");
        }
    }

    #[test]
    fn new_captures_name_and_size() {
        let desc = TypeDesc::new::<[u16; 3]>(Kind::Array);

        assert_eq!(desc.name(), "[u16; 3]");
        assert_eq!(desc.size(), 6);
        assert_eq!(desc.kind(), Kind::Array);
        assert!(desc.inner().is_none());
    }

    #[test]
    fn array_knows_element() {
        let desc = TypeDesc::array::<[u32; 4], u32>();

        let element = desc.inner().unwrap();
        assert_eq!(element.name(), "u32");
        assert_eq!(element.kind(), Kind::Scalar);
    }

    #[test]
    fn pointer_is_distinct_from_its_target() {
        let pointer = TypeDesc::pointer::<Box<u64>, u64>();
        let target = TypeDesc::new::<u64>(Kind::Scalar);

        assert_eq!(pointer.kind(), Kind::Pointer);
        assert_eq!(pointer.inner(), Some(target));
        assert_ne!(pointer, target);
        assert_eq!(pointer, TypeDesc::pointer::<Box<u64>, u64>());
    }

    #[test]
    fn lifetimes_are_erased() {
        fn name_of<'a>(_: &'a [u8]) -> &'static str {
            TypeDesc::new::<&'a [u8]>(Kind::Slice).name()
        }

        let local = [1_u8, 2, 3];
        assert_eq!(name_of(&local), TypeDesc::new::<&'static [u8]>(Kind::Slice).name());
    }
}
