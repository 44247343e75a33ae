use foldhash::{HashMap, HashMapExt};
use parking_lot::RwLock;

use crate::{Kind, TypeDesc};

/// Scan-relevant facts about a type, derived from its kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TypeInfo {
    is_reference_like: bool,
    needs_scan: bool,
}

impl TypeInfo {
    /// Whether the in-place representation of the type is an indirection to memory elsewhere.
    ///
    /// A type-erased value holding a value of a type that is not reference-like has to
    /// account for the payload separately.
    #[must_use]
    pub fn is_reference_like(&self) -> bool {
        self.is_reference_like
    }

    /// Whether values of the type may own memory outside their in-place representation.
    ///
    /// Values of types that do not need scanning are charged their in-place size and never
    /// presented to the scanner.
    #[must_use]
    pub fn needs_scan(&self) -> bool {
        self.needs_scan
    }
}

/// Memoizes [`TypeInfo`] per type.
///
/// Type shapes never change, so a cache can be shared between any number of scans, including
/// concurrent ones on different root sets. Each type is classified at most a few times, after
/// which lookups only take a shared lock.
///
/// # Example
///
/// ```
/// use footprint::{MemSize, TypeInfoCache};
///
/// let cache = TypeInfoCache::new();
///
/// assert!(!cache.info(&<[u8; 16]>::type_desc()).needs_scan());
/// assert!(cache.info(&<[String; 2]>::type_desc()).needs_scan());
/// ```
#[derive(Debug, Default)]
pub struct TypeInfoCache {
    infos: RwLock<HashMap<TypeDesc, TypeInfo>>,
}

impl TypeInfoCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            infos: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the classification of the type described by `desc`.
    #[must_use]
    pub fn info(&self, desc: &TypeDesc) -> TypeInfo {
        if let Some(info) = self.infos.read().get(desc).copied() {
            return info;
        }

        // The lock is not held while classifying, as arrays classify their element type first.
        let info = self.classify(desc);

        *self.infos.write().entry(*desc).or_insert(info)
    }

    pub(crate) fn needs_scan(&self, desc: &TypeDesc) -> bool {
        self.info(desc).needs_scan()
    }

    pub(crate) fn is_reference_like(&self, desc: &TypeDesc) -> bool {
        self.info(desc).is_reference_like()
    }

    /// Number of types classified so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.infos.read().len()
    }

    /// Whether no type has been classified yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.infos.read().is_empty()
    }

    fn classify(&self, desc: &TypeDesc) -> TypeInfo {
        let is_reference_like = desc.kind().is_reference_like();

        let needs_scan = match desc.kind() {
            Kind::Scalar => false,
            // An array of unknown element type is walked to find out.
            Kind::Array => desc
                .inner()
                .is_none_or(|element| self.needs_scan(&element)),
            Kind::Struct => true,
            Kind::Pointer
            | Kind::Interface
            | Kind::String
            | Kind::Slice
            | Kind::Map
            | Kind::Channel
            | Kind::Function => is_reference_like,
        };

        TypeInfo {
            is_reference_like,
            needs_scan,
        }
    }
}
