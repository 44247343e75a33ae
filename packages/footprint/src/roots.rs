use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::context::ScanContext;
use crate::{Error, MemSize, Result, Sizes, TypeInfoCache};

/// A set of named roots whose retained memory can be measured.
///
/// Each root is a shared borrow of a value. Everything reachable from a root through
/// [`MemSize`] is counted, each byte once. When multiple roots reach the same memory, it is
/// billed to the root whose name sorts first.
///
/// The roots stay borrowed for as long as they are registered, so they cannot change while the
/// set exists except through interior mutability. Values behind interior mutability are only
/// inspected while a guard is held and are skipped if they are exclusively held elsewhere.
///
/// By default, roots are stored as `&dyn MemSize`, so roots of different types can be mixed.
/// Any other `MemSize` type can be used as the root type via [`RootSet::builder()`], for
/// example `dyn MemSize + Sync` to share the set between threads.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use footprint::RootSet;
///
/// let mut users = HashMap::new();
/// users.insert(1_u32, "Alice".to_string());
/// users.insert(2_u32, "Bob".to_string());
///
/// let log = vec![0_u8; 1000];
///
/// let mut roots = RootSet::new();
/// roots.add("users", &users);
/// roots.add("log", &log);
///
/// let sizes = roots.scan().unwrap();
///
/// assert!(sizes.root("log").unwrap() >= 1000);
/// assert_eq!(roots.names().collect::<Vec<_>>(), ["log", "users"]);
/// ```
pub struct RootSet<'a, R: ?Sized + MemSize + 'a = dyn MemSize + 'a> {
    roots: BTreeMap<String, &'a R>,
    types: Arc<TypeInfoCache>,

    // Scans of the same set take turns.
    scan_lock: Mutex<()>,
}

impl<'a> RootSet<'a> {
    /// Creates an empty set with its own type information cache.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a set with custom configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use footprint::{MemSize, RootSet, TypeInfoCache};
    ///
    /// let types = Arc::new(TypeInfoCache::new());
    ///
    /// let roots: RootSet<'_, dyn MemSize + Sync> = RootSet::builder()
    ///     .type_cache(Arc::clone(&types))
    ///     .build();
    ///
    /// assert!(roots.is_empty());
    /// ```
    #[must_use]
    pub fn builder() -> RootSetBuilder {
        RootSetBuilder::new()
    }
}

impl Default for RootSet<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, R: ?Sized + MemSize + 'a> RootSet<'a, R> {
    /// Registers a root under `name`, replacing any root previously registered under it.
    pub fn add(&mut self, name: impl Into<String>, root: &'a R) {
        self.roots.insert(name.into(), root);
    }

    /// Names of all registered roots, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    /// Number of registered roots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no root is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Measures the memory retained by all registered roots.
    ///
    /// # Errors
    ///
    /// Returns an error if any reachable value has a [`MemSize`] implementation that breaks
    /// the contract of the trait.
    pub fn scan(&self) -> Result<Sizes> {
        self.scan_roots(self.roots.iter().map(|(name, root)| (name.as_str(), *root)))
    }

    /// Measures the memory retained by the root registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownRoot`] if no root is registered under `name`.
    ///
    /// Returns an error if any reachable value has a [`MemSize`] implementation that breaks
    /// the contract of the trait.
    pub fn scan_root(&self, name: &str) -> Result<Sizes> {
        let root = self.roots.get(name).ok_or_else(|| Error::UnknownRoot {
            name: name.to_owned(),
        })?;

        self.scan_roots([(name, *root)])
    }

    fn scan_roots<'r>(&self, roots: impl IntoIterator<Item = (&'r str, &'a R)>) -> Result<Sizes> {
        let _guard = self.scan_lock.lock();

        debug!(root_count = self.roots.len(), "memory scan starting");

        let mut context = ScanContext::new(&self.types);

        for (name, root) in roots {
            context.scan_root(name, root.as_dyn_mem_size())?;
        }

        let sizes = context.finish();

        debug!(
            total = sizes.total(),
            bitmap_bytes = sizes.bitmap_bytes(),
            buffer_spans = sizes.buffer_spans(),
            "memory scan completed"
        );

        Ok(sizes)
    }
}

impl<'a, R: ?Sized + MemSize + 'a> fmt::Debug for RootSet<'a, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("roots", &self.roots.keys().collect::<Vec<_>>())
            .field("types", &self.types)
            .finish_non_exhaustive()
    }
}

/// Creates instances of [`RootSet`].
///
/// Use `RootSet::builder()` to create a new instance of this builder.
#[derive(Debug, Default)]
#[must_use]
pub struct RootSetBuilder {
    types: Option<Arc<TypeInfoCache>>,
}

impl RootSetBuilder {
    pub(crate) fn new() -> Self {
        Self { types: None }
    }

    /// Sets the type information cache to use for scans.
    ///
    /// Sharing one cache between several root sets avoids classifying the same types again in
    /// each of them. By default, each root set gets its own cache.
    pub fn type_cache(self, types: Arc<TypeInfoCache>) -> Self {
        Self {
            types: Some(types),
        }
    }

    /// Builds the root set with the current configuration.
    ///
    /// The root type is inferred from how the set is used. [`RootSet::new()`] builds a set of
    /// `dyn MemSize` roots.
    pub fn build<'a, R: ?Sized + MemSize + 'a>(self) -> RootSet<'a, R> {
        RootSet {
            roots: BTreeMap::new(),
            types: self.types.unwrap_or_default(),
            scan_lock: Mutex::new(()),
        }
    }
}

/// Measures the memory retained by a single value.
///
/// This is a shorthand for registering the value as the only root of a [`RootSet`], under an
/// empty name, and scanning it.
///
/// # Example
///
/// ```
/// let words = vec!["one".to_string(), "two".to_string()];
///
/// let sizes = footprint::scan(&words).unwrap();
///
/// assert_eq!(
///     sizes.total(),
///     size_of::<Vec<String>>() + 2 * size_of::<String>() + 6
/// );
/// ```
///
/// # Errors
///
/// Returns an error if any reachable value has a [`MemSize`] implementation that breaks the
/// contract of the trait.
pub fn scan<R: ?Sized + MemSize>(root: &R) -> Result<Sizes> {
    let mut roots: RootSet<'_, R> = RootSetBuilder::new().build();
    roots.add("", root);
    roots.scan()
}
