use std::fmt;

use smallvec::SmallVec;

use crate::{Address, Kind, MemSize, TypeDesc};

/// How a value presents itself to the scanner.
///
/// Each variant corresponds to one [`Kind`] and carries what the scanner needs to find memory
/// owned indirectly by the value. A value presents its view from [`MemSize::describe()`].
#[expect(
    clippy::exhaustive_enums,
    reason = "mirrors the closed set of value kinds"
)]
pub enum View<'v> {
    /// Plain data. Nothing to follow.
    Scalar,

    /// A reference to a single value, or `None` for a null reference.
    ///
    /// The target is billed separately under its own type.
    Pointer(Option<&'v dyn MemSize>),

    /// A type-erased value, or `None` for an empty slot.
    ///
    /// The payload is not billed under its own type. If the payload type is not itself
    /// reference-like, its in-place size is charged to the interface value.
    Interface(Option<&'v dyn MemSize>),

    /// Character data of the given length, owned by the value.
    String {
        /// Bytes of character data.
        bytes: usize,
    },

    /// A contiguous buffer of elements that other views may share.
    Slice(Elements<'v>),

    /// Elements stored inline in the value.
    Array(Elements<'v>),

    /// Entries of a map.
    Map(Entries<'v>),

    /// Fields stored inline in the value.
    Struct(Fields<'v>),

    /// The buffer of a channel.
    Channel(ChannelView),

    /// A function or closure.
    Function,
}

impl View<'_> {
    /// The kind of value this view presents.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::Scalar => Kind::Scalar,
            Self::Pointer(_) => Kind::Pointer,
            Self::Interface(_) => Kind::Interface,
            Self::String { .. } => Kind::String,
            Self::Slice(_) => Kind::Slice,
            Self::Array(_) => Kind::Array,
            Self::Map(_) => Kind::Map,
            Self::Struct(_) => Kind::Struct,
            Self::Channel(_) => Kind::Channel,
            Self::Function => Kind::Function,
        }
    }
}

impl fmt::Debug for View<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("View").field(&self.kind()).finish()
    }
}

/// A run of elements in memory, as seen by a slice or array.
///
/// The first `len` elements are initialized and can be walked. A buffer may reserve room for
/// more elements than it holds. That room is charged as part of the buffer but never walked.
pub struct Elements<'v> {
    items: Box<dyn ElementSeq<'v> + 'v>,
    capacity: usize,
}

impl<'v> Elements<'v> {
    /// Creates a view of `items` in a buffer with room for `capacity` elements.
    ///
    /// A capacity lower than the number of items is raised to the number of items.
    ///
    /// # Example
    ///
    /// ```
    /// use footprint::{Elements, Kind, MemSize, TypeDesc, View};
    ///
    /// struct Samples(Vec<u32>);
    ///
    /// impl MemSize for Samples {
    ///     fn type_desc() -> TypeDesc {
    ///         TypeDesc::new::<Self>(Kind::Slice)
    ///     }
    ///
    ///     fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
    ///         visit(View::Slice(Elements::new(&self.0, self.0.capacity())));
    ///     }
    /// }
    /// ```
    #[must_use]
    pub fn new<T: MemSize>(items: &'v [T], capacity: usize) -> Self {
        Self {
            capacity: capacity.max(items.len()),
            items: Box::new(items),
        }
    }

    /// Address of the first element.
    pub(crate) fn base(&self) -> Address {
        self.items.base()
    }

    /// Number of initialized elements.
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Number of elements the buffer has room for.
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn element_desc(&self) -> TypeDesc {
        self.items.element_desc()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&'v dyn MemSize> {
        self.items.element(index)
    }
}

impl fmt::Debug for Elements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements")
            .field("base", &self.base())
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("element", &self.element_desc())
            .finish()
    }
}

// Type-erased access to a slice of some `T: MemSize`.
trait ElementSeq<'v> {
    fn base(&self) -> Address;
    fn len(&self) -> usize;
    fn element_desc(&self) -> TypeDesc;
    fn element(&self, index: usize) -> Option<&'v dyn MemSize>;
}

impl<'v, T: MemSize> ElementSeq<'v> for &'v [T] {
    fn base(&self) -> Address {
        Address::new(self.as_ptr().addr())
    }

    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn element_desc(&self) -> TypeDesc {
        T::type_desc()
    }

    fn element(&self, index: usize) -> Option<&'v dyn MemSize> {
        let items: &'v [T] = *self;
        let item: &'v T = items.get(index)?;
        Some(item)
    }
}

type EntryIter<'v> = Box<dyn Iterator<Item = (&'v dyn MemSize, &'v dyn MemSize)> + 'v>;

/// The entries of a map.
///
/// Keys and values are charged at their in-place size for every entry. Entries are only
/// walked if the key or value type can own further memory.
pub struct Entries<'v> {
    len: usize,
    key: TypeDesc,
    value: TypeDesc,
    iter: EntryIter<'v>,
}

impl<'v> Entries<'v> {
    /// Creates a view of `len` entries yielded by `iter`.
    #[must_use]
    pub fn new<K, V>(len: usize, iter: impl Iterator<Item = (&'v K, &'v V)> + 'v) -> Self
    where
        K: MemSize + 'v,
        V: MemSize + 'v,
    {
        Self {
            len,
            key: K::type_desc(),
            value: V::type_desc(),
            iter: Box::new(iter.map(|(key, value)| -> (&'v dyn MemSize, &'v dyn MemSize) {
                (key, value)
            })),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn key_desc(&self) -> TypeDesc {
        self.key
    }

    pub(crate) fn value_desc(&self) -> TypeDesc {
        self.value
    }

    pub(crate) fn into_entries(self) -> EntryIter<'v> {
        self.iter
    }
}

impl fmt::Debug for Entries<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entries")
            .field("len", &self.len)
            .field("key", &self.key)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// The fields of an aggregate value.
///
/// Each field must be located inside the value that presents it.
#[derive(Default)]
pub struct Fields<'v> {
    fields: SmallVec<[&'v dyn MemSize; 4]>,
}

impl<'v> Fields<'v> {
    /// An aggregate without fields worth visiting.
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: SmallVec::new(),
        }
    }

    /// An aggregate with a single field.
    #[must_use]
    pub fn one(field: &'v dyn MemSize) -> Self {
        let mut fields = Self::new();
        fields.push(field);
        fields
    }

    /// Appends a field.
    pub fn push(&mut self, field: &'v dyn MemSize) {
        self.fields.push(field);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'v dyn MemSize> {
        self.fields.iter().copied()
    }
}

impl fmt::Debug for Fields<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.fields.iter().map(|field| field.dyn_type_desc().name()))
            .finish()
    }
}

/// The buffer of a channel: room for `capacity` elements of the given type.
///
/// Queued messages are never walked, as that is not possible without consuming them.
#[derive(Clone, Copy, Debug)]
pub struct ChannelView {
    capacity: usize,
    element: TypeDesc,
}

impl ChannelView {
    /// A channel buffer with room for `capacity` elements of type `T`.
    #[must_use]
    pub fn new<T: MemSize>(capacity: usize) -> Self {
        Self {
            capacity,
            element: T::type_desc(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn element_desc(&self) -> TypeDesc {
        self.element
    }
}
