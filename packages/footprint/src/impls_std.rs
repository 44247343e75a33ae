//! `MemSize` for types from the standard library.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::marker::PhantomData;
use std::num::NonZero;
use std::rc::{self, Rc};
use std::sync::{self, Arc};
use std::time::Duration;

use crate::{Elements, Entries, Fields, Kind, MemSize, TypeDesc, View};

crate::impl_mem_size!(
    scalar u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    bool,
    char,
    (),
    Duration,
    NonZero<u8>,
    NonZero<u16>,
    NonZero<u32>,
    NonZero<u64>,
    NonZero<u128>,
    NonZero<usize>,
    NonZero<i8>,
    NonZero<i16>,
    NonZero<i32>,
    NonZero<i64>,
    NonZero<i128>,
    NonZero<isize>,
);

impl<T: ?Sized> MemSize for PhantomData<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Scalar)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Scalar);
    }
}

// Strings. The character data of a `String` is its whole buffer, spare capacity included.

impl MemSize for String {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::String)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::String {
            bytes: self.capacity(),
        });
    }
}

impl MemSize for &str {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::String)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::String { bytes: self.len() });
    }
}

impl MemSize for Box<str> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::String)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::String { bytes: self.len() });
    }
}

// Pointers.

macro_rules! impl_pointer {
    ($($ptr:ty),+) => {
        $(
            impl<T: MemSize> MemSize for $ptr {
                fn type_desc() -> TypeDesc {
                    TypeDesc::pointer::<Self, T>()
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    let target: &T = self;
                    visit(View::Pointer(Some(target)));
                }
            }
        )+
    };
}

impl_pointer!(Box<T>, &T, &mut T, Rc<T>, Arc<T>);

macro_rules! impl_dyn_pointer {
    ($($ptr:ty),+) => {
        $(
            impl MemSize for $ptr {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Pointer)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    let target: &dyn MemSize = &**self;
                    visit(View::Pointer(Some(target)));
                }
            }
        )+
    };
}

impl_dyn_pointer!(&dyn MemSize, Rc<dyn MemSize>, Arc<dyn MemSize>);

// A weak reference does not keep its target alive, so the target is never billed to it.
macro_rules! impl_weak {
    ($($weak:ty),+) => {
        $(
            impl<T: MemSize> MemSize for $weak {
                fn type_desc() -> TypeDesc {
                    TypeDesc::pointer::<Self, T>()
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    visit(View::Pointer(None));
                }
            }
        )+
    };
}

impl_weak!(rc::Weak<T>, sync::Weak<T>);

// Boxed trait objects own their payload the way an interface value does.

impl MemSize for Box<dyn MemSize> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Interface)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Interface(Some(&**self)));
    }
}

impl MemSize for Box<dyn MemSize + Send + Sync> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Interface)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let payload: &dyn MemSize = &**self;
        visit(View::Interface(Some(payload)));
    }
}

// Sequences.

impl<T: MemSize> MemSize for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Slice)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Slice(Elements::new(self, self.capacity())));
    }
}

macro_rules! impl_slice {
    ($($slice:ty),+) => {
        $(
            impl<T: MemSize> MemSize for $slice {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Slice)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    let items: &[T] = self;
                    visit(View::Slice(Elements::new(items, items.len())));
                }
            }
        )+
    };
}

impl_slice!(Box<[T]>, &[T], &mut [T]);

impl<T: MemSize, const N: usize> MemSize for [T; N] {
    fn type_desc() -> TypeDesc {
        TypeDesc::array::<Self, T>()
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Array(Elements::new(self, N)));
    }
}

// Maps and sets. A set is a map whose values take up no space.

impl<K: MemSize, V: MemSize, S> MemSize for HashMap<K, V, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Map)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Map(Entries::new(self.len(), self.iter())));
    }
}

impl<K: MemSize, V: MemSize> MemSize for BTreeMap<K, V> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Map)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Map(Entries::new(self.len(), self.iter())));
    }
}

impl<T: MemSize, S> MemSize for HashSet<T, S> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Map)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Map(Entries::new(
            self.len(),
            self.iter().map(|key| (key, &())),
        )));
    }
}

impl<T: MemSize> MemSize for BTreeSet<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Map)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        visit(View::Map(Entries::new(
            self.len(),
            self.iter().map(|key| (key, &())),
        )));
    }
}

// Aggregates.

impl<T: MemSize> MemSize for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let fields = match self {
            Some(value) => Fields::one(value),
            None => Fields::new(),
        };

        visit(View::Struct(fields));
    }
}

crate::impl_mem_size!([A: MemSize] (A,) { 0 });
crate::impl_mem_size!([A: MemSize, B: MemSize] (A, B) { 0, 1 });
crate::impl_mem_size!([A: MemSize, B: MemSize, C: MemSize] (A, B, C) { 0, 1, 2 });
crate::impl_mem_size!([A: MemSize, B: MemSize, C: MemSize, D: MemSize] (A, B, C, D) { 0, 1, 2, 3 });

// Functions. Code and captured state cannot be inspected.

macro_rules! impl_function {
    ($(($($arg:ident),*)),+) => {
        $(
            impl<R, $($arg),*> MemSize for fn($($arg),*) -> R {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Function)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    visit(View::Function);
                }
            }

            impl<R, $($arg),*> MemSize for Box<dyn Fn($($arg),*) -> R> {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Function)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    visit(View::Function);
                }
            }

            impl<R, $($arg),*> MemSize for Box<dyn Fn($($arg),*) -> R + Send + Sync> {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Function)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    visit(View::Function);
                }
            }

            impl<R, $($arg),*> MemSize for Box<dyn FnMut($($arg),*) -> R> {
                fn type_desc() -> TypeDesc {
                    TypeDesc::new::<Self>(Kind::Function)
                }

                fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
                    visit(View::Function);
                }
            }
        )+
    };
}

impl_function!((), (A), (A, B), (A, B, C));

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::cell::Cell;

    use super::*;

    // Captures what a value presents, as owned data.
    #[derive(Debug, PartialEq)]
    enum Seen {
        Kind(Kind),
        Pointer(Option<&'static str>),
        String(usize),
        Elements { len: usize, capacity: usize },
        Entries(usize),
        Fields(Vec<&'static str>),
    }

    fn seen<T: MemSize>(value: &T) -> Seen {
        let mut result = None;

        value.describe(&mut |view| {
            result = Some(match view {
                View::Pointer(target) | View::Interface(target) => {
                    Seen::Pointer(target.map(|t| t.dyn_type_desc().name()))
                }
                View::String { bytes } => Seen::String(bytes),
                View::Slice(elements) | View::Array(elements) => Seen::Elements {
                    len: elements.len(),
                    capacity: elements.capacity(),
                },
                View::Map(entries) => Seen::Entries(entries.len()),
                View::Struct(fields) => {
                    Seen::Fields(fields.iter().map(|f| f.dyn_type_desc().name()).collect())
                }
                other => Seen::Kind(other.kind()),
            });
        });

        result.unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(seen(&5_u32), Seen::Kind(Kind::Scalar));
        assert_eq!(seen(&Duration::ZERO), Seen::Kind(Kind::Scalar));
        assert_eq!(seen(&NonZero::new(3_u8).unwrap()), Seen::Kind(Kind::Scalar));
        assert_eq!(seen(&PhantomData::<str>), Seen::Kind(Kind::Scalar));
        assert_eq!(u64::type_desc().size(), 8);
    }

    #[test]
    fn string_reports_capacity() {
        let mut s = String::with_capacity(32);
        s.push_str("abc");

        assert_eq!(seen(&s), Seen::String(32));
        assert_eq!(seen(&"abcd"), Seen::String(4));
        assert_eq!(seen(&Box::<str>::from("ab")), Seen::String(2));
    }

    #[test]
    fn pointers_present_their_target() {
        let boxed = Box::new(1_u16);
        let dyn_ref: &dyn MemSize = &2_u8;

        assert_eq!(seen(&boxed), Seen::Pointer(Some("u16")));
        assert_eq!(seen(&Rc::new(1_u32)), Seen::Pointer(Some("u32")));
        assert_eq!(seen(&Arc::new(1_u64)), Seen::Pointer(Some("u64")));
        assert_eq!(seen(&&3_i8), Seen::Pointer(Some("i8")));
        assert_eq!(seen(&dyn_ref), Seen::Pointer(Some("u8")));
        assert_eq!(Box::<u16>::type_desc().inner(), Some(u16::type_desc()));
    }

    #[test]
    fn weak_is_never_followed() {
        let strong = Rc::new(1_u32);
        let weak = Rc::downgrade(&strong);

        assert_eq!(seen(&weak), Seen::Pointer(None));
    }

    #[test]
    fn boxed_trait_object_is_interface() {
        let boxed: Box<dyn MemSize> = Box::new(7_u64);

        assert_eq!(Box::<dyn MemSize>::type_desc().kind(), Kind::Interface);
        assert_eq!(seen(&boxed), Seen::Pointer(Some("u64")));
    }

    #[test]
    fn vec_reports_len_and_capacity() {
        let mut v = Vec::with_capacity(10);
        v.extend([1_u32, 2, 3]);

        assert_eq!(seen(&v), Seen::Elements { len: 3, capacity: 10 });
        assert_eq!(
            seen(&v.as_slice()),
            Seen::Elements { len: 3, capacity: 3 }
        );
        assert_eq!(
            seen(&v.clone().into_boxed_slice()),
            Seen::Elements { len: 3, capacity: 3 }
        );
    }

    #[test]
    fn array_knows_its_element_type() {
        let array = [0_u16; 5];

        assert_eq!(seen(&array), Seen::Elements { len: 5, capacity: 5 });
        assert_eq!(<[u16; 5]>::type_desc().inner(), Some(u16::type_desc()));
        assert_eq!(<[u16; 5]>::type_desc().size(), 10);
    }

    #[test]
    fn maps_and_sets_report_len() {
        let map: HashMap<u8, u8> = [(1, 1), (2, 2)].into_iter().collect();
        let tree: BTreeMap<u8, String> = [(1, String::new())].into_iter().collect();
        let set: HashSet<u32> = [1, 2, 3].into_iter().collect();
        let tree_set: BTreeSet<u32> = BTreeSet::new();

        assert_eq!(seen(&map), Seen::Entries(2));
        assert_eq!(seen(&tree), Seen::Entries(1));
        assert_eq!(seen(&set), Seen::Entries(3));
        assert_eq!(seen(&tree_set), Seen::Entries(0));
    }

    #[test]
    fn option_presents_payload_if_any() {
        assert_eq!(seen(&Some(1_u8)), Seen::Fields(vec!["u8"]));
        assert_eq!(seen(&None::<u8>), Seen::Fields(vec![]));
    }

    #[test]
    fn tuples_present_every_field() {
        assert_eq!(seen(&(1_u8, 2_u16)), Seen::Fields(vec!["u8", "u16"]));
        assert_eq!(
            seen(&(1_u8, 2_u16, 'x', true)),
            Seen::Fields(vec!["u8", "u16", "char", "bool"])
        );
    }

    #[test]
    fn functions_cannot_be_inspected() {
        let calls = Cell::new(0_u32);
        let closure: Box<dyn Fn() -> u32> = Box::new(move || calls.get());
        let pointer: fn(u8) -> u8 = |x| x;

        assert_eq!(seen(&closure), Seen::Kind(Kind::Function));
        assert_eq!(seen(&pointer), Seen::Kind(Kind::Function));
        assert_eq!(closure(), 0);
        assert_eq!(pointer(2), 2);
    }
}
