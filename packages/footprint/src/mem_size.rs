use crate::{TypeDesc, View};

/// A value whose memory footprint can be measured by a scan.
///
/// Implementations describe the static shape of the type in [`type_desc()`][Self::type_desc]
/// and present each value to the scanner in [`describe()`][Self::describe]. The scanner uses
/// the two together to find all memory owned directly or indirectly by a value, counting each
/// byte once even if it is reachable through multiple paths.
///
/// Implementations are provided for common standard library types, for `parking_lot` locks and
/// for `crossbeam` channels. Plain-data types and structs can implement the trait via
/// [`impl_mem_size!`][crate::impl_mem_size].
///
/// # Contract
///
/// * `describe()` must call `visit` exactly once, with a [`View`] of the same [`Kind`][crate::Kind]
///   as the one declared in `type_desc()`. Calls after the first are ignored.
/// * References passed via [`View::Struct`] fields must point inside the value itself.
///
/// A scan that observes a broken contract fails with an [`Error`][crate::Error].
///
/// # Example
///
/// ```
/// use footprint::{Fields, Kind, MemSize, TypeDesc, View};
///
/// struct Config {
///     name: String,
///     retries: u32,
/// }
///
/// impl MemSize for Config {
///     fn type_desc() -> TypeDesc {
///         TypeDesc::new::<Self>(Kind::Struct)
///     }
///
///     fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
///         let mut fields = Fields::one(&self.name);
///         fields.push(&self.retries);
///
///         visit(View::Struct(fields));
///     }
/// }
///
/// let config = Config {
///     name: "primary".to_string(),
///     retries: 3,
/// };
///
/// let sizes = footprint::scan(&config).unwrap();
/// assert!(sizes.total() >= size_of::<Config>() + "primary".len());
/// ```
pub trait MemSize: DynMemSize {
    /// Describes the static shape of the type.
    fn type_desc() -> TypeDesc
    where
        Self: Sized;

    /// Presents the value to the scanner by calling `visit` once.
    fn describe(&self, visit: &mut dyn FnMut(View<'_>));
}

/// Object-safe access to the type descriptor of a [`MemSize`] value.
///
/// This is implemented for every sized [`MemSize`] type and is what allows a scan to start
/// from, or pass through, a `dyn MemSize`. There is no need to implement it manually.
pub trait DynMemSize {
    /// The descriptor of the concrete type of the value.
    fn dyn_type_desc(&self) -> TypeDesc;

    /// The value as a trait object.
    fn as_dyn_mem_size(&self) -> &dyn MemSize;
}

impl<T: MemSize> DynMemSize for T {
    fn dyn_type_desc(&self) -> TypeDesc {
        T::type_desc()
    }

    fn as_dyn_mem_size(&self) -> &dyn MemSize {
        self
    }
}

/// Implements [`MemSize`] for plain-data types or for structs.
///
/// Plain-data types own no memory outside of their in-place representation:
///
/// ```
/// #[derive(Clone, Copy)]
/// struct Point {
///     x: f32,
///     y: f32,
/// }
///
/// footprint::impl_mem_size!(scalar Point);
/// ```
///
/// Structs list the fields that the scanner should walk. Fields not listed are still part of
/// the in-place size of the struct, they are just not inspected for memory they own elsewhere.
/// Tuple struct fields are listed by index.
///
/// ```
/// struct Inventory {
///     items: Vec<String>,
///     owner: Box<str>,
/// }
///
/// footprint::impl_mem_size!(Inventory { items, owner });
///
/// struct Wrapper<T>(Vec<T>);
///
/// footprint::impl_mem_size!([T: footprint::MemSize] Wrapper<T> { 0 });
/// ```
#[macro_export]
macro_rules! impl_mem_size {
    (scalar $($ty:ty),+ $(,)?) => {
        $(
            impl $crate::MemSize for $ty {
                fn type_desc() -> $crate::TypeDesc {
                    $crate::TypeDesc::new::<Self>($crate::Kind::Scalar)
                }

                fn describe(&self, visit: &mut dyn FnMut($crate::View<'_>)) {
                    visit($crate::View::Scalar);
                }
            }
        )+
    };
    ([$($generics:tt)*] $ty:ty { $($field:tt),+ $(,)? }) => {
        impl<$($generics)*> $crate::MemSize for $ty {
            fn type_desc() -> $crate::TypeDesc {
                $crate::TypeDesc::new::<Self>($crate::Kind::Struct)
            }

            fn describe(&self, visit: &mut dyn FnMut($crate::View<'_>)) {
                let mut fields = $crate::Fields::new();
                $(fields.push(&self.$field);)+

                visit($crate::View::Struct(fields));
            }
        }
    };
    ($ty:ty { $($field:tt),+ $(,)? }) => {
        $crate::impl_mem_size!([] $ty { $($field),+ });
    };
}
