use thiserror::Error;

use crate::Kind;

/// Errors that can occur when scanning memory.
///
/// Other than [`UnknownRoot`][Error::UnknownRoot], every variant indicates a [`MemSize`]
/// implementation that does not uphold the contract of the trait. Such a failure aborts the
/// scan, as any result produced from that point on would be wrong.
///
/// [`MemSize`]: crate::MemSize
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A scan was requested for a root name that was never registered.
    #[error("no root named '{name}' is registered")]
    UnknownRoot {
        /// The name that was requested.
        name: String,
    },

    /// A value presented a view of a different kind than its type declares.
    #[error("value of type {type_name} is declared as {declared} but presented itself as {observed}")]
    KindMismatch {
        /// The type of the value.
        type_name: &'static str,

        /// The kind declared by the type descriptor.
        declared: Kind,

        /// The kind of the view the value presented.
        observed: Kind,
    },

    /// A value did not present any view of itself.
    #[error("value of type {type_name} did not present a view of itself")]
    MissingView {
        /// The type of the value.
        type_name: &'static str,
    },

    /// An aggregate value presented a field that is not located inside the value.
    #[error("value of type {type_name} presented a field of type {field_type} located outside of it")]
    FieldOutOfBounds {
        /// The type of the aggregate value.
        type_name: &'static str,

        /// The type of the field.
        field_type: &'static str,
    },
}

/// A specialized `Result` type for scan operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
