use std::{fmt, ptr};

/// A location in the address space of the current process.
///
/// Code dealing with `usize` is oblivious to the zero address. Code dealing with `Address` is
/// not: it treats the zero address as "no stable address". This is the case for values that
/// are reached through an owner that does not give them a fixed location for the purpose of a
/// scan, such as the keys and values of a map.
///
/// Offsetting an invalid address yields an invalid address. It never wraps around to produce
/// a spurious valid address.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(usize);

impl Address {
    /// The "no stable address" sentinel.
    pub const INVALID: Self = Self(0);

    /// Creates an address from a raw integer. Zero is the invalid address.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// The address at which `value` is currently located.
    #[must_use]
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Self(ptr_to_usize(value))
    }

    /// Whether this address identifies a trackable location.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// The address as a raw integer.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Returns the address `offset` bytes past this one.
    ///
    /// An invalid address stays invalid.
    ///
    /// # Panics
    ///
    /// Panics if the result does not fit in the address space. That cannot happen for an
    /// offset inside a live value.
    #[must_use]
    pub fn offset(self, offset: usize) -> Self {
        if !self.is_valid() {
            return Self::INVALID;
        }

        Self(
            self.0
                .checked_add(offset)
                .expect("offset address overflows usize - the value cannot exist at this address"),
        )
    }

    /// The distance in bytes from `base` to this address, if this address is not below `base`.
    #[must_use]
    pub fn distance_from(self, base: Self) -> Option<usize> {
        self.0.checked_sub(base.0)
    }
}

fn ptr_to_usize<T: ?Sized>(value: &T) -> usize {
    // Fat pointers carry metadata we do not need. Only the data address identifies the value.
    ptr::from_ref(value).cast::<u8>().addr()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn zero_is_invalid() {
        assert!(!Address::INVALID.is_valid());
        assert!(!Address::new(0).is_valid());
        assert!(Address::new(1).is_valid());
    }

    #[test]
    fn offset_of_invalid_stays_invalid() {
        assert_eq!(Address::INVALID.offset(16), Address::INVALID);
        assert_eq!(Address::INVALID.offset(usize::MAX), Address::INVALID);
    }

    #[test]
    fn offset_of_valid_moves_forward() {
        assert_eq!(Address::new(0x1000).offset(0x20), Address::new(0x1020));
        assert_eq!(Address::new(0x1000).offset(0), Address::new(0x1000));
    }

    #[test]
    #[should_panic]
    fn offset_past_end_of_address_space_panics() {
        let _ = Address::new(usize::MAX).offset(1);
    }

    #[test]
    fn of_reports_field_locations() {
        let pair = (1_u64, 2_u64);

        let base = Address::of(&pair);
        let first = Address::of(&pair.0);
        let second = Address::of(&pair.1);

        assert!(base.is_valid());
        assert_eq!(first.distance_from(base).map(|d| d % 8), Some(0));
        assert_eq!(second.distance_from(base).map(|d| d % 8), Some(0));
        assert_ne!(first, second);
    }

    #[test]
    fn distance_below_base_is_none() {
        assert_eq!(Address::new(8).distance_from(Address::new(16)), None);
        assert_eq!(Address::new(24).distance_from(Address::new(16)), Some(8));
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Address::new(0xbeef).to_string(), "0xbeef");
    }
}
