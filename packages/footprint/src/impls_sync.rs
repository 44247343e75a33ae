//! `MemSize` for types with interior mutability.
//!
//! The contents of these types are only inspected while a guard is held, so they cannot change
//! during the inspection. A value that is exclusively held elsewhere is presented without its
//! contents and whatever memory it owns is not counted.

use std::any::type_name;
use std::cell::RefCell;
use std::sync::{self, TryLockError};

use tracing::trace;

use crate::{Fields, Kind, MemSize, TypeDesc, View};

/// Presents the contents of `L` obtained through a guard, or nothing if no guard was available.
fn present_guarded<L, T: MemSize>(contents: Option<&T>, visit: &mut dyn FnMut(View<'_>)) {
    let fields = contents.map_or_else(
        || {
            trace!(
                type_name = type_name::<L>(),
                "contents are exclusively held elsewhere, skipping"
            );
            Fields::new()
        },
        |contents| Fields::one(contents),
    );

    visit(View::Struct(fields));
}

fn into_option<G>(result: sync::TryLockResult<G>) -> Option<G> {
    match result {
        Ok(guard) => Some(guard),
        // A poisoned lock still holds a consistent value as far as its memory is concerned.
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

impl<T: MemSize> MemSize for RefCell<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let guard = self.try_borrow().ok();
        present_guarded::<Self, T>(guard.as_deref(), visit);
    }
}

impl<T: MemSize> MemSize for sync::Mutex<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let guard = into_option(self.try_lock());
        present_guarded::<Self, T>(guard.as_deref(), visit);
    }
}

impl<T: MemSize> MemSize for sync::RwLock<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let guard = into_option(self.try_read());
        present_guarded::<Self, T>(guard.as_deref(), visit);
    }
}

impl<T: MemSize> MemSize for parking_lot::Mutex<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let guard = self.try_lock();
        present_guarded::<Self, T>(guard.as_deref(), visit);
    }
}

impl<T: MemSize> MemSize for parking_lot::RwLock<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::new::<Self>(Kind::Struct)
    }

    fn describe(&self, visit: &mut dyn FnMut(View<'_>)) {
        let guard = self.try_read();
        present_guarded::<Self, T>(guard.as_deref(), visit);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn field_count<T: MemSize>(value: &T) -> usize {
        let mut count = None;

        value.describe(&mut |view| {
            if let View::Struct(fields) = view {
                count = Some(fields.iter().count());
            }
        });

        count.unwrap()
    }

    #[test]
    fn ref_cell_skips_exclusively_borrowed_contents() {
        let cell = RefCell::new(5_u32);
        assert_eq!(field_count(&cell), 1);

        let shared = cell.borrow();
        assert_eq!(field_count(&cell), 1);
        drop(shared);

        let exclusive = cell.borrow_mut();
        assert_eq!(field_count(&cell), 0);
        drop(exclusive);
    }

    #[test]
    fn std_mutex_skips_held_contents() {
        let mutex = sync::Mutex::new(vec![1_u8]);
        assert_eq!(field_count(&mutex), 1);

        let guard = mutex.lock().unwrap();
        assert_eq!(field_count(&mutex), 0);
        drop(guard);
    }

    #[test]
    fn std_mutex_presents_poisoned_contents() {
        let mutex = Arc::new(sync::Mutex::new(1_u32));

        let poisoner = Arc::clone(&mutex);
        let result = thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poisoning the mutex");
        })
        .join();

        assert!(result.is_err());
        assert!(mutex.is_poisoned());
        assert_eq!(field_count(&*mutex), 1);
    }

    #[test]
    fn std_rw_lock_allows_concurrent_readers() {
        let lock = sync::RwLock::new(String::from("abc"));

        let reader = lock.read().unwrap();
        assert_eq!(field_count(&lock), 1);
        drop(reader);

        let writer = lock.write().unwrap();
        assert_eq!(field_count(&lock), 0);
        drop(writer);
    }

    #[test]
    fn parking_lot_locks_skip_held_contents() {
        let mutex = parking_lot::Mutex::new(1_u64);
        let lock = parking_lot::RwLock::new(2_u64);

        assert_eq!(field_count(&mutex), 1);
        assert_eq!(field_count(&lock), 1);

        let mutex_guard = mutex.lock();
        let lock_guard = lock.write();

        assert_eq!(field_count(&mutex), 0);
        assert_eq!(field_count(&lock), 0);

        drop(mutex_guard);
        drop(lock_guard);
    }
}
