//! Tagging and untagging of raw pointers.
//!
//! A handful of places in the VM need to atomically swap a pointer while
//! also recording one bit of extra information (for example: "is this
//! process suspended with or without a timeout"). `TaggedPointer` packs that
//! bit into the pointer's own low bits, relying on the fact that anything we
//! point at here (a `Timeout`, an `ObjectPointer`'s target) is more than
//! 1-byte aligned.

use std::sync::atomic::{AtomicPtr, Ordering};

const MASK: usize = 0x1;

/// Returns a copy of `pointer` with `bit` set.
pub fn with_bit<T>(pointer: *mut T, bit: usize) -> *mut T {
    ((pointer as usize) | (1 << bit)) as *mut T
}

/// Returns a copy of `pointer` with every tag bit cleared.
pub fn untagged<T>(pointer: *mut T) -> *mut T {
    ((pointer as usize) & !MASK) as *mut T
}

pub struct TaggedPointer<T> {
    inner: AtomicPtr<T>,
}

impl<T> TaggedPointer<T> {
    pub fn null() -> Self {
        TaggedPointer {
            inner: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    pub fn atomic_load(&self) -> *mut T {
        self.inner.load(Ordering::Acquire)
    }

    pub fn atomic_store(&self, value: *mut T) {
        self.inner.store(value, Ordering::Release);
    }

    /// Attempts to atomically replace the current value with `new` if it
    /// still equals `current`. Returns whether the swap happened.
    pub fn compare_and_swap(&self, current: *mut T, new: *mut T) -> bool {
        self.inner
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_bit_and_untagged() {
        let mut value = 10;
        let ptr = &mut value as *mut i32;
        let tagged = with_bit(ptr, 0);

        assert_ne!(tagged, ptr);
        assert_eq!(untagged(tagged), ptr);
    }

    #[test]
    fn test_compare_and_swap() {
        let tp: TaggedPointer<i32> = TaggedPointer::null();

        let mut value = 1;
        let ptr = &mut value as *mut i32;

        assert!(tp.compare_and_swap(std::ptr::null_mut(), ptr));
        assert_eq!(tp.atomic_load(), ptr);
    }
}
