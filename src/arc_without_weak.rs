//! An `Arc` without the ability to create weak references.
//!
//! `std::sync::Arc` reserves a word in its allocation for a weak count even
//! when no `Weak` is ever created. Processes and a handful of other
//! frequently-allocated shared structures in this VM never need weak
//! references, so `ArcWithoutWeak` drops that bookkeeping and is a single
//! atomic refcount plus the payload.
//!
//! The payload is stored as the first field so a pointer to the payload and a
//! pointer to the allocation are the same address; this is what makes
//! `into_raw`/`from_raw` a plain pointer cast instead of needing offset math.

use std::ops::Deref;
use std::process;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

#[repr(C)]
struct ArcInner<T> {
    value: T,
    count: AtomicUsize,
}

pub struct ArcWithoutWeak<T> {
    inner: NonNull<ArcInner<T>>,
}

unsafe impl<T: Sync + Send> Send for ArcWithoutWeak<T> {}
unsafe impl<T: Sync + Send> Sync for ArcWithoutWeak<T> {}

impl<T> ArcWithoutWeak<T> {
    pub fn new(value: T) -> Self {
        let inner = Box::new(ArcInner {
            value,
            count: AtomicUsize::new(1),
        });

        ArcWithoutWeak {
            inner: Box::leak(inner).into(),
        }
    }

    pub fn as_ptr(&self) -> *const T {
        self.inner.as_ptr() as *const T
    }

    /// Consumes this handle and returns the raw pointer to the payload,
    /// without decrementing the refcount. The caller is responsible for
    /// eventually reconstructing an `ArcWithoutWeak` (via `from_raw`), or the
    /// allocation leaks.
    pub fn into_raw(this: Self) -> *mut T {
        let ptr = this.inner.as_ptr() as *mut T;

        std::mem::forget(this);

        ptr
    }

    /// Reconstructs an `ArcWithoutWeak` from a pointer previously produced by
    /// `into_raw`. The pointer must still be backed by a live `ArcInner<T>`
    /// allocation.
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        ArcWithoutWeak {
            inner: NonNull::new_unchecked(ptr as *mut ArcInner<T>),
        }
    }
}

impl<T> Clone for ArcWithoutWeak<T> {
    fn clone(&self) -> Self {
        unsafe {
            self.inner.as_ref().count.fetch_add(1, Ordering::Relaxed);
        }

        ArcWithoutWeak { inner: self.inner }
    }
}

impl<T> Deref for ArcWithoutWeak<T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &self.inner.as_ref().value }
    }
}

impl<T> Drop for ArcWithoutWeak<T> {
    fn drop(&mut self) {
        unsafe {
            if self.inner.as_ref().count.fetch_sub(1, Ordering::Release) != 1 {
                return;
            }

            std::sync::atomic::fence(Ordering::Acquire);

            // Avoid a double panic tearing down the allocation while the
            // thread is already unwinding.
            if std::thread::panicking() {
                let ptr = self.inner.as_ptr();

                if std::panic::catch_unwind(|| drop(Box::from_raw(ptr))).is_err() {
                    process::abort();
                }
            } else {
                drop(Box::from_raw(self.inner.as_ptr()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_and_drop() {
        let a = ArcWithoutWeak::new(10);
        let b = a.clone();

        assert_eq!(*a, 10);
        assert_eq!(*b, 10);

        drop(a);

        assert_eq!(*b, 10);
    }

    #[test]
    fn test_into_raw_and_from_raw() {
        let a = ArcWithoutWeak::new(String::from("hello"));
        let ptr = ArcWithoutWeak::into_raw(a);

        let b = unsafe { ArcWithoutWeak::from_raw(ptr) };

        assert_eq!(*b, "hello");
    }

    #[test]
    fn test_as_ptr_stable_across_clone() {
        let a = ArcWithoutWeak::new(42);
        let b = a.clone();

        assert_eq!(a.as_ptr(), b.as_ptr());
    }
}
