//! Allocation into the shared, immortal permanent space.
//!
//! Objects allocated here (module singletons, interned strings, code
//! objects' literal wrappers) are flagged permanent and are never visited
//! by a process' collector; they may be freely shared by reference across
//! processes (3. Invariant 2).

use parking_lot::Mutex;
use std::sync::Arc;

use crate::immix::bucket::Bucket;
use crate::immix::copy_object::CopyObject;
use crate::immix::global_allocator::RcGlobalAllocator;
use crate::object::Object;
use crate::object_pointer::ObjectPointer;
use crate::object_value::ObjectValue;

pub struct PermanentAllocator {
    bucket: Bucket,
    global_allocator: RcGlobalAllocator,
}

pub type RcPermanentAllocator = Arc<Mutex<PermanentAllocator>>;

impl PermanentAllocator {
    pub fn new(global_allocator: RcGlobalAllocator) -> Self {
        PermanentAllocator {
            bucket: Bucket::new(),
            global_allocator,
        }
    }

    pub fn allocate_empty(&mut self) -> ObjectPointer {
        self.allocate_without_prototype(ObjectValue::None)
    }

    pub fn allocate_with_prototype(&mut self, value: ObjectValue, prototype: ObjectPointer) -> ObjectPointer {
        let pointer = self.bucket_allocate(Object::with_prototype(value, prototype));

        self.mark_permanent(pointer)
    }

    pub fn allocate_without_prototype(&mut self, value: ObjectValue) -> ObjectPointer {
        let pointer = self.bucket_allocate(Object::new(value));

        self.mark_permanent(pointer)
    }

    fn bucket_allocate(&mut self, object: Object) -> ObjectPointer {
        self.bucket.allocate(object)
    }

    fn mark_permanent(&self, pointer: ObjectPointer) -> ObjectPointer {
        pointer.get_mut().set_permanent();
        pointer
    }

    pub fn global_allocator(&self) -> &RcGlobalAllocator {
        &self.global_allocator
    }
}

impl CopyObject for PermanentAllocator {
    fn allocate_copy(&mut self, object: Object) -> ObjectPointer {
        let pointer = self.bucket_allocate(object);

        self.mark_permanent(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immix::global_allocator::GlobalAllocator;

    #[test]
    fn test_allocate_empty_is_permanent() {
        let mut allocator = PermanentAllocator::new(GlobalAllocator::new());
        let pointer = allocator.allocate_empty();

        assert!(pointer.is_permanent());
    }

    #[test]
    fn test_copy_object_preserves_permanence() {
        let mut allocator = PermanentAllocator::new(GlobalAllocator::new());
        let original = allocator.allocate_without_prototype(ObjectValue::Integer(9));
        let copy = allocator.copy_object(original);

        // Already permanent, so copy_object should hand back the same
        // pointer rather than duplicating it.
        assert_eq!(copy, original);
    }
}
