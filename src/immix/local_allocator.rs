//! The per-process allocator.
//!
//! Every `Process` owns exactly one `LocalAllocator`: a young generation
//! (bump-allocated, copy-collected) and a mature generation (block
//! allocated, mark-compacted), plus the remembered set recording
//! mature-to-young writes the write barrier has observed.

use std::collections::HashSet;

use crate::immix::bucket::Bucket;
use crate::immix::copy_object::CopyObject;
use crate::immix::global_allocator::RcGlobalAllocator;
use crate::object::Object;
use crate::object_pointer::ObjectPointer;
use crate::object_value::ObjectValue;

/// Number of young collections a surviving object endures before being
/// promoted to the mature generation.
const MAX_YOUNG_AGE: u8 = 3;

pub struct LocalAllocator {
    pub young_generation: Bucket,
    pub mature_generation: Bucket,
    pub global_allocator: RcGlobalAllocator,
    pub remembered_set: HashSet<ObjectPointer>,

    young_threshold: u32,
    mature_threshold: u32,
}

impl LocalAllocator {
    pub fn new(global_allocator: RcGlobalAllocator, young_threshold: u32, mature_threshold: u32) -> Self {
        LocalAllocator {
            young_generation: Bucket::new(),
            mature_generation: Bucket::new(),
            global_allocator,
            remembered_set: HashSet::new(),
            young_threshold,
            mature_threshold,
        }
    }

    pub fn allocate_empty(&mut self) -> ObjectPointer {
        self.allocate_without_prototype(ObjectValue::None)
    }

    pub fn allocate_with_prototype(&mut self, value: ObjectValue, prototype: ObjectPointer) -> ObjectPointer {
        self.young_generation.allocate(Object::with_prototype(value, prototype))
    }

    pub fn allocate_without_prototype(&mut self, value: ObjectValue) -> ObjectPointer {
        self.young_generation.allocate(Object::new(value))
    }

    /// Allocates directly into the mature generation. Used by the tracer
    /// when promoting a surviving young object (the object already exists;
    /// this just gives it its new, mature home).
    pub fn allocate_mature(&mut self, object: Object) -> ObjectPointer {
        let pointer = self.mature_generation.allocate(object);

        pointer.get_mut().set_mature();
        pointer
    }

    /// Copies an externally-produced object (e.g. one sitting in the
    /// mailbox's own arena) into this process's young generation so it
    /// outlives the mailbox slot it arrived in.
    pub fn move_object(&mut self, pointer: ObjectPointer) -> ObjectPointer {
        self.copy_object(pointer)
    }

    pub fn young_block_allocation_threshold_exceeded(&self) -> bool {
        self.young_generation.block_count() as u32 >= self.young_threshold
    }

    pub fn mature_block_allocation_threshold_exceeded(&self) -> bool {
        self.mature_generation.block_count() as u32 >= self.mature_threshold
    }

    pub fn increment_young_ages(&mut self) {
        self.young_generation.increment_age();
    }

    pub fn should_promote_young(&self) -> bool {
        self.young_generation.should_promote(MAX_YOUNG_AGE)
    }

    pub fn mature_generation_mut(&mut self) -> &mut Bucket {
        &mut self.mature_generation
    }

    pub fn remember_object(&mut self, pointer: ObjectPointer) {
        self.remembered_set.insert(pointer);
    }

    pub fn has_remembered_objects(&self) -> bool {
        !self.remembered_set.is_empty()
    }

    pub fn remembered_pointers(&mut self) -> Vec<ObjectPointer> {
        self.remembered_set.drain().collect()
    }

    /// Replaces the young generation with a fresh, empty bucket, returning
    /// the old one so the collector can iterate its blocks one last time
    /// (e.g. to finalize unreachable resources) before dropping them.
    pub fn swap_young_generation(&mut self) -> Bucket {
        std::mem::replace(&mut self.young_generation, Bucket::new())
    }
}

impl CopyObject for LocalAllocator {
    fn allocate_copy(&mut self, object: Object) -> ObjectPointer {
        self.young_generation.allocate(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::immix::global_allocator::GlobalAllocator;

    fn new_allocator() -> LocalAllocator {
        LocalAllocator::new(GlobalAllocator::new(), 8, 8)
    }

    #[test]
    fn test_allocate_empty() {
        let mut allocator = new_allocator();
        let pointer = allocator.allocate_empty();

        assert!(pointer.is_boxed());
        assert!(pointer.is_young());
    }

    #[test]
    fn test_allocate_mature_sets_mature_flag() {
        let mut allocator = new_allocator();
        let pointer = allocator.allocate_mature(Object::new(ObjectValue::None));

        assert!(pointer.is_mature());
    }

    #[test]
    fn test_remember_object() {
        let mut allocator = new_allocator();
        let pointer = allocator.allocate_empty();

        assert!(!allocator.has_remembered_objects());

        allocator.remember_object(pointer);

        assert!(allocator.has_remembered_objects());
    }
}
