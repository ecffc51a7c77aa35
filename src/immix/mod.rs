//! The generational, evacuating allocator backing every process heap plus
//! the shared permanent space (3. Heap, 4.B Per-process Heap & Collector).

pub mod block;
pub mod block_list;
pub mod bucket;
pub mod copy_object;
pub mod global_allocator;
pub mod local_allocator;
pub mod mailbox_allocator;
pub mod permanent_allocator;
