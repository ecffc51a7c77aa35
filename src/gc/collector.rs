//! Moving young-generation collection and mark/evacuate mature-generation
//! collection for a single (already suspended) process (4.B collection,
//! 3. Invariant 3 write barrier).
//!
//! The young collector is a straight semispace copy: adapted from
//! `immix/copy_object.rs`'s `CopyObject::copy_value` dispatch, but diverging
//! from it in one respect -- it stops at the boundary of the mature
//! generation (a mature child is left untouched, never duplicated) and
//! installs a forwarding pointer on every object it moves so a second
//! reference to the same object resolves to the copy already made instead
//! of being duplicated again.
//!
//! The mature collector instead parallel-marks with `gc::tracer::Pool`
//! (reusing the exact job-stealing pool the young collector has no use
//! for, since copying can't safely happen from more than one thread without
//! the allocator synchronization the upstream tracer pool assumes but this
//! port doesn't implement -- see `gc::tracer`'s module doc), then evacuates
//! only the fragmented mature blocks `immix::bucket::Bucket` already knows
//! how to identify.

use std::collections::HashSet;

use crate::gc::statistics::TraceStatistics;
use crate::gc::tracer;
use crate::immix::bucket::Bucket;
use crate::object::Object;
use crate::object_pointer::ObjectPointer;
use crate::object_value::ObjectValue;
use crate::process::RcProcess;

/// Survival rate below which a mature block is evacuated rather than kept
/// in place.
const FRAGMENTATION_THRESHOLD: f64 = 0.35;

/// Collects the young generation of `process`, promoting the whole
/// generation to mature if it has survived enough collections
/// (`LocalAllocator::should_promote_young`).
pub fn collect_young(process: &RcProcess) -> TraceStatistics {
    let promote = process.local_data().allocator.should_promote_young();
    let mut old_young = process.local_data_mut().allocator.swap_young_generation();
    let mut stats = TraceStatistics::new();

    let remembered = process.local_data_mut().allocator.remembered_pointers();

    for pointer in remembered {
        scan_remembered(process, pointer, promote, &mut stats);
    }

    for slot in process.roots() {
        let moved = evacuate(process, *slot.get(), promote, &mut stats);

        *slot.get_mut() = moved;
    }

    if !promote {
        process.local_data_mut().allocator.increment_young_ages();
    }

    process
        .local_data_mut()
        .allocator
        .global_allocator
        .add_blocks(&mut old_young.blocks);

    stats
}

/// Re-scans a remembered mature object (one the write barrier flagged as
/// holding a pointer into the young generation) for young children, moving
/// anything it still points at without moving the remembered object itself.
fn scan_remembered(process: &RcProcess, remembered: ObjectPointer, promote: bool, stats: &mut TraceStatistics) {
    if let ObjectValue::Array(array) = &mut remembered.get_mut().value {
        for element in array.iter_mut() {
            *element = evacuate(process, *element, promote, stats);
        }
    }

    if let ObjectValue::Block(block) = &mut remembered.get_mut().value {
        if let Some(binding) = &block.captured_binding {
            binding.each_pointer(&mut |slot| {
                let moved = evacuate(process, *slot.get(), promote, stats);

                *slot.get_mut() = moved;
            });
        }

        block.receiver = evacuate(process, block.receiver, promote, stats);
    }

    if let Some(header) = remembered.get().attributes_map() {
        for name in header.attribute_names() {
            if let Some(value) = header.get_attribute(&name) {
                let new_name = evacuate(process, name, promote, stats);
                let new_value = evacuate(process, value, promote, stats);

                remembered.get_mut().add_attribute(new_name, new_value);
            }
        }
    }
}

/// Moves `pointer` if it is a young, not-yet-forwarded object, returning its
/// new address. Mature, permanent and immediate pointers pass through
/// untouched.
fn evacuate(process: &RcProcess, pointer: ObjectPointer, promote: bool, stats: &mut TraceStatistics) -> ObjectPointer {
    if !pointer.is_boxed() || pointer.is_permanent() || pointer.is_mature() {
        return pointer;
    }

    if pointer.get().is_forwarded() {
        let mut resolved = pointer;
        resolved.resolve_forwarding_pointer();

        return resolved;
    }

    let mut moved = pointer.get_mut().take();

    moved.value = evacuate_value(process, moved.value, promote, stats);

    if let Some(header) = moved.header.as_mut() {
        for name in header.attribute_names() {
            if let Some(value) = header.get_attribute(&name) {
                let new_name = evacuate(process, name, promote, stats);
                let new_value = evacuate(process, value, promote, stats);

                header.add_attribute(new_name, new_value);
            }
        }
    }

    let new_pointer = if promote {
        stats.promoted += 1;
        process.local_data_mut().allocator.allocate_mature(moved)
    } else {
        stats.evacuated += 1;
        process.local_data_mut().allocator.young_generation.allocate(moved)
    };

    pointer.get_mut().forward_to(new_pointer);
    stats.marked += 1;

    new_pointer
}

fn evacuate_value(process: &RcProcess, value: ObjectValue, promote: bool, stats: &mut TraceStatistics) -> ObjectValue {
    match value {
        ObjectValue::Array(mut array) => {
            for element in array.iter_mut() {
                *element = evacuate(process, *element, promote, stats);
            }

            ObjectValue::Array(array)
        }
        ObjectValue::Block(block) => {
            let receiver = evacuate(process, block.receiver, promote, stats);

            if let Some(binding) = &block.captured_binding {
                binding.each_pointer(&mut |slot| {
                    let moved = evacuate(process, *slot.get(), promote, stats);

                    *slot.get_mut() = moved;
                });
            }

            ObjectValue::Block(Box::new(crate::block::Block::new(
                block.code.clone(),
                receiver,
                block.captured_binding.clone(),
            )))
        }
        other => other,
    }
}

/// Marks the whole reachable graph with `pool`, then evacuates whichever
/// mature blocks fall under the fragmentation threshold.
pub fn collect_mature(process: &RcProcess, pool: &tracer::Pool) -> TraceStatistics {
    process.local_data_mut().allocator.young_generation.reset_marks();
    process.local_data_mut().allocator.mature_generation.reset_marks();

    for slot in process.roots() {
        pool.schedule(slot);
    }

    let mut stats = pool.trace();

    let mature = process.local_data_mut().allocator.mature_generation_mut();

    mature.mark_fragmented_blocks(FRAGMENTATION_THRESHOLD);

    let (fragmented, kept): (Vec<_>, Vec<_>) =
        std::mem::take(&mut mature.blocks).into_iter().partition(|block| block.is_fragmented());

    mature.blocks = kept;

    let mut survivors = Bucket::new();

    for mut block in fragmented {
        for object in block.iter_mut() {
            if object.is_marked() {
                let taken = object.take();
                let new_pointer = survivors.allocate(taken);

                object.forward_to(new_pointer);

                stats.evacuated += 1;
            }
        }
    }

    mature.append(&mut survivors);

    resolve_forwarding(process);

    stats
}

/// Rewrites every reachable slot still pointing at an object that has since
/// been forwarded, following a mature evacuation pass.
fn resolve_forwarding(process: &RcProcess) {
    let mut visited = HashSet::new();

    for slot in process.roots() {
        let mut pointer = *slot.get();

        resolve(&mut pointer, &mut visited);

        *slot.get_mut() = pointer;
    }
}

fn resolve(pointer: &mut ObjectPointer, visited: &mut HashSet<usize>) {
    if !pointer.is_boxed() {
        return;
    }

    if pointer.get().is_forwarded() {
        pointer.resolve_forwarding_pointer();
    }

    if !visited.insert(pointer.raw.raw as usize) {
        return;
    }

    resolve_children(*pointer, visited);
}

fn resolve_children(pointer: ObjectPointer, visited: &mut HashSet<usize>) {
    if let ObjectValue::Array(array) = &mut pointer.get_mut().value {
        for element in array.iter_mut() {
            resolve(element, visited);
        }
    }

    if let ObjectValue::Block(block) = &mut pointer.get_mut().value {
        if let Some(binding) = &block.captured_binding {
            binding.each_pointer(&mut |slot| {
                let mut value = *slot.get();

                resolve(&mut value, visited);

                *slot.get_mut() = value;
            });
        }

        resolve(&mut block.receiver, visited);
    }

    if let Some(header) = pointer.get().attributes_map() {
        for name in header.attribute_names() {
            if let Some(value) = header.get_attribute(&name) {
                let mut new_name = name;
                let mut new_value = value;

                resolve(&mut new_name, visited);
                resolve(&mut new_value, visited);

                pointer.get_mut().add_attribute(new_name, new_value);
            }
        }
    }
}

/// Marks the mailbox's pending messages as still in use, or reclaims the
/// mailbox arena outright if it is currently empty. A mailbox's messages are
/// moved onto the receiving process' own heap as they're read
/// (`Process::receive_message`), so once the queue drains there is nothing
/// left in the arena to preserve.
pub fn collect_mailbox(process: &RcProcess) {
    if !process.has_messages() {
        process.local_data_mut().mailbox.reset_allocator();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiled_code::CompiledCode;
    use crate::config::Config;
    use crate::global_scope::GlobalScope;
    use crate::immix::global_allocator::GlobalAllocator;
    use crate::object_value;
    use crate::process::Process;

    fn process() -> RcProcess {
        let code = CompiledCode::with_rc("main".to_string(), "main.aeon".to_string(), 1, Vec::new());

        Process::from_code(
            0,
            code,
            ObjectPointer::integer(1),
            GlobalScope::new(),
            GlobalAllocator::new(),
            &Config::new(),
        )
    }

    #[test]
    fn test_collect_young_survives_reachable_object() {
        let process = process();
        let pointer = process
            .local_data_mut()
            .allocator
            .allocate_without_prototype(object_value::integer(42));

        process.context_mut().set_register(0, pointer);

        let stats = collect_young(&process);

        assert_eq!(stats.evacuated, 1);

        let moved = process.context().get_register(0).unwrap();

        assert_eq!(moved.integer_value().unwrap(), 42);
        assert!(moved.is_young());
    }

    #[test]
    fn test_collect_young_promotes_when_aged() {
        let process = process();
        let pointer = process
            .local_data_mut()
            .allocator
            .allocate_without_prototype(object_value::integer(1));

        process.context_mut().set_register(0, pointer);

        for _ in 0..10 {
            process.local_data_mut().allocator.increment_young_ages();
        }

        collect_young(&process);

        let moved = process.context().get_register(0).unwrap();

        assert!(moved.is_mature());
    }

    #[test]
    fn test_collect_mailbox_resets_when_empty() {
        let process = process();

        assert!(!process.has_messages());

        collect_mailbox(&process);

        assert_eq!(process.local_data().mailbox.block_count(), 0);
    }
}
