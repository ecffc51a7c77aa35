//! The block pool shared by every process.
//!
//! Blocks reclaimed when a process' heap is dropped are handed back here
//! instead of being freed outright, so the next process to grow its young
//! generation can reuse an already-allocated block instead of paying for a
//! fresh one. This is the one allocator-level structure shared across
//! process boundaries (9. Global mutable state: explicitly allow-listed).

use std::sync::Arc;

use parking_lot::Mutex;

use crate::immix::block::Block;

pub type RcGlobalAllocator = Arc<GlobalAllocator>;

pub struct GlobalAllocator {
    blocks: Mutex<Vec<Box<Block>>>,
}

impl GlobalAllocator {
    pub fn new() -> RcGlobalAllocator {
        Arc::new(GlobalAllocator {
            blocks: Mutex::new(Vec::new()),
        })
    }

    /// Takes a previously reclaimed block, if one is available.
    pub fn request_block(&self) -> Box<Block> {
        self.blocks
            .lock()
            .pop()
            .unwrap_or_else(|| Box::new(Block::new()))
    }

    /// Returns one or more blocks to the shared pool for reuse.
    pub fn add_blocks(&self, blocks: &mut Vec<Box<Block>>) {
        self.blocks.lock().extend(blocks.drain(..));
    }

    pub fn pooled_block_count(&self) -> usize {
        self.blocks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_request_block() {
        let allocator = GlobalAllocator::new();

        let mut blocks = vec![Box::new(Block::new())];
        allocator.add_blocks(&mut blocks);

        assert_eq!(allocator.pooled_block_count(), 1);

        let _ = allocator.request_block();

        assert_eq!(allocator.pooled_block_count(), 0);
    }
}
