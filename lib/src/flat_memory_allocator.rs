//! Contiguous first-fit allocator over a single address space.
//!
//! The block list is kept sorted by address, non-overlapping, and covering
//! `[0, total_memory)` exactly. Freed blocks are coalesced with their
//! neighbors on the spot, so no chain of more than two free blocks can form.
use crate::memory_allocator::{AllocationError, MemoryAllocatorBase};
use log::{info, warn};
use std::collections::VecDeque;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryBlock {
    pub start_address: usize,
    pub size: usize,
    pub owner: Option<u64>,
}

impl MemoryBlock {
    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    pub fn end_address(&self) -> usize {
        self.start_address + self.size
    }
}

pub struct FlatMemoryAllocator {
    total_memory: usize,
    blocks: Vec<MemoryBlock>,
    backing_store: VecDeque<u64>,
}

impl FlatMemoryAllocator {
    pub fn new(total_memory: usize) -> Self {
        Self {
            total_memory,
            blocks: vec![MemoryBlock {
                start_address: 0,
                size: total_memory,
                owner: None,
            }],
            backing_store: VecDeque::new(),
        }
    }

    fn find_first_fit(&self, size: usize) -> Option<usize> {
        self.blocks
            .iter()
            .position(|block| block.is_free() && block.size >= size)
    }

    /// Carve an occupied block of exactly `size` at the start of the free
    /// block at `index`, inserting a free remainder block after it.
    fn place(&mut self, index: usize, process_id: u64, size: usize) -> usize {
        let remaining = self.blocks[index].size - size;
        let start_address = self.blocks[index].start_address;
        self.blocks[index].size = size;
        self.blocks[index].owner = Some(process_id);
        if remaining > 0 {
            self.blocks.insert(
                index + 1,
                MemoryBlock {
                    start_address: start_address + size,
                    size: remaining,
                    owner: None,
                },
            );
        }
        start_address
    }

    /// Evict the first occupied block in address order, recording its owner
    /// in the backing store. Returns false when nothing is resident.
    fn swap_out_oldest(&mut self) -> bool {
        let Some(victim) = self
            .blocks
            .iter()
            .find_map(|block| block.owner)
        else {
            return false;
        };
        info!("swapping out process {} to the backing store", victim);
        self.backing_store.push_back(victim);
        self.deallocate_block(victim);
        true
    }

    /// First-fit allocation with a single eviction retry. Returns the start
    /// address of the carved block.
    pub fn allocate_block(
        &mut self,
        process_id: u64,
        size: usize,
    ) -> Result<usize, AllocationError> {
        // bounded retry instead of recursing after eviction
        for attempt in 0..2 {
            if let Some(index) = self.find_first_fit(size) {
                return Ok(self.place(index, process_id, size));
            }
            if attempt == 0 && !self.swap_out_oldest() {
                break;
            }
        }
        Err(AllocationError::Exhausted { requested: size })
    }

    pub fn deallocate_block(&mut self, process_id: u64) {
        let Some(index) = self
            .blocks
            .iter()
            .position(|block| block.owner == Some(process_id))
        else {
            warn!("deallocate for unknown process id {}", process_id);
            return;
        };
        self.blocks[index].owner = None;
        // merge the free neighbor after, then the one before
        if index + 1 < self.blocks.len() && self.blocks[index + 1].is_free() {
            self.blocks[index].size += self.blocks[index + 1].size;
            self.blocks.remove(index + 1);
        }
        if index > 0 && self.blocks[index - 1].is_free() {
            self.blocks[index - 1].size += self.blocks[index].size;
            self.blocks.remove(index);
        }
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn backing_store(&self) -> &VecDeque<u64> {
        &self.backing_store
    }
}

impl MemoryAllocatorBase for FlatMemoryAllocator {
    fn allocate(&mut self, process_id: u64, size: usize) -> Result<(), AllocationError> {
        self.allocate_block(process_id, size).map(|_| ())
    }

    fn deallocate(&mut self, process_id: u64) {
        self.deallocate_block(process_id);
    }

    fn describe(&self) -> String {
        let mut out = String::from("Memory state:\n");
        for block in &self.blocks {
            match block.owner {
                Some(process_id) => {
                    let _ = writeln!(
                        out,
                        "[{} - {}] Occupied by process {}",
                        block.start_address,
                        block.end_address() - 1,
                        process_id
                    );
                }
                None => {
                    let _ = writeln!(
                        out,
                        "[{} - {}] Free",
                        block.start_address,
                        block.end_address() - 1
                    );
                }
            }
        }
        out
    }

    fn strategy_name(&self) -> &'static str {
        "flat"
    }

    fn total_memory(&self) -> usize {
        self.total_memory
    }

    fn used_memory(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| !block.is_free())
            .map(|block| block.size)
            .sum()
    }

    fn external_fragmentation(&self) -> usize {
        self.blocks
            .iter()
            .filter(|block| block.is_free())
            .map(|block| block.size)
            .sum()
    }
}
