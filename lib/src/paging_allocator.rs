//! Fixed-size frame allocator with per-process page tables.
//!
//! Eviction follows residency order: the backing-store queue records resident
//! processes oldest-first, and swapping out pops the front entry and destroys
//! its allocation. A multi-page request that cannot be satisfied even after
//! eviction releases every frame it already claimed, so partial claims never
//! leak.
use crate::memory_allocator::{AllocationError, MemoryAllocatorBase};
use log::{info, warn};
use num_integer::div_ceil;
use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageTableEntry {
    pub frame_number: usize,
    pub valid: bool,
}

pub struct PagingAllocator {
    frame_size: usize,
    frame_usage: Vec<bool>,
    page_tables: HashMap<u64, Vec<PageTableEntry>>,
    backing_store: VecDeque<u64>,
    pages_paged_in: u64,
    pages_paged_out: u64,
}

impl PagingAllocator {
    pub fn new(total_memory: usize, frame_size: usize) -> Self {
        Self {
            frame_size,
            frame_usage: vec![false; total_memory / frame_size],
            page_tables: HashMap::new(),
            backing_store: VecDeque::new(),
            pages_paged_in: 0,
            pages_paged_out: 0,
        }
    }

    pub fn total_frames(&self) -> usize {
        self.frame_usage.len()
    }

    pub fn frame_usage(&self) -> &[bool] {
        &self.frame_usage
    }

    pub fn page_table(&self, process_id: u64) -> Option<&[PageTableEntry]> {
        self.page_tables.get(&process_id).map(Vec::as_slice)
    }

    fn find_free_frame(&self) -> Option<usize> {
        self.frame_usage.iter().position(|used| !used)
    }

    /// Evict the oldest resident process, skipping `exclude` so a page-in
    /// request never destroys its own page table. Returns false when no
    /// victim exists.
    fn swap_out_oldest(&mut self, exclude: Option<u64>) -> bool {
        let Some(position) = self
            .backing_store
            .iter()
            .position(|&id| exclude != Some(id))
        else {
            return false;
        };
        let Some(victim) = self.backing_store.remove(position) else {
            return false;
        };
        info!("swapping out process {} from memory", victim);
        if let Some(table) = self.page_tables.remove(&victim) {
            for entry in table.iter().filter(|entry| entry.valid) {
                self.frame_usage[entry.frame_number] = false;
                self.pages_paged_out += 1;
            }
        }
        true
    }

    /// Find a free frame, evicting the oldest resident once if none is free.
    fn claim_frame(&mut self, exclude: Option<u64>) -> Option<usize> {
        let frame = match self.find_free_frame() {
            Some(frame) => Some(frame),
            None if self.swap_out_oldest(exclude) => self.find_free_frame(),
            None => None,
        }?;
        self.frame_usage[frame] = true;
        Some(frame)
    }

    /// Bring a swapped-out or never-loaded page into a frame.
    pub fn page_in(&mut self, process_id: u64, page_number: usize) {
        match self.page_tables.get(&process_id) {
            Some(table) if page_number >= table.len() => {
                warn!(
                    "page {} is out of range for process {}",
                    page_number, process_id
                );
                return;
            }
            Some(table) if table[page_number].valid => return,
            Some(_) => {}
            None => {
                warn!("page in for unknown process id {}", process_id);
                return;
            }
        }
        let Some(frame) = self.claim_frame(Some(process_id)) else {
            warn!(
                "no free frame available for paging in process {}",
                process_id
            );
            return;
        };
        if let Some(table) = self.page_tables.get_mut(&process_id) {
            table[page_number] = PageTableEntry {
                frame_number: frame,
                valid: true,
            };
            self.pages_paged_in += 1;
        }
    }

    /// Drop a resident page from its frame.
    pub fn page_out(&mut self, process_id: u64, page_number: usize) {
        let Some(table) = self.page_tables.get_mut(&process_id) else {
            warn!("page out for unknown process id {}", process_id);
            return;
        };
        if page_number >= table.len() {
            warn!(
                "page {} is out of range for process {}",
                page_number, process_id
            );
            return;
        }
        if !table[page_number].valid {
            return;
        }
        let frame = table[page_number].frame_number;
        table[page_number].valid = false;
        self.frame_usage[frame] = false;
        self.pages_paged_out += 1;
    }
}

impl MemoryAllocatorBase for PagingAllocator {
    fn allocate(&mut self, process_id: u64, size: usize) -> Result<(), AllocationError> {
        let pages_needed = div_ceil(size, self.frame_size);
        let mut page_table = Vec::with_capacity(pages_needed);
        for _ in 0..pages_needed {
            match self.claim_frame(None) {
                Some(frame) => page_table.push(PageTableEntry {
                    frame_number: frame,
                    valid: true,
                }),
                None => {
                    // all-or-nothing: release the frames this call claimed
                    for entry in &page_table {
                        self.frame_usage[entry.frame_number] = false;
                    }
                    return Err(AllocationError::Exhausted { requested: size });
                }
            }
        }
        self.page_tables.insert(process_id, page_table);
        self.backing_store.push_back(process_id);
        Ok(())
    }

    fn deallocate(&mut self, process_id: u64) {
        let Some(table) = self.page_tables.remove(&process_id) else {
            warn!("deallocate for unknown process id {}", process_id);
            return;
        };
        for entry in table.iter().filter(|entry| entry.valid) {
            self.frame_usage[entry.frame_number] = false;
        }
        self.backing_store.retain(|&id| id != process_id);
    }

    fn describe(&self) -> String {
        let mut out = String::from("Paging memory state:\n");
        for (frame, used) in self.frame_usage.iter().enumerate() {
            let _ = writeln!(
                out,
                "Frame {}: {}",
                frame,
                if *used { "Occupied" } else { "Free" }
            );
        }
        out.push_str("Page tables:\n");
        let mut process_ids: Vec<u64> = self.page_tables.keys().copied().collect();
        process_ids.sort_unstable();
        for process_id in process_ids {
            let _ = writeln!(out, "Process {}:", process_id);
            for (page, entry) in self.page_tables[&process_id].iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  Page {} -> Frame {} ({})",
                    page,
                    entry.frame_number,
                    if entry.valid { "Valid" } else { "Invalid" }
                );
            }
        }
        out
    }

    fn strategy_name(&self) -> &'static str {
        "paging"
    }

    fn total_memory(&self) -> usize {
        self.frame_usage.len() * self.frame_size
    }

    fn used_memory(&self) -> usize {
        self.frame_usage.iter().filter(|used| **used).count() * self.frame_size
    }

    fn external_fragmentation(&self) -> usize {
        // any free frame can satisfy a page, so nothing is unusable
        0
    }

    fn pages_paged_in(&self) -> u64 {
        self.pages_paged_in
    }

    fn pages_paged_out(&self) -> u64 {
        self.pages_paged_out
    }
}
