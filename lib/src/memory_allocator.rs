use crate::config::SimulationConfig;
use crate::flat_memory_allocator::FlatMemoryAllocator;
use crate::paging_allocator::PagingAllocator;
use std::fmt;

/// Failure of an allocation request after the bounded eviction retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    Exhausted { requested: usize },
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationError::Exhausted { requested } => {
                write!(f, "no memory available for a request of {} units", requested)
            }
        }
    }
}

impl std::error::Error for AllocationError {}

pub trait MemoryAllocatorBase: Send {
    fn allocate(&mut self, process_id: u64, size: usize) -> Result<(), AllocationError>;
    fn deallocate(&mut self, process_id: u64);
    fn describe(&self) -> String;
    fn strategy_name(&self) -> &'static str;
    fn total_memory(&self) -> usize;
    fn used_memory(&self) -> usize;
    fn free_memory(&self) -> usize {
        self.total_memory() - self.used_memory()
    }
    fn external_fragmentation(&self) -> usize;
    fn pages_paged_in(&self) -> u64 {
        0
    }
    fn pages_paged_out(&self) -> u64 {
        0
    }
}

/// Strategy selection happens once, at initialization. One frame covering the
/// whole address space means paging degenerates to a single contiguous range,
/// so the flat allocator is used instead.
pub fn create_allocator(config: &SimulationConfig) -> Box<dyn MemoryAllocatorBase> {
    if config.mem_per_frame == config.max_overall_mem {
        Box::new(FlatMemoryAllocator::new(config.max_overall_mem))
    } else {
        Box::new(PagingAllocator::new(
            config.max_overall_mem,
            config.mem_per_frame,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerKind;

    fn create_config(max_overall_mem: usize, mem_per_frame: usize) -> SimulationConfig {
        SimulationConfig {
            num_cpu: 2,
            scheduler: SchedulerKind::Fcfs,
            quantum_cycles: 4,
            batch_process_freq: 1.0,
            min_ins: 100,
            max_ins: 200,
            delay_per_exec: 0.0,
            max_overall_mem,
            mem_per_frame,
            min_mem_per_proc: 64,
            max_mem_per_proc: 512,
        }
    }

    #[test]
    fn test_flat_selected_when_frame_covers_whole_space() {
        let allocator = create_allocator(&create_config(1024, 1024));
        assert_eq!(allocator.strategy_name(), "flat");
        assert_eq!(allocator.total_memory(), 1024);
    }

    #[test]
    fn test_paging_selected_otherwise() {
        let allocator = create_allocator(&create_config(1024, 256));
        assert_eq!(allocator.strategy_name(), "paging");
        assert_eq!(allocator.total_memory(), 1024);
    }
}
