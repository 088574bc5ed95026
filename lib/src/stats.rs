//! Tick counters and derived utilization figures read by reporting
//! collaborators.
use crate::memory_allocator::MemoryAllocatorBase;
use serde_derive::{Deserialize, Serialize};
use std::fmt;

/// Monotonic counters: idle advances when a worker observes an empty ready
/// queue, active advances once per executed instruction tick. Neither is
/// ever decremented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStats {
    pub idle_ticks: u64,
    pub active_ticks: u64,
}

impl TickStats {
    pub fn total_ticks(&self) -> u64 {
        self.idle_ticks + self.active_ticks
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedUtilization {
    pub cpu_utilization: u32,
    pub cores_used: usize,
    pub cores_available: usize,
}

impl ReportedUtilization {
    /// Truncating percentage, clamped to `[0, 100]`.
    pub fn from_counts(running: usize, total_cores: usize) -> Self {
        let cores_used = running.min(total_cores);
        Self {
            cpu_utilization: (running as u32 * 100 / total_cores as u32).min(100),
            cores_used,
            cores_available: total_cores - cores_used,
        }
    }
}

impl fmt::Display for ReportedUtilization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU utilization: {}%", self.cpu_utilization)?;
        writeln!(f, "Cores used: {}", self.cores_used)?;
        write!(f, "Cores available: {}", self.cores_available)
    }
}

/// Snapshot printed by the `vmstat` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStat {
    pub total_memory: usize,
    pub used_memory: usize,
    pub free_memory: usize,
    pub idle_ticks: u64,
    pub active_ticks: u64,
    pub total_ticks: u64,
    pub pages_paged_in: u64,
    pub pages_paged_out: u64,
}

impl MemoryStat {
    pub fn collect(ticks: &TickStats, allocator: &dyn MemoryAllocatorBase) -> Self {
        Self {
            total_memory: allocator.total_memory(),
            used_memory: allocator.used_memory(),
            free_memory: allocator.free_memory(),
            idle_ticks: ticks.idle_ticks,
            active_ticks: ticks.active_ticks,
            total_ticks: ticks.total_ticks(),
            pages_paged_in: allocator.pages_paged_in(),
            pages_paged_out: allocator.pages_paged_out(),
        }
    }
}

impl fmt::Display for MemoryStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total memory: {} KB", self.total_memory)?;
        writeln!(f, "Used memory: {} KB", self.used_memory)?;
        writeln!(f, "Free memory: {} KB", self.free_memory)?;
        writeln!(f, "Idle cpu ticks: {}", self.idle_ticks)?;
        writeln!(f, "Active cpu ticks: {}", self.active_ticks)?;
        writeln!(f, "Total cpu ticks: {}", self.total_ticks)?;
        writeln!(f, "Pages paged in: {}", self.pages_paged_in)?;
        write!(f, "Pages paged out: {}", self.pages_paged_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_memory_allocator::FlatMemoryAllocator;

    #[test]
    fn test_utilization_truncates() {
        let utilization = ReportedUtilization::from_counts(1, 3);
        assert_eq!(utilization.cpu_utilization, 33);
        assert_eq!(utilization.cores_used, 1);
        assert_eq!(utilization.cores_available, 2);
    }

    #[test]
    fn test_utilization_bounds() {
        assert_eq!(ReportedUtilization::from_counts(0, 4).cpu_utilization, 0);
        assert_eq!(ReportedUtilization::from_counts(4, 4).cpu_utilization, 100);
        // never exceeds 100 even if counts race past the core count
        let clamped = ReportedUtilization::from_counts(5, 4);
        assert_eq!(clamped.cpu_utilization, 100);
        assert_eq!(clamped.cores_available, 0);
    }

    #[test]
    fn test_total_ticks_sums_counters() {
        let ticks = TickStats {
            idle_ticks: 3,
            active_ticks: 7,
        };
        assert_eq!(ticks.total_ticks(), 10);
    }

    #[test]
    fn test_memory_stat_collects_allocator_state() {
        let mut allocator = FlatMemoryAllocator::new(300);
        allocator.allocate_block(1, 100).unwrap();
        let ticks = TickStats {
            idle_ticks: 2,
            active_ticks: 5,
        };
        let stat = MemoryStat::collect(&ticks, &allocator);
        assert_eq!(stat.total_memory, 300);
        assert_eq!(stat.used_memory, 100);
        assert_eq!(stat.free_memory, 200);
        assert_eq!(stat.total_ticks, 7);
        assert_eq!(stat.pages_paged_in, 0);
    }
}
