//! The admission path: name check, memory allocation, then submission.
//!
//! A rejected admission leaves the system exactly as it was: the allocation
//! is rolled back and no process object is retained anywhere.
use crate::config::SimulationConfig;
use crate::memory_allocator::{AllocationError, MemoryAllocatorBase};
use crate::process::Process;
use crate::scheduler_base::SchedulerBase;
use rand::Rng;
use std::fmt;

#[derive(Debug)]
pub enum AdmissionError {
    DuplicateName(String),
    AllocationFailed {
        name: String,
        source: AllocationError,
    },
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::DuplicateName(name) => {
                write!(f, "process with name \"{}\" already exists", name)
            }
            AdmissionError::AllocationFailed { name, source } => {
                write!(f, "memory allocation failed for process \"{}\": {}", name, source)
            }
        }
    }
}

impl std::error::Error for AdmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdmissionError::DuplicateName(_) => None,
            AdmissionError::AllocationFailed { source, .. } => Some(source),
        }
    }
}

/// Admit a named process: allocate its memory, then hand it to the
/// scheduler. Returns the assigned process id.
pub fn admit_process(
    scheduler: &dyn SchedulerBase,
    allocator: &mut dyn MemoryAllocatorBase,
    name: &str,
    total_instructions: u64,
    memory_size: usize,
) -> Result<u64, AdmissionError> {
    if !scheduler.is_valid_process_name(name) {
        return Err(AdmissionError::DuplicateName(name.to_string()));
    }
    let process = Process::new(name, total_instructions, memory_size);
    let process_id = process.id;
    allocator
        .allocate(process_id, memory_size)
        .map_err(|source| AdmissionError::AllocationFailed {
            name: name.to_string(),
            source,
        })?;
    if scheduler.submit(process).is_err() {
        // lost a race on the name between the check and the submit
        allocator.deallocate(process_id);
        return Err(AdmissionError::DuplicateName(name.to_string()));
    }
    Ok(process_id)
}

/// Random workload for a generated process, drawn from the configured
/// instruction and memory ranges.
pub fn generate_workload(config: &SimulationConfig) -> (u64, usize) {
    let mut rng = rand::thread_rng();
    let total_instructions = rng.gen_range(config.min_ins..=config.max_ins);
    let memory_size = rng.gen_range(config.min_mem_per_proc..=config.max_mem_per_proc);
    (total_instructions, memory_size)
}
