//! This module contains the definition of the process entity and its snapshot
use chrono::{DateTime, Local};
use serde_derive::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_PROCESS_ID: AtomicU64 = AtomicU64::new(1);

///enum to represent three derived states
///waiting in the queue, dispatched on a core, all instructions executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Ready,
    Running,
    Finished,
}

#[derive(Debug)]
pub struct Process {
    pub id: u64,
    pub name: String,
    pub total_instructions: u64,
    pub executed_instructions: u64,
    pub core_id: Option<usize>,
    pub memory_size: usize,
    pub start_time: Option<DateTime<Local>>,
}

impl Process {
    pub fn new(name: &str, total_instructions: u64, memory_size: usize) -> Self {
        Self {
            id: NEXT_PROCESS_ID.fetch_add(1, Ordering::Relaxed),
            name: name.to_string(),
            total_instructions,
            executed_instructions: 0,
            core_id: None,
            memory_size,
            start_time: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.executed_instructions == self.total_instructions
    }

    pub fn status(&self) -> ProcessStatus {
        if self.is_finished() {
            ProcessStatus::Finished
        } else if self.core_id.is_some() {
            ProcessStatus::Running
        } else {
            ProcessStatus::Ready
        }
    }

    /// Advance execution progress, never exceeding the total instruction count.
    pub fn advance(&mut self, instructions: u64) {
        self.executed_instructions =
            (self.executed_instructions + instructions).min(self.total_instructions);
    }

    pub fn remaining_instructions(&self) -> u64 {
        self.total_instructions - self.executed_instructions
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            name: self.name.clone(),
            id: self.id,
            start_time: self
                .start_time
                .map(|time| time.format("%m/%d/%Y %I:%M:%S%p").to_string()),
            core_id: self.core_id,
            executed_instructions: self.executed_instructions,
            total_instructions: self.total_instructions,
            memory_size: self.memory_size,
        }
    }
}

/// Point-in-time copy of a process used by reporting collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub name: String,
    pub id: u64,
    pub start_time: Option<String>,
    pub core_id: Option<usize>,
    pub executed_instructions: u64,
    pub total_instructions: u64,
    pub memory_size: usize,
}

impl ProcessSnapshot {
    pub fn is_finished(&self) -> bool {
        self.executed_instructions == self.total_instructions
    }

    pub fn display_line(&self) -> String {
        let start_time = self.start_time.as_deref().unwrap_or("N/A");
        if self.is_finished() {
            format!(
                "{} ({}) Finished {} / {}",
                self.name, start_time, self.executed_instructions, self.total_instructions
            )
        } else {
            let core = self
                .core_id
                .map(|core_id| core_id.to_string())
                .unwrap_or_else(|| "N/A".to_string());
            format!(
                "{} ({}) Core: {} {} / {}",
                self.name, start_time, core, self.executed_instructions, self.total_instructions
            )
        }
    }
}
