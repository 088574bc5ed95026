//! Shared worker-pool state and the scheduler capability contract.
//!
//! Each scheduler instance guards its queue, running and finished
//! collections, and tick counters with one mutex; a single condition
//! variable signals queue non-emptiness or shutdown. A process is owned by
//! exactly one collection at a time and moves between them, it is never
//! aliased across two collections.
use crate::config::{SchedulerKind, SimulationConfig};
use crate::fcfs_scheduler::FcfsScheduler;
use crate::process::{Process, ProcessSnapshot};
use crate::report::{dump_utilization_report_to_yaml, UtilizationReport};
use crate::rr_scheduler::RrScheduler;
use crate::stats::{ReportedUtilization, TickStats};
use chrono::Local;
use log::warn;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    DuplicateName(String),
    AlreadyStarted,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerError::DuplicateName(name) => {
                write!(f, "a process named \"{}\" already exists", name)
            }
            SchedulerError::AlreadyStarted => {
                write!(f, "the scheduler workers have already been started")
            }
        }
    }
}

impl std::error::Error for SchedulerError {}

pub(crate) struct SchedulerState {
    pub ready_queue: VecDeque<Process>,
    pub running: Vec<Process>,
    pub finished: Vec<Process>,
    pub ticks: TickStats,
    pub shutdown: bool,
}

impl SchedulerState {
    fn is_live_name(&self, name: &str) -> bool {
        self.ready_queue.iter().any(|process| process.name == name)
            || self.running.iter().any(|process| process.name == name)
            || self.finished.iter().any(|process| process.name == name)
    }
}

pub struct SchedulerCore {
    pub(crate) state: Mutex<SchedulerState>,
    pub(crate) queue_signal: Condvar,
    pub(crate) num_cores: usize,
    pub(crate) delay_per_exec: Duration,
}

impl SchedulerCore {
    pub(crate) fn new(num_cores: usize, delay_per_exec: Duration) -> Self {
        Self {
            state: Mutex::new(SchedulerState {
                ready_queue: VecDeque::new(),
                running: Vec::new(),
                finished: Vec::new(),
                ticks: TickStats::default(),
                shutdown: false,
            }),
            queue_signal: Condvar::new(),
            num_cores,
            delay_per_exec,
        }
    }

    pub(crate) fn submit(&self, process: Process) -> Result<(), SchedulerError> {
        let mut state = self.state.lock().unwrap();
        if state.is_live_name(&process.name) {
            return Err(SchedulerError::DuplicateName(process.name));
        }
        state.ready_queue.push_back(process);
        self.queue_signal.notify_one();
        Ok(())
    }

    /// Block until a process can be dispatched onto `core_id`, or return
    /// None once shutdown is observed. The popped process moves into the
    /// running collection tagged with the core and its first start time.
    pub(crate) fn dispatch(&self, core_id: usize) -> Option<u64> {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.shutdown {
                return None;
            }
            if let Some(mut process) = state.ready_queue.pop_front() {
                process.core_id = Some(core_id);
                if process.start_time.is_none() {
                    process.start_time = Some(Local::now());
                }
                let process_id = process.id;
                state.running.push(process);
                return Some(process_id);
            }
            state.ticks.idle_ticks += 1;
            state = self.queue_signal.wait(state).unwrap();
        }
    }

    /// One execution tick: advance the process under the lock. Returns
    /// whether it finished, or None if it is not in the running set.
    pub(crate) fn advance_process(&self, process_id: u64, instructions: u64) -> Option<bool> {
        let mut state = self.state.lock().unwrap();
        let finished = state
            .running
            .iter_mut()
            .find(|process| process.id == process_id)
            .map(|process| {
                process.advance(instructions);
                process.is_finished()
            });
        match finished {
            Some(finished) => {
                state.ticks.active_ticks += 1;
                Some(finished)
            }
            None => {
                warn!("process {} is not in the running set", process_id);
                None
            }
        }
    }

    pub(crate) fn finish_process(&self, process_id: u64) {
        let mut state = self.state.lock().unwrap();
        match state
            .running
            .iter()
            .position(|process| process.id == process_id)
        {
            Some(index) => {
                let process = state.running.remove(index);
                state.finished.push(process);
            }
            None => warn!("process {} cannot be moved to finished", process_id),
        }
    }

    /// Return an unfinished process to the queue tail (round-robin requeue).
    pub(crate) fn requeue_process(&self, process_id: u64) {
        let mut state = self.state.lock().unwrap();
        match state
            .running
            .iter()
            .position(|process| process.id == process_id)
        {
            Some(index) => {
                let mut process = state.running.remove(index);
                process.core_id = None;
                state.ready_queue.push_back(process);
                self.queue_signal.notify_one();
            }
            None => warn!("process {} cannot be requeued", process_id),
        }
    }
}

pub(crate) fn stop_workers(core: &SchedulerCore, workers: &mut Vec<JoinHandle<()>>) {
    {
        let mut state = core.state.lock().unwrap();
        state.shutdown = true;
    }
    core.queue_signal.notify_all();
    for handle in workers.drain(..) {
        if handle.join().is_err() {
            warn!("a worker thread panicked before shutdown");
        }
    }
}

pub trait SchedulerBase: Send {
    fn core(&self) -> &Arc<SchedulerCore>;
    fn workers_mut(&mut self) -> &mut Vec<JoinHandle<()>>;

    /// Spawn one worker thread per configured core. Starting twice, or
    /// starting again after `stop`, is a warned no-op.
    fn start(&mut self);

    fn stop(&mut self) {
        let core = Arc::clone(self.core());
        stop_workers(&core, self.workers_mut());
    }

    fn submit(&self, process: Process) -> Result<(), SchedulerError> {
        self.core().submit(process)
    }

    fn is_valid_process_name(&self, name: &str) -> bool {
        !self.core().state.lock().unwrap().is_live_name(name)
    }

    fn snapshot_running(&self) -> Vec<ProcessSnapshot> {
        let state = self.core().state.lock().unwrap();
        state.running.iter().map(Process::snapshot).collect()
    }

    fn snapshot_finished(&self) -> Vec<ProcessSnapshot> {
        let state = self.core().state.lock().unwrap();
        state.finished.iter().map(Process::snapshot).collect()
    }

    fn snapshot_queue_names(&self) -> Vec<String> {
        let state = self.core().state.lock().unwrap();
        state
            .ready_queue
            .iter()
            .map(|process| process.name.clone())
            .collect()
    }

    /// Point-in-time view of one process, wherever it currently lives.
    fn snapshot_process(&self, name: &str) -> Option<ProcessSnapshot> {
        let state = self.core().state.lock().unwrap();
        state
            .ready_queue
            .iter()
            .chain(state.running.iter())
            .chain(state.finished.iter())
            .find(|process| process.name == name)
            .map(Process::snapshot)
    }

    fn report_utilization(&self) -> ReportedUtilization {
        let core = self.core();
        let state = core.state.lock().unwrap();
        ReportedUtilization::from_counts(state.running.len(), core.num_cores)
    }

    fn tick_stats(&self) -> TickStats {
        self.core().state.lock().unwrap().ticks.clone()
    }

    fn write_utilization_report(&self, file_path: &str) {
        let report = UtilizationReport {
            generated_at: Local::now().format("%m/%d/%Y %I:%M:%S%p").to_string(),
            utilization: self.report_utilization(),
            running_processes: self.snapshot_running(),
            finished_processes: self.snapshot_finished(),
        };
        dump_utilization_report_to_yaml(file_path, &report);
    }
}

pub fn create_scheduler(config: &SimulationConfig) -> Box<dyn SchedulerBase> {
    match config.scheduler {
        SchedulerKind::Fcfs => Box::new(FcfsScheduler::new(
            config.num_cpu,
            config.delay_per_exec_duration(),
        )),
        SchedulerKind::Rr => Box::new(RrScheduler::new(
            config.num_cpu,
            config.quantum_cycles,
            config.delay_per_exec_duration(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_core() -> SchedulerCore {
        SchedulerCore::new(2, Duration::ZERO)
    }

    #[test]
    fn test_submit_rejects_duplicate_live_names() {
        let core = create_core();
        core.submit(Process::new("proc_a", 10, 64)).unwrap();
        assert_eq!(
            core.submit(Process::new("proc_a", 20, 64)),
            Err(SchedulerError::DuplicateName("proc_a".to_string()))
        );
    }

    #[test]
    fn test_dispatch_tags_core_and_start_time() {
        let core = create_core();
        core.submit(Process::new("proc_a", 10, 64)).unwrap();
        let process_id = core.dispatch(1).unwrap();
        let state = core.state.lock().unwrap();
        assert!(state.ready_queue.is_empty());
        let process = &state.running[0];
        assert_eq!(process.id, process_id);
        assert_eq!(process.core_id, Some(1));
        assert!(process.start_time.is_some());
    }

    #[test]
    fn test_dispatch_returns_none_on_shutdown() {
        let core = create_core();
        core.state.lock().unwrap().shutdown = true;
        assert_eq!(core.dispatch(0), None);
    }

    #[test]
    fn test_advance_finish_moves_process() {
        let core = create_core();
        core.submit(Process::new("proc_a", 3, 64)).unwrap();
        let process_id = core.dispatch(0).unwrap();
        assert_eq!(core.advance_process(process_id, 2), Some(false));
        assert_eq!(core.advance_process(process_id, 2), Some(true));
        core.finish_process(process_id);
        let state = core.state.lock().unwrap();
        assert!(state.running.is_empty());
        assert_eq!(state.finished.len(), 1);
        assert_eq!(state.ticks.active_ticks, 2);
    }

    #[test]
    fn test_requeue_clears_core_and_returns_to_tail() {
        let core = create_core();
        core.submit(Process::new("proc_a", 10, 64)).unwrap();
        core.submit(Process::new("proc_b", 10, 64)).unwrap();
        let process_id = core.dispatch(0).unwrap();
        core.advance_process(process_id, 4);
        core.requeue_process(process_id);
        let state = core.state.lock().unwrap();
        assert!(state.running.is_empty());
        let names: Vec<&str> = state
            .ready_queue
            .iter()
            .map(|process| process.name.as_str())
            .collect();
        assert_eq!(names, vec!["proc_b", "proc_a"]);
        assert_eq!(state.ready_queue[1].core_id, None);
        assert_eq!(state.ready_queue[1].executed_instructions, 4);
    }

    #[test]
    fn test_advance_unknown_process_reports_none() {
        let core = create_core();
        assert_eq!(core.advance_process(999, 1), None);
    }
}
