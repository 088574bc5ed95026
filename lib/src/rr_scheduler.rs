//! Round-robin scheduling: each dispatch is capped at a time quantum of
//! execution ticks, and unfinished processes return to the queue tail.
//!
//! A tick advances exactly one instruction, so a dispatch executes
//! `min(quantum, remaining)` instructions and the quantum bound is exact.
use crate::scheduler_base::{stop_workers, SchedulerBase, SchedulerCore, SchedulerError};
use log::warn;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub struct RrScheduler {
    core: Arc<SchedulerCore>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
    quantum: u64,
}

impl RrScheduler {
    pub fn new(num_cores: usize, quantum: u64, delay_per_exec: Duration) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(num_cores, delay_per_exec)),
            workers: Vec::new(),
            started: false,
            quantum,
        }
    }

    pub fn quantum(&self) -> u64 {
        self.quantum
    }

    /// The quantum is fixed once workers are running; reconfiguring live
    /// workers is rejected instead of silently taking effect on some cores.
    pub fn set_quantum(&mut self, quantum: u64) -> Result<(), SchedulerError> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.quantum = quantum;
        Ok(())
    }

    fn worker_loop(core: Arc<SchedulerCore>, core_id: usize, quantum: u64) {
        'dispatch: while let Some(process_id) = core.dispatch(core_id) {
            for _ in 0..quantum {
                match core.advance_process(process_id, 1) {
                    Some(true) => {
                        core.finish_process(process_id);
                        continue 'dispatch;
                    }
                    Some(false) => thread::sleep(core.delay_per_exec),
                    None => continue 'dispatch,
                }
            }
            // quantum exhausted, give the next process its turn
            core.requeue_process(process_id);
        }
    }
}

impl SchedulerBase for RrScheduler {
    fn core(&self) -> &Arc<SchedulerCore> {
        &self.core
    }

    fn workers_mut(&mut self) -> &mut Vec<JoinHandle<()>> {
        &mut self.workers
    }

    fn start(&mut self) {
        if self.started {
            warn!("rr scheduler is already started");
            return;
        }
        self.started = true;
        for core_id in 0..self.core.num_cores {
            let core = Arc::clone(&self.core);
            let quantum = self.quantum;
            self.workers
                .push(thread::spawn(move || Self::worker_loop(core, core_id, quantum)));
        }
    }
}

impl Drop for RrScheduler {
    fn drop(&mut self) {
        let core = Arc::clone(&self.core);
        stop_workers(&core, &mut self.workers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Process;
    use std::time::Instant;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_quantum_interleaving_on_single_core() {
        // A(5) and B(3) with quantum 2: quanta run A, B, A, B(done), A(done),
        // so B finishes first even though A arrived first
        let mut scheduler = RrScheduler::new(1, 2, Duration::ZERO);
        scheduler.submit(Process::new("rr_a", 5, 64)).unwrap();
        scheduler.submit(Process::new("rr_b", 3, 64)).unwrap();
        scheduler.start();
        assert!(wait_until(Duration::from_secs(2), || {
            scheduler.snapshot_finished().len() == 2
        }));
        scheduler.stop();
        let finished: Vec<String> = scheduler
            .snapshot_finished()
            .iter()
            .map(|process| process.name.clone())
            .collect();
        assert_eq!(finished, vec!["rr_b", "rr_a"]);
    }

    #[test]
    fn test_short_process_finishes_within_first_quantum() {
        let mut scheduler = RrScheduler::new(1, 10, Duration::ZERO);
        scheduler.submit(Process::new("rr_short", 4, 64)).unwrap();
        scheduler.start();
        assert!(wait_until(Duration::from_secs(1), || {
            scheduler.snapshot_finished().len() == 1
        }));
        scheduler.stop();
        let finished = scheduler.snapshot_finished();
        assert_eq!(finished[0].executed_instructions, 4);
        assert_eq!(finished[0].total_instructions, 4);
    }

    #[test]
    fn test_requeued_process_keeps_progress() {
        // quantum 1 on one busy core: after stop, the survivor must carry
        // the instructions it already executed back in the queue
        let mut scheduler = RrScheduler::new(1, 1, Duration::from_millis(5));
        scheduler.submit(Process::new("rr_keep", 1000, 64)).unwrap();
        scheduler.start();
        assert!(wait_until(Duration::from_secs(1), || {
            scheduler
                .snapshot_process("rr_keep")
                .map(|process| process.executed_instructions >= 2)
                .unwrap_or(false)
        }));
        scheduler.stop();
        let survivor = scheduler.snapshot_process("rr_keep").unwrap();
        assert!(survivor.executed_instructions >= 2);
        assert!(!survivor.is_finished());
    }

    #[test]
    fn test_set_quantum_rejected_after_start() {
        let mut scheduler = RrScheduler::new(1, 2, Duration::ZERO);
        assert!(scheduler.set_quantum(8).is_ok());
        assert_eq!(scheduler.quantum(), 8);
        scheduler.start();
        assert_eq!(scheduler.set_quantum(4), Err(SchedulerError::AlreadyStarted));
        assert_eq!(scheduler.quantum(), 8);
        scheduler.stop();
    }

    #[test]
    fn test_two_cores_drain_many_processes() {
        let mut scheduler = RrScheduler::new(2, 3, Duration::ZERO);
        for i in 0..6 {
            scheduler
                .submit(Process::new(&format!("rr_many_{}", i), 10, 64))
                .unwrap();
        }
        scheduler.start();
        assert!(wait_until(Duration::from_secs(2), || {
            scheduler.snapshot_finished().len() == 6
        }));
        scheduler.stop();
        assert!(scheduler.is_valid_process_name("rr_many_unknown"));
        assert!(!scheduler.is_valid_process_name("rr_many_0"));
    }
}
