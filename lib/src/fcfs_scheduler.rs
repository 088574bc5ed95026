//! First-come-first-served scheduling: workers drain one shared queue in
//! arrival order and run each dispatched process to completion.
use crate::scheduler_base::{stop_workers, SchedulerBase, SchedulerCore};
use log::warn;
use rand::Rng;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on the random number of instructions executed per tick.
const MAX_TICK_PROGRESS: u64 = 10;

pub struct FcfsScheduler {
    core: Arc<SchedulerCore>,
    workers: Vec<JoinHandle<()>>,
    started: bool,
}

impl FcfsScheduler {
    pub fn new(num_cores: usize, delay_per_exec: Duration) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(num_cores, delay_per_exec)),
            workers: Vec::new(),
            started: false,
        }
    }

    fn worker_loop(core: Arc<SchedulerCore>, core_id: usize) {
        let mut rng = rand::thread_rng();
        while let Some(process_id) = core.dispatch(core_id) {
            // run to completion, no preemption
            loop {
                match core.advance_process(process_id, rng.gen_range(1..=MAX_TICK_PROGRESS)) {
                    Some(true) => {
                        core.finish_process(process_id);
                        break;
                    }
                    Some(false) => thread::sleep(core.delay_per_exec),
                    None => break,
                }
            }
        }
    }
}

impl SchedulerBase for FcfsScheduler {
    fn core(&self) -> &Arc<SchedulerCore> {
        &self.core
    }

    fn workers_mut(&mut self) -> &mut Vec<JoinHandle<()>> {
        &mut self.workers
    }

    fn start(&mut self) {
        if self.started {
            warn!("fcfs scheduler is already started");
            return;
        }
        self.started = true;
        for core_id in 0..self.core.num_cores {
            let core = Arc::clone(&self.core);
            self.workers
                .push(thread::spawn(move || Self::worker_loop(core, core_id)));
        }
    }
}

impl Drop for FcfsScheduler {
    fn drop(&mut self) {
        let core = Arc::clone(&self.core);
        stop_workers(&core, &mut self.workers);
    }
}
