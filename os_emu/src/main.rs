use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use lib::admission::{admit_process, generate_workload};
use lib::config::SimulationConfig;
use lib::memory_allocator::{create_allocator, MemoryAllocatorBase};
use lib::process::ProcessSnapshot;
use lib::report::create_scheduler_report_yaml;
use lib::scheduler_base::{create_scheduler, SchedulerBase};
use lib::stats::MemoryStat;

/// Application description and arguments definition using clap crate
#[derive(Parser)]
#[clap()]
struct AppArg {
    #[clap(short = 'c', long = "config_path", default_value = "config.yaml")]
    config_path: String,
    #[clap(short = 'o', long = "output_dir_path", default_value = "./outputs")]
    output_dir_path: String,
}

struct BatchGenerator {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

struct Session {
    config: SimulationConfig,
    scheduler: Arc<Mutex<Box<dyn SchedulerBase>>>,
    allocator: Arc<Mutex<Box<dyn MemoryAllocatorBase>>>,
    report_path: String,
    generator: Option<BatchGenerator>,
}

impl Session {
    fn initialize(config_path: &str, output_dir_path: &str) -> Result<Self> {
        let config = SimulationConfig::load(Path::new(config_path))
            .with_context(|| format!("could not initialize from \"{}\"", config_path))?;
        let allocator = create_allocator(&config);
        println!("{} memory allocator initialized", allocator.strategy_name());

        let mut scheduler = create_scheduler(&config);
        scheduler.start();
        println!(
            "{} scheduler started on {} cores",
            config.scheduler.as_str(),
            config.num_cpu
        );

        let report_path =
            create_scheduler_report_yaml(output_dir_path, config.scheduler.as_str());
        Ok(Self {
            config,
            scheduler: Arc::new(Mutex::new(scheduler)),
            allocator: Arc::new(Mutex::new(allocator)),
            report_path,
            generator: None,
        })
    }

    fn admit(&self, name: &str) {
        let (total_instructions, memory_size) = generate_workload(&self.config);
        let result = {
            let scheduler = self.scheduler.lock().unwrap();
            let mut allocator = self.allocator.lock().unwrap();
            admit_process(
                &**scheduler,
                &mut **allocator,
                name,
                total_instructions,
                memory_size,
            )
        };
        match result {
            Ok(_) => self.print_process_details(name),
            Err(err) => println!("{}", err),
        }
    }

    fn print_process_details(&self, name: &str) {
        let snapshot = self.scheduler.lock().unwrap().snapshot_process(name);
        match snapshot {
            Some(snapshot) => print_detail_view(&snapshot),
            None => println!("Process {} not found.", name),
        }
    }

    fn screen_ls(&self) {
        let scheduler = self.scheduler.lock().unwrap();
        println!("{}", scheduler.report_utilization());
        println!("----------------");
        println!("Running processes:");
        for process in scheduler.snapshot_running() {
            println!("{}", process.display_line());
        }
        println!("----------------");
        println!("Finished processes:");
        for process in scheduler.snapshot_finished() {
            println!("{}", process.display_line());
        }
        println!("----------------");
    }

    fn start_batch_generator(&mut self) {
        if self.generator.is_some() {
            println!("Batch process generation is already running");
            return;
        }
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let scheduler = Arc::clone(&self.scheduler);
        let allocator = Arc::clone(&self.allocator);
        let config = self.config.clone();
        let interval = self.config.batch_interval();
        let handle = thread::spawn(move || {
            let mut counter: u64 = 1;
            while !stop_flag.load(Ordering::Relaxed) {
                let name = format!("p{:02}", counter);
                counter += 1;
                let (total_instructions, memory_size) = generate_workload(&config);
                {
                    let scheduler = scheduler.lock().unwrap();
                    let mut allocator = allocator.lock().unwrap();
                    if let Err(err) = admit_process(
                        &**scheduler,
                        &mut **allocator,
                        &name,
                        total_instructions,
                        memory_size,
                    ) {
                        warn!("batch admission skipped: {}", err);
                    }
                }
                thread::sleep(interval);
            }
        });
        self.generator = Some(BatchGenerator { stop, handle });
        println!("Batch process generation started");
    }

    fn stop_batch_generator(&mut self) {
        match self.generator.take() {
            Some(generator) => {
                generator.stop.store(true, Ordering::Relaxed);
                let _ = generator.handle.join();
                println!("Batch process generation stopped");
            }
            None => println!("Batch process generation is not running"),
        }
    }

    fn report_util(&self) {
        self.scheduler
            .lock()
            .unwrap()
            .write_utilization_report(&self.report_path);
        println!("Report generated at {}", self.report_path);
    }

    fn process_smi(&self) {
        let scheduler = self.scheduler.lock().unwrap();
        let allocator = self.allocator.lock().unwrap();
        println!("{}", scheduler.report_utilization());
        println!("----------------");
        print!("{}", allocator.describe());
        println!("----------------");
    }

    fn vmstat(&self) {
        let ticks = self.scheduler.lock().unwrap().tick_stats();
        let allocator = self.allocator.lock().unwrap();
        println!("{}", MemoryStat::collect(&ticks, &**allocator));
    }

    fn shutdown(&mut self) {
        self.stop_batch_generator_quietly();
        self.scheduler.lock().unwrap().stop();
    }

    fn stop_batch_generator_quietly(&mut self) {
        if let Some(generator) = self.generator.take() {
            generator.stop.store(true, Ordering::Relaxed);
            let _ = generator.handle.join();
        }
    }
}

fn print_detail_view(snapshot: &ProcessSnapshot) {
    println!("Process: {}", snapshot.name);
    println!("ID: {}", snapshot.id);
    println!(
        "Started: {}",
        snapshot.start_time.as_deref().unwrap_or("N/A")
    );
    match snapshot.core_id {
        Some(core_id) => println!("Core: {}", core_id),
        None => println!("Core: N/A"),
    }
    println!(
        "Progress: {} / {}",
        snapshot.executed_instructions, snapshot.total_instructions
    );
    println!("Memory: {} KB", snapshot.memory_size);
}

fn print_help() {
    println!("Available commands:");
    println!("  initialize        - Load the configuration and start the scheduler");
    println!("  screen -s <name>  - Admit a new process and show its details");
    println!("  screen -r <name>  - Show the details of an existing process");
    println!("  screen -ls        - List CPU utilization, running and finished processes");
    println!("  scheduler-test    - Start admitting generated processes periodically");
    println!("  scheduler-stop    - Stop the batch process generation");
    println!("  report-util       - Append a utilization report to the report file");
    println!("  process-smi       - Show the memory state");
    println!("  vmstat            - Show memory and cpu tick statistics");
    println!("  clear             - Clear the screen");
    println!("  exit              - Quit");
}

fn main() -> Result<()> {
    env_logger::init();
    let arg: AppArg = AppArg::parse();
    let mut session: Option<Session> = None;

    loop {
        print!("Enter a command: ");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            if let Some(mut session) = session.take() {
                session.shutdown();
            }
            break;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            continue;
        };

        if command == "initialize" {
            if session.is_some() {
                println!("Already initialized");
                continue;
            }
            session = Some(Session::initialize(&arg.config_path, &arg.output_dir_path)?);
            println!(
                "Config initialized with \"{}\" parameters",
                arg.config_path
            );
            continue;
        }

        match command {
            "help" => {
                print_help();
                continue;
            }
            "clear" => {
                print!("\x1b[2J\x1b[H");
                continue;
            }
            "exit" => {
                if let Some(mut session) = session.take() {
                    session.shutdown();
                }
                break;
            }
            _ => {}
        }

        let Some(session) = session.as_mut() else {
            println!("Initialize the program with command \"initialize\"");
            continue;
        };

        match tokens.as_slice() {
            ["screen", "-s", name] => session.admit(name),
            ["screen", "-r", name] => session.print_process_details(name),
            ["screen", "-ls"] => session.screen_ls(),
            ["scheduler-test"] => session.start_batch_generator(),
            ["scheduler-stop"] => session.stop_batch_generator(),
            ["report-util"] => session.report_util(),
            ["process-smi"] => session.process_smi(),
            ["vmstat"] => session.vmstat(),
            _ => println!("Unknown command: {}", line.trim()),
        }
    }

    Ok(())
}
