//! Simulation parameters loaded from a YAML key/value file.
//!
//! The configuration is validated once at load time and then passed by value
//! into the scheduler and allocator constructors. Invalid parameters abort
//! initialization instead of being clamped.
use serde_derive::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    Fcfs,
    Rr,
}

impl SchedulerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerKind::Fcfs => "fcfs",
            SchedulerKind::Rr => "rr",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    #[serde(rename = "num-cpu")]
    pub num_cpu: usize,
    #[serde(rename = "scheduler")]
    pub scheduler: SchedulerKind,
    #[serde(rename = "quantum-cycles")]
    pub quantum_cycles: u64,
    #[serde(rename = "batch-process-freq")]
    pub batch_process_freq: f64,
    #[serde(rename = "min-ins")]
    pub min_ins: u64,
    #[serde(rename = "max-ins")]
    pub max_ins: u64,
    #[serde(rename = "delay-per-exec")]
    pub delay_per_exec: f64,
    #[serde(rename = "max-overall-mem")]
    pub max_overall_mem: usize,
    #[serde(rename = "mem-per-frame")]
    pub mem_per_frame: usize,
    #[serde(rename = "min-mem-per-proc")]
    pub min_mem_per_proc: usize,
    #[serde(rename = "max-mem-per-proc")]
    pub max_mem_per_proc: usize,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_yaml::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "failed to read configuration file: {}", err),
            ConfigError::Parse(err) => write!(f, "failed to parse configuration: {}", err),
            ConfigError::Invalid(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl SimulationConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: SimulationConfig =
            serde_yaml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cpu == 0 {
            return Err(ConfigError::Invalid("num-cpu must be at least 1".to_string()));
        }
        if self.scheduler == SchedulerKind::Rr && self.quantum_cycles == 0 {
            return Err(ConfigError::Invalid(
                "quantum-cycles must be at least 1 for the rr scheduler".to_string(),
            ));
        }
        if self.mem_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "mem-per-frame must be non-zero".to_string(),
            ));
        }
        if self.max_overall_mem == 0 {
            return Err(ConfigError::Invalid(
                "max-overall-mem must be non-zero".to_string(),
            ));
        }
        if self.max_overall_mem % self.mem_per_frame != 0 {
            return Err(ConfigError::Invalid(
                "max-overall-mem must be an exact multiple of mem-per-frame".to_string(),
            ));
        }
        if self.min_ins == 0 || self.min_ins > self.max_ins {
            return Err(ConfigError::Invalid(
                "min-ins and max-ins must form a non-empty range starting at 1".to_string(),
            ));
        }
        if self.min_mem_per_proc == 0 || self.min_mem_per_proc > self.max_mem_per_proc {
            return Err(ConfigError::Invalid(
                "min-mem-per-proc and max-mem-per-proc must form a non-empty range starting at 1"
                    .to_string(),
            ));
        }
        if self.batch_process_freq <= 0.0 {
            return Err(ConfigError::Invalid(
                "batch-process-freq must be positive".to_string(),
            ));
        }
        if self.delay_per_exec < 0.0 {
            return Err(ConfigError::Invalid(
                "delay-per-exec must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn delay_per_exec_duration(&self) -> Duration {
        Duration::from_secs_f64(self.delay_per_exec)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_secs_f64(self.batch_process_freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_config_yaml() -> String {
        "num-cpu: 4\n\
         scheduler: rr\n\
         quantum-cycles: 5\n\
         batch-process-freq: 1.0\n\
         min-ins: 1000\n\
         max-ins: 2000\n\
         delay-per-exec: 0.1\n\
         max-overall-mem: 16384\n\
         mem-per-frame: 4096\n\
         min-mem-per-proc: 4096\n\
         max-mem-per-proc: 16384\n"
            .to_string()
    }

    fn parse(yaml: &str) -> SimulationConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_load_valid_config() {
        let config = parse(&create_config_yaml());
        assert!(config.validate().is_ok());
        assert_eq!(config.num_cpu, 4);
        assert_eq!(config.scheduler, SchedulerKind::Rr);
        assert_eq!(config.quantum_cycles, 5);
        assert_eq!(config.max_overall_mem, 16384);
        assert_eq!(config.mem_per_frame, 4096);
    }

    #[test]
    fn test_scheduler_kind_parsing() {
        let yaml = create_config_yaml().replace("scheduler: rr", "scheduler: fcfs");
        assert_eq!(parse(&yaml).scheduler, SchedulerKind::Fcfs);
        let yaml = create_config_yaml().replace("scheduler: rr", "scheduler: sjf");
        assert!(serde_yaml::from_str::<SimulationConfig>(&yaml).is_err());
    }

    #[test]
    fn test_zero_frame_size_rejected() {
        let yaml = create_config_yaml().replace("mem-per-frame: 4096", "mem-per-frame: 0");
        assert!(matches!(
            parse(&yaml).validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_non_multiple_total_memory_rejected() {
        let yaml =
            create_config_yaml().replace("max-overall-mem: 16384", "max-overall-mem: 10000");
        assert!(matches!(
            parse(&yaml).validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_inverted_instruction_range_rejected() {
        let yaml = create_config_yaml().replace("min-ins: 1000", "min-ins: 3000");
        assert!(matches!(
            parse(&yaml).validate(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_quantum_rejected_for_rr() {
        let yaml = create_config_yaml().replace("quantum-cycles: 5", "quantum-cycles: 0");
        assert!(parse(&yaml).validate().is_err());
        // fcfs never dispatches by quantum, so a zero value is accepted there
        let yaml = yaml.replace("scheduler: rr", "scheduler: fcfs");
        assert!(parse(&yaml).validate().is_ok());
    }

    #[test]
    fn test_zero_cpu_rejected() {
        let yaml = create_config_yaml().replace("num-cpu: 4", "num-cpu: 0");
        assert!(parse(&yaml).validate().is_err());
    }

    #[test]
    fn test_delay_conversion() {
        let config = parse(&create_config_yaml());
        assert_eq!(config.delay_per_exec_duration(), Duration::from_millis(100));
        assert_eq!(config.batch_interval(), Duration::from_secs(1));
    }
}
