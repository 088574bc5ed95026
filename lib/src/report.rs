use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;

use crate::process::ProcessSnapshot;
use crate::stats::ReportedUtilization;

/// Utilization snapshot appended to the report file by
/// `write_utilization_report`.
#[derive(Clone, Serialize, Deserialize)]
pub struct UtilizationReport {
    pub generated_at: String,
    pub utilization: ReportedUtilization,
    pub running_processes: Vec<ProcessSnapshot>,
    pub finished_processes: Vec<ProcessSnapshot>,
}

pub fn create_report_file(folder_path: &str, file_name: &str) -> String {
    if fs::metadata(folder_path).is_err() {
        let _ = fs::create_dir_all(folder_path);
        info!("Created folder: {}", folder_path);
    }
    let file_path = format!("{}/{}.yaml", folder_path, file_name);
    if let Err(err) = fs::File::create(&file_path) {
        warn!("Failed to create file: {}", err);
    }
    file_path
}

pub fn create_scheduler_report_yaml(dir_path: &str, alg_name: &str) -> String {
    let now: DateTime<Utc> = Utc::now();
    let date = now.format("%Y-%m-%d-%H-%M-%S").to_string();
    let file_name = format!("{}-{}-report", date, alg_name);
    create_report_file(dir_path, &file_name)
}

/// The report file is append-only; earlier snapshots are never truncated.
pub fn append_info_to_report(file_path: &str, info: &str) {
    if let Ok(mut file) = OpenOptions::new()
        .write(true)
        .append(true)
        .create(true)
        .open(file_path)
    {
        if let Err(err) = file.write_all(info.as_bytes()) {
            eprintln!("Failed to write to file: {}", err);
        }
    } else {
        eprintln!("Failed to open file: {}", file_path);
    }
}

pub fn dump_utilization_report_to_yaml(file_path: &str, report: &UtilizationReport) {
    let yaml =
        serde_yaml::to_string(report).expect("Failed to serialize UtilizationReport to YAML");
    append_info_to_report(file_path, &yaml);
}
