use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sysinfo::{CpuExt, System, SystemExt};

use crate::config::Config;

/// Metadata of one benchmark run, dumped to `config.toml` inside the
/// run directory when the run starts and rewritten with the finish
/// timestamp when it ends.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunInfo {
    /// Benchmark run id
    pub runid: String,

    /// Benchmark start time
    #[serde(rename = "start-time-utc")]
    pub start_timestamp_utc: i64,

    /// Benchmark finish time
    #[serde(rename = "finish-time-utc")]
    pub finish_timestamp_utc: Option<i64>,

    /// Root directory the corpus was collected from
    #[serde(rename = "corpus-root")]
    pub corpus_root: PathBuf,

    pub config: Config,

    pub platform: PlatformInfo,
}

impl RunInfo {
    pub fn new(
        config: &Config,
        corpus_root: &Path,
        runid: String,
        start_time: DateTime<Local>,
    ) -> Self {
        Self {
            runid,
            start_timestamp_utc: start_time.to_utc().timestamp(),
            finish_timestamp_utc: None,
            corpus_root: corpus_root.to_owned(),
            config: config.clone(),
            platform: PLATFORM_INFO.clone(),
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn dump(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}

/// Generate a run id from the host name and the local wall-clock time.
pub fn generate_runid() -> (String, DateTime<Local>) {
    let t = Local::now();
    let time = t.format("%Y-%m-%d-%a-%H%M%S").to_string();
    let host = PLATFORM_INFO.host.clone();
    (format!("{}-{}", host, time), t)
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlatformInfo {
    pub host: String,
    pub os: String,
    pub arch: String,
    #[serde(rename = "kernel-version")]
    pub kernel: String,
    #[serde(rename = "cpu-model")]
    pub cpu_model: String,
    pub memory_size: usize,
    pub pid: usize,
}

pub static PLATFORM_INFO: Lazy<PlatformInfo> = Lazy::new(|| {
    let mut sys = System::new_all();
    sys.refresh_all();
    const UNKNOWN: &str = "<unknown>";
    PlatformInfo {
        host: sys.host_name().unwrap_or(UNKNOWN.to_string()),
        os: sys.long_os_version().unwrap_or(UNKNOWN.to_string()),
        arch: std::env::consts::ARCH.to_string(),
        kernel: sys.kernel_version().unwrap_or(UNKNOWN.to_string()),
        cpu_model: sys.global_cpu_info().brand().to_owned(),
        memory_size: sys.total_memory() as usize,
        pid: std::process::id() as usize,
    }
});
