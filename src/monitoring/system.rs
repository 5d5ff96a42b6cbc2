//! Host resource snapshot gathered from sysinfo.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use sysinfo::System;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub total: u64,
    pub free: u64,
    pub used: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    pub cores: usize,
    pub model: String,
    pub load_average: [f64; 3],
    pub usage: f32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInfo {
    #[serde(rename = "type")]
    pub os_type: String,
    pub platform: &'static str,
    pub arch: &'static str,
    pub release: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemSnapshot {
    pub uptime: u64,
    pub memory: MemoryInfo,
    pub cpu: CpuInfo,
    pub platform: PlatformInfo,
}

/// Keeps one `System` around so CPU usage is measured between refreshes.
pub struct SystemSampler {
    sys: Mutex<System>,
    started: Instant,
}

impl Default for SystemSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemSampler {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();
        Self {
            sys: Mutex::new(sys),
            started: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        let mut sys = self.sys.lock().unwrap_or_else(PoisonError::into_inner);
        sys.refresh_memory();
        sys.refresh_cpu();

        let total = sys.total_memory();
        let used = sys.used_memory();
        let usage_percent = if total == 0 {
            0.0
        } else {
            (used as f64 / total as f64 * 10_000.0).round() / 100.0
        };
        let load = System::load_average();

        SystemSnapshot {
            uptime: self.uptime_secs(),
            memory: MemoryInfo {
                total,
                free: total.saturating_sub(used),
                used,
                usage_percent,
            },
            cpu: CpuInfo {
                cores: sys.cpus().len(),
                model: sys
                    .cpus()
                    .first()
                    .map(|c| c.brand().trim().to_string())
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                load_average: [load.one, load.five, load.fifteen],
                usage: sys.global_cpu_info().cpu_usage(),
            },
            platform: PlatformInfo {
                os_type: System::name().unwrap_or_else(|| "Unknown".to_string()),
                platform: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                release: System::kernel_version().unwrap_or_default(),
            },
        }
    }
}
