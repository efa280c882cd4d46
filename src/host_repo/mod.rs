// Host CPU/memory usage from /proc pseudo-files.

use crate::models::{HostCpu, HostMemory, HostUsage};
use std::sync::Mutex;
use std::time::Duration;
use sysinfo::System;
use tracing::warn;

const PROC_STAT: &str = "/proc/stat";
const PROC_MEMINFO: &str = "/proc/meminfo";

/// Point-in-time read of the aggregate cpu line. Idle includes iowait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CpuSample {
    pub total: u64,
    pub idle: u64,
}

pub struct HostRepo {
    sys: Mutex<System>,
    sample_window: Duration,
}

impl HostRepo {
    pub fn new(sample_window_ms: u64) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_all();
        Self {
            sys: Mutex::new(sys),
            sample_window: Duration::from_millis(sample_window_ms),
        }
    }

    /// Host CPU usage from two /proc/stat reads separated by the sample
    /// window. Any read/parse failure degrades to 0%, logged.
    pub async fn sample_cpu(&self) -> HostCpu {
        let first = read_cpu_sample();
        tokio::time::sleep(self.sample_window).await;
        let second = read_cpu_sample();
        let usage_percent = match (first, second) {
            (Some(a), Some(b)) => cpu_percent(a, b),
            _ => 0.0,
        };
        HostCpu {
            usage_percent,
            core_count: self.core_count(),
        }
    }

    /// Host memory from a single /proc/meminfo read.
    pub fn sample_memory(&self) -> HostMemory {
        match std::fs::read_to_string(PROC_MEMINFO) {
            Ok(contents) => match parse_meminfo(&contents) {
                Some((total, available)) => memory_from_kb(total, available),
                None => {
                    warn!(operation = "sample_memory", "failed to parse {}", PROC_MEMINFO);
                    memory_from_kb(0, 0)
                }
            },
            Err(e) => {
                warn!(error = %e, operation = "sample_memory", "failed to read {}", PROC_MEMINFO);
                memory_from_kb(0, 0)
            }
        }
    }

    pub async fn sample(&self) -> HostUsage {
        let cpu = self.sample_cpu().await;
        let memory = self.sample_memory();
        HostUsage { cpu, memory }
    }

    fn core_count(&self) -> u32 {
        match self.sys.lock() {
            Ok(sys) => sys.cpus().len() as u32,
            Err(e) => {
                warn!(error = %e, operation = "core_count", "sysinfo lock poisoned");
                0
            }
        }
    }
}

fn read_cpu_sample() -> Option<CpuSample> {
    match std::fs::read_to_string(PROC_STAT) {
        Ok(contents) => {
            let sample = parse_proc_stat(&contents);
            if sample.is_none() {
                warn!(operation = "sample_cpu", "failed to parse {}", PROC_STAT);
            }
            sample
        }
        Err(e) => {
            warn!(error = %e, operation = "sample_cpu", "failed to read {}", PROC_STAT);
            None
        }
    }
}

/// Parses the aggregate "cpu " line: user nice system idle iowait irq softirq
/// steal [guest guest_nice]. Guest time is already folded into user time.
pub(crate) fn parse_proc_stat(contents: &str) -> Option<CpuSample> {
    let line = contents.lines().find(|l| {
        l.starts_with("cpu") && l.as_bytes().get(3).is_some_and(|b| b.is_ascii_whitespace())
    })?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<Vec<u64>>>()?;
    if fields.len() < 5 {
        return None;
    }
    let idle = fields[3] + fields[4];
    let total = fields.iter().sum();
    Some(CpuSample { total, idle })
}

/// usage% = (Δtotal − Δidle) / Δtotal × 100; 0 when the window is empty.
pub(crate) fn cpu_percent(prev: CpuSample, cur: CpuSample) -> f64 {
    let total_delta = cur.total.saturating_sub(prev.total);
    let idle_delta = cur.idle.saturating_sub(prev.idle);
    if total_delta == 0 {
        return 0.0;
    }
    let busy = total_delta.saturating_sub(idle_delta);
    (busy as f64 / total_delta as f64 * 100.0).clamp(0.0, 100.0)
}

pub(crate) fn parse_meminfo(contents: &str) -> Option<(u64, u64)> {
    let mut total = None;
    let mut available = None;
    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = rest.split_whitespace().next()?.parse().ok();
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available = rest.split_whitespace().next()?.parse().ok();
        }
        if total.is_some() && available.is_some() {
            break;
        }
    }
    Some((total?, available?))
}

fn memory_from_kb(total_kb: u64, available_kb: u64) -> HostMemory {
    let total = total_kb * 1024;
    let available = available_kb * 1024;
    let used = total.saturating_sub(available);
    let used_percent = if total > 0 {
        used as f64 / total as f64 * 100.0
    } else {
        0.0
    };
    HostMemory {
        used_bytes: used,
        total_bytes: total,
        available_bytes: available,
        used_percent,
    }
}
