// Domain models for telemetry snapshots, alerts and runtime events.

use serde::{Deserialize, Serialize};

/// One per-container sample, produced fresh every monitoring cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStat {
    /// Short (12 character) container id.
    pub id: String,
    pub name: String,
    pub cpu_percent: f64,
    /// Human-readable "used / limit" memory string.
    pub mem_usage: String,
    pub mem_percent: f64,
    pub net_io: String,
    pub block_io: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCpu {
    pub usage_percent: f64,
    pub core_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostMemory {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_percent: f64,
}

/// Host-wide usage, computed from /proc counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostUsage {
    pub cpu: HostCpu,
    pub memory: HostMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerCounts {
    pub total: i64,
    pub running: i64,
    pub paused: i64,
    pub stopped: i64,
}

/// Aggregate runtime + host overview, embedded in every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInfo {
    pub containers: ContainerCounts,
    pub images: i64,
    pub version: String,
    pub architecture: String,
    pub os: String,
    pub kernel_version: String,
    pub host: HostUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Cpu,
    Memory,
    Container,
}

/// Fire-and-forget alert; transmitted, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    #[serde(rename = "type")]
    pub level: AlertLevel,
    pub category: AlertCategory,
    pub message: String,
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    pub container_id: String,
    pub container_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub timestamp: u64,
}

/// Classified container lifecycle event from the runtime's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeEvent {
    #[serde(rename = "type")]
    pub level: AlertLevel,
    pub category: AlertCategory,
    pub action: String,
    pub message: String,
    pub recommendation: Option<String>,
    pub container_id: String,
    pub container_name: String,
    pub image: String,
    pub timestamp: u64,
}

/// The unit pushed to a monitoring-subscribed client each cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSnapshot {
    pub stats: Vec<ContainerStat>,
    pub system_info: SystemInfo,
    pub alerts: Vec<Alert>,
    pub timestamp: u64,
}

/// Milliseconds since the unix epoch; 0 on clock error (logged).
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, operation = "now_millis", "system time error");
            0
        })
}

/// First 12 characters of a container id, the runtime's short form.
pub fn short_id(id: &str) -> String {
    id.chars().take(12).collect()
}

/// Formats a byte count as a short human string ("512.0MiB").
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
