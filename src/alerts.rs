// Threshold evaluation for container stats. Pure: no I/O, no hidden state.

use crate::config::MonitoringConfig;
use crate::models::{Alert, AlertCategory, AlertLevel, ContainerStat};

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub cpu_warning: f64,
    pub memory_warning: f64,
    pub cpu_critical: f64,
    pub memory_critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            cpu_warning: 80.0,
            memory_warning: 85.0,
            cpu_critical: 95.0,
            memory_critical: 95.0,
        }
    }
}

impl From<&MonitoringConfig> for Thresholds {
    fn from(c: &MonitoringConfig) -> Self {
        Self {
            cpu_warning: c.cpu_warning,
            memory_warning: c.memory_warning,
            cpu_critical: c.cpu_critical,
            memory_critical: c.memory_critical,
        }
    }
}

/// Evaluates each stat against the thresholds. CPU and memory are checked
/// independently, so a single container can produce 0, 1 or 2 alerts.
pub fn evaluate(thresholds: &Thresholds, stats: &[ContainerStat]) -> Vec<Alert> {
    let mut alerts = Vec::new();
    for stat in stats {
        if let Some(alert) = check_dimension(
            thresholds.cpu_critical,
            thresholds.cpu_warning,
            AlertCategory::Cpu,
            stat.cpu_percent,
            stat,
        ) {
            alerts.push(alert);
        }
        if let Some(alert) = check_dimension(
            thresholds.memory_critical,
            thresholds.memory_warning,
            AlertCategory::Memory,
            stat.mem_percent,
            stat,
        ) {
            alerts.push(alert);
        }
    }
    alerts
}

fn check_dimension(
    critical: f64,
    warning: f64,
    category: AlertCategory,
    value: f64,
    stat: &ContainerStat,
) -> Option<Alert> {
    let (level, threshold) = if value >= critical {
        (AlertLevel::Critical, critical)
    } else if value >= warning {
        (AlertLevel::Warning, warning)
    } else {
        return None;
    };
    let dimension = match category {
        AlertCategory::Cpu => "CPU",
        AlertCategory::Memory => "memory",
        AlertCategory::Container => "container",
    };
    Some(Alert {
        level,
        category,
        message: format!(
            "Container {} {} usage at {:.1}%",
            stat.name, dimension, value
        ),
        recommendation: Some(recommendation(level, category).to_string()),
        value: Some(value.clamp(0.0, 100.0)),
        threshold: Some(threshold),
        container_id: stat.id.clone(),
        container_name: stat.name.clone(),
        image: None,
        timestamp: stat.timestamp,
    })
}

/// Fixed human-readable recommendation keyed by (level, category).
fn recommendation(level: AlertLevel, category: AlertCategory) -> &'static str {
    match (level, category) {
        (AlertLevel::Critical, AlertCategory::Cpu) => {
            "CPU is saturated. Scale the workload out or raise the CPU limit now."
        }
        (AlertLevel::Warning, AlertCategory::Cpu) => {
            "Review the container workload; consider scaling before it saturates."
        }
        (AlertLevel::Critical, AlertCategory::Memory) => {
            "Memory is nearly exhausted. Raise the limit or restart the container."
        }
        (AlertLevel::Warning, AlertCategory::Memory) => {
            "Memory pressure is building; check for leaks or raise the limit."
        }
        _ => "Inspect the container state.",
    }
}
