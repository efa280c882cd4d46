// Turn a raw Docker stats sample into a ContainerStat.

use crate::models::{ContainerStat, format_bytes, short_id};
use bollard::container::Stats;

/// Builds a ContainerStat from a raw stats response. Every field is parsed
/// defensively: a missing or garbled counter becomes 0, never an error, so
/// one bad sample cannot abort the whole snapshot.
pub(crate) fn build_stat(s: &Stats, id: &str, name: &str, timestamp: u64) -> ContainerStat {
    let cpu_delta = s
        .cpu_stats
        .cpu_usage
        .total_usage
        .wrapping_sub(s.precpu_stats.cpu_usage.total_usage) as i64;
    let system_delta = s.cpu_stats.system_cpu_usage.unwrap_or(0) as i64
        - s.precpu_stats.system_cpu_usage.unwrap_or(0) as i64;
    let online = s.cpu_stats.online_cpus.unwrap_or(1) as f64;
    let cpu_percent = if system_delta > 0 && cpu_delta > 0 && online > 0.0 {
        cpu_delta as f64 / system_delta as f64 * online * 100.0
    } else {
        0.0
    };

    let mem_usage = s.memory_stats.usage.unwrap_or(0);
    let mem_limit = s.memory_stats.limit.unwrap_or(0);
    let mem_percent = if mem_limit > 0 {
        (mem_usage as f64 / mem_limit as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };

    let (net_rx, net_tx) = s.networks.as_ref().map_or((0u64, 0u64), |n| {
        n.values()
            .fold((0, 0), |(rx, tx), v| (rx + v.rx_bytes, tx + v.tx_bytes))
    });

    let (block_read, block_write) = s
        .blkio_stats
        .io_service_bytes_recursive
        .as_ref()
        .map_or((0u64, 0u64), |entries| {
            entries.iter().fold((0, 0), |(read, write), e| {
                if e.op.eq_ignore_ascii_case("read") {
                    (read + e.value, write)
                } else if e.op.eq_ignore_ascii_case("write") {
                    (read, write + e.value)
                } else {
                    (read, write)
                }
            })
        });

    ContainerStat {
        id: short_id(id),
        name: name.to_string(),
        cpu_percent: cpu_percent.max(0.0),
        mem_usage: format!("{} / {}", format_bytes(mem_usage), format_bytes(mem_limit)),
        mem_percent,
        net_io: format!("{} / {}", format_bytes(net_rx), format_bytes(net_tx)),
        block_io: format!("{} / {}", format_bytes(block_read), format_bytes(block_write)),
        timestamp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(cpu_stats: serde_json::Value, extra: serde_json::Value) -> Stats {
        let mut v = json!({
            "read": "0001-01-01T00:00:00Z",
            "preread": "0001-01-01T00:00:00Z",
            "num_procs": 0,
            "pids_stats": {},
            "memory_stats": {},
            "blkio_stats": {},
            "storage_stats": {},
            "cpu_stats": cpu_stats,
            "precpu_stats": {
                "cpu_usage": { "total_usage": 50_000_000u64, "usage_in_usermode": 0, "usage_in_kernelmode": 0 },
                "system_cpu_usage": 500_000_000u64,
                "throttling_data": { "periods": 0, "throttled_periods": 0, "throttled_time": 0 }
            },
            "name": "/web",
            "id": "abc"
        });
        if let (Some(obj), Some(extra)) = (v.as_object_mut(), extra.as_object()) {
            for (k, val) in extra {
                obj.insert(k.clone(), val.clone());
            }
        }
        serde_json::from_value(v).expect("stats fixture")
    }

    fn cpu(total_usage: u64, system_cpu_usage: u64) -> serde_json::Value {
        json!({
            "cpu_usage": { "total_usage": total_usage, "usage_in_usermode": 0, "usage_in_kernelmode": 0 },
            "system_cpu_usage": system_cpu_usage,
            "online_cpus": 2,
            "throttling_data": { "periods": 0, "throttled_periods": 0, "throttled_time": 0 }
        })
    }

    #[test]
    fn build_stat_computes_cpu_memory_and_io() {
        let s = sample(
            cpu(100_000_000, 1_000_000_000),
            json!({
                "memory_stats": { "usage": 268_435_456u64, "limit": 536_870_912u64 },
                "networks": {
                    "eth0": {
                        "rx_bytes": 1000, "tx_bytes": 2000,
                        "rx_packets": 0, "tx_packets": 0,
                        "rx_errors": 0, "tx_errors": 0,
                        "rx_dropped": 0, "tx_dropped": 0
                    }
                },
                "blkio_stats": {
                    "io_service_bytes_recursive": [
                        { "major": 8, "minor": 0, "op": "Read", "value": 1024 },
                        { "major": 8, "minor": 0, "op": "Write", "value": 2048 }
                    ]
                }
            }),
        );
        let out = build_stat(&s, "abcdef1234567890", "web", 42);
        assert_eq!(out.id, "abcdef123456");
        assert_eq!(out.name, "web");
        // (50e6 / 500e6) * 2 cpus * 100
        assert!((out.cpu_percent - 20.0).abs() < 0.01);
        assert_eq!(out.mem_usage, "256.0MiB / 512.0MiB");
        assert!((out.mem_percent - 50.0).abs() < 0.01);
        assert_eq!(out.net_io, "1000B / 2.0KiB");
        assert_eq!(out.block_io, "1.0KiB / 2.0KiB");
        assert_eq!(out.timestamp, 42);
    }

    #[test]
    fn build_stat_zero_system_delta_is_zero_cpu() {
        let s = sample(cpu(100_000_000, 500_000_000), json!({}));
        let out = build_stat(&s, "id", "n", 0);
        assert_eq!(out.cpu_percent, 0.0);
    }

    #[test]
    fn build_stat_missing_counters_degrade_to_zero() {
        let s = sample(
            json!({
                "cpu_usage": { "total_usage": 0, "usage_in_usermode": 0, "usage_in_kernelmode": 0 },
                "throttling_data": { "periods": 0, "throttled_periods": 0, "throttled_time": 0 }
            }),
            json!({}),
        );
        let out = build_stat(&s, "id", "n", 0);
        assert_eq!(out.cpu_percent, 0.0);
        assert_eq!(out.mem_percent, 0.0);
        assert!(!out.cpu_percent.is_nan());
        assert!(!out.mem_percent.is_nan());
        assert_eq!(out.mem_usage, "0B / 0B");
        assert_eq!(out.net_io, "0B / 0B");
    }

    #[test]
    fn build_stat_never_negative_on_counter_reset() {
        // precpu ahead of cpu (counter reset after daemon restart)
        let s = sample(cpu(10_000_000, 400_000_000), json!({}));
        let out = build_stat(&s, "id", "n", 0);
        assert!(out.cpu_percent >= 0.0);
    }
}
