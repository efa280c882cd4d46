// Config loading and validation tests

use dockbridge::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[monitoring]
default_interval_ms = 5000
cpu_sample_window_ms = 100
cpu_warning = 80.0
memory_warning = 85.0
cpu_critical = 95.0
memory_critical = 95.0
broadcast_capacity = 64

[events]
restart_backoff_secs = 5

[terminal]
connect_timeout_secs = 30
prompt_timeout_secs = 15
tunnel_proxy_command = "cloudflared access ssh --hostname %h"
max_concurrent = 32
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.monitoring.default_interval_ms, 5000);
    assert_eq!(config.monitoring.cpu_warning, 80.0);
    assert_eq!(config.events.restart_backoff_secs, 5);
    assert_eq!(config.terminal.max_concurrent, 32);
    assert_eq!(
        config.terminal.tunnel_proxy_command,
        "cloudflared access ssh --hostname %h"
    );
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_interval_zero() {
    let bad = VALID_CONFIG.replace("default_interval_ms = 5000", "default_interval_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("default_interval_ms"));
}

#[test]
fn test_config_validation_rejects_cpu_sample_window_zero() {
    let bad = VALID_CONFIG.replace("cpu_sample_window_ms = 100", "cpu_sample_window_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("cpu_sample_window_ms"));
}

#[test]
fn test_config_validation_rejects_broadcast_capacity_zero() {
    let bad = VALID_CONFIG.replace("broadcast_capacity = 64", "broadcast_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("broadcast_capacity"));
}

#[test]
fn test_config_validation_rejects_out_of_range_threshold() {
    let bad = VALID_CONFIG.replace("cpu_warning = 80.0", "cpu_warning = 140.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("cpu_warning"));

    let bad = VALID_CONFIG.replace("memory_critical = 95.0", "memory_critical = -1.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("memory_critical"));
}

#[test]
fn test_config_validation_rejects_warning_above_critical() {
    let bad = VALID_CONFIG.replace("cpu_warning = 80.0", "cpu_warning = 99.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("cpu_warning"));

    let bad = VALID_CONFIG.replace("memory_warning = 85.0", "memory_warning = 96.0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("memory_warning"));
}

#[test]
fn test_config_validation_rejects_restart_backoff_zero() {
    let bad = VALID_CONFIG.replace("restart_backoff_secs = 5", "restart_backoff_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("restart_backoff_secs"));
}

#[test]
fn test_config_validation_rejects_connect_timeout_zero() {
    let bad = VALID_CONFIG.replace("connect_timeout_secs = 30", "connect_timeout_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("connect_timeout_secs"));
}

#[test]
fn test_config_validation_rejects_empty_proxy_command() {
    let bad = VALID_CONFIG.replace(
        "tunnel_proxy_command = \"cloudflared access ssh --hostname %h\"",
        "tunnel_proxy_command = \"\"",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("tunnel_proxy_command"));
}

#[test]
fn test_config_validation_rejects_max_concurrent_zero() {
    let bad = VALID_CONFIG.replace("max_concurrent = 32", "max_concurrent = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_concurrent"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.monitoring.broadcast_capacity, 64);
}

const MINIMAL_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[monitoring]

[events]

[terminal]
"#;

#[test]
fn test_config_defaults_when_omitted() {
    let config = AppConfig::load_from_str(MINIMAL_CONFIG).expect("valid");
    assert_eq!(config.monitoring.default_interval_ms, 5000);
    assert_eq!(config.monitoring.cpu_sample_window_ms, 100);
    assert_eq!(config.monitoring.cpu_warning, 80.0);
    assert_eq!(config.monitoring.memory_warning, 85.0);
    assert_eq!(config.monitoring.cpu_critical, 95.0);
    assert_eq!(config.monitoring.memory_critical, 95.0);
    assert_eq!(config.events.restart_backoff_secs, 5);
    assert_eq!(config.terminal.connect_timeout_secs, 30);
    assert_eq!(config.terminal.prompt_timeout_secs, 15);
    assert_eq!(config.terminal.max_concurrent, 32);
    assert!(config.terminal.tunnel_proxy_command.contains("%h"));
}
