use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitoring: MonitoringConfig,
    pub events: EventsConfig,
    pub terminal: TerminalConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    /// Interval used when a client starts monitoring without one.
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,
    /// Window between the two /proc/stat reads used for host CPU usage.
    #[serde(default = "default_cpu_sample_window_ms")]
    pub cpu_sample_window_ms: u64,
    #[serde(default = "default_cpu_warning")]
    pub cpu_warning: f64,
    #[serde(default = "default_memory_warning")]
    pub memory_warning: f64,
    #[serde(default = "default_cpu_critical")]
    pub cpu_critical: f64,
    #[serde(default = "default_memory_critical")]
    pub memory_critical: f64,
    /// Runtime events kept in the broadcast channel (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Delay before resubscribing after the event stream drops.
    #[serde(default = "default_restart_backoff_secs")]
    pub restart_backoff_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TerminalConfig {
    /// Bound on the SSH connect + auth handshake.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How long the tunnel backend waits for a password prompt.
    #[serde(default = "default_prompt_timeout_secs")]
    pub prompt_timeout_secs: u64,
    /// ProxyCommand template for tunneled SSH; %h is replaced with the host.
    #[serde(default = "default_tunnel_proxy_command")]
    pub tunnel_proxy_command: String,
    /// Per-instance ceiling on simultaneously open terminal backends.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_cpu_sample_window_ms() -> u64 {
    100
}

fn default_cpu_warning() -> f64 {
    80.0
}

fn default_memory_warning() -> f64 {
    85.0
}

fn default_cpu_critical() -> f64 {
    95.0
}

fn default_memory_critical() -> f64 {
    95.0
}

fn default_broadcast_capacity() -> usize {
    64
}

fn default_restart_backoff_secs() -> u64 {
    5
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_prompt_timeout_secs() -> u64 {
    15
}

fn default_tunnel_proxy_command() -> String {
    "cloudflared access ssh --hostname %h".to_string()
}

fn default_max_concurrent() -> usize {
    32
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.monitoring.default_interval_ms > 0,
            "monitoring.default_interval_ms must be > 0, got {}",
            self.monitoring.default_interval_ms
        );
        anyhow::ensure!(
            self.monitoring.cpu_sample_window_ms > 0,
            "monitoring.cpu_sample_window_ms must be > 0, got {}",
            self.monitoring.cpu_sample_window_ms
        );
        anyhow::ensure!(
            self.monitoring.broadcast_capacity > 0,
            "monitoring.broadcast_capacity must be > 0, got {}",
            self.monitoring.broadcast_capacity
        );
        for (name, value) in [
            ("monitoring.cpu_warning", self.monitoring.cpu_warning),
            ("monitoring.memory_warning", self.monitoring.memory_warning),
            ("monitoring.cpu_critical", self.monitoring.cpu_critical),
            ("monitoring.memory_critical", self.monitoring.memory_critical),
        ] {
            anyhow::ensure!(
                (0.0..=100.0).contains(&value),
                "{} must be within [0, 100], got {}",
                name,
                value
            );
        }
        anyhow::ensure!(
            self.monitoring.cpu_warning <= self.monitoring.cpu_critical,
            "monitoring.cpu_warning ({}) must not exceed monitoring.cpu_critical ({})",
            self.monitoring.cpu_warning,
            self.monitoring.cpu_critical
        );
        anyhow::ensure!(
            self.monitoring.memory_warning <= self.monitoring.memory_critical,
            "monitoring.memory_warning ({}) must not exceed monitoring.memory_critical ({})",
            self.monitoring.memory_warning,
            self.monitoring.memory_critical
        );
        anyhow::ensure!(
            self.events.restart_backoff_secs > 0,
            "events.restart_backoff_secs must be > 0, got {}",
            self.events.restart_backoff_secs
        );
        anyhow::ensure!(
            self.terminal.connect_timeout_secs > 0,
            "terminal.connect_timeout_secs must be > 0, got {}",
            self.terminal.connect_timeout_secs
        );
        anyhow::ensure!(
            self.terminal.prompt_timeout_secs > 0,
            "terminal.prompt_timeout_secs must be > 0, got {}",
            self.terminal.prompt_timeout_secs
        );
        anyhow::ensure!(
            !self.terminal.tunnel_proxy_command.is_empty(),
            "terminal.tunnel_proxy_command must be non-empty"
        );
        anyhow::ensure!(
            self.terminal.max_concurrent > 0,
            "terminal.max_concurrent must be > 0, got {}",
            self.terminal.max_concurrent
        );
        Ok(())
    }
}
